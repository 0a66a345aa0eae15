pub mod decision_repo;
pub mod migrations;
pub mod observation_repo;
pub mod run_repo;
pub mod vector_store;

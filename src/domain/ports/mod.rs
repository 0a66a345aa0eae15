pub mod decision_repository;
pub mod embedding;
pub mod notifier;
pub mod observation_repository;
pub mod reasoning;
pub mod run_repository;
pub mod source;
pub mod vector_store;

pub mod embeddings;
pub mod notify;
pub mod reasoning;
pub mod sources;
pub mod sqlite;

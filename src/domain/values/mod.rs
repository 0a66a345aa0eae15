pub mod confidence;
pub mod fingerprint;
pub mod retry;
pub mod sentiment;
pub mod signal;
pub mod source_kind;

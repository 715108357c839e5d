pub mod assistant_service;
pub mod prompt;
pub mod retrieval_service;

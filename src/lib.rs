//! code-assist — routes natural-language requests to specialized
//! assistants and streams their answers back incrementally.

pub mod agents;
pub mod config;
pub mod error;
pub mod llm;
pub mod retrieval;
pub mod router;
pub mod session;
pub mod stream;
pub mod supervisor;

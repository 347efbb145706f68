//! Destination handlers — the three assistants a query can be routed to.

pub mod explainer;
pub mod generator;
pub mod repository;

pub use explainer::CodeExplainer;
pub use generator::CodeGenerator;
pub use repository::RepositoryAgent;

//! Document store backends for visagent retrieval.
//!
//! Two implementations of the core `DocumentStore` trait:
//! - `HttpDocumentStore` — talks to an external retrieval service
//! - `InMemoryDocumentStore` — keyword search over a Vec, for tests
//!   and ephemeral deployments

pub mod http;
pub mod in_memory;

pub use http::HttpDocumentStore;
pub use in_memory::InMemoryDocumentStore;

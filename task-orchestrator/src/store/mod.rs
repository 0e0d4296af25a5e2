//! Task store clients.
//!
//! The engine talks to the external task store through the `TaskStore`
//! trait; `http` is the production client, `memory` a self-contained
//! implementation for tests and local runs.

pub mod http;
pub mod memory;

pub use http::HttpTaskStore;
pub use memory::MemoryTaskStore;

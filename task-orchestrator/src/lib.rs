// Dependency graph construction and critical path analysis
pub mod graph;

// Priority scoring
pub mod scoring;

// Task lifecycle state machine
pub mod state;

// Coherent batch selection
pub mod batch;

// Durable context registry cache
pub mod registry;

// Context recovery after working-memory loss
pub mod recovery;

// Keyword-driven knowledge module routing
pub mod knowledge;

// Task store clients
pub mod store;

// Orchestration session facade
pub mod session;

// Configuration loading
pub mod config;

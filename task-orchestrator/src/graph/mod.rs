//! Dependency graph construction and analysis.
//!
//! The builder turns a flat, possibly inconsistent task list into an
//! index-based adjacency structure; the analyzer computes blocking-chain
//! lengths and critical-path membership on the acyclic residual.

pub mod builder;
pub mod critical_path;

pub use builder::{DependencyGraph, GraphWarning};
pub use critical_path::{analyze, CriticalPathAnalysis};

//! Persistence layer: entities, the store abstraction, and its backends.

pub mod challenge_store;
pub mod models;
pub mod storage;

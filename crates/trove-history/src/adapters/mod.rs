//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound ports: the explorer HTTP log source and the
//! session checkpoint stores.

mod checkpoint;
mod explorer;

pub use checkpoint::{InMemoryCheckpointStore, SessionFileCheckpointStore, DEFAULT_SESSION_KEY};
pub use explorer::ExplorerLogSource;

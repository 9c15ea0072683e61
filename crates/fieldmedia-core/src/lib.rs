//! FieldMedia core library
//!
//! Domain models, typed errors, lifecycle events, and engine configuration
//! shared across all FieldMedia crates. This crate performs no I/O.

pub mod config;
pub mod error;
pub mod events;
pub mod models;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{AdmissionError, DerivativeError};
pub use events::{EventBus, MediaEvent};

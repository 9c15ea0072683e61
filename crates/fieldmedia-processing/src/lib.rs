//! Admission control and derivative generation.
//!
//! Admission rejects oversized, disallowed, over-quota, or undecodable
//! candidates before anything is persisted. The derivative pipeline then
//! produces the compressed, thumbnail, and preview variants per media kind;
//! each step fails independently and failures are recorded per variant.

pub mod admission;
pub mod audio;
pub mod document;
pub mod image_media;
pub mod pipeline;
pub mod video;

pub use admission::AdmissionController;
pub use pipeline::{CompressedOutput, DerivativeOutput, DerivativePipeline, DerivativeStrategy};

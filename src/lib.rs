pub mod calibrate;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod provider;
pub mod references;
pub mod sifter;
pub mod similarity;
pub mod store;

pub use error::SiftError;

// Re-export vision types for convenience
pub use facesift_vision::{Embedding, ModelPaths, Pipeline};

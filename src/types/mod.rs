//! Core data types shared across the engine

pub mod model;
pub mod turn;

pub use model::{ModelCatalog, ModelDescriptor, ProviderKind};
pub use turn::{Role, StreamFragment, Turn};

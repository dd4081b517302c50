//! Model registry: which logical models exist and where they are served.

mod registry;

pub use registry::{ModelConfig, ModelRegistry, RegistryError, UnknownModel};

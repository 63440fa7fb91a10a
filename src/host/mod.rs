//! The engine host (C4): one single-writer task per symbol plus the registry
//! that creates them lazily and dispatches commands to them.

mod engine_host;
mod registry;

pub use engine_host::EngineHost;
pub use registry::{EngineHandle, EngineRegistry};

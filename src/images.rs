/*! Shaders, fixed-function state and the [`Engine`] that owns a device and its resources. */

pub mod engine;
pub mod render_state;
pub mod shader;

pub use engine::{Engine, EngineParts};

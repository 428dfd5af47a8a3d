// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! GPU resources and the managers that own them. */

pub mod buffer;
pub mod chain;
pub mod texture;
pub mod uniforms;
pub mod visible_to;

pub use buffer::{BufferHandle, BufferManager};
pub use texture::{TextureHandle, TextureManager};
pub use uniforms::UniformTable;

// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
wgpu backend.

[`BoundDevice`] implements [`crate::Device`] on a `wgpu::Device`/`wgpu::Queue` pair.
Creation and upload calls go straight to wgpu inside error scopes; binding calls are
recorded into [`RecordedBindings`] for whatever builds the render pass.
*/

mod bound_device;
mod buffer;
mod error;
mod mipmaps;
mod pixel_format;
mod texture;

pub use bound_device::{BoundDevice, ColorBinding, RecordedBindings};
pub use buffer::Buffer;
pub use texture::{Staging, Texture, View};

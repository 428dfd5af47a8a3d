/*! textures_and_uniforms is the GPU resource layer underneath a renderer: it creates,
formats, updates and binds textures, buffers and shader uniforms.

Here is a quick chart of what lives where:

| Concern                        | Module                          | Key types                                      |
|--------------------------------|---------------------------------|------------------------------------------------|
| Format resolution              | [`pixel_formats`]               | [`pixel_formats::FormatResolver`], [`pixel_formats::FormatDescriptor`] |
| Mip/subresource layout         | [`mip_chain`]                   | [`mip_chain::SubresourceLayout`], [`mip_chain::MipClamp`] |
| Textures, chains, depth cache  | [`bindings::texture`]           | [`bindings::texture::TextureManager`], [`bindings::chain::TextureChain`] |
| Vertex/index/uniform/compute   | [`bindings::buffer`]            | [`bindings::buffer::BufferManager`]            |
| Uniform reflection             | [`bindings::uniforms`]          | [`bindings::uniforms::UniformTable`]           |
| Shaders, render state, engine  | [`images`]                      | [`images::Engine`], [`images::shader::Shader`] |
| Backends                       | [`Device`], [`headless`]        | [`headless::HeadlessDevice`], `BoundDevice` (wgpu) |

# Ownership

Every GPU object is owned by exactly one manager.  Callers receive small generational
handles ([`bindings::texture::TextureHandle`], [`bindings::buffer::BufferHandle`]); using a handle
after its resource was destroyed is reported as [`Error::StaleHandle`] rather than
touching freed memory.

# Threading

The layer is single-threaded.  All creation, uniform writes and binding happen on the
render thread in program order, so nothing here locks.

# Backends

The default backend is [wgpu](https://wgpu.rs) (feature `backend_wgpu`).  A recording
[`headless`] backend is always available; it performs no GPU work but keeps exact
allocation and binding records, which makes it suitable for tests and for hosts without
an adapter.
*/
// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

pub mod bindings;
pub mod error;
pub mod images;
pub mod mip_chain;
pub mod pixel_formats;
mod bittricks;
mod imp;

pub use error::{Error, GpuFault, GpuResourceError};
pub use imp::{
    BackBufferInfo, BufferDescriptor, ColorTarget, Device, MapDiscipline, MipUpload,
    TextureDescriptor, TextureUsages, ViewDescriptor, ViewKind, headless,
};

#[cfg(feature = "backend_wgpu")]
pub use imp::wgpu::{
    BoundDevice, ColorBinding, RecordedBindings, Buffer as WgpuBuffer, Staging as WgpuStaging,
    Texture as WgpuTexture, View as WgpuView,
};

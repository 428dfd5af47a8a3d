// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Backend seam.

Managers in [`crate::bindings`] are generic over a [`Device`].  The trait only speaks in
backend-neutral descriptors; everything format- or API-specific happens behind it.
*/

use crate::Error;
use crate::bindings::buffer::{BufferKind, StorageKind};
use crate::images::render_state::RasterState;
use crate::images::shader::Stage;
use crate::pixel_formats::StorageFormat;

pub mod headless;

#[cfg(feature = "backend_wgpu")]
pub mod wgpu;

bitflags::bitflags! {
    /// How a texture allocation will be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsages: u32 {
        const SHADER_READ = 1 << 0;
        const RENDER_TARGET = 1 << 1;
        const DEPTH_STENCIL = 1 << 2;
        const COPY_SRC = 1 << 3;
        const COPY_DST = 1 << 4;
    }
}

/// A single GPU texture allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDescriptor<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    /// 6 for cubemaps.
    pub array_layers: u32,
    pub mip_levels: u32,
    pub sample_count: u32,
    pub format: StorageFormat,
    pub usage: TextureUsages,
}

/// Initial contents of one subresource, tightly packed in blocks.
#[derive(Debug, Clone, Copy)]
pub struct MipUpload<'a> {
    pub layer: u32,
    /// Level in the allocation (not in the source stream).
    pub level: u32,
    pub width: u32,
    pub height: u32,
    pub row_pitch: u32,
    /// Rows of blocks.
    pub rows: u32,
    pub data: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// All levels and layers, as a 2D (or 2D array) texture.
    ShaderResource,
    /// All six layers as a cube.
    ShaderCube,
    /// Level 0 of one layer, as a color attachment.
    RenderTarget { layer: u32 },
    /// Level 0 of one layer, as a depth attachment.
    DepthStencil { layer: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewDescriptor {
    pub format: StorageFormat,
    pub kind: ViewKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDescriptor<'a> {
    pub label: &'a str,
    /// Allocation size, already padded.
    pub size: u64,
    pub kind: BufferKind,
    pub storage: StorageKind,
}

/// Update discipline for dynamic buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapDiscipline {
    /// Previous contents may be thrown away; the driver may rename the allocation.
    Discard,
    /// The caller guarantees no in-flight GPU read overlaps the written region.
    NoOverwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackBufferInfo {
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
}

/// Color attachment for subsequent draws.
#[derive(Debug)]
pub enum ColorTarget<'a, V> {
    BackBuffer,
    View(&'a V),
}

impl<V> Clone for ColorTarget<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<V> Copy for ColorTarget<'_, V> {}

/**
A GPU device.

Resource types are owned values: dropping one releases the backend object.  Views are
always dropped before the texture they were created from.

Every fallible method reports device-level failures as [`Error::Gpu`]; once the device is
lost, every later call fails the same way.
*/
pub trait Device: 'static {
    type Texture;
    type View;
    type Buffer;
    /// CPU-readable copy target for texture readback.
    type Staging;

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor<'_>,
        uploads: &[MipUpload<'_>],
    ) -> Result<Self::Texture, Error>;
    fn create_view(
        &mut self,
        texture: &Self::Texture,
        desc: &ViewDescriptor,
    ) -> Result<Self::View, Error>;
    fn create_staging(&mut self, texture: &Self::Texture) -> Result<Self::Staging, Error>;
    /// Copies level 0 of layer 0 into `staging` and returns it tightly packed.
    fn read_back(
        &mut self,
        texture: &Self::Texture,
        staging: &Self::Staging,
    ) -> Result<Vec<u8>, Error>;
    /// Regenerates levels 1.. of every layer from level 0.
    fn generate_mipmaps(&mut self, texture: &Self::Texture) -> Result<(), Error>;
    fn resolve_multisample(
        &mut self,
        source: &Self::Texture,
        destination: &Self::Texture,
    ) -> Result<(), Error>;

    fn create_buffer(
        &mut self,
        desc: &BufferDescriptor<'_>,
        contents: Option<&[u8]>,
    ) -> Result<Self::Buffer, Error>;
    /// Writes `data` at offset 0 of a dynamic buffer.
    fn write_buffer(
        &mut self,
        buffer: &Self::Buffer,
        data: &[u8],
        discipline: MapDiscipline,
    ) -> Result<(), Error>;

    fn back_buffer_info(&self) -> BackBufferInfo;
    fn bind_render_targets(
        &mut self,
        color: ColorTarget<'_, Self::View>,
        depth: Option<&Self::View>,
    ) -> Result<(), Error>;
    fn apply_raster_state(&mut self, state: &RasterState);

    fn supports_stage(&self, stage: Stage) -> bool;
    fn set_vertex_uniforms(&mut self, slot: u32, buffer: &Self::Buffer) -> Result<(), Error>;
    fn set_fragment_uniforms(&mut self, slot: u32, buffer: &Self::Buffer) -> Result<(), Error>;
    fn set_geometry_uniforms(&mut self, slot: u32, buffer: &Self::Buffer) -> Result<(), Error>;
    fn set_compute_uniforms(&mut self, slot: u32, buffer: &Self::Buffer) -> Result<(), Error>;
    fn set_vertex_texture(&mut self, slot: u32, view: &Self::View) -> Result<(), Error>;
    fn set_fragment_texture(&mut self, slot: u32, view: &Self::View) -> Result<(), Error>;
    fn set_geometry_texture(&mut self, slot: u32, view: &Self::View) -> Result<(), Error>;
    fn set_compute_texture(&mut self, slot: u32, view: &Self::View) -> Result<(), Error>;
}

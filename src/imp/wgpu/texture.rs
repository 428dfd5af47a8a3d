// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::error::internal;
use super::pixel_format::{view_formats, wgpu_format, wgpu_usage};
use crate::Error;
use crate::bittricks::align_up;
use crate::imp::{MipUpload, TextureDescriptor, ViewDescriptor, ViewKind};
use crate::pixel_formats::StorageFormat;
use wgpu::{Extent3d, TexelCopyBufferInfo, TexelCopyBufferLayout, TexelCopyTextureInfo};

/// A wgpu texture together with the storage format it was created for.
#[derive(Debug)]
pub struct Texture {
    pub(super) texture: wgpu::Texture,
    pub(super) format: StorageFormat,
}

impl Texture {
    pub fn wgpu(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn storage_format(&self) -> StorageFormat {
        self.format
    }
}

#[derive(Debug)]
pub struct View {
    pub(super) view: wgpu::TextureView,
    pub(super) desc: ViewDescriptor,
}

impl View {
    pub fn wgpu(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn descriptor(&self) -> ViewDescriptor {
        self.desc
    }
}

/// A mappable buffer holding level 0 of layer 0 with 256-byte aligned rows.
#[derive(Debug)]
pub struct Staging {
    pub(super) buffer: wgpu::Buffer,
    pub(super) padded_row: u32,
    pub(super) row: u32,
    pub(super) rows: u32,
}

pub(super) fn create(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    desc: &TextureDescriptor<'_>,
    uploads: &[MipUpload<'_>],
) -> Texture {
    let format = wgpu_format(desc.format);
    let view_formats = view_formats(format);
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(desc.label),
        size: Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: desc.array_layers,
        },
        mip_level_count: desc.mip_levels,
        sample_count: desc.sample_count,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu_usage(desc.format, desc.usage),
        view_formats: &view_formats,
    });
    for upload in uploads {
        let extent = Extent3d {
            width: upload.width,
            height: upload.height,
            depth_or_array_layers: 1,
        }
        .physical_size(format);
        queue.write_texture(
            TexelCopyTextureInfo {
                texture: &texture,
                mip_level: upload.level,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: upload.layer,
                },
                aspect: wgpu::TextureAspect::All,
            },
            upload.data,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(upload.row_pitch),
                rows_per_image: Some(upload.rows),
            },
            extent,
        );
    }
    Texture {
        texture,
        format: desc.format,
    }
}

pub(super) fn create_view(texture: &Texture, desc: &ViewDescriptor) -> View {
    let native = &texture.texture;
    let depth = texture.format.is_depth();
    let layers = native.depth_or_array_layers();
    let (dimension, base_array_layer, array_layer_count, mip_level_count) = match desc.kind {
        ViewKind::ShaderResource if layers > 1 => {
            (wgpu::TextureViewDimension::D2Array, 0, None, None)
        }
        ViewKind::ShaderResource => (wgpu::TextureViewDimension::D2, 0, None, None),
        ViewKind::ShaderCube => (wgpu::TextureViewDimension::Cube, 0, Some(6), None),
        ViewKind::RenderTarget { layer } | ViewKind::DepthStencil { layer } => {
            (wgpu::TextureViewDimension::D2, layer, Some(1), Some(1))
        }
    };
    let aspect = match desc.kind {
        ViewKind::ShaderResource | ViewKind::ShaderCube if depth => {
            wgpu::TextureAspect::DepthOnly
        }
        _ => wgpu::TextureAspect::All,
    };
    //depth views keep the allocation's format, the aspect picks the plane
    let format = if depth {
        native.format()
    } else {
        wgpu_format(desc.format)
    };
    let view = native.create_view(&wgpu::TextureViewDescriptor {
        label: None,
        format: Some(format),
        dimension: Some(dimension),
        usage: None,
        aspect,
        base_mip_level: 0,
        mip_level_count,
        base_array_layer,
        array_layer_count,
    });
    View { view, desc: *desc }
}

pub(super) fn create_staging(device: &wgpu::Device, texture: &Texture) -> Staging {
    let block = texture.format.block_info();
    let native = &texture.texture;
    let row = native.width().div_ceil(block.dimension) * block.bytes;
    let rows = native.height().div_ceil(block.dimension);
    let padded_row = align_up(row as u64, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64) as u32;
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback staging"),
        size: padded_row as u64 * rows as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    Staging {
        buffer,
        padded_row,
        row,
        rows,
    }
}

/// Copies level 0 of layer 0 into `staging`, waits for the GPU, and returns tight rows.
pub(super) fn read_back(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &Texture,
    staging: &Staging,
) -> Result<Vec<u8>, Error> {
    let g = logwise::perfwarn_begin!("wgpu read_back");
    let native = &texture.texture;
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback"),
    });
    encoder.copy_texture_to_buffer(
        TexelCopyTextureInfo {
            texture: native,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        TexelCopyBufferInfo {
            buffer: &staging.buffer,
            layout: TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(staging.padded_row),
                rows_per_image: Some(staging.rows),
            },
        },
        Extent3d {
            width: native.width(),
            height: native.height(),
            depth_or_array_layers: 1,
        }
        .physical_size(native.format()),
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.buffer.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device
        .poll(wgpu::PollType::Wait)
        .map_err(|e| internal("readback poll", e))?;
    receiver
        .recv()
        .map_err(|e| internal("readback map", e))?
        .map_err(|e| internal("readback map", e))?;

    let mut out = Vec::with_capacity((staging.row * staging.rows) as usize);
    {
        let mapped = slice.get_mapped_range();
        for row in mapped.chunks_exact(staging.padded_row as usize) {
            out.extend_from_slice(&row[..staging.row as usize]);
        }
    }
    staging.buffer.unmap();
    drop(g);
    Ok(out)
}

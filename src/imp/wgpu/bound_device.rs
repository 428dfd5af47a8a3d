// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::buffer::{self, Buffer};
use super::error::{LostFlag, device_lost, internal, scoped};
use super::mipmaps::MipBlitter;
use super::texture::{self, Staging, Texture, View};
use crate::Error;
use crate::error::{GpuFault, GpuResourceError};
use crate::images::render_state::{BlendMode, CompareFunction, CullMode, RasterState};
use crate::images::shader::Stage;
use crate::imp::{
    BackBufferInfo, BufferDescriptor, ColorTarget, Device, MapDiscipline, MipUpload,
    TextureDescriptor, ViewDescriptor,
};
use crate::pixel_formats::StorageFormat;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::collections::BTreeMap;
use wgpu::Trace;

/// Color attachment recorded by [`Device::bind_render_targets`].
#[derive(Debug, Clone)]
pub enum ColorBinding {
    /// The surface texture (or, without a surface, whatever the host presents).
    BackBuffer,
    View(wgpu::TextureView),
}

/**
Everything bound since the last [`BoundDevice::take_bindings`].

wgpu fixes pipeline state and bind groups at pass-build time, so the binding calls of
[`Device`] only record here; the pass builder reads the record when it assembles the
pipeline and bind groups for a draw.
*/
#[derive(Debug, Clone, Default)]
pub struct RecordedBindings {
    pub color: Option<ColorBinding>,
    pub depth: Option<wgpu::TextureView>,
    pub raster: RasterState,
    pub uniforms: BTreeMap<(Stage, u32), wgpu::Buffer>,
    pub textures: BTreeMap<(Stage, u32), wgpu::TextureView>,
}

impl RecordedBindings {
    pub fn primitive_state(&self) -> wgpu::PrimitiveState {
        wgpu::PrimitiveState {
            cull_mode: match self.raster.cull {
                CullMode::None => None,
                CullMode::Front => Some(wgpu::Face::Front),
                CullMode::Back => Some(wgpu::Face::Back),
            },
            ..Default::default()
        }
    }

    pub fn blend_state(&self) -> Option<wgpu::BlendState> {
        match self.raster.blend {
            BlendMode::Opaque => None,
            BlendMode::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
            BlendMode::Premultiplied => Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
            BlendMode::Additive => {
                let add = wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                };
                Some(wgpu::BlendState {
                    color: add,
                    alpha: add,
                })
            }
        }
    }

    pub fn depth_stencil_state(&self, format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
        let depth = self.raster.depth;
        let compare = if depth.test {
            compare_function(depth.compare)
        } else {
            wgpu::CompareFunction::Always
        };
        wgpu::DepthStencilState {
            format,
            depth_write_enabled: depth.write,
            depth_compare: compare,
            stencil: Default::default(),
            bias: Default::default(),
        }
    }
}

fn compare_function(compare: CompareFunction) -> wgpu::CompareFunction {
    match compare {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

#[derive(Debug)]
struct BackBufferSurface {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

/// A wgpu device and queue, optionally presenting to a window surface.
#[derive(Debug)]
pub struct BoundDevice {
    blitter: MipBlitter,
    bindings: RecordedBindings,
    surface: Option<BackBufferSurface>,
    queue: wgpu::Queue,
    device: wgpu::Device,
    adapter: wgpu::Adapter,
    back_buffer: BackBufferInfo,
    lost: LostFlag,
}

async fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), Error> {
    let options = wgpu::RequestAdapterOptions {
        power_preference: Default::default(),
        force_fallback_adapter: false,
        compatible_surface: surface,
    };
    let adapter = instance.request_adapter(&options).await.map_err(|e| {
        logwise::error_sync!("no adapter: {e}", e = logwise::privacy::LogIt(&e));
        GpuResourceError::new(
            GpuFault::AdapterNotFound,
            GpuResourceError::WGPU_INTERNAL,
            e.to_string(),
        )
    })?;
    let wanted = wgpu::Features::TEXTURE_COMPRESSION_BC | wgpu::Features::DEPTH32FLOAT_STENCIL8;
    let descriptor = wgpu::DeviceDescriptor {
        label: Some("textures_and_uniforms"),
        required_features: adapter.features() & wanted,
        required_limits: adapter.limits(),
        memory_hints: Default::default(),
        trace: Trace::Off,
    };
    let (device, queue) = adapter
        .request_device(&descriptor)
        .await
        .map_err(|e| internal("request device", e))?;
    logwise::info_sync!(
        "bound device on {adapter}",
        adapter = logwise::privacy::LogIt(&adapter.get_info().name)
    );
    Ok((adapter, device, queue))
}

impl BoundDevice {
    /// A device without a window.  The back buffer is only a size for depth matching.
    pub async fn new(back_buffer: BackBufferInfo) -> Result<Self, Error> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let (adapter, device, queue) = request_device(&instance, None).await?;
        Ok(Self::assemble(adapter, device, queue, None, back_buffer))
    }

    /**
    A device presenting to `window`.

    # Safety
    `window` must outlive the returned device.
    */
    pub async unsafe fn for_window<W>(window: &W, width: u32, height: u32) -> Result<Self, Error>
    where
        W: HasWindowHandle + HasDisplayHandle,
    {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let target = wgpu::SurfaceTargetUnsafe::RawHandle {
            raw_display_handle: window
                .display_handle()
                .map_err(|e| internal("display handle", e))?
                .as_raw(),
            raw_window_handle: window
                .window_handle()
                .map_err(|e| internal("window handle", e))?
                .as_raw(),
        };
        // SAFETY: the caller keeps the window alive for as long as the device
        let surface = unsafe { instance.create_surface_unsafe(target) }
            .map_err(|e| internal("create surface", e))?;
        let (adapter, device, queue) = request_device(&instance, Some(&surface)).await?;
        let config = surface
            .get_default_config(&adapter, width.max(1), height.max(1))
            .ok_or(Error::Unsupported("surface with this adapter"))?;
        surface.configure(&device, &config);
        let back_buffer = BackBufferInfo {
            width: config.width,
            height: config.height,
            sample_count: 1,
        };
        Ok(Self::assemble(
            adapter,
            device,
            queue,
            Some(BackBufferSurface { surface, config }),
            back_buffer,
        ))
    }

    fn assemble(
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface: Option<BackBufferSurface>,
        back_buffer: BackBufferInfo,
    ) -> Self {
        let lost = LostFlag::default();
        lost.install(&device);
        BoundDevice {
            blitter: MipBlitter::default(),
            bindings: RecordedBindings::default(),
            surface,
            queue,
            device,
            adapter,
            back_buffer,
            lost,
        }
    }

    pub fn wgpu_device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn surface(&self) -> Option<&wgpu::Surface<'static>> {
        self.surface.as_ref().map(|s| &s.surface)
    }

    pub fn is_lost(&self) -> bool {
        self.lost.is_lost()
    }

    pub fn bindings(&self) -> &RecordedBindings {
        &self.bindings
    }

    /// Returns the record and starts a fresh one with the same raster state.
    pub fn take_bindings(&mut self) -> RecordedBindings {
        let raster = self.bindings.raster;
        std::mem::replace(
            &mut self.bindings,
            RecordedBindings {
                raster,
                ..Default::default()
            },
        )
    }

    /// Resizes the back buffer, reconfiguring the surface when there is one.
    pub fn resize_back_buffer(&mut self, width: u32, height: u32) {
        self.back_buffer.width = width.max(1);
        self.back_buffer.height = height.max(1);
        if let Some(surface) = &mut self.surface {
            surface.config.width = self.back_buffer.width;
            surface.config.height = self.back_buffer.height;
            surface.surface.configure(&self.device, &surface.config);
        }
    }

    fn check_alive(&self, what: &str) -> Result<(), Error> {
        if self.lost.is_lost() {
            Err(device_lost(what))
        } else {
            Ok(())
        }
    }

    fn check_features(&self, format: StorageFormat) -> Result<(), Error> {
        let features = self.device.features();
        if format.is_compressed() && !features.contains(wgpu::Features::TEXTURE_COMPRESSION_BC) {
            return Err(Error::Unsupported("BC compressed textures on this adapter"));
        }
        if matches!(
            format,
            StorageFormat::Depth32FloatStencil8
                | StorageFormat::Depth32Stencil8Typeless
                | StorageFormat::R32FloatX8X24
        ) && !features.contains(wgpu::Features::DEPTH32FLOAT_STENCIL8)
        {
            return Err(Error::Unsupported("32-bit depth with stencil on this adapter"));
        }
        Ok(())
    }
}

impl Device for BoundDevice {
    type Texture = Texture;
    type View = View;
    type Buffer = Buffer;
    type Staging = Staging;

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor<'_>,
        uploads: &[MipUpload<'_>],
    ) -> Result<Texture, Error> {
        self.check_features(desc.format)?;
        scoped(&self.device, &self.lost, desc.label, || {
            texture::create(&self.device, &self.queue, desc, uploads)
        })
    }

    fn create_view(&mut self, texture: &Texture, desc: &ViewDescriptor) -> Result<View, Error> {
        scoped(&self.device, &self.lost, "create view", || {
            texture::create_view(texture, desc)
        })
    }

    fn create_staging(&mut self, texture: &Texture) -> Result<Staging, Error> {
        scoped(&self.device, &self.lost, "create staging", || {
            texture::create_staging(&self.device, texture)
        })
    }

    fn read_back(&mut self, texture: &Texture, staging: &Staging) -> Result<Vec<u8>, Error> {
        self.check_alive("read back")?;
        texture::read_back(&self.device, &self.queue, texture, staging)
    }

    fn generate_mipmaps(&mut self, texture: &Texture) -> Result<(), Error> {
        scoped(&self.device, &self.lost, "generate mipmaps", || {
            self.blitter.generate(&self.device, &self.queue, texture)
        })?
    }

    fn resolve_multisample(&mut self, source: &Texture, destination: &Texture) -> Result<(), Error> {
        scoped(&self.device, &self.lost, "resolve multisample", || {
            let native = &source.texture;
            let size = wgpu::Extent3d {
                width: native.width(),
                height: native.height(),
                depth_or_array_layers: 1,
            };
            //resolve targets must be attachments, the destination may only be a copy target
            let resolved = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("msaa resolve"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: native.format(),
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            let source_view = native.create_view(&wgpu::TextureViewDescriptor::default());
            let resolved_view = resolved.create_view(&wgpu::TextureViewDescriptor::default());
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("msaa resolve"),
                });
            {
                let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("msaa resolve"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &source_view,
                        depth_slice: None,
                        resolve_target: Some(&resolved_view),
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
            }
            encoder.copy_texture_to_texture(
                resolved.as_image_copy(),
                destination.texture.as_image_copy(),
                size,
            );
            self.queue.submit(std::iter::once(encoder.finish()));
        })
    }

    fn create_buffer(
        &mut self,
        desc: &BufferDescriptor<'_>,
        contents: Option<&[u8]>,
    ) -> Result<Buffer, Error> {
        scoped(&self.device, &self.lost, desc.label, || {
            buffer::create(&self.device, desc, contents)
        })
    }

    fn write_buffer(
        &mut self,
        buffer: &Buffer,
        data: &[u8],
        discipline: MapDiscipline,
    ) -> Result<(), Error> {
        scoped(&self.device, &self.lost, "write buffer", || {
            buffer::write(&self.queue, buffer, data, discipline)
        })
    }

    fn back_buffer_info(&self) -> BackBufferInfo {
        self.back_buffer
    }

    fn bind_render_targets(
        &mut self,
        color: ColorTarget<'_, View>,
        depth: Option<&View>,
    ) -> Result<(), Error> {
        self.check_alive("bind render targets")?;
        self.bindings.color = Some(match color {
            ColorTarget::BackBuffer => ColorBinding::BackBuffer,
            ColorTarget::View(view) => ColorBinding::View(view.view.clone()),
        });
        self.bindings.depth = depth.map(|d| d.view.clone());
        Ok(())
    }

    fn apply_raster_state(&mut self, state: &RasterState) {
        self.bindings.raster = *state;
    }

    fn supports_stage(&self, stage: Stage) -> bool {
        stage != Stage::Geometry
    }

    fn set_vertex_uniforms(&mut self, slot: u32, buffer: &Buffer) -> Result<(), Error> {
        self.bindings
            .uniforms
            .insert((Stage::Vertex, slot), buffer.buffer.clone());
        Ok(())
    }

    fn set_fragment_uniforms(&mut self, slot: u32, buffer: &Buffer) -> Result<(), Error> {
        self.bindings
            .uniforms
            .insert((Stage::Fragment, slot), buffer.buffer.clone());
        Ok(())
    }

    fn set_geometry_uniforms(&mut self, _slot: u32, _buffer: &Buffer) -> Result<(), Error> {
        Err(Error::Unsupported("geometry shaders on wgpu"))
    }

    fn set_compute_uniforms(&mut self, slot: u32, buffer: &Buffer) -> Result<(), Error> {
        self.bindings
            .uniforms
            .insert((Stage::Compute, slot), buffer.buffer.clone());
        Ok(())
    }

    fn set_vertex_texture(&mut self, slot: u32, view: &View) -> Result<(), Error> {
        self.bindings
            .textures
            .insert((Stage::Vertex, slot), view.view.clone());
        Ok(())
    }

    fn set_fragment_texture(&mut self, slot: u32, view: &View) -> Result<(), Error> {
        self.bindings
            .textures
            .insert((Stage::Fragment, slot), view.view.clone());
        Ok(())
    }

    fn set_geometry_texture(&mut self, _slot: u32, _view: &View) -> Result<(), Error> {
        Err(Error::Unsupported("geometry shaders on wgpu"))
    }

    fn set_compute_texture(&mut self, slot: u32, view: &View) -> Result<(), Error> {
        self.bindings
            .textures
            .insert((Stage::Compute, slot), view.view.clone());
        Ok(())
    }
}

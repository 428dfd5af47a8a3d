// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::Error;
use crate::bindings::buffer::{BufferHandle, BufferKind, BufferManager, BufferUsage};
use crate::bindings::texture::{DepthTarget, TextureHandle, TextureManager};
use crate::bindings::visible_to::TextureConfig;
use crate::images::render_state::{BlendMode, CullMode, DepthMode, RenderStateCache};
use crate::imp::Device;
use crate::pixel_formats::FormatResolver;

/**
Owns a [`Device`] together with every resource created on it.

Resources are always released before the device they belong to: on drop, on
[`Engine::teardown`] and on [`Engine::recreate_device`].
*/
#[derive(Debug)]
pub struct Engine<D: Device> {
    //drop order is significant here
    textures: TextureManager<D>,
    buffers: BufferManager<D>,
    render_state: RenderStateCache,
    device: D,
}

/// Disjoint borrows of an [`Engine`]'s parts.
#[derive(Debug)]
pub struct EngineParts<'a, D: Device> {
    pub device: &'a mut D,
    pub textures: &'a mut TextureManager<D>,
    pub buffers: &'a mut BufferManager<D>,
    pub render_state: &'a mut RenderStateCache,
}

impl<D: Device> Engine<D> {
    pub fn new(device: D) -> Self {
        Self::with_resolver(device, FormatResolver::new())
    }

    pub fn with_resolver(device: D, resolver: FormatResolver) -> Self {
        logwise::info_sync!("engine created");
        Engine {
            textures: TextureManager::new(resolver),
            buffers: BufferManager::new(),
            render_state: RenderStateCache::new(),
            device,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn textures(&self) -> &TextureManager<D> {
        &self.textures
    }

    pub fn buffers(&self) -> &BufferManager<D> {
        &self.buffers
    }

    pub fn render_state(&self) -> &RenderStateCache {
        &self.render_state
    }

    pub fn parts_mut(&mut self) -> EngineParts<'_, D> {
        EngineParts {
            device: &mut self.device,
            textures: &mut self.textures,
            buffers: &mut self.buffers,
            render_state: &mut self.render_state,
        }
    }

    pub fn create_texture(
        &mut self,
        config: &TextureConfig<'_>,
        data: Option<&[u8]>,
    ) -> Result<TextureHandle, Error> {
        self.textures.create_texture(&mut self.device, config, data)
    }

    pub fn create_buffer(&mut self, kind: BufferKind) -> BufferHandle {
        self.buffers.create_buffer(kind)
    }

    pub fn upload_buffer(
        &mut self,
        handle: BufferHandle,
        usage: BufferUsage,
        data: Option<&[u8]>,
        size: u64,
    ) -> Result<(), Error> {
        self.buffers.upload(&mut self.device, handle, usage, data, size)
    }

    pub fn set_render_target(
        &mut self,
        color: Option<TextureHandle>,
        depth: DepthTarget,
        face: Option<u32>,
    ) -> Result<(), Error> {
        self.textures
            .set_render_target(&mut self.device, color, depth, face)
    }

    pub fn commit(&mut self, handle: TextureHandle) -> Result<(), Error> {
        self.textures.commit(&mut self.device, handle)
    }

    pub fn set_cull_mode(&mut self, cull: CullMode) {
        self.render_state.set_cull_mode(&mut self.device, cull);
    }

    pub fn set_blend_mode(&mut self, blend: BlendMode) {
        self.render_state.set_blend_mode(&mut self.device, blend);
    }

    pub fn set_depth_mode(&mut self, depth: DepthMode) {
        self.render_state.set_depth_mode(&mut self.device, depth);
    }

    /// Releases every texture, then every buffer.  Handles held by callers go stale.
    pub fn teardown(&mut self) {
        let g = logwise::perfwarn_begin!("Engine::teardown");
        self.textures.release_all();
        self.buffers.release_all();
        self.render_state.invalidate();
        drop(g);
    }

    /**
    Replaces a lost device.

    Every resource of the old device is released first, then the old device is handed back
    so the caller decides when it goes away.  Callers recreate their resources afterwards.
    */
    pub fn recreate_device(&mut self, device: D) -> D {
        logwise::warn_sync!("recreating device");
        self.teardown();
        std::mem::replace(&mut self.device, device)
    }

    /// Tears down and returns the device.
    pub fn into_device(mut self) -> D {
        self.teardown();
        let Engine {
            textures,
            buffers,
            render_state: _,
            device,
        } = self;
        drop(textures);
        drop(buffers);
        device
    }
}

// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A recording backend that does no GPU work.

[`HeadlessDevice`] keeps texture and buffer contents in memory and counts every call that
would have reached a driver.  It is used by the test suite and by hosts without an
adapter.

Resources hold a shared release log, so the order in which views, textures and buffers
were dropped can be checked after the fact.
*/

use super::{
    BackBufferInfo, BufferDescriptor, ColorTarget, Device, MapDiscipline, MipUpload,
    TextureDescriptor, ViewDescriptor, ViewKind,
};
use crate::error::{GpuFault, GpuResourceError};
use crate::images::render_state::RasterState;
use crate::images::shader::Stage;
use crate::pixel_formats::StorageFormat;
use crate::{Error, mip_chain};
use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Native status codes reported by the headless device.
pub const STATUS_OUT_OF_MEMORY: i32 = 0x8007_000e_u32 as i32;
pub const STATUS_DEVICE_REMOVED: i32 = 0x887a_0005_u32 as i32;
pub const STATUS_DEVICE_RESET: i32 = 0x887a_0007_u32 as i32;
pub const STATUS_FAIL: i32 = 0x8000_4005_u32 as i32;

fn status_for(fault: GpuFault) -> i32 {
    match fault {
        GpuFault::OutOfMemory => STATUS_OUT_OF_MEMORY,
        GpuFault::DeviceRemoved => STATUS_DEVICE_REMOVED,
        GpuFault::DeviceReset => STATUS_DEVICE_RESET,
        GpuFault::AdapterNotFound | GpuFault::Internal => STATUS_FAIL,
    }
}

/// Counters for every call that would have reached the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub textures_created: u32,
    pub views_created: u32,
    pub staging_created: u32,
    pub buffers_created: u32,
    pub discard_writes: u32,
    pub no_overwrite_writes: u32,
    pub mip_generations: u32,
    pub resolves: u32,
    pub readbacks: u32,
    pub target_binds: u32,
    pub raster_applies: u32,
    pub stage_binds: u32,
}

/// An entry in the release log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Released {
    Texture(u64),
    View(u64),
    Buffer(u64),
}

type ReleaseLog = Rc<RefCell<Vec<Released>>>;

#[derive(Debug)]
pub struct HeadlessTexture {
    id: u64,
    width: u32,
    height: u32,
    layers: u32,
    mips: u32,
    samples: u32,
    format: StorageFormat,
    /// Layer-major: `layer * mips + level`.
    contents: RefCell<Vec<Vec<u8>>>,
    log: ReleaseLog,
}

impl HeadlessTexture {
    pub fn id(&self) -> u64 {
        self.id
    }
    pub fn width(&self) -> u32 {
        self.width
    }
    pub fn height(&self) -> u32 {
        self.height
    }
    pub fn array_layers(&self) -> u32 {
        self.layers
    }
    pub fn mip_levels(&self) -> u32 {
        self.mips
    }
    pub fn sample_count(&self) -> u32 {
        self.samples
    }
    pub fn format(&self) -> StorageFormat {
        self.format
    }
    /// Contents of one subresource.
    pub fn level(&self, layer: u32, level: u32) -> Vec<u8> {
        self.contents.borrow()[(layer * self.mips + level) as usize].clone()
    }

    fn level_size(&self, level: u32) -> usize {
        let w = (self.width >> level).max(1);
        let h = (self.height >> level).max(1);
        mip_chain::source_size(w, h, self.format.block_info(), 1) as usize
    }
}

impl Drop for HeadlessTexture {
    fn drop(&mut self) {
        self.log.borrow_mut().push(Released::Texture(self.id));
    }
}

#[derive(Debug)]
pub struct HeadlessView {
    id: u64,
    texture: u64,
    desc: ViewDescriptor,
    log: ReleaseLog,
}

impl HeadlessView {
    pub fn id(&self) -> u64 {
        self.id
    }
    /// Id of the texture this view was created from.
    pub fn texture(&self) -> u64 {
        self.texture
    }
    pub fn descriptor(&self) -> ViewDescriptor {
        self.desc
    }
}

impl Drop for HeadlessView {
    fn drop(&mut self) {
        self.log.borrow_mut().push(Released::View(self.id));
    }
}

#[derive(Debug)]
pub struct HeadlessBuffer {
    id: u64,
    size: u64,
    contents: RefCell<Vec<u8>>,
    log: ReleaseLog,
}

impl HeadlessBuffer {
    pub fn id(&self) -> u64 {
        self.id
    }
    pub fn size(&self) -> u64 {
        self.size
    }
    pub fn contents(&self) -> Ref<'_, Vec<u8>> {
        self.contents.borrow()
    }
}

impl Drop for HeadlessBuffer {
    fn drop(&mut self) {
        self.log.borrow_mut().push(Released::Buffer(self.id));
    }
}

#[derive(Debug)]
pub struct HeadlessStaging {
    texture: u64,
}

/// Currently bound color attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundColor {
    BackBuffer,
    /// Id of the bound view.
    View(u64),
}

#[derive(Debug)]
pub struct HeadlessDevice {
    next_id: u64,
    stats: HeadlessStats,
    log: ReleaseLog,
    fail_next: Option<GpuFault>,
    lost: Option<GpuFault>,
    back_buffer: BackBufferInfo,
    color: Option<BoundColor>,
    depth: Option<u64>,
    raster: Option<RasterState>,
    uniforms: BTreeMap<(Stage, u32), u64>,
    textures: BTreeMap<(Stage, u32), u64>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// A device with a 1280×720 single-sampled back buffer.
    pub fn new() -> Self {
        Self::with_back_buffer(BackBufferInfo {
            width: 1280,
            height: 720,
            sample_count: 1,
        })
    }

    pub fn with_back_buffer(back_buffer: BackBufferInfo) -> Self {
        HeadlessDevice {
            next_id: 1,
            stats: HeadlessStats::default(),
            log: Rc::new(RefCell::new(Vec::new())),
            fail_next: None,
            lost: None,
            back_buffer,
            color: None,
            depth: None,
            raster: None,
            uniforms: BTreeMap::new(),
            textures: BTreeMap::new(),
        }
    }

    pub fn stats(&self) -> &HeadlessStats {
        &self.stats
    }

    pub fn release_log(&self) -> Vec<Released> {
        self.log.borrow().clone()
    }

    /// The next texture, staging or buffer allocation fails with `fault`.
    pub fn fail_next_allocation(&mut self, fault: GpuFault) {
        self.fail_next = Some(fault);
    }

    /// Every later call fails with `fault`, as after an adapter removal.
    pub fn remove_device(&mut self, fault: GpuFault) {
        self.lost = Some(fault);
    }

    pub fn resize_back_buffer(&mut self, width: u32, height: u32) {
        self.back_buffer.width = width;
        self.back_buffer.height = height;
    }

    pub fn bound_color(&self) -> Option<BoundColor> {
        self.color
    }

    /// Id of the bound depth view.
    pub fn bound_depth(&self) -> Option<u64> {
        self.depth
    }

    pub fn raster_state(&self) -> Option<RasterState> {
        self.raster
    }

    /// Id of the uniform buffer bound at `slot` of `stage`.
    pub fn stage_uniforms(&self, stage: Stage, slot: u32) -> Option<u64> {
        self.uniforms.get(&(stage, slot)).copied()
    }

    /// Id of the view bound at `slot` of `stage`.
    pub fn stage_texture(&self, stage: Stage, slot: u32) -> Option<u64> {
        self.textures.get(&(stage, slot)).copied()
    }

    fn fault(fault: GpuFault, detail: &str) -> Error {
        logwise::error_sync!(
            "headless device fault {fault}",
            fault = logwise::privacy::LogIt(&fault)
        );
        GpuResourceError::new(fault, status_for(fault), detail).into()
    }

    fn check_alive(&self) -> Result<(), Error> {
        match self.lost {
            Some(fault) => Err(Self::fault(fault, "device was removed")),
            None => Ok(()),
        }
    }

    fn allocate(&mut self, what: &str) -> Result<u64, Error> {
        self.check_alive()?;
        if let Some(fault) = self.fail_next.take() {
            return Err(Self::fault(fault, what));
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }

    fn bind_stage(
        &mut self,
        uniform: bool,
        stage: Stage,
        slot: u32,
        id: u64,
    ) -> Result<(), Error> {
        self.check_alive()?;
        self.stats.stage_binds += 1;
        let map = if uniform {
            &mut self.uniforms
        } else {
            &mut self.textures
        };
        map.insert((stage, slot), id);
        Ok(())
    }
}

impl Device for HeadlessDevice {
    type Texture = HeadlessTexture;
    type View = HeadlessView;
    type Buffer = HeadlessBuffer;
    type Staging = HeadlessStaging;

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor<'_>,
        uploads: &[MipUpload<'_>],
    ) -> Result<HeadlessTexture, Error> {
        let id = self.allocate(desc.label)?;
        let mut texture = HeadlessTexture {
            id,
            width: desc.width,
            height: desc.height,
            layers: desc.array_layers,
            mips: desc.mip_levels,
            samples: desc.sample_count,
            format: desc.format,
            contents: RefCell::new(Vec::new()),
            log: self.log.clone(),
        };
        let mut contents = Vec::with_capacity((desc.array_layers * desc.mip_levels) as usize);
        for _layer in 0..desc.array_layers {
            for level in 0..desc.mip_levels {
                contents.push(vec![0; texture.level_size(level)]);
            }
        }
        for upload in uploads {
            assert!(upload.layer < desc.array_layers && upload.level < desc.mip_levels);
            let expected = texture.level_size(upload.level);
            assert_eq!(
                upload.data.len(),
                expected,
                "upload for level {} of {} is the wrong size",
                upload.level,
                desc.label
            );
            assert_eq!(upload.row_pitch as usize * upload.rows as usize, expected);
            contents[(upload.layer * desc.mip_levels + upload.level) as usize] =
                upload.data.to_vec();
        }
        texture.contents = RefCell::new(contents);
        self.stats.textures_created += 1;
        logwise::trace_sync!("headless texture {id} created", id = id);
        Ok(texture)
    }

    fn create_view(
        &mut self,
        texture: &HeadlessTexture,
        desc: &ViewDescriptor,
    ) -> Result<HeadlessView, Error> {
        self.check_alive()?;
        match desc.kind {
            ViewKind::ShaderCube => assert_eq!(texture.layers, 6, "cube view of a non-cube"),
            ViewKind::RenderTarget { layer } | ViewKind::DepthStencil { layer } => {
                assert!(layer < texture.layers)
            }
            ViewKind::ShaderResource => {}
        }
        let id = self.next_id;
        self.next_id += 1;
        self.stats.views_created += 1;
        Ok(HeadlessView {
            id,
            texture: texture.id,
            desc: *desc,
            log: self.log.clone(),
        })
    }

    fn create_staging(&mut self, texture: &HeadlessTexture) -> Result<HeadlessStaging, Error> {
        self.allocate("staging")?;
        self.stats.staging_created += 1;
        Ok(HeadlessStaging {
            texture: texture.id,
        })
    }

    fn read_back(
        &mut self,
        texture: &HeadlessTexture,
        staging: &HeadlessStaging,
    ) -> Result<Vec<u8>, Error> {
        self.check_alive()?;
        assert_eq!(staging.texture, texture.id, "staging belongs to another texture");
        self.stats.readbacks += 1;
        Ok(texture.level(0, 0))
    }

    fn generate_mipmaps(&mut self, texture: &HeadlessTexture) -> Result<(), Error> {
        self.check_alive()?;
        let Some(channels) = texture.format.channels() else {
            return Err(Error::Unsupported("mip generation for this format"));
        };
        let mut contents = texture.contents.borrow_mut();
        for layer in 0..texture.layers {
            let base = (layer * texture.mips) as usize;
            let chain = mip_chain::generate_mips(
                &contents[base],
                texture.width,
                texture.height,
                channels,
                texture.mips,
            );
            let mut offset = 0;
            for level in 0..texture.mips {
                let size = texture.level_size(level);
                contents[base + level as usize] = chain[offset..offset + size].to_vec();
                offset += size;
            }
        }
        self.stats.mip_generations += 1;
        Ok(())
    }

    fn resolve_multisample(
        &mut self,
        source: &HeadlessTexture,
        destination: &HeadlessTexture,
    ) -> Result<(), Error> {
        self.check_alive()?;
        let resolved = source.level(0, 0);
        destination.contents.borrow_mut()[0] = resolved;
        self.stats.resolves += 1;
        Ok(())
    }

    fn create_buffer(
        &mut self,
        desc: &BufferDescriptor<'_>,
        contents: Option<&[u8]>,
    ) -> Result<HeadlessBuffer, Error> {
        let id = self.allocate(desc.label)?;
        let mut bytes = vec![0; desc.size as usize];
        if let Some(data) = contents {
            assert!(data.len() as u64 <= desc.size);
            bytes[..data.len()].copy_from_slice(data);
        }
        self.stats.buffers_created += 1;
        Ok(HeadlessBuffer {
            id,
            size: desc.size,
            contents: RefCell::new(bytes),
            log: self.log.clone(),
        })
    }

    fn write_buffer(
        &mut self,
        buffer: &HeadlessBuffer,
        data: &[u8],
        discipline: MapDiscipline,
    ) -> Result<(), Error> {
        self.check_alive()?;
        assert!(data.len() as u64 <= buffer.size, "write past end of buffer");
        let mut contents = buffer.contents.borrow_mut();
        if discipline == MapDiscipline::Discard {
            //prior contents are undefined after a discard
            contents.fill(0);
        }
        contents[..data.len()].copy_from_slice(data);
        match discipline {
            MapDiscipline::Discard => self.stats.discard_writes += 1,
            MapDiscipline::NoOverwrite => self.stats.no_overwrite_writes += 1,
        }
        Ok(())
    }

    fn back_buffer_info(&self) -> BackBufferInfo {
        self.back_buffer
    }

    fn bind_render_targets(
        &mut self,
        color: ColorTarget<'_, HeadlessView>,
        depth: Option<&HeadlessView>,
    ) -> Result<(), Error> {
        self.check_alive()?;
        self.color = Some(match color {
            ColorTarget::BackBuffer => BoundColor::BackBuffer,
            ColorTarget::View(view) => BoundColor::View(view.id),
        });
        self.depth = depth.map(|d| d.id);
        self.stats.target_binds += 1;
        Ok(())
    }

    fn apply_raster_state(&mut self, state: &RasterState) {
        self.raster = Some(*state);
        self.stats.raster_applies += 1;
    }

    fn supports_stage(&self, _stage: Stage) -> bool {
        true
    }

    fn set_vertex_uniforms(&mut self, slot: u32, buffer: &HeadlessBuffer) -> Result<(), Error> {
        self.bind_stage(true, Stage::Vertex, slot, buffer.id)
    }
    fn set_fragment_uniforms(&mut self, slot: u32, buffer: &HeadlessBuffer) -> Result<(), Error> {
        self.bind_stage(true, Stage::Fragment, slot, buffer.id)
    }
    fn set_geometry_uniforms(&mut self, slot: u32, buffer: &HeadlessBuffer) -> Result<(), Error> {
        self.bind_stage(true, Stage::Geometry, slot, buffer.id)
    }
    fn set_compute_uniforms(&mut self, slot: u32, buffer: &HeadlessBuffer) -> Result<(), Error> {
        self.bind_stage(true, Stage::Compute, slot, buffer.id)
    }
    fn set_vertex_texture(&mut self, slot: u32, view: &HeadlessView) -> Result<(), Error> {
        self.bind_stage(false, Stage::Vertex, slot, view.id)
    }
    fn set_fragment_texture(&mut self, slot: u32, view: &HeadlessView) -> Result<(), Error> {
        self.bind_stage(false, Stage::Fragment, slot, view.id)
    }
    fn set_geometry_texture(&mut self, slot: u32, view: &HeadlessView) -> Result<(), Error> {
        self.bind_stage(false, Stage::Geometry, slot, view.id)
    }
    fn set_compute_texture(&mut self, slot: u32, view: &HeadlessView) -> Result<(), Error> {
        self.bind_stage(false, Stage::Compute, slot, view.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::buffer::{BufferKind, StorageKind};
    use crate::imp::TextureUsages;

    fn desc(format: StorageFormat) -> TextureDescriptor<'static> {
        TextureDescriptor {
            label: "t",
            width: 4,
            height: 4,
            array_layers: 1,
            mip_levels: 3,
            sample_count: 1,
            format,
            usage: TextureUsages::SHADER_READ,
        }
    }

    #[test]
    fn lost_device_fails_everything() {
        let mut device = HeadlessDevice::new();
        device.remove_device(GpuFault::DeviceRemoved);
        let err = device.create_texture(&desc(StorageFormat::R8Unorm), &[]).unwrap_err();
        assert!(err.is_device_lost());
        match err {
            Error::Gpu(e) => assert_eq!(e.code, STATUS_DEVICE_REMOVED),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn injected_allocation_failure_is_one_shot() {
        let mut device = HeadlessDevice::new();
        device.fail_next_allocation(GpuFault::OutOfMemory);
        let buffer = BufferDescriptor {
            label: "b",
            size: 16,
            kind: BufferKind::Uniform,
            storage: StorageKind::Dynamic,
        };
        assert!(device.create_buffer(&buffer, None).is_err());
        assert!(device.create_buffer(&buffer, None).is_ok());
        assert_eq!(device.stats().buffers_created, 1);
    }

    #[test]
    fn generates_levels_from_level_zero() {
        let mut device = HeadlessDevice::new();
        let base = [8u8; 16];
        let upload = MipUpload {
            layer: 0,
            level: 0,
            width: 4,
            height: 4,
            row_pitch: 4,
            rows: 4,
            data: &base,
        };
        let texture = device.create_texture(&desc(StorageFormat::R8Unorm), &[upload]).unwrap();
        assert_eq!(texture.level(0, 2), vec![0]);
        device.generate_mipmaps(&texture).unwrap();
        assert_eq!(texture.level(0, 1), vec![8; 4]);
        assert_eq!(texture.level(0, 2), vec![8]);
    }

    #[test]
    fn release_log_records_drop_order() {
        let mut device = HeadlessDevice::new();
        let texture = device.create_texture(&desc(StorageFormat::Rgba8Unorm), &[]).unwrap();
        let view = device
            .create_view(
                &texture,
                &ViewDescriptor {
                    format: StorageFormat::Rgba8Unorm,
                    kind: ViewKind::ShaderResource,
                },
            )
            .unwrap();
        let (t, v) = (texture.id(), view.id());
        drop(view);
        drop(texture);
        assert_eq!(device.release_log(), vec![Released::View(v), Released::Texture(t)]);
    }
}

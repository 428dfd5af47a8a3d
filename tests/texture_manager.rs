// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use std::cell::Cell;
use std::rc::Rc;
use textures_and_uniforms::bindings::chain::{ChainState, TextureChain};
use textures_and_uniforms::bindings::texture::{BackingKind, DepthTarget, TextureManager};
use textures_and_uniforms::bindings::visible_to::{TextureConfig, TextureFlags};
use textures_and_uniforms::headless::{BoundColor, HeadlessDevice, HeadlessTexture, Released};
use textures_and_uniforms::pixel_formats::{FormatResolver, FormatTag, StorageFormat};
use textures_and_uniforms::{
    BackBufferInfo, Device, Error, TextureDescriptor, TextureUsages,
};

fn manager() -> (HeadlessDevice, TextureManager<HeadlessDevice>) {
    (
        HeadlessDevice::new(),
        TextureManager::new(FormatResolver::new()),
    )
}

/// A chain owner whose current slot the test moves by hand.
struct ManualChain {
    length: usize,
    slot: Rc<Cell<usize>>,
    commits: Rc<Cell<u32>>,
}

impl TextureChain<HeadlessDevice> for ManualChain {
    fn create_images(
        &mut self,
        device: &mut HeadlessDevice,
        desc: &TextureDescriptor<'_>,
    ) -> Result<Vec<HeadlessTexture>, Error> {
        (0..self.length)
            .map(|_| device.create_texture(desc, &[]))
            .collect()
    }

    fn current_slot(&self) -> usize {
        self.slot.get()
    }

    fn commit(&mut self) -> Result<(), Error> {
        self.commits.set(self.commits.get() + 1);
        Ok(())
    }
}

fn manual_chain(length: usize) -> (Box<ManualChain>, Rc<Cell<usize>>, Rc<Cell<u32>>) {
    let slot = Rc::new(Cell::new(0));
    let commits = Rc::new(Cell::new(0));
    (
        Box::new(ManualChain {
            length,
            slot: slot.clone(),
            commits: commits.clone(),
        }),
        slot,
        commits,
    )
}

#[test]
fn depth_buffers_are_cached_by_size_and_samples() {
    let (mut device, mut textures) = manager();
    let a = textures
        .get_depth_buffer(&mut device, 1280, 720, 1, FormatTag::Depth32Float)
        .unwrap();
    let b = textures
        .get_depth_buffer(&mut device, 1280, 720, 1, FormatTag::Depth32Float)
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(device.stats().textures_created, 1);

    let msaa = textures
        .get_depth_buffer(&mut device, 1280, 720, 4, FormatTag::Depth32Float)
        .unwrap();
    assert_ne!(a, msaa);
    assert_eq!(textures.depth_cache_len(), 2);

    //a different format still hits the cache
    let c = textures
        .get_depth_buffer(&mut device, 1280, 720, 1, FormatTag::Depth24Stencil8)
        .unwrap();
    assert_eq!(a, c);
    assert_eq!(device.stats().textures_created, 2);
}

#[test]
fn destroyed_depth_buffer_leaves_the_cache() {
    let (mut device, mut textures) = manager();
    let a = textures
        .get_depth_buffer(&mut device, 64, 64, 1, FormatTag::Depth16)
        .unwrap();
    textures.destroy_texture(a).unwrap();
    assert_eq!(textures.depth_cache_len(), 0);
    let b = textures
        .get_depth_buffer(&mut device, 64, 64, 1, FormatTag::Depth16)
        .unwrap();
    assert_ne!(a, b);
}

#[test]
fn auto_depth_follows_the_back_buffer() {
    let mut device = HeadlessDevice::with_back_buffer(BackBufferInfo {
        width: 800,
        height: 600,
        sample_count: 4,
    });
    let mut textures = TextureManager::new(FormatResolver::new());
    textures
        .set_render_target(&mut device, None, DepthTarget::Auto, None)
        .unwrap();
    assert_eq!(device.bound_color(), Some(BoundColor::BackBuffer));
    assert!(device.bound_depth().is_some());
    assert_eq!(textures.depth_cache_len(), 1);
    let depth = textures
        .get_depth_buffer(&mut device, 800, 600, 4, FormatTag::Depth32Float)
        .unwrap();
    let info = textures.texture_info(depth).unwrap();
    assert_eq!(info.sample_count, 4);
    assert_eq!(info.format.storage, StorageFormat::Depth32Float);
}

#[test]
fn back_buffer_always_gets_a_cached_depth_buffer() {
    let mut device = HeadlessDevice::with_back_buffer(BackBufferInfo {
        width: 640,
        height: 480,
        sample_count: 1,
    });
    let mut textures = TextureManager::new(FormatResolver::new());
    textures
        .set_render_target(&mut device, None, DepthTarget::None, None)
        .unwrap();
    assert_eq!(device.bound_color(), Some(BoundColor::BackBuffer));
    let first = device.bound_depth();
    assert!(first.is_some());
    assert_eq!(textures.depth_cache_len(), 1);

    textures
        .set_render_target(&mut device, None, DepthTarget::None, None)
        .unwrap();
    assert_eq!(device.bound_depth(), first);
    assert_eq!(textures.depth_cache_len(), 1);
    assert_eq!(device.stats().textures_created, 1);
}

#[test]
fn explicit_color_target_without_depth() {
    let (mut device, mut textures) = manager();
    let config = TextureConfig {
        flags: TextureFlags::RENDER_TARGET,
        ..TextureConfig::new("offscreen", 256, 128, FormatTag::Rgba16Float)
    };
    let target = textures.create_texture(&mut device, &config, None).unwrap();
    textures
        .set_render_target(&mut device, Some(target), DepthTarget::None, None)
        .unwrap();
    assert!(matches!(device.bound_color(), Some(BoundColor::View(_))));
    assert_eq!(device.bound_depth(), None);
    assert_eq!(textures.depth_cache_len(), 0);
}

#[test]
fn chain_commit_state_machine() {
    let (mut device, mut textures) = manager();
    let (owner, slot, commits) = manual_chain(3);
    let config = TextureConfig {
        flags: TextureFlags::RENDER_TARGET,
        ..TextureConfig::new("eye", 128, 128, FormatTag::Rgba8Unorm)
    };
    let handle = textures
        .create_chain_texture(&mut device, &config, owner)
        .unwrap();
    let info = textures.texture_info(handle).unwrap();
    assert_eq!(info.chain_length, 3);
    assert_eq!(info.backing, BackingKind::Chain);

    assert_eq!(
        textures.chain_state(handle).unwrap(),
        Some(ChainState::Writable { slot: 0 })
    );
    textures.commit(&mut device, handle).unwrap();
    assert_eq!(commits.get(), 1);
    assert_eq!(
        textures.chain_state(handle).unwrap(),
        Some(ChainState::Committed { slot: 0 })
    );

    let first = textures.native(handle).unwrap().id();
    slot.set(1);
    assert_eq!(
        textures.chain_state(handle).unwrap(),
        Some(ChainState::Writable { slot: 1 })
    );
    let second = textures.native(handle).unwrap().id();
    assert_ne!(first, second);
    assert_eq!(textures.shader_view(handle).unwrap().texture(), second);
}

#[test]
fn chain_commit_regenerates_mips_for_render_targets() {
    let (mut device, mut textures) = manager();
    let (owner, _slot, commits) = manual_chain(2);
    let config = TextureConfig {
        flags: TextureFlags::RENDER_TARGET | TextureFlags::GEN_MIPMAPS,
        mip_levels: 0,
        ..TextureConfig::new("mirror chain", 64, 64, FormatTag::Rgba8Unorm)
    };
    let handle = textures
        .create_chain_texture(&mut device, &config, owner)
        .unwrap();
    assert_eq!(textures.texture_info(handle).unwrap().mip_levels, 7);
    textures.commit(&mut device, handle).unwrap();
    assert_eq!(device.stats().mip_generations, 1);
    assert_eq!(commits.get(), 1);
}

#[test]
fn commit_on_owned_texture_does_nothing() {
    let (mut device, mut textures) = manager();
    let config = TextureConfig::new("plain", 4, 4, FormatTag::R8Unorm);
    let handle = textures
        .create_texture(&mut device, &config, Some(&[0; 16]))
        .unwrap();
    textures.commit(&mut device, handle).unwrap();
    assert_eq!(textures.chain_state(handle).unwrap(), None);
    assert_eq!(device.stats().mip_generations, 0);
}

#[test]
fn depth_resolve_is_unsupported() {
    let (mut device, mut textures) = manager();
    let source = textures
        .get_depth_buffer(&mut device, 64, 64, 4, FormatTag::Depth32Float)
        .unwrap();
    let destination = textures
        .get_depth_buffer(&mut device, 64, 64, 1, FormatTag::Depth32Float)
        .unwrap();
    assert_eq!(
        textures.resolve_msaa(&mut device, source, destination),
        Err(Error::Unsupported("MSAA resolve of a depth texture"))
    );
    assert_eq!(device.stats().resolves, 0);
}

#[test]
fn color_resolve() {
    let (mut device, mut textures) = manager();
    let msaa = TextureConfig {
        sample_count: 4,
        flags: TextureFlags::RENDER_TARGET,
        ..TextureConfig::new("msaa", 64, 64, FormatTag::Rgba8Unorm)
    };
    let single = TextureConfig::new("resolved", 64, 64, FormatTag::Rgba8Unorm);
    let source = textures.create_texture(&mut device, &msaa, None).unwrap();
    let destination = textures.create_texture(&mut device, &single, None).unwrap();
    textures
        .resolve_msaa(&mut device, source, destination)
        .unwrap();
    assert_eq!(device.stats().resolves, 1);
}

#[test]
fn mirror_texture_is_sample_only() {
    let (mut device, mut textures) = manager();
    let desc = TextureDescriptor {
        label: "compositor mirror",
        width: 512,
        height: 256,
        array_layers: 1,
        mip_levels: 1,
        sample_count: 1,
        format: StorageFormat::Rgba8UnormSrgb,
        usage: TextureUsages::SHADER_READ,
    };
    let image = device.create_texture(&desc, &[]).unwrap();
    let image_id = image.id();
    let config = TextureConfig {
        flags: TextureFlags::SRGB | TextureFlags::RENDER_TARGET,
        ..TextureConfig::new("mirror", 512, 256, FormatTag::Rgba8Unorm)
    };
    let handle = textures
        .create_mirror_texture(&mut device, &config, image)
        .unwrap();
    assert_eq!(
        textures.texture_info(handle).unwrap().backing,
        BackingKind::Mirror
    );
    assert_eq!(textures.shader_view(handle).unwrap().texture(), image_id);
    //shader view only
    assert_eq!(device.stats().views_created, 1);
    textures.commit(&mut device, handle).unwrap();
}

#[test]
fn stale_handles_are_errors() {
    let (mut device, mut textures) = manager();
    let config = TextureConfig::new("gone", 4, 4, FormatTag::R8Unorm);
    let handle = textures
        .create_texture(&mut device, &config, Some(&[0; 16]))
        .unwrap();
    textures.destroy_texture(handle).unwrap();
    assert_eq!(
        textures.destroy_texture(handle),
        Err(Error::StaleHandle("texture"))
    );
    assert!(textures.shader_view(handle).is_err());
    assert!(matches!(
        textures.set_render_target(&mut device, Some(handle), DepthTarget::None, None),
        Err(Error::StaleHandle("texture"))
    ));
}

#[test]
fn allocation_failure_surfaces_as_gpu_error() {
    let (mut device, mut textures) = manager();
    device.fail_next_allocation(textures_and_uniforms::GpuFault::OutOfMemory);
    let config = TextureConfig::new("big", 4096, 4096, FormatTag::Rgba32Float);
    let err = textures.create_texture(&mut device, &config, None).unwrap_err();
    assert!(matches!(&err, Error::Gpu(e) if e.fault == textures_and_uniforms::GpuFault::OutOfMemory));
    assert!(!err.is_device_lost());
    assert!(textures.is_empty());
}

#[test]
fn release_all_drops_every_texture() {
    let (mut device, mut textures) = manager();
    let (owner, _slot, _commits) = manual_chain(2);
    let config = TextureConfig::new("chain", 16, 16, FormatTag::Bgra8Unorm);
    textures
        .create_chain_texture(&mut device, &config, owner)
        .unwrap();
    textures
        .get_depth_buffer(&mut device, 16, 16, 1, FormatTag::Depth32Float)
        .unwrap();
    textures.release_all();
    assert!(textures.is_empty());
    let released_textures = device
        .release_log()
        .iter()
        .filter(|r| matches!(r, Released::Texture(_)))
        .count();
    assert_eq!(released_textures, 3);
}

#[test]
#[should_panic(expected = "a 4x4 chain has 3")]
fn too_many_mips_without_data_is_fatal() {
    let (mut device, mut textures) = manager();
    let config = TextureConfig {
        mip_levels: 12,
        ..TextureConfig::new("overlong", 4, 4, FormatTag::Rgba8Unorm)
    };
    let _ = textures.create_texture(&mut device, &config, None);
}

/// A chain owner whose compositor session is already gone.
struct EndedSession;

impl TextureChain<HeadlessDevice> for EndedSession {
    fn create_images(
        &mut self,
        device: &mut HeadlessDevice,
        desc: &TextureDescriptor<'_>,
    ) -> Result<Vec<HeadlessTexture>, Error> {
        Ok(vec![device.create_texture(desc, &[])?])
    }

    fn current_slot(&self) -> usize {
        0
    }

    fn commit(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn session_alive(&self) -> bool {
        false
    }
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "released after its chain session was destroyed")]
fn releasing_after_the_session_is_fatal_on_debug() {
    let (mut device, mut textures) = manager();
    let config = TextureConfig::new("late", 16, 16, FormatTag::Rgba8Unorm);
    let handle = textures
        .create_chain_texture(&mut device, &config, Box::new(EndedSession))
        .unwrap();
    let _ = textures.destroy_texture(handle);
}

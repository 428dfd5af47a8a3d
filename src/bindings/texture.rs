// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Texture resources.

[`TextureManager`] owns every texture and hands out [`TextureHandle`]s.  A handle is a
non-owning reference: once the texture is destroyed, using the handle returns
[`Error::StaleHandle`].

A texture is backed in one of three ways:

* **Owned**: a single image created (and uploaded) by the manager.
* **Chain**: N images allocated by a [`TextureChain`] owner that rotates them.  The manager
  creates one set of views per image and binds whichever slot the owner says is current.
* **Mirror**: a single image supplied from outside, exposed for sampling only.

# Upload

Source data is one byte stream with every mip level of every layer back to back
(layer-major, largest level first).  It goes through [`compute_layout`] so that a
[`MipClamp`](crate::mip_chain::MipClamp) can drop the largest levels, and the whole retained chain is created with a
single allocation call.

# Depth buffers

[`TextureManager::get_depth_buffer`] is a memoizing pool keyed by size and sample count.
Entries live until destroyed or until [`TextureManager::release_all`].
*/

use crate::Error;
use crate::bindings::chain::{ChainState, TextureChain};
use crate::bindings::visible_to::{TextureConfig, TextureFlags};
use crate::bittricks::full_mip_count;
use crate::imp::{
    ColorTarget, Device, MipUpload, TextureDescriptor, TextureUsages, ViewDescriptor, ViewKind,
};
use crate::mip_chain::{self, compute_layout};
use crate::pixel_formats::{FormatDescriptor, FormatResolver, FormatTag, PixelFormat};
use slotmap::SlotMap;
use std::borrow::Cow;
use std::collections::HashMap;

slotmap::new_key_type! {
    /// Non-owning reference to a texture in a [`TextureManager`].
    pub struct TextureHandle;
}

/// How a texture's images are owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackingKind {
    Owned,
    Chain,
    Mirror,
}

/// Depth attachment for [`TextureManager::set_render_target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthTarget {
    /// A cached depth buffer matching the color target (or the back buffer).
    Auto,
    /// No depth attachment.  With the back buffer as color this behaves as [`DepthTarget::Auto`].
    None,
    Texture(TextureHandle),
}

/// What a texture was created as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureInfo {
    pub format: FormatDescriptor,
    pub flags: TextureFlags,
    /// Allocated size, after any mip clamp.
    pub width: u32,
    pub height: u32,
    pub array_layers: u32,
    /// Levels allocated.
    pub mip_levels: u32,
    /// Levels the caller asked for; larger than `mip_levels` when a clamp dropped some.
    pub requested_mips: u32,
    pub sample_count: u32,
    /// Number of backing images.
    pub chain_length: usize,
    pub backing: BackingKind,
}

/// Views for one backing image.
struct SlotViews<D: Device> {
    shader: Option<D::View>,
    /// One per layer: color or depth-stencil attachments.
    targets: Vec<D::View>,
}

enum Backing<D: Device> {
    Owned,
    Chain {
        owner: Box<dyn TextureChain<D>>,
        committed: Option<usize>,
    },
    Mirror,
}

/// Field order is release order.
struct TextureEntry<D: Device> {
    slots: Vec<SlotViews<D>>,
    staging: Option<D::Staging>,
    images: Vec<D::Texture>,
    backing: Backing<D>,
    info: TextureInfo,
    name: String,
}

impl<D: Device> TextureEntry<D> {
    fn current(&self) -> usize {
        match &self.backing {
            Backing::Owned | Backing::Mirror => 0,
            Backing::Chain { owner, .. } => {
                let slot = owner.current_slot();
                assert!(
                    slot < self.images.len(),
                    "chain owner of {} reports slot {slot} of {}",
                    self.name,
                    self.images.len()
                );
                slot
            }
        }
    }

    /// Releases views, then staging, then images, then the chain owner.
    fn release(self) {
        if let Backing::Chain { owner, .. } = &self.backing {
            debug_assert!(
                owner.session_alive(),
                "texture {} released after its chain session was destroyed",
                self.name
            );
        }
        let TextureEntry {
            slots,
            staging,
            images,
            backing,
            info: _,
            name,
        } = self;
        drop(slots);
        drop(staging);
        drop(images);
        drop(backing);
        logwise::trace_sync!("released texture {name}", name = logwise::privacy::LogIt(&name));
    }
}

pub struct TextureManager<D: Device> {
    resolver: FormatResolver,
    textures: SlotMap<TextureHandle, TextureEntry<D>>,
    depth_cache: HashMap<(u32, u32, u32), TextureHandle>,
}

impl<D: Device> std::fmt::Debug for TextureManager<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureManager")
            .field("textures", &self.textures.len())
            .field("depth_cache", &self.depth_cache)
            .finish()
    }
}

fn usages(
    format: &FormatDescriptor,
    flags: TextureFlags,
    mip_levels: u32,
    sample_count: u32,
) -> TextureUsages {
    let mut usage = TextureUsages::empty();
    if sample_count == 1 {
        usage |= TextureUsages::COPY_DST;
    } else if !format.is_depth {
        //multisampled color is only ever drawn into
        usage |= TextureUsages::RENDER_TARGET;
    }
    if shader_readable(format, flags) {
        usage |= TextureUsages::SHADER_READ;
    }
    if format.is_depth {
        usage |= TextureUsages::DEPTH_STENCIL;
    } else if flags.contains(TextureFlags::RENDER_TARGET)
        || (flags.contains(TextureFlags::GEN_MIPMAPS) && mip_levels > 1)
    {
        usage |= TextureUsages::RENDER_TARGET;
    }
    if flags.contains(TextureFlags::STAGING) {
        usage |= TextureUsages::COPY_SRC;
    }
    usage
}

fn shader_readable(format: &FormatDescriptor, flags: TextureFlags) -> bool {
    !format.is_depth || flags.contains(TextureFlags::SAMPLE_DEPTH)
}

fn create_slot_views<D: Device>(
    device: &mut D,
    image: &D::Texture,
    info: &TextureInfo,
) -> Result<SlotViews<D>, Error> {
    let cube = info.array_layers == 6 && info.flags.contains(TextureFlags::CUBEMAP);
    let shader = if shader_readable(&info.format, info.flags) {
        Some(device.create_view(
            image,
            &ViewDescriptor {
                format: info.format.shader_view,
                kind: if cube {
                    ViewKind::ShaderCube
                } else {
                    ViewKind::ShaderResource
                },
            },
        )?)
    } else {
        None
    };
    let mut targets = Vec::new();
    if info.backing != BackingKind::Mirror {
        let format = info.format.target_view();
        if info.format.is_depth {
            for layer in 0..info.array_layers {
                targets.push(device.create_view(
                    image,
                    &ViewDescriptor {
                        format,
                        kind: ViewKind::DepthStencil { layer },
                    },
                )?);
            }
        } else if info.flags.contains(TextureFlags::RENDER_TARGET) {
            for layer in 0..info.array_layers {
                targets.push(device.create_view(
                    image,
                    &ViewDescriptor {
                        format,
                        kind: ViewKind::RenderTarget { layer },
                    },
                )?);
            }
        }
    }
    Ok(SlotViews { shader, targets })
}

impl<D: Device> TextureManager<D> {
    pub fn new(resolver: FormatResolver) -> Self {
        TextureManager {
            resolver,
            textures: SlotMap::with_key(),
            depth_cache: HashMap::new(),
        }
    }

    pub fn resolver(&self) -> &FormatResolver {
        &self.resolver
    }

    /// Live textures, including cached depth buffers.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn depth_cache_len(&self) -> usize {
        self.depth_cache.len()
    }

    fn entry(&self, handle: TextureHandle) -> Result<&TextureEntry<D>, Error> {
        self.textures.get(handle).ok_or(Error::StaleHandle("texture"))
    }

    fn entry_mut(&mut self, handle: TextureHandle) -> Result<&mut TextureEntry<D>, Error> {
        self.textures.get_mut(handle).ok_or(Error::StaleHandle("texture"))
    }

    fn check_config(config: &TextureConfig<'_>, format: &FormatDescriptor) {
        assert!(
            config.width > 0 && config.height > 0,
            "texture {} has size {}x{}",
            config.debug_name,
            config.width,
            config.height
        );
        assert!(config.sample_count >= 1, "sample count of 0");
        if config.is_cubemap() {
            assert_eq!(config.width, config.height, "cubemap faces must be square");
        }
        if config.sample_count > 1 {
            assert!(
                config.mip_levels == 1,
                "multisampled texture {} can't have mips",
                config.debug_name
            );
        }
        let full = full_mip_count(config.width, config.height);
        assert!(
            config.mip_levels <= full,
            "texture {} asks for {} mips, a {}x{} chain has {full}",
            config.debug_name,
            config.mip_levels,
            config.width,
            config.height
        );
        if config.wants_generated_mips() {
            assert!(
                !format.is_compressed && !format.is_depth,
                "mips can't be generated for {:?}",
                format.tag
            );
        }
    }

    /**
    Creates a texture, optionally with initial contents.

    `data` holds `config.mip_levels` levels per layer, layer-major.  With
    [`TextureFlags::GEN_MIPMAPS`] it may instead hold only level 0 of each layer; the
    remaining levels are box-filtered on the CPU.

    # Panics
    On malformed configs and when `data` does not match the configured chain.
    */
    pub fn create_texture(
        &mut self,
        device: &mut D,
        config: &TextureConfig<'_>,
        data: Option<&[u8]>,
    ) -> Result<TextureHandle, Error> {
        let format = self.resolver.resolve(config.format, config.flags);
        Self::check_config(config, &format);
        let layers = config.array_layers();
        let block = format.block_info();
        let requested = if config.mip_levels == 0 {
            full_mip_count(config.width, config.height)
        } else {
            config.mip_levels
        };

        let (width, height, mip_levels, stream, layout) = match data {
            None => (config.width, config.height, requested, None, None),
            Some(data) => {
                assert!(!format.is_depth, "depth textures take no initial data");
                assert_eq!(config.sample_count, 1, "multisampled textures take no initial data");
                let base_size = mip_chain::source_size(config.width, config.height, block, 1);
                let stream: Cow<'_, [u8]> = if config.wants_generated_mips()
                    && requested > 1
                    && data.len() as u64 == base_size * layers as u64
                {
                    let channels = format
                        .storage
                        .channels()
                        .expect("uncompressed color formats have channels");
                    let mut generated = Vec::new();
                    for layer in data.chunks_exact(base_size as usize) {
                        generated.extend(mip_chain::generate_mips(
                            layer,
                            config.width,
                            config.height,
                            channels,
                            requested,
                        ));
                    }
                    Cow::Owned(generated)
                } else {
                    Cow::Borrowed(data)
                };
                let layout =
                    compute_layout(config.width, config.height, block, config.mip_clamp, requested);
                let stride = layout.source_bytes_consumed();
                assert_eq!(
                    stream.len() as u64,
                    stride * layers as u64,
                    "source data for {} is {} bytes, a {}-level chain of {} layers is {}",
                    config.debug_name,
                    stream.len(),
                    requested,
                    layers,
                    stride * layers as u64
                );
                if layout.skipped_leading_mips() > 0 {
                    logwise::warn_sync!(
                        "texture {name} clamped: {skipped} of {requested} mips skipped",
                        name = logwise::privacy::LogIt(&config.debug_name),
                        skipped = layout.skipped_leading_mips(),
                        requested = requested
                    );
                }
                (
                    layout.largest_width(),
                    layout.largest_height(),
                    layout.effective_mips(),
                    Some(stream),
                    Some(layout),
                )
            }
        };

        let mut uploads = Vec::new();
        if let (Some(stream), Some(layout)) = (&stream, &layout) {
            let stride = layout.source_bytes_consumed();
            for layer in 0..layers {
                let layer_start = stride * layer as u64;
                for (index, level) in layout.levels().iter().enumerate() {
                    let start = (layer_start + level.byte_offset) as usize;
                    let end = start + level.slice_pitch as usize;
                    uploads.push(MipUpload {
                        layer,
                        level: index as u32,
                        width: level.width,
                        height: level.height,
                        row_pitch: level.row_pitch,
                        rows: level.block_rows,
                        data: &stream[start..end],
                    });
                }
            }
        }

        let desc = TextureDescriptor {
            label: config.debug_name,
            width,
            height,
            array_layers: layers,
            mip_levels,
            sample_count: config.sample_count,
            format: format.storage,
            usage: usages(&format, config.flags, mip_levels, config.sample_count),
        };
        let image = device.create_texture(&desc, &uploads)?;
        let info = TextureInfo {
            format,
            flags: config.flags,
            width,
            height,
            array_layers: layers,
            mip_levels,
            requested_mips: requested,
            sample_count: config.sample_count,
            chain_length: 1,
            backing: BackingKind::Owned,
        };
        self.insert(device, config.debug_name, info, vec![image], Backing::Owned)
    }

    /// Creates a texture from typed pixels.
    ///
    /// `pixels` holds level 0 of each layer.  With [`TextureFlags::GEN_MIPMAPS`] the rest of
    /// the chain is built by averaging; otherwise `config.mip_levels` must be 1.
    pub fn create_texture_from_pixels<F: PixelFormat>(
        &mut self,
        device: &mut D,
        config: &TextureConfig<'_>,
        pixels: &[F::CPixel],
    ) -> Result<TextureHandle, Error> {
        assert_eq!(config.format, F::TAG, "pixel type does not match the configured format");
        let mut config = config.clone();
        if F::SRGB {
            config.flags |= TextureFlags::SRGB;
        }
        let levels = if config.mip_levels == 0 {
            full_mip_count(config.width, config.height)
        } else {
            config.mip_levels
        };
        let per_layer = config.width as usize * config.height as usize;
        assert_eq!(pixels.len(), per_layer * config.array_layers() as usize);
        assert!(
            levels == 1 || config.wants_generated_mips(),
            "{levels} mips requested but only level 0 was supplied"
        );
        config.mip_levels = levels;
        self.create_texture(device, &config, Some(bytemuck::cast_slice(pixels)))
    }

    /// Creates a texture backed by images from `owner`.
    pub fn create_chain_texture(
        &mut self,
        device: &mut D,
        config: &TextureConfig<'_>,
        mut owner: Box<dyn TextureChain<D>>,
    ) -> Result<TextureHandle, Error> {
        let format = self.resolver.resolve(config.format, config.flags);
        Self::check_config(config, &format);
        let mip_levels = if config.mip_levels == 0 {
            full_mip_count(config.width, config.height)
        } else {
            config.mip_levels
        };
        let desc = TextureDescriptor {
            label: config.debug_name,
            width: config.width,
            height: config.height,
            array_layers: config.array_layers(),
            mip_levels,
            sample_count: config.sample_count,
            format: format.storage,
            usage: usages(&format, config.flags, mip_levels, config.sample_count),
        };
        let images = owner.create_images(device, &desc)?;
        assert!(!images.is_empty(), "chain owner for {} returned no images", config.debug_name);
        let info = TextureInfo {
            format,
            flags: config.flags,
            width: config.width,
            height: config.height,
            array_layers: desc.array_layers,
            mip_levels,
            requested_mips: mip_levels,
            sample_count: config.sample_count,
            chain_length: images.len(),
            backing: BackingKind::Chain,
        };
        self.insert(
            device,
            config.debug_name,
            info,
            images,
            Backing::Chain {
                owner,
                committed: None,
            },
        )
    }

    /// Wraps an externally created image (e.g. a compositor's mirror of the headset view)
    /// for sampling.
    pub fn create_mirror_texture(
        &mut self,
        device: &mut D,
        config: &TextureConfig<'_>,
        image: D::Texture,
    ) -> Result<TextureHandle, Error> {
        let format = self.resolver.resolve(config.format, config.flags);
        Self::check_config(config, &format);
        let info = TextureInfo {
            format,
            flags: config.flags,
            width: config.width,
            height: config.height,
            array_layers: 1,
            mip_levels: 1,
            requested_mips: 1,
            sample_count: config.sample_count,
            chain_length: 1,
            backing: BackingKind::Mirror,
        };
        self.insert(device, config.debug_name, info, vec![image], Backing::Mirror)
    }

    fn insert(
        &mut self,
        device: &mut D,
        name: &str,
        info: TextureInfo,
        images: Vec<D::Texture>,
        backing: Backing<D>,
    ) -> Result<TextureHandle, Error> {
        let mut slots = Vec::with_capacity(images.len());
        for image in &images {
            slots.push(create_slot_views(device, image, &info)?);
        }
        let staging = if info.flags.contains(TextureFlags::STAGING) {
            Some(device.create_staging(&images[0])?)
        } else {
            None
        };
        logwise::info_sync!(
            "texture {name} created: {w}x{h}, {mips} mips, {slots} images",
            name = logwise::privacy::LogIt(&name),
            w = info.width,
            h = info.height,
            mips = info.mip_levels,
            slots = images.len()
        );
        Ok(self.textures.insert(TextureEntry {
            slots,
            staging,
            images,
            backing,
            info,
            name: name.to_owned(),
        }))
    }

    /**
    Returns a depth buffer of the given size and sample count, creating it on first use.

    The cache is keyed by `(width, height, sample_count)` only; asking again with a
    different depth format returns the cached buffer.
    */
    pub fn get_depth_buffer(
        &mut self,
        device: &mut D,
        width: u32,
        height: u32,
        sample_count: u32,
        format: FormatTag,
    ) -> Result<TextureHandle, Error> {
        assert!(format.is_depth(), "{format:?} is not a depth format");
        let key = (width, height, sample_count);
        if let Some(&handle) = self.depth_cache.get(&key) {
            if let Some(entry) = self.textures.get(handle) {
                if entry.info.format.tag != format {
                    logwise::warn_sync!(
                        "cached depth buffer is {cached}, {wanted} was asked for",
                        cached = logwise::privacy::LogIt(&entry.info.format.tag),
                        wanted = logwise::privacy::LogIt(&format)
                    );
                }
                return Ok(handle);
            }
            self.depth_cache.remove(&key);
        }
        let name = format!("depth {width}x{height}x{sample_count}");
        let config = TextureConfig {
            sample_count,
            ..TextureConfig::new(&name, width, height, format)
        };
        let handle = self.create_texture(device, &config, None)?;
        self.depth_cache.insert(key, handle);
        Ok(handle)
    }

    fn target_view(&self, handle: TextureHandle, layer: u32) -> Result<&D::View, Error> {
        let entry = self.entry(handle)?;
        let slot = &entry.slots[entry.current()];
        assert!(
            !slot.targets.is_empty(),
            "texture {} is not a render target",
            entry.name
        );
        slot.targets
            .get(layer as usize)
            .ok_or(Error::Unsupported("face index on a texture without that face"))
    }

    /**
    Binds color and depth attachments for subsequent draws.

    `None` color binds the back buffer, which always gets a cached depth buffer of its
    size unless an explicit depth texture is given.  `face` selects a cubemap face (of the
    color target, and of the depth target when it is a cubemap too).
    */
    pub fn set_render_target(
        &mut self,
        device: &mut D,
        color: Option<TextureHandle>,
        depth: DepthTarget,
        face: Option<u32>,
    ) -> Result<(), Error> {
        let depth = match (color, depth) {
            (Some(_), DepthTarget::None) => None,
            (_, DepthTarget::Texture(handle)) => Some(handle),
            (_, DepthTarget::Auto) | (None, DepthTarget::None) => {
                let (width, height, samples) = match color {
                    None => {
                        let back = device.back_buffer_info();
                        (back.width, back.height, back.sample_count)
                    }
                    Some(handle) => {
                        let info = &self.entry(handle)?.info;
                        (info.width, info.height, info.sample_count)
                    }
                };
                Some(self.get_depth_buffer(
                    device,
                    width,
                    height,
                    samples,
                    FormatTag::Depth32Float,
                )?)
            }
        };
        let color_view = match color {
            None => ColorTarget::BackBuffer,
            Some(handle) => ColorTarget::View(self.target_view(handle, face.unwrap_or(0))?),
        };
        let depth_view = match depth {
            None => None,
            Some(handle) => {
                let entry = self.entry(handle)?;
                assert!(entry.info.format.is_depth, "{} is not a depth texture", entry.name);
                let layer = if entry.info.array_layers == 6 {
                    face.unwrap_or(0)
                } else {
                    0
                };
                Some(self.target_view(handle, layer)?)
            }
        };
        device.bind_render_targets(color_view, depth_view)
    }

    /// Resolves a multisampled texture into a single-sampled one.
    ///
    /// Depth textures return [`Error::Unsupported`].
    pub fn resolve_msaa(
        &mut self,
        device: &mut D,
        source: TextureHandle,
        destination: TextureHandle,
    ) -> Result<(), Error> {
        let src = self.entry(source)?;
        let dst = self.entry(destination)?;
        if src.info.format.is_depth || dst.info.format.is_depth {
            return Err(Error::Unsupported("MSAA resolve of a depth texture"));
        }
        assert!(src.info.sample_count > 1, "{} is not multisampled", src.name);
        assert_eq!(dst.info.sample_count, 1, "resolve destination is multisampled");
        assert_eq!(
            (src.info.width, src.info.height),
            (dst.info.width, dst.info.height),
            "resolve size mismatch"
        );
        assert_eq!(src.info.format.storage, dst.info.format.storage, "resolve format mismatch");
        device.resolve_multisample(&src.images[src.current()], &dst.images[dst.current()])
    }

    /**
    Finalizes the current slot of a chain-backed texture.

    Regenerates mips first when the texture is a render target created with
    [`TextureFlags::GEN_MIPMAPS`], then tells the chain owner.  For other textures this does
    nothing.
    */
    pub fn commit(&mut self, device: &mut D, handle: TextureHandle) -> Result<(), Error> {
        let entry = self.entry_mut(handle)?;
        let slot = entry.current();
        let regenerate = entry.info.flags.contains(TextureFlags::GEN_MIPMAPS)
            && entry.info.flags.contains(TextureFlags::RENDER_TARGET)
            && entry.info.mip_levels > 1;
        match &mut entry.backing {
            Backing::Owned | Backing::Mirror => Ok(()),
            Backing::Chain { owner, committed } => {
                if regenerate {
                    device.generate_mipmaps(&entry.images[slot])?;
                }
                owner.commit()?;
                *committed = Some(slot);
                logwise::trace_sync!("committed chain slot {slot}", slot = slot);
                Ok(())
            }
        }
    }

    /// Frame-cycle state of a chain-backed texture; `None` for other textures.
    pub fn chain_state(&self, handle: TextureHandle) -> Result<Option<ChainState>, Error> {
        let entry = self.entry(handle)?;
        Ok(match &entry.backing {
            Backing::Chain { committed, .. } => {
                let slot = entry.current();
                Some(if *committed == Some(slot) {
                    ChainState::Committed { slot }
                } else {
                    ChainState::Writable { slot }
                })
            }
            _ => None,
        })
    }

    pub fn texture_info(&self, handle: TextureHandle) -> Result<&TextureInfo, Error> {
        Ok(&self.entry(handle)?.info)
    }

    /// The shader view of the current slot.
    pub fn shader_view(&self, handle: TextureHandle) -> Result<&D::View, Error> {
        let entry = self.entry(handle)?;
        entry.slots[entry.current()]
            .shader
            .as_ref()
            .ok_or(Error::Unsupported("depth texture created without SAMPLE_DEPTH"))
    }

    /// The backend image of the current slot.
    pub fn native(&self, handle: TextureHandle) -> Result<&D::Texture, Error> {
        let entry = self.entry(handle)?;
        Ok(&entry.images[entry.current()])
    }

    /// Regenerates levels 1.. of the current slot from level 0.
    pub fn generate_mipmaps(&mut self, device: &mut D, handle: TextureHandle) -> Result<(), Error> {
        let entry = self.entry(handle)?;
        if entry.info.mip_levels <= 1 {
            return Ok(());
        }
        device.generate_mipmaps(&entry.images[entry.current()])
    }

    /// Copies level 0 of a [`TextureFlags::STAGING`] texture back to the CPU.
    pub fn read_back(&mut self, device: &mut D, handle: TextureHandle) -> Result<Vec<u8>, Error> {
        let entry = self.entry(handle)?;
        let Some(staging) = &entry.staging else {
            return Err(Error::Unsupported("read back of a texture created without STAGING"));
        };
        let interval = logwise::perfwarn_begin!("TextureManager::read_back");
        let bytes = device.read_back(&entry.images[0], staging);
        drop(interval);
        bytes
    }

    /// Releases a texture's views, images and chain owner, in that order.
    pub fn destroy_texture(&mut self, handle: TextureHandle) -> Result<(), Error> {
        let entry = self
            .textures
            .remove(handle)
            .ok_or(Error::StaleHandle("texture"))?;
        self.depth_cache.retain(|_, cached| *cached != handle);
        entry.release();
        Ok(())
    }

    /// Releases every texture, including cached depth buffers.
    pub fn release_all(&mut self) {
        let count = self.textures.len();
        self.depth_cache.clear();
        for (_, entry) in self.textures.drain() {
            entry.release();
        }
        logwise::info_sync!("released {count} textures", count = count);
    }
}

impl<D: Device> Drop for TextureManager<D> {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::headless::{HeadlessDevice, Released};
    use crate::mip_chain::MipClamp;

    fn manager() -> (HeadlessDevice, TextureManager<HeadlessDevice>) {
        (HeadlessDevice::new(), TextureManager::new(FormatResolver::new()))
    }

    #[test]
    fn bc1_srgb_single_level_upload() {
        let (mut device, mut textures) = manager();
        let config = TextureConfig {
            flags: TextureFlags::SRGB,
            ..TextureConfig::new("bc1", 256, 256, FormatTag::Bc1)
        };
        let data = vec![0x5a; 32768];
        let handle = textures.create_texture(&mut device, &config, Some(&data)).unwrap();
        let info = textures.texture_info(handle).unwrap();
        assert_eq!(info.mip_levels, 1);
        assert_eq!(info.format.storage, crate::pixel_formats::StorageFormat::Bc1UnormSrgb);
        let native = textures.native(handle).unwrap();
        assert_eq!(native.level(0, 0).len(), 32768);
        assert_eq!(device.stats().textures_created, 1);
    }

    #[test]
    fn clamp_allocates_the_smaller_texture() {
        let (mut device, mut textures) = manager();
        let config = TextureConfig {
            mip_levels: 11,
            mip_clamp: MipClamp::MaxDimension(512),
            ..TextureConfig::new("clamped", 1024, 1024, FormatTag::Bc1)
        };
        let block = textures.resolver().resolve(FormatTag::Bc1, TextureFlags::empty()).block_info();
        let size = mip_chain::source_size(1024, 1024, block, 11) as usize;
        //mark each byte with its source level so retained uploads can be checked
        let mut data = vec![0u8; size];
        let full = compute_layout(1024, 1024, block, MipClamp::Disabled, 11);
        for level in full.levels() {
            let start = level.byte_offset as usize;
            data[start..start + level.slice_pitch as usize].fill(level.source_level as u8);
        }
        let handle = textures.create_texture(&mut device, &config, Some(&data)).unwrap();
        let info = textures.texture_info(handle).unwrap();
        assert_eq!((info.width, info.height), (512, 512));
        assert_eq!((info.mip_levels, info.requested_mips), (10, 11));
        let native = textures.native(handle).unwrap();
        assert!(native.level(0, 0).iter().all(|b| *b == 1));
        assert!(native.level(0, 9).iter().all(|b| *b == 10));
    }

    #[test]
    fn cubemap_has_six_faces() {
        let (mut device, mut textures) = manager();
        let config = TextureConfig {
            flags: TextureFlags::CUBEMAP | TextureFlags::RENDER_TARGET,
            ..TextureConfig::new("env", 64, 64, FormatTag::Rgba16Float)
        };
        let handle = textures.create_texture(&mut device, &config, None).unwrap();
        assert_eq!(textures.texture_info(handle).unwrap().array_layers, 6);
        //one cube view plus six face targets
        assert_eq!(device.stats().views_created, 7);
        let cube = textures.shader_view(handle).unwrap();
        assert_eq!(cube.descriptor().kind, ViewKind::ShaderCube);

        textures
            .set_render_target(&mut device, Some(handle), DepthTarget::None, Some(3))
            .unwrap();
        let face = textures.target_view(handle, 3).unwrap().id();
        assert_eq!(device.bound_color(), Some(crate::imp::headless::BoundColor::View(face)));
    }

    #[test]
    fn generated_mips_from_level_zero() {
        let (mut device, mut textures) = manager();
        let config = TextureConfig {
            flags: TextureFlags::GEN_MIPMAPS,
            mip_levels: 0,
            ..TextureConfig::new("gen", 4, 4, FormatTag::R8Unorm)
        };
        let handle = textures.create_texture(&mut device, &config, Some(&[40u8; 16])).unwrap();
        let native = textures.native(handle).unwrap();
        assert_eq!(native.mip_levels(), 3);
        assert_eq!(native.level(0, 2), vec![40]);
    }

    #[test]
    fn typed_pixels() {
        use crate::pixel_formats::{RGBA8UnormSRGB, Unorm4};
        let (mut device, mut textures) = manager();
        let config = TextureConfig {
            flags: TextureFlags::GEN_MIPMAPS,
            mip_levels: 2,
            ..TextureConfig::new("typed", 2, 2, FormatTag::Rgba8Unorm)
        };
        let px = [Unorm4 { r: 200, g: 100, b: 0, a: 255 }; 4];
        let handle = textures
            .create_texture_from_pixels::<RGBA8UnormSRGB>(&mut device, &config, &px)
            .unwrap();
        let info = textures.texture_info(handle).unwrap();
        assert!(info.format.color_space == crate::pixel_formats::ColorSpace::Srgb);
        assert_eq!(textures.native(handle).unwrap().level(0, 1), vec![200, 100, 0, 255]);
    }

    #[test]
    fn typed_pixels_share_the_box_filter() {
        use crate::pixel_formats::R8UNorm;
        let (mut device, mut textures) = manager();
        let config = TextureConfig {
            flags: TextureFlags::GEN_MIPMAPS,
            mip_levels: 0,
            ..TextureConfig::new("r8", 2, 2, FormatTag::R8Unorm)
        };
        let handle = textures
            .create_texture_from_pixels::<R8UNorm>(&mut device, &config, &[0, 100, 200, 100])
            .unwrap();
        let native = textures.native(handle).unwrap();
        assert_eq!(native.mip_levels(), 2);
        assert_eq!(native.level(0, 1), vec![100]);
    }

    #[test]
    #[should_panic(expected = "only level 0 was supplied")]
    fn typed_pixels_without_generation_take_one_level() {
        use crate::pixel_formats::R8UNorm;
        let (mut device, mut textures) = manager();
        let config = TextureConfig {
            mip_levels: 2,
            ..TextureConfig::new("r8", 2, 2, FormatTag::R8Unorm)
        };
        let _ = textures.create_texture_from_pixels::<R8UNorm>(&mut device, &config, &[0; 4]);
    }

    #[test]
    fn destroy_releases_views_before_images() {
        let (mut device, mut textures) = manager();
        let config = TextureConfig {
            flags: TextureFlags::RENDER_TARGET,
            ..TextureConfig::new("rt", 8, 8, FormatTag::Rgba8Unorm)
        };
        let handle = textures.create_texture(&mut device, &config, None).unwrap();
        let texture_id = textures.native(handle).unwrap().id();
        textures.destroy_texture(handle).unwrap();
        let log = device.release_log();
        assert_eq!(log.last(), Some(&Released::Texture(texture_id)));
        assert_eq!(log.iter().filter(|r| matches!(r, Released::View(_))).count(), 2);
        assert_eq!(textures.texture_info(handle), Err(Error::StaleHandle("texture")));
        assert_eq!(textures.destroy_texture(handle), Err(Error::StaleHandle("texture")));
    }

    #[test]
    fn depth_without_sampling_has_no_shader_view() {
        let (mut device, mut textures) = manager();
        let handle = textures
            .get_depth_buffer(&mut device, 32, 32, 1, FormatTag::Depth24Stencil8)
            .unwrap();
        assert!(matches!(textures.shader_view(handle), Err(Error::Unsupported(_))));
        let sampled = TextureConfig {
            flags: TextureFlags::SAMPLE_DEPTH,
            ..TextureConfig::new("shadow", 32, 32, FormatTag::Depth32Float)
        };
        let shadow = textures.create_texture(&mut device, &sampled, None).unwrap();
        let view = textures.shader_view(shadow).unwrap();
        assert_eq!(view.descriptor().format, crate::pixel_formats::StorageFormat::R32Float);
    }

    #[test]
    fn readback_requires_staging() {
        let (mut device, mut textures) = manager();
        let plain = textures
            .create_texture(&mut device, &TextureConfig::new("p", 2, 1, FormatTag::R8Unorm), Some(&[1, 2]))
            .unwrap();
        assert!(matches!(textures.read_back(&mut device, plain), Err(Error::Unsupported(_))));
        let config = TextureConfig {
            flags: TextureFlags::STAGING,
            ..TextureConfig::new("s", 2, 1, FormatTag::R8Unorm)
        };
        let staged = textures.create_texture(&mut device, &config, Some(&[3, 4])).unwrap();
        assert_eq!(textures.read_back(&mut device, staged).unwrap(), vec![3, 4]);
    }

    #[test]
    #[should_panic(expected = "source data")]
    fn short_source_stream_is_fatal() {
        let (mut device, mut textures) = manager();
        let config = TextureConfig {
            mip_levels: 2,
            ..TextureConfig::new("short", 8, 8, FormatTag::Bc7)
        };
        let _ = textures.create_texture(&mut device, &config, Some(&[0; 64]));
    }
}

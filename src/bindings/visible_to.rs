// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Texture usage declarations and the per-call texture configuration.
//!
//! Nothing here is persisted or read from the environment.  The engine describes each
//! texture with a [`TextureConfig`] at creation time and the managers derive everything
//! else from it.
//!
//! # Examples
//!
//! ```
//! use textures_and_uniforms::bindings::visible_to::{TextureConfig, TextureFlags};
//! use textures_and_uniforms::pixel_formats::FormatTag;
//!
//! let config = TextureConfig {
//!     flags: TextureFlags::SRGB | TextureFlags::GEN_MIPMAPS,
//!     mip_levels: 0,
//!     ..TextureConfig::new("diffuse", 256, 256, FormatTag::Rgba8Unorm)
//! };
//! assert!(config.wants_generated_mips());
//! ```

use crate::mip_chain::MipClamp;
use crate::pixel_formats::FormatTag;

bitflags::bitflags! {
    /// How a texture will be used.
    ///
    /// The bits sit above the low byte so they can be or-ed with a [`FormatTag`] code into
    /// the single value accepted by
    /// [`FormatResolver::resolve_raw`](crate::pixel_formats::FormatResolver::resolve_raw).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureFlags: u32 {
        /// Store color in sRGB encoding, where the format has an sRGB twin.
        const SRGB = 1 << 8;
        /// The texture is drawn into.
        const RENDER_TARGET = 1 << 9;
        /// A depth texture that shaders will also read.
        const SAMPLE_DEPTH = 1 << 10;
        /// Build the mip chain from level 0: on the CPU at creation for uploaded data, and
        /// on the GPU at commit for render targets.
        const GEN_MIPMAPS = 1 << 11;
        /// Six layers with a cube shader view and one render view per face.
        const CUBEMAP = 1 << 12;
        /// Allocate a CPU-readable staging copy for [`read_back`](crate::bindings::texture::TextureManager::read_back).
        const STAGING = 1 << 13;
    }
}

/// Creation parameters for a texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureConfig<'a> {
    pub debug_name: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: FormatTag,
    pub flags: TextureFlags,
    /// Levels present in the source data, or to allocate.  `0` means the full chain.
    pub mip_levels: u32,
    /// Drop leading levels that exceed this size.
    pub mip_clamp: MipClamp,
    pub sample_count: u32,
}

impl<'a> TextureConfig<'a> {
    /// A single-level, single-sampled, unclamped texture.
    pub fn new(debug_name: &'a str, width: u32, height: u32, format: FormatTag) -> Self {
        TextureConfig {
            debug_name,
            width,
            height,
            format,
            flags: TextureFlags::empty(),
            mip_levels: 1,
            mip_clamp: MipClamp::Disabled,
            sample_count: 1,
        }
    }

    pub fn is_cubemap(&self) -> bool {
        self.flags.contains(TextureFlags::CUBEMAP)
    }

    pub fn is_render_target(&self) -> bool {
        self.flags.contains(TextureFlags::RENDER_TARGET)
    }

    pub fn wants_generated_mips(&self) -> bool {
        self.flags.contains(TextureFlags::GEN_MIPMAPS)
    }

    pub fn array_layers(&self) -> u32 {
        if self.is_cubemap() { 6 } else { 1 }
    }
}

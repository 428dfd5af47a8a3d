// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Format resolution for GPU textures.
//!
//! Callers describe a texture with an abstract [`FormatTag`] (what kind of data) plus
//! [`TextureFlags`] (how it will be used).  The [`FormatResolver`] turns that into a
//! [`FormatDescriptor`]: the concrete [`StorageFormat`] to allocate, the format shader
//! views are created with, and the sRGB twin, if one exists.
//!
//! # Rules
//!
//! - Block-compressed tags pick their sRGB twin only when [`TextureFlags::SRGB`] is set and
//!   a twin exists.  BC6H has no twin and ignores the flag, as do the float formats.
//! - Depth tags allocate a *typeless* storage format when [`TextureFlags::SAMPLE_DEPTH`] is
//!   set, so a shader can read the depth buffer through a derived view format.  Otherwise
//!   they allocate the natural depth format.
//! - Anything else (sRGB depth, shader-readable color, unknown raw codes) is a calling
//!   contract violation and panics.  A wrong format silently corrupts rendering, so there is
//!   no fallback.
//!
//! # Examples
//!
//! ```
//! use textures_and_uniforms::pixel_formats::{FormatResolver, FormatTag, StorageFormat};
//! use textures_and_uniforms::bindings::visible_to::TextureFlags;
//!
//! let resolver = FormatResolver::new();
//! let bc1 = resolver.resolve(FormatTag::Bc1, TextureFlags::SRGB);
//! assert_eq!(bc1.storage, StorageFormat::Bc1UnormSrgb);
//! assert_eq!(bc1.bytes_per_unit, 8);
//!
//! let depth = resolver.resolve(FormatTag::Depth32Float, TextureFlags::SAMPLE_DEPTH);
//! assert_eq!(depth.storage, StorageFormat::Depth32Typeless);
//! assert_eq!(depth.shader_view, StorageFormat::R32Float);
//! ```

mod typed;

pub use typed::*;

use crate::bindings::visible_to::TextureFlags;

/// Abstract format requested by the engine.
///
/// The discriminant is the raw code accepted by [`FormatResolver::resolve_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FormatTag {
    R8Unorm = 1,
    Rgba8Unorm = 2,
    Bgra8Unorm = 3,
    R16Float = 4,
    Rgba16Float = 5,
    R32Float = 6,
    Rg32Float = 7,
    Rgba32Float = 8,
    Bc1 = 0x10,
    Bc2 = 0x11,
    Bc3 = 0x12,
    Bc6hSigned = 0x13,
    Bc6hUnsigned = 0x14,
    Bc7 = 0x15,
    Depth32Float = 0x20,
    Depth24Stencil8 = 0x21,
    Depth16 = 0x22,
    Depth32FloatStencil8 = 0x23,
}

impl FormatTag {
    pub const ALL: [FormatTag; 18] = [
        FormatTag::R8Unorm,
        FormatTag::Rgba8Unorm,
        FormatTag::Bgra8Unorm,
        FormatTag::R16Float,
        FormatTag::Rgba16Float,
        FormatTag::R32Float,
        FormatTag::Rg32Float,
        FormatTag::Rgba32Float,
        FormatTag::Bc1,
        FormatTag::Bc2,
        FormatTag::Bc3,
        FormatTag::Bc6hSigned,
        FormatTag::Bc6hUnsigned,
        FormatTag::Bc7,
        FormatTag::Depth32Float,
        FormatTag::Depth24Stencil8,
        FormatTag::Depth16,
        FormatTag::Depth32FloatStencil8,
    ];

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<FormatTag> {
        FormatTag::ALL.into_iter().find(|tag| tag.code() == code)
    }

    pub const fn is_depth(self) -> bool {
        matches!(
            self,
            FormatTag::Depth32Float
                | FormatTag::Depth24Stencil8
                | FormatTag::Depth16
                | FormatTag::Depth32FloatStencil8
        )
    }

    fn index(self) -> usize {
        FormatTag::ALL
            .iter()
            .position(|t| *t == self)
            .expect("every tag is listed in ALL")
    }
}

/// Concrete format of a GPU allocation or view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageFormat {
    R8Unorm,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    R16Float,
    Rgba16Float,
    R32Float,
    Rg32Float,
    Rgba32Float,
    Bc1Unorm,
    Bc1UnormSrgb,
    Bc2Unorm,
    Bc2UnormSrgb,
    Bc3Unorm,
    Bc3UnormSrgb,
    Bc6hSfloat,
    Bc6hUfloat,
    Bc7Unorm,
    Bc7UnormSrgb,
    Depth32Float,
    Depth24Stencil8,
    Depth16Unorm,
    Depth32FloatStencil8,
    /// Typeless storage for a shader-readable 32-bit float depth buffer.
    Depth32Typeless,
    /// Typeless storage for a shader-readable 24-bit depth + 8-bit stencil buffer.
    Depth24Stencil8Typeless,
    /// Typeless storage for a shader-readable 16-bit depth buffer.
    Depth16Typeless,
    /// Typeless storage for a shader-readable 32-bit float depth + 8-bit stencil buffer.
    Depth32Stencil8Typeless,
    /// Shader view of the depth plane of [`StorageFormat::Depth24Stencil8Typeless`].
    R24UnormX8,
    /// Shader view of [`StorageFormat::Depth16Typeless`].
    R16Unorm,
    /// Shader view of the depth plane of [`StorageFormat::Depth32Stencil8Typeless`].
    R32FloatX8X24,
}

/// Size of the unit a format is addressed in: one pixel, or one compressed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockInfo {
    /// Bytes per pixel (uncompressed) or per block (compressed).
    pub bytes: u32,
    /// Edge length of a block in pixels; 1 for uncompressed formats.
    pub dimension: u32,
}

/// Channel layout of an uncompressed color format, used for CPU mip generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Unorm8,
    Float16,
    Float32,
}

impl StorageFormat {
    pub const fn block_info(self) -> BlockInfo {
        use StorageFormat::*;
        let (bytes, dimension) = match self {
            R8Unorm => (1, 1),
            R16Float | Depth16Unorm | Depth16Typeless | R16Unorm => (2, 1),
            Rgba8Unorm | Rgba8UnormSrgb | Bgra8Unorm | Bgra8UnormSrgb | R32Float => (4, 1),
            Depth32Float | Depth24Stencil8 | Depth32Typeless | Depth24Stencil8Typeless
            | R24UnormX8 => (4, 1),
            Rgba16Float | Rg32Float => (8, 1),
            Depth32FloatStencil8 | Depth32Stencil8Typeless | R32FloatX8X24 => (8, 1),
            Rgba32Float => (16, 1),
            Bc1Unorm | Bc1UnormSrgb => (8, 4),
            Bc2Unorm | Bc2UnormSrgb | Bc3Unorm | Bc3UnormSrgb | Bc6hSfloat | Bc6hUfloat
            | Bc7Unorm | Bc7UnormSrgb => (16, 4),
        };
        BlockInfo { bytes, dimension }
    }

    pub const fn is_compressed(self) -> bool {
        self.block_info().dimension > 1
    }

    /// Depth-capable storage, natural or typeless.
    pub const fn is_depth(self) -> bool {
        use StorageFormat::*;
        matches!(
            self,
            Depth32Float
                | Depth24Stencil8
                | Depth16Unorm
                | Depth32FloatStencil8
                | Depth32Typeless
                | Depth24Stencil8Typeless
                | Depth16Typeless
                | Depth32Stencil8Typeless
        )
    }

    pub const fn has_stencil(self) -> bool {
        use StorageFormat::*;
        matches!(
            self,
            Depth24Stencil8 | Depth32FloatStencil8 | Depth24Stencil8Typeless | Depth32Stencil8Typeless
        )
    }

    pub const fn is_typeless(self) -> bool {
        use StorageFormat::*;
        matches!(
            self,
            Depth32Typeless | Depth24Stencil8Typeless | Depth16Typeless | Depth32Stencil8Typeless
        )
    }

    pub const fn is_float(self) -> bool {
        use StorageFormat::*;
        matches!(
            self,
            R16Float | Rgba16Float | R32Float | Rg32Float | Rgba32Float | Bc6hSfloat | Bc6hUfloat
        )
    }

    pub const fn is_srgb(self) -> bool {
        use StorageFormat::*;
        matches!(
            self,
            Rgba8UnormSrgb | Bgra8UnormSrgb | Bc1UnormSrgb | Bc2UnormSrgb | Bc3UnormSrgb | Bc7UnormSrgb
        )
    }

    /// The natural (typed) depth format behind a typeless depth storage format.
    ///
    /// Depth-stencil views of a typeless allocation are created with this format.
    pub const fn depth_write_format(self) -> StorageFormat {
        use StorageFormat::*;
        match self {
            Depth32Typeless => Depth32Float,
            Depth24Stencil8Typeless => Depth24Stencil8,
            Depth16Typeless => Depth16Unorm,
            Depth32Stencil8Typeless => Depth32FloatStencil8,
            other => other,
        }
    }

    /// Shader-view format derived from a typeless depth storage format.
    ///
    /// # Panics
    /// Panics when `self` is not typeless depth storage.
    pub const fn depth_shader_view(self) -> StorageFormat {
        use StorageFormat::*;
        match self {
            Depth32Typeless => R32Float,
            Depth24Stencil8Typeless => R24UnormX8,
            Depth16Typeless => R16Unorm,
            Depth32Stencil8Typeless => R32FloatX8X24,
            _ => panic!("no shader view for non-typeless storage"),
        }
    }

    /// Channel layout for CPU-side filtering, or `None` when the format can't be filtered
    /// byte-wise (compressed and depth formats).
    pub const fn channels(self) -> Option<(ChannelKind, u32)> {
        use StorageFormat::*;
        match self {
            R8Unorm => Some((ChannelKind::Unorm8, 1)),
            Rgba8Unorm | Rgba8UnormSrgb | Bgra8Unorm | Bgra8UnormSrgb => {
                Some((ChannelKind::Unorm8, 4))
            }
            R16Float => Some((ChannelKind::Float16, 1)),
            Rgba16Float => Some((ChannelKind::Float16, 4)),
            R32Float => Some((ChannelKind::Float32, 1)),
            Rg32Float => Some((ChannelKind::Float32, 2)),
            Rgba32Float => Some((ChannelKind::Float32, 4)),
            _ => None,
        }
    }
}

/// Whether sampled values go through the sRGB transfer function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    Linear,
    Srgb,
}

/// Everything the rest of the layer needs to know about a resolved format.
///
/// Immutable once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatDescriptor {
    pub tag: FormatTag,
    pub color_space: ColorSpace,
    /// Format of the allocation.
    pub storage: StorageFormat,
    /// Format shader-visible views are created with.
    pub shader_view: StorageFormat,
    /// The sRGB counterpart of the linear storage format, if the format family has one.
    pub srgb_twin: Option<StorageFormat>,
    /// Bytes per pixel for uncompressed formats, bytes per 4×4 block for compressed ones.
    pub bytes_per_unit: u32,
    pub block_dimension: u32,
    pub is_compressed: bool,
    /// Float channels (including BC6H), which have no sRGB encoding.
    pub is_float: bool,
    pub is_depth: bool,
    pub has_stencil: bool,
}

impl FormatDescriptor {
    pub const fn block_info(&self) -> BlockInfo {
        BlockInfo {
            bytes: self.bytes_per_unit,
            dimension: self.block_dimension,
        }
    }

    /// Format used for render-target or depth-stencil views.
    pub const fn target_view(&self) -> StorageFormat {
        self.storage.depth_write_format()
    }
}

#[derive(Debug, Clone, Copy)]
struct FormatRow {
    linear: StorageFormat,
    srgb: Option<StorageFormat>,
    typeless: Option<StorageFormat>,
}

/**
Resolves abstract formats into [`FormatDescriptor`]s.

The resolver owns the format tables.  Build it once and pass it to whatever needs it;
resolution is a pure function of `(tag, flags)`.
*/
#[derive(Debug, Clone)]
pub struct FormatResolver {
    rows: [FormatRow; FormatTag::ALL.len()],
}

impl Default for FormatResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatResolver {
    pub fn new() -> Self {
        use StorageFormat as S;
        let row = |linear, srgb, typeless| FormatRow {
            linear,
            srgb,
            typeless,
        };
        let rows = FormatTag::ALL.map(|tag| match tag {
            FormatTag::R8Unorm => row(S::R8Unorm, None, None),
            FormatTag::Rgba8Unorm => row(S::Rgba8Unorm, Some(S::Rgba8UnormSrgb), None),
            FormatTag::Bgra8Unorm => row(S::Bgra8Unorm, Some(S::Bgra8UnormSrgb), None),
            FormatTag::R16Float => row(S::R16Float, None, None),
            FormatTag::Rgba16Float => row(S::Rgba16Float, None, None),
            FormatTag::R32Float => row(S::R32Float, None, None),
            FormatTag::Rg32Float => row(S::Rg32Float, None, None),
            FormatTag::Rgba32Float => row(S::Rgba32Float, None, None),
            FormatTag::Bc1 => row(S::Bc1Unorm, Some(S::Bc1UnormSrgb), None),
            FormatTag::Bc2 => row(S::Bc2Unorm, Some(S::Bc2UnormSrgb), None),
            FormatTag::Bc3 => row(S::Bc3Unorm, Some(S::Bc3UnormSrgb), None),
            FormatTag::Bc6hSigned => row(S::Bc6hSfloat, None, None),
            FormatTag::Bc6hUnsigned => row(S::Bc6hUfloat, None, None),
            FormatTag::Bc7 => row(S::Bc7Unorm, Some(S::Bc7UnormSrgb), None),
            FormatTag::Depth32Float => row(S::Depth32Float, None, Some(S::Depth32Typeless)),
            FormatTag::Depth24Stencil8 => {
                row(S::Depth24Stencil8, None, Some(S::Depth24Stencil8Typeless))
            }
            FormatTag::Depth16 => row(S::Depth16Unorm, None, Some(S::Depth16Typeless)),
            FormatTag::Depth32FloatStencil8 => row(
                S::Depth32FloatStencil8,
                None,
                Some(S::Depth32Stencil8Typeless),
            ),
        });
        Self { rows }
    }

    /// Resolves `tag` under `flags`.  Only [`TextureFlags::SRGB`] and
    /// [`TextureFlags::SAMPLE_DEPTH`] influence the result.
    ///
    /// # Panics
    /// Panics on contradictory requests: sRGB depth, or shader-readable depth on a color tag.
    pub fn resolve(&self, tag: FormatTag, flags: TextureFlags) -> FormatDescriptor {
        let row = self.rows[tag.index()];
        let srgb = flags.contains(TextureFlags::SRGB);
        let sample_depth = flags.contains(TextureFlags::SAMPLE_DEPTH);

        let (storage, shader_view) = if tag.is_depth() {
            assert!(!srgb, "depth format {tag:?} has no sRGB encoding");
            if sample_depth {
                let typeless = row.typeless.expect("depth rows carry a typeless format");
                (typeless, typeless.depth_shader_view())
            } else {
                (row.linear, row.linear)
            }
        } else {
            assert!(
                !sample_depth,
                "shader-readable depth requested for color format {tag:?}"
            );
            let storage = match (srgb, row.srgb) {
                (true, Some(twin)) => twin,
                _ => row.linear,
            };
            (storage, storage)
        };

        let block = storage.block_info();
        FormatDescriptor {
            tag,
            color_space: if storage.is_srgb() {
                ColorSpace::Srgb
            } else {
                ColorSpace::Linear
            },
            storage,
            shader_view,
            srgb_twin: row.srgb,
            bytes_per_unit: block.bytes,
            block_dimension: block.dimension,
            is_compressed: block.dimension > 1,
            is_float: storage.is_float(),
            is_depth: storage.is_depth(),
            has_stencil: storage.has_stencil(),
        }
    }

    /// Resolves a raw `code | flags` value: the low byte is a [`FormatTag`] code, the rest
    /// are [`TextureFlags`] bits.
    ///
    /// # Panics
    /// Panics on an unknown tag code or unknown flag bits.
    pub fn resolve_raw(&self, raw: u32) -> FormatDescriptor {
        let code = (raw & 0xff) as u8;
        let tag = FormatTag::from_code(code)
            .unwrap_or_else(|| panic!("unknown format code {code:#x}"));
        let flags = TextureFlags::from_bits(raw & !0xff)
            .unwrap_or_else(|| panic!("unknown texture flag bits in {raw:#x}"));
        self.resolve(tag, flags)
    }
}

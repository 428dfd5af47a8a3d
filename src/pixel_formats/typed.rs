// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Compile-time pixel formats.
//!
//! Each uncompressed [`FormatTag`] has a zero-sized marker type whose `CPixel` is the exact
//! memory layout of one pixel.  Code that builds pixel data on the CPU uses these to get a
//! typecheck on what it writes; [`crate::bindings::texture::TextureManager::create_texture_from_pixels`]
//! takes them directly.
//!
//! ```
//! use textures_and_uniforms::pixel_formats::{BGRA8UnormPixelSRGB, Float4};
//!
//! let linear_color = Float4 { r: 0.5, g: 0.0, b: 0.0, a: 1.0 };
//! let srgb_pixel: BGRA8UnormPixelSRGB = linear_color.into();
//! assert_eq!(srgb_pixel.r, 188);
//! ```

use super::FormatTag;
use bytemuck::{Pod, Zeroable};

pub use half::f16;

pub(crate) mod sealed {
    use std::fmt::Debug;

    /// Sealed pixel format marker.
    pub trait PixelFormat: Debug + Send + Sync + 'static {
        /// The abstract format this marker allocates.
        const TAG: super::FormatTag;
        /// Whether the marker requests the sRGB twin of `TAG`.
        const SRGB: bool;
        type CPixel: Copy + Debug + bytemuck::Pod;
    }
}

pub use sealed::PixelFormat;

/// 8-bit normalized format with a single red channel.
#[derive(Debug, Clone)]
pub struct R8UNorm;
impl PixelFormat for R8UNorm {
    const TAG: FormatTag = FormatTag::R8Unorm;
    const SRGB: bool = false;
    type CPixel = u8;
}

/// Two-channel 32-bit floating point format.
#[derive(Debug, Clone)]
pub struct RGFloat;
impl PixelFormat for RGFloat {
    const TAG: FormatTag = FormatTag::Rg32Float;
    const SRGB: bool = false;
    type CPixel = RGFloatPixel;
}

/// Pixel type for [`RGFloat`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct RGFloatPixel {
    pub r: f32,
    pub g: f32,
}

/// 32-bit float format with a single red channel.
#[derive(Debug, Clone)]
pub struct R32Float;
impl PixelFormat for R32Float {
    const TAG: FormatTag = FormatTag::R32Float;
    const SRGB: bool = false;
    type CPixel = f32;
}

/// 16-bit half-precision float format with a single red channel.
#[derive(Debug, Clone)]
pub struct R16Float;
impl PixelFormat for R16Float {
    const TAG: FormatTag = FormatTag::R16Float;
    const SRGB: bool = false;
    type CPixel = f16;
}

/// Four-channel half-precision float format, the usual HDR render target.
#[derive(Debug, Clone)]
pub struct RGBA16Float;
impl PixelFormat for RGBA16Float {
    const TAG: FormatTag = FormatTag::Rgba16Float;
    const SRGB: bool = false;
    type CPixel = Half4;
}

/// Pixel type for [`RGBA16Float`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Half4 {
    pub r: f16,
    pub g: f16,
    pub b: f16,
    pub a: f16,
}

impl From<Float4> for Half4 {
    fn from(f: Float4) -> Self {
        Half4 {
            r: f16::from_f32(f.r),
            g: f16::from_f32(f.g),
            b: f16::from_f32(f.b),
            a: f16::from_f32(f.a),
        }
    }
}

/// RGBA pixel with 8-bit normalized channels.
///
/// ```
/// use textures_and_uniforms::pixel_formats::{Unorm4, Float4};
///
/// let float_color = Float4 { r: 1.0, g: 0.5, b: 0.0, a: 1.0 };
/// let unorm_color = Unorm4::from_floats(float_color);
/// assert_eq!(unorm_color.g, 128);
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Unorm4 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}
impl Unorm4 {
    /// Converts normalized floats to 8-bit values, clamping and rounding.
    pub fn from_floats(float4: Float4) -> Self {
        Unorm4 {
            r: (float4.r * 255.0).round().clamp(0.0, 255.0) as u8,
            g: (float4.g * 255.0).round().clamp(0.0, 255.0) as u8,
            b: (float4.b * 255.0).round().clamp(0.0, 255.0) as u8,
            a: (float4.a * 255.0).round().clamp(0.0, 255.0) as u8,
        }
    }
}

/// 8-bit normalized RGBA format, linear.
#[derive(Debug, Clone)]
pub struct RGBA8UNorm;
impl PixelFormat for RGBA8UNorm {
    const TAG: FormatTag = FormatTag::Rgba8Unorm;
    const SRGB: bool = false;
    type CPixel = Unorm4;
}

/// 8-bit normalized RGBA format with sRGB encoding.
#[derive(Debug, Clone)]
pub struct RGBA8UnormSRGB;
impl PixelFormat for RGBA8UnormSRGB {
    const TAG: FormatTag = FormatTag::Rgba8Unorm;
    const SRGB: bool = true;
    type CPixel = Unorm4;
}

/// BGRA channel order with sRGB encoding; the usual swapchain format.
#[derive(Debug, Copy, Clone)]
pub struct BGRA8UNormSRGB;
impl PixelFormat for BGRA8UNormSRGB {
    const TAG: FormatTag = FormatTag::Bgra8Unorm;
    const SRGB: bool = true;
    type CPixel = BGRA8UnormPixelSRGB;
}

/// Pixel type for [`BGRA8UNormSRGB`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct BGRA8UnormPixelSRGB {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub a: u8,
}
fn linear_to_srgb(c: f32) -> f32 {
    if c < 0.0031308 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn srgb_to_linear(s: f32) -> f32 {
    if s <= 0.04045 {
        s / 12.92
    } else {
        ((s + 0.055) / 1.055).powf(2.4)
    }
}

impl From<Float4> for BGRA8UnormPixelSRGB {
    /// Applies the sRGB transfer function; alpha stays linear.
    fn from(color: Float4) -> Self {
        Self {
            b: (linear_to_srgb(color.b) * 255.0).round() as u8,
            g: (linear_to_srgb(color.g) * 255.0).round() as u8,
            r: (linear_to_srgb(color.r) * 255.0).round() as u8,
            a: (color.a * 255.0).round() as u8,
        }
    }
}

/// Four-channel linear float color.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Float4 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl From<BGRA8UnormPixelSRGB> for Float4 {
    fn from(c: BGRA8UnormPixelSRGB) -> Self {
        Self {
            r: srgb_to_linear(c.r as f32 / 255.0),
            g: srgb_to_linear(c.g as f32 / 255.0),
            b: srgb_to_linear(c.b as f32 / 255.0),
            a: c.a as f32 / 255.0,
        }
    }
}

/// 32-bit float RGBA.
#[derive(Debug, Clone)]
pub struct RGBA32Float;
impl PixelFormat for RGBA32Float {
    const TAG: FormatTag = FormatTag::Rgba32Float;
    const SRGB: bool = false;
    type CPixel = Float4;
}

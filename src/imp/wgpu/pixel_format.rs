// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::imp::TextureUsages;
use crate::pixel_formats::StorageFormat;

/// The wgpu format an allocation or view of `format` uses.
///
/// wgpu has no typeless formats: typeless depth storage, and the shader views of it,
/// become the matching depth format.  Shader views select the depth aspect instead.
pub(super) const fn wgpu_format(format: StorageFormat) -> wgpu::TextureFormat {
    use StorageFormat::*;
    use wgpu::TextureFormat as W;
    match format {
        R8Unorm => W::R8Unorm,
        Rgba8Unorm => W::Rgba8Unorm,
        Rgba8UnormSrgb => W::Rgba8UnormSrgb,
        Bgra8Unorm => W::Bgra8Unorm,
        Bgra8UnormSrgb => W::Bgra8UnormSrgb,
        R16Float => W::R16Float,
        Rgba16Float => W::Rgba16Float,
        R32Float => W::R32Float,
        Rg32Float => W::Rg32Float,
        Rgba32Float => W::Rgba32Float,
        Bc1Unorm => W::Bc1RgbaUnorm,
        Bc1UnormSrgb => W::Bc1RgbaUnormSrgb,
        Bc2Unorm => W::Bc2RgbaUnorm,
        Bc2UnormSrgb => W::Bc2RgbaUnormSrgb,
        Bc3Unorm => W::Bc3RgbaUnorm,
        Bc3UnormSrgb => W::Bc3RgbaUnormSrgb,
        Bc6hSfloat => W::Bc6hRgbFloat,
        Bc6hUfloat => W::Bc6hRgbUfloat,
        Bc7Unorm => W::Bc7RgbaUnorm,
        Bc7UnormSrgb => W::Bc7RgbaUnormSrgb,
        Depth32Float | Depth32Typeless => W::Depth32Float,
        Depth24Stencil8 | Depth24Stencil8Typeless | R24UnormX8 => W::Depth24PlusStencil8,
        Depth16Unorm | Depth16Typeless | R16Unorm => W::Depth16Unorm,
        Depth32FloatStencil8 | Depth32Stencil8Typeless | R32FloatX8X24 => {
            W::Depth32FloatStencil8
        }
    }
}

pub(super) fn wgpu_usage(format: StorageFormat, usage: TextureUsages) -> wgpu::TextureUsages {
    let mut out = wgpu::TextureUsages::empty();
    if usage.contains(TextureUsages::SHADER_READ) {
        out |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if usage.intersects(TextureUsages::RENDER_TARGET | TextureUsages::DEPTH_STENCIL) {
        out |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    if usage.contains(TextureUsages::COPY_SRC) {
        out |= wgpu::TextureUsages::COPY_SRC;
    }
    //depth is never uploaded
    if usage.contains(TextureUsages::COPY_DST) && !format.is_depth() {
        out |= wgpu::TextureUsages::COPY_DST;
    }
    out
}

/// Formats a texture of `format` may additionally be viewed as.
pub(super) fn view_formats(format: wgpu::TextureFormat) -> Vec<wgpu::TextureFormat> {
    let twin = if format.is_srgb() {
        format.remove_srgb_suffix()
    } else {
        format.add_srgb_suffix()
    };
    if twin == format { Vec::new() } else { vec![twin] }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typeless_depth_maps_to_depth() {
        assert_eq!(
            wgpu_format(StorageFormat::Depth24Stencil8Typeless),
            wgpu::TextureFormat::Depth24PlusStencil8
        );
        assert_eq!(
            wgpu_format(StorageFormat::R16Unorm),
            wgpu::TextureFormat::Depth16Unorm
        );
        let usage = wgpu_usage(
            StorageFormat::Depth32Typeless,
            TextureUsages::SHADER_READ | TextureUsages::DEPTH_STENCIL | TextureUsages::COPY_DST,
        );
        assert_eq!(
            usage,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT
        );
    }

    #[test]
    fn srgb_twins_are_view_formats() {
        assert_eq!(
            view_formats(wgpu::TextureFormat::Rgba8Unorm),
            vec![wgpu::TextureFormat::Rgba8UnormSrgb]
        );
        assert_eq!(
            view_formats(wgpu::TextureFormat::Bc1RgbaUnormSrgb),
            vec![wgpu::TextureFormat::Bc1RgbaUnorm]
        );
        assert!(view_formats(wgpu::TextureFormat::R32Float).is_empty());
    }
}

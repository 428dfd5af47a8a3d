// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! GPU mip regeneration: each level is drawn from the one above with a 2x2 box filter.

use super::texture::Texture;
use crate::Error;
use std::collections::HashMap;

const BLIT_SHADER: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    return vec4<f32>(uv * vec2<f32>(2.0, -2.0) + vec2<f32>(-1.0, 1.0), 0.0, 1.0);
}

@group(0) @binding(0) var source: texture_2d<f32>;

@fragment
fn fs_main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let last = vec2<i32>(textureDimensions(source)) - vec2<i32>(1, 1);
    let near = min(vec2<i32>(position.xy) * 2, last);
    let far = min(near + vec2<i32>(1, 1), last);
    let sum = textureLoad(source, near, 0)
        + textureLoad(source, vec2<i32>(far.x, near.y), 0)
        + textureLoad(source, vec2<i32>(near.x, far.y), 0)
        + textureLoad(source, far, 0);
    return sum * 0.25;
}
"#;

/// Blit pipelines, one per target format.
#[derive(Debug, Default)]
pub(super) struct MipBlitter {
    shared: Option<(wgpu::ShaderModule, wgpu::BindGroupLayout, wgpu::PipelineLayout)>,
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

impl MipBlitter {
    fn pipeline(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
    ) -> (wgpu::RenderPipeline, wgpu::BindGroupLayout) {
        let (module, bind_group_layout, layout) = &*self.shared.get_or_insert_with(|| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("mip blit"),
                source: wgpu::ShaderSource::Wgsl(BLIT_SHADER.into()),
            });
            let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("mip blit"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                }],
            });
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("mip blit"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });
            (module, bind_group_layout, layout)
        });
        let pipeline = self.pipelines.entry(format).or_insert_with(|| {
            logwise::info_sync!(
                "building mip blit pipeline for {format}",
                format = logwise::privacy::LogIt(&format)
            );
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("mip blit"),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(format.into())],
                }),
                multiview: None,
                cache: None,
            })
        });
        (pipeline.clone(), bind_group_layout.clone())
    }

    /// Redraws levels 1.. of every layer of `texture` from level 0.
    pub(super) fn generate(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        texture: &Texture,
    ) -> Result<(), Error> {
        if texture.format.is_compressed() || texture.format.is_depth() {
            return Err(Error::Unsupported("GPU mip generation for this format"));
        }
        let native = &texture.texture;
        let format = native.format();
        let (pipeline, bind_group_layout) = self.pipeline(device, format);

        let level_view = |layer: u32, level: u32| {
            native.create_view(&wgpu::TextureViewDescriptor {
                label: Some("mip level"),
                dimension: Some(wgpu::TextureViewDimension::D2),
                base_mip_level: level,
                mip_level_count: Some(1),
                base_array_layer: layer,
                array_layer_count: Some(1),
                ..Default::default()
            })
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("mip generation"),
        });
        for layer in 0..native.depth_or_array_layers() {
            for level in 1..native.mip_level_count() {
                let source = level_view(layer, level - 1);
                let target = level_view(layer, level);
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("mip blit"),
                    layout: &bind_group_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&source),
                    }],
                });
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("mip blit"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &target,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_pipeline(&pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
        }
        queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

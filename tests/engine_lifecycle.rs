// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use textures_and_uniforms::bindings::buffer::{BufferKind, BufferUsage};
use textures_and_uniforms::bindings::texture::DepthTarget;
use textures_and_uniforms::bindings::uniforms::CompiledShader;
use textures_and_uniforms::bindings::visible_to::{TextureConfig, TextureFlags};
use textures_and_uniforms::headless::{HeadlessDevice, Released};
use textures_and_uniforms::images::Engine;
use textures_and_uniforms::images::render_state::{BlendMode, DepthMode};
use textures_and_uniforms::images::shader::{Shader, Stage, StageOps};
use textures_and_uniforms::pixel_formats::FormatTag;
use textures_and_uniforms::{Error, GpuFault};

const SHADER: &str = "
    struct Globals {
        tint: vec4<f32>,
        scale: f32,
    }
    @group(0) @binding(0) var<uniform> globals: Globals;
";

fn module() -> naga::Module {
    naga::front::wgsl::parse_str(SHADER).unwrap()
}

fn populate(engine: &mut Engine<HeadlessDevice>) {
    let config = TextureConfig {
        flags: TextureFlags::RENDER_TARGET,
        ..TextureConfig::new("scene", 64, 64, FormatTag::Rgba8Unorm)
    };
    let target = engine.create_texture(&config, None).unwrap();
    engine
        .set_render_target(Some(target), DepthTarget::Auto, None)
        .unwrap();
    let vertices = engine.create_buffer(BufferKind::Vertex);
    engine
        .upload_buffer(vertices, BufferUsage::READ_ONLY, Some(&[0; 48]), 48)
        .unwrap();
}

#[test]
fn teardown_releases_views_then_textures_then_buffers() {
    let mut engine = Engine::new(HeadlessDevice::new());
    populate(&mut engine);
    engine.teardown();

    let log = engine.device().release_log();
    let last_view = log
        .iter()
        .rposition(|r| matches!(r, Released::View(_)))
        .unwrap();
    let first_texture = log
        .iter()
        .position(|r| matches!(r, Released::Texture(_)))
        .unwrap();
    let last_texture = log
        .iter()
        .rposition(|r| matches!(r, Released::Texture(_)))
        .unwrap();
    let first_buffer = log
        .iter()
        .position(|r| matches!(r, Released::Buffer(_)))
        .unwrap();
    assert!(last_texture < first_buffer);
    //views of a texture go before that texture
    assert!(log[..first_texture].iter().any(|r| matches!(r, Released::View(_))));
    assert!(last_view < first_buffer);
    assert!(engine.textures().is_empty());
    assert!(engine.buffers().is_empty());
}

#[test]
fn device_loss_recovery() {
    let mut engine = Engine::new(HeadlessDevice::new());
    populate(&mut engine);
    engine.device_mut().remove_device(GpuFault::DeviceReset);

    let config = TextureConfig::new("after loss", 4, 4, FormatTag::R8Unorm);
    let err = engine.create_texture(&config, Some(&[0; 16])).unwrap_err();
    assert!(err.is_device_lost());

    let old = engine.recreate_device(HeadlessDevice::new());
    //everything from the old device went away before it was handed back
    assert!(old.release_log().iter().any(|r| matches!(r, Released::Buffer(_))));
    assert!(engine.textures().is_empty());

    engine.create_texture(&config, Some(&[0; 16])).unwrap();
    assert_eq!(engine.device().stats().textures_created, 1);
}

#[test]
fn render_state_is_reapplied_after_recreation() {
    let mut engine = Engine::new(HeadlessDevice::new());
    engine.set_blend_mode(BlendMode::Alpha);
    engine.set_blend_mode(BlendMode::Alpha);
    assert_eq!(engine.device().stats().raster_applies, 1);

    engine.recreate_device(HeadlessDevice::new());
    engine.set_blend_mode(BlendMode::Alpha);
    assert_eq!(engine.device().stats().raster_applies, 1);
    engine.set_depth_mode(DepthMode::DISABLED);
    let state = engine.device().raster_state().unwrap();
    assert_eq!(state.blend, BlendMode::Alpha);
    assert_eq!(state.depth, DepthMode::DISABLED);
}

#[test]
fn shader_prepare_binds_uniforms_to_its_stage() {
    let mut engine = Engine::new(HeadlessDevice::new());
    let module = module();
    let mut shader =
        Shader::new(engine.device(), Stage::Fragment, CompiledShader::Module(&module)).unwrap();
    assert_eq!(shader.stage(), Stage::Fragment);
    assert!(shader.set_uniform("scale", &[2.0]));
    assert!(!shader.set_uniform("missing", &[2.0]));
    shader.prepare(&mut engine).unwrap();

    let device = engine.device();
    assert_eq!(device.stats().buffers_created, 1);
    let bound = device.stage_uniforms(Stage::Fragment, 0).unwrap();
    assert!(device.stage_uniforms(Stage::Vertex, 0).is_none());

    //a second prepare reuses the buffer
    shader.prepare(&mut engine).unwrap();
    assert_eq!(engine.device().stats().buffers_created, 1);
    assert_eq!(engine.device().stage_uniforms(Stage::Fragment, 0), Some(bound));
}

#[test]
fn shader_survives_teardown() {
    let mut engine = Engine::new(HeadlessDevice::new());
    let module = module();
    let mut shader =
        Shader::new(engine.device(), Stage::Vertex, CompiledShader::Module(&module)).unwrap();
    shader.prepare(&mut engine).unwrap();
    engine.recreate_device(HeadlessDevice::new());
    shader.prepare(&mut engine).unwrap();
    assert!(engine.device().stage_uniforms(Stage::Vertex, 0).is_some());
    shader.release(&mut engine);
    assert!(engine.buffers().is_empty());
}

#[test]
fn shader_binds_textures_through_the_stage_table() {
    let mut engine = Engine::new(HeadlessDevice::new());
    let module = module();
    let shader =
        Shader::new(engine.device(), Stage::Compute, CompiledShader::Module(&module)).unwrap();
    let config = TextureConfig::new("albedo", 2, 2, FormatTag::Rgba8Unorm);
    let texture = engine.create_texture(&config, Some(&[255; 16])).unwrap();
    shader.bind_texture(&mut engine, 3, texture).unwrap();
    let view = engine.textures().shader_view(texture).unwrap().id();
    assert_eq!(engine.device().stage_texture(Stage::Compute, 3), Some(view));
}

#[test]
fn depth_without_sampling_cannot_be_bound() {
    let mut engine = Engine::new(HeadlessDevice::new());
    let module = module();
    let shader =
        Shader::new(engine.device(), Stage::Fragment, CompiledShader::Module(&module)).unwrap();
    let config = TextureConfig::new("depth", 32, 32, FormatTag::Depth32Float);
    let depth = engine.create_texture(&config, None).unwrap();
    assert!(matches!(
        shader.bind_texture(&mut engine, 0, depth),
        Err(Error::Unsupported(_))
    ));
}

#[test]
fn stage_ops_dispatch_by_stage() {
    let mut engine = Engine::new(HeadlessDevice::new());
    let buffer = engine.create_buffer(BufferKind::Uniform);
    engine
        .upload_buffer(buffer, BufferUsage::empty(), Some(&[0; 16]), 16)
        .unwrap();
    let parts = engine.parts_mut();
    let native = parts.buffers.native(buffer).unwrap().unwrap();
    for stage in [Stage::Vertex, Stage::Fragment, Stage::Geometry, Stage::Compute] {
        let ops = StageOps::for_stage(stage);
        assert_eq!(ops.stage(), stage);
        ops.set_uniforms(parts.device, 1, native).unwrap();
        assert_eq!(parts.device.stage_uniforms(stage, 1), Some(native.id()));
    }
}

// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Stage-tagged shader objects.

A [`Shader`] pairs a reflected [`UniformTable`] with a uniform buffer and a [`StageOps`]
table.  The table is picked once, from the stage, when the shader is created; binding
afterwards is a plain function-pointer call.
*/

use crate::Error;
use crate::bindings::buffer::{BufferHandle, BufferKind};
use crate::bindings::texture::TextureHandle;
use crate::bindings::uniforms::{CompiledShader, UniformTable};
use crate::images::engine::Engine;
use crate::imp::Device;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Vertex,
    Fragment,
    Geometry,
    Compute,
}

type SetUniforms<D> = fn(&mut D, u32, &<D as Device>::Buffer) -> Result<(), Error>;
type SetTexture<D> = fn(&mut D, u32, &<D as Device>::View) -> Result<(), Error>;

/// Per-stage binding functions.
pub struct StageOps<D: Device> {
    stage: Stage,
    set_uniforms: SetUniforms<D>,
    set_texture: SetTexture<D>,
}

impl<D: Device> Clone for StageOps<D> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<D: Device> Copy for StageOps<D> {}

impl<D: Device> std::fmt::Debug for StageOps<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageOps").field("stage", &self.stage).finish()
    }
}

impl<D: Device> StageOps<D> {
    pub fn for_stage(stage: Stage) -> Self {
        let (set_uniforms, set_texture): (SetUniforms<D>, SetTexture<D>) = match stage {
            Stage::Vertex => (D::set_vertex_uniforms, D::set_vertex_texture),
            Stage::Fragment => (D::set_fragment_uniforms, D::set_fragment_texture),
            Stage::Geometry => (D::set_geometry_uniforms, D::set_geometry_texture),
            Stage::Compute => (D::set_compute_uniforms, D::set_compute_texture),
        };
        StageOps {
            stage,
            set_uniforms,
            set_texture,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn set_uniforms(&self, device: &mut D, slot: u32, buffer: &D::Buffer) -> Result<(), Error> {
        (self.set_uniforms)(device, slot, buffer)
    }

    pub fn set_texture(&self, device: &mut D, slot: u32, view: &D::View) -> Result<(), Error> {
        (self.set_texture)(device, slot, view)
    }
}

#[derive(Debug)]
pub struct Shader<D: Device> {
    ops: StageOps<D>,
    uniforms: UniformTable,
    /// Created on the first [`Shader::prepare`] that has something to upload.
    buffer: Option<BufferHandle>,
}

impl<D: Device> Shader<D> {
    /// Reflects `compiled` for `stage`.
    ///
    /// Returns [`Error::Unsupported`] when the device has no such stage.
    pub fn new(device: &D, stage: Stage, compiled: CompiledShader<'_>) -> Result<Self, Error> {
        if !device.supports_stage(stage) {
            return Err(Error::Unsupported("shader stage on this device"));
        }
        Ok(Shader {
            ops: StageOps::for_stage(stage),
            uniforms: UniformTable::build(compiled)?,
            buffer: None,
        })
    }

    pub fn stage(&self) -> Stage {
        self.ops.stage()
    }

    pub fn uniforms(&self) -> &UniformTable {
        &self.uniforms
    }

    /// Writes a uniform by name; `false` when the shader has no such uniform.
    pub fn set_uniform(&mut self, name: &str, values: &[f32]) -> bool {
        self.uniforms.set_uniform(name, values)
    }

    /// Uploads the uniforms and binds them to slot 0 of this shader's stage.
    pub fn prepare(&mut self, engine: &mut Engine<D>) -> Result<(), Error> {
        if self.uniforms.is_empty() {
            return Ok(());
        }
        let parts = engine.parts_mut();
        let handle = match self.buffer {
            Some(handle) if parts.buffers.info(handle).is_ok() => handle,
            //first use, or the engine was torn down since
            _ => {
                let handle = parts.buffers.create_buffer(BufferKind::Uniform);
                self.buffer = Some(handle);
                handle
            }
        };
        self.uniforms.sync_to_gpu(parts.device, parts.buffers, handle)?;
        let native = parts
            .buffers
            .native(handle)?
            .ok_or(Error::StaleHandle("uniform buffer"))?;
        self.ops.set_uniforms(parts.device, 0, native)
    }

    /// Binds the current shader view of `texture` to `slot` of this shader's stage.
    pub fn bind_texture(
        &self,
        engine: &mut Engine<D>,
        slot: u32,
        texture: TextureHandle,
    ) -> Result<(), Error> {
        let parts = engine.parts_mut();
        let view = parts.textures.shader_view(texture)?;
        self.ops.set_texture(parts.device, slot, view)
    }

    /// Releases the uniform buffer.
    pub fn release(self, engine: &mut Engine<D>) {
        if let Some(handle) = self.buffer {
            //already gone after a teardown
            let _ = engine.parts_mut().buffers.destroy_buffer(handle);
        }
    }
}

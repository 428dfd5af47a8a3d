// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Shader uniform reflection.

A [`UniformTable`] is built once from a compiled shader: it records the name, offset and
size of every member of the shader's first uniform block, and owns a zeroed CPU copy of
that block.  Draw code writes uniforms by name into the copy, then
[`UniformTable::sync_to_gpu`] uploads it before the draw.

A shader without a uniform block gets an empty table; writes then simply miss.

```
use textures_and_uniforms::bindings::uniforms::{CompiledShader, UniformTable};

let module = naga::front::wgsl::parse_str("
    struct Globals { tint: vec4<f32>, time: f32 }
    @group(0) @binding(0) var<uniform> globals: Globals;
").unwrap();
let mut table = UniformTable::build(CompiledShader::Module(&module)).unwrap();
assert!(table.set_uniform("time", &[2.5]));
assert!(!table.set_uniform("missing", &[1.0]));
assert_eq!(table.variable("time").unwrap().offset, 16);
```
*/

use crate::Error;
use crate::bindings::buffer::{BufferHandle, BufferManager, BufferUsage};
use crate::imp::Device;

/// An already-compiled shader.
#[derive(Debug, Clone, Copy)]
pub enum CompiledShader<'a> {
    /// SPIR-V bytecode.
    SpirV(&'a [u8]),
    /// A module from any naga front-end.
    Module(&'a naga::Module),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformVariable {
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformTable {
    variables: Vec<UniformVariable>,
    blob: Vec<u8>,
}

impl UniformTable {
    /// A table for a shader without uniforms.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn build(shader: CompiledShader<'_>) -> Result<Self, Error> {
        match shader {
            CompiledShader::SpirV(bytes) => {
                let module =
                    naga::front::spv::parse_u8_slice(bytes, &naga::front::spv::Options::default())
                        .map_err(|e| Error::ShaderReflection(e.to_string()))?;
                Ok(Self::reflect(&module))
            }
            CompiledShader::Module(module) => Ok(Self::reflect(module)),
        }
    }

    fn reflect(module: &naga::Module) -> Self {
        let first = module
            .global_variables
            .iter()
            .filter(|(_, global)| global.space == naga::AddressSpace::Uniform)
            .min_by_key(|(_, global)| {
                global
                    .binding
                    .as_ref()
                    .map(|b| (b.group, b.binding))
                    .unwrap_or((u32::MAX, u32::MAX))
            });
        let Some((_, global)) = first else {
            logwise::trace_sync!("shader has no uniform block");
            return Self::empty();
        };

        let ctx = module.to_ctx();
        let inner = &module.types[global.ty].inner;
        let variables = match inner {
            naga::TypeInner::Struct { members, .. } => members
                .iter()
                .enumerate()
                .map(|(index, member)| UniformVariable {
                    name: member
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("member{index}")),
                    offset: member.offset,
                    size: module.types[member.ty].inner.size(ctx),
                })
                .collect(),
            other => vec![UniformVariable {
                name: global.name.clone().unwrap_or_default(),
                offset: 0,
                size: other.size(ctx),
            }],
        };
        let size = inner.size(ctx) as usize;
        logwise::info_sync!(
            "reflected uniform block: {count} variables, {size} bytes",
            count = variables.len(),
            size = size
        );
        UniformTable {
            variables,
            blob: vec![0; size],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blob.is_empty()
    }

    pub fn variables(&self) -> &[UniformVariable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&UniformVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// The CPU copy of the uniform block.
    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    /**
    Copies `values` into the variable called `name`.

    Returns `false` without touching the blob when no such variable exists.

    # Panics
    When `values` is larger than the variable.
    */
    pub fn set_uniform(&mut self, name: &str, values: &[f32]) -> bool {
        let Some((offset, size)) = self.variable(name).map(|v| (v.offset, v.size)) else {
            return false;
        };
        let bytes: &[u8] = bytemuck::cast_slice(values);
        assert!(
            bytes.len() <= size as usize,
            "{} bytes written to uniform {name} of {size} bytes",
            bytes.len()
        );
        let start = offset as usize;
        self.blob[start..start + bytes.len()].copy_from_slice(bytes);
        true
    }

    /// Uploads the blob into `target`.  Does nothing for an empty table.
    pub fn sync_to_gpu<D: Device>(
        &self,
        device: &mut D,
        buffers: &mut BufferManager<D>,
        target: BufferHandle,
    ) -> Result<(), Error> {
        if self.is_empty() {
            return Ok(());
        }
        buffers.upload(
            device,
            target,
            BufferUsage::empty(),
            Some(&self.blob),
            self.blob.len() as u64,
        )
    }
}

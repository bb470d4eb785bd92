use std::collections::HashMap;

use log::error;

use crate::device::{
    GlslType, GraphicsDevice, ProgramId, ShaderDialect, ShaderId, ShaderKind, UniformLocation,
};
use crate::error::Result;

/// Active attribute of a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveAttribute {
    pub location: u32,
    pub data_type: GlslType,
}

/// Active uniform of a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveUniform {
    pub location: UniformLocation,
    pub data_type: GlslType,
}

/// Linked shader program together with its reflected interface.
#[derive(Debug, Clone)]
pub struct Program {
    id: ProgramId,
    attributes: HashMap<String, ActiveAttribute>,
    uniforms: HashMap<String, ActiveUniform>,
}

impl Program {
    /// Compiles and links a program from sources without a `#version` line;
    /// the device's [`ShaderDialect`] supplies the header.
    ///
    /// Compile and link failures are logged and the (unusable) program is
    /// still returned; only failures to create the objects are errors.
    pub fn build(
        device: &mut dyn GraphicsDevice,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self> {
        let dialect = device.shader_dialect();
        let vertex = compile(
            device,
            ShaderKind::Vertex,
            &decorate(dialect, ShaderKind::Vertex, vertex_source),
        )?;
        let fragment = compile(
            device,
            ShaderKind::Fragment,
            &decorate(dialect, ShaderKind::Fragment, fragment_source),
        )?;
        let id = device.link_program(vertex, fragment)?;
        device.delete_shader(vertex);
        device.delete_shader(fragment);
        if let Some(log) = device.program_diagnostics(id) {
            error!("failed to link program {}: {log}", id.0);
        }

        let attributes = device
            .active_attributes(id)
            .into_iter()
            .map(|info| {
                (
                    info.name,
                    ActiveAttribute {
                        location: info.location,
                        data_type: info.data_type,
                    },
                )
            })
            .collect();
        let uniforms = device
            .active_uniforms(id)
            .into_iter()
            .map(|info| {
                (
                    info.name,
                    ActiveUniform {
                        location: info.location,
                        data_type: info.data_type,
                    },
                )
            })
            .collect();

        Ok(Self {
            id,
            attributes,
            uniforms,
        })
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn use_program(&self, device: &mut dyn GraphicsDevice) {
        device.use_program(self.id);
    }

    pub fn attribute(&self, name: &str) -> Option<ActiveAttribute> {
        self.attributes.get(name).copied()
    }

    pub fn uniform(&self, name: &str) -> Option<ActiveUniform> {
        self.uniforms.get(name).copied()
    }

    /// Looks up a struct member such as `lights[0].color`.
    pub fn uniform_member(&self, prefix: &str, field: &str) -> Option<ActiveUniform> {
        self.uniform(&format!("{prefix}.{field}"))
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.contains_key(name)
    }

    /// Number of elements of the struct array `name`, read from the highest
    /// active `name[i].field` index. `None` when the program declares no
    /// such array.
    pub fn array_len(&self, name: &str) -> Option<usize> {
        self.uniforms
            .keys()
            .filter_map(|uniform| element_index(uniform, name))
            .max()
            .map(|last| last + 1)
    }
}

fn element_index(uniform: &str, array: &str) -> Option<usize> {
    let rest = uniform.strip_prefix(array)?.strip_prefix('[')?;
    let (index, member) = rest.split_once(']')?;
    if !member.is_empty() && !member.starts_with('.') {
        return None;
    }
    index.parse().ok()
}

fn compile(device: &mut dyn GraphicsDevice, kind: ShaderKind, source: &str) -> Result<ShaderId> {
    let shader = device.compile_shader(kind, source)?;
    if let Some(log) = device.shader_diagnostics(shader) {
        error!(
            "error while compiling {kind:?} shader, source:\n{}\n{log}",
            number_lines(source)
        );
    }
    Ok(shader)
}

fn decorate(dialect: ShaderDialect, kind: ShaderKind, source: &str) -> String {
    format!("{}\n{}", dialect.header(kind), source.trim())
}

fn number_lines(source: &str) -> String {
    source
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{}. {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

use std::collections::{HashMap, HashSet};

use glam::{Mat4, Vec2, Vec3, Vec4};
use log::debug;

use super::{
    AttributeInfo, BlendFactor, BufferId, BufferTarget, Capability, ClearMask, DrawMode,
    GlslType, GraphicsDevice, IndexType, ProgramId, ShaderDialect, ShaderId, ShaderKind, TextureId,
    TextureImage, TextureParams, UniformInfo, UniformLocation, VertexArrayId,
};
use crate::error::{FrameworkError, Result};

/// Value written to a uniform, as captured by [`RecordingDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

/// One call made against a [`RecordingDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CompileShader { shader: ShaderId, kind: ShaderKind },
    DeleteShader(ShaderId),
    LinkProgram { program: ProgramId },
    UseProgram(ProgramId),
    CreateBuffer(BufferId),
    BindBuffer { target: BufferTarget, buffer: Option<BufferId> },
    UploadBuffer { target: BufferTarget, buffer: BufferId, bytes: usize },
    VertexAttribPointer { buffer: BufferId, location: u32, components: i32 },
    CreateVertexArray(VertexArrayId),
    BindVertexArray(Option<VertexArrayId>),
    CreateTexture(TextureId),
    UploadTexture { texture: TextureId, width: u32, height: u32, params: TextureParams },
    BindTexture { unit: u32, texture: TextureId },
    /// Uniform write resolved back to the name the bound program declares.
    SetUniform { program: ProgramId, name: String, value: RecordedValue },
    DrawArrays { mode: DrawMode, first: i32, count: i32 },
    DrawElements { mode: DrawMode, count: i32, index_type: IndexType, offset: i32 },
    Clear(ClearMask),
    ClearColor(Vec4),
    Viewport { x: i32, y: i32, width: i32, height: i32 },
    SetEnabled { capability: Capability, enabled: bool },
    BlendFunc { source: BlendFactor, destination: BlendFactor },
}

impl Command {
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::DrawArrays { .. } | Self::DrawElements { .. })
    }
}

#[derive(Debug)]
struct ShaderRecord {
    kind: ShaderKind,
    source: String,
    diagnostics: Option<String>,
    deleted: bool,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    attributes: Vec<AttributeInfo>,
    uniforms: Vec<UniformInfo>,
    diagnostics: Option<String>,
}

/// Headless device that keeps every call in memory.
///
/// Program reflection is derived from the GLSL declarations in the shader
/// sources: every `in` of the vertex stage is an active attribute and every
/// `uniform` (with struct arrays expanded to `name[i].field`) is an active
/// uniform. A shader without a `main` function fails to compile.
#[derive(Debug)]
pub struct RecordingDevice {
    size: (u32, u32),
    dialect: ShaderDialect,
    commands: Vec<Command>,
    shaders: Vec<ShaderRecord>,
    programs: Vec<ProgramRecord>,
    next_buffer: u32,
    next_vertex_array: u32,
    next_texture: u32,
    current_program: Option<ProgramId>,
    enabled: HashSet<Capability>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl RecordingDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            dialect: ShaderDialect::default(),
            commands: Vec::new(),
            shaders: Vec::new(),
            programs: Vec::new(),
            next_buffer: 0,
            next_vertex_array: 0,
            next_texture: 0,
            current_program: None,
            enabled: HashSet::new(),
        }
    }

    /// Changes the reported drawing buffer size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    /// Reports `dialect` to programs built on this device.
    pub fn set_shader_dialect(&mut self, dialect: ShaderDialect) {
        self.dialect = dialect;
    }

    /// Source text a shader was compiled from, header included.
    pub fn shader_source(&self, shader: ShaderId) -> Option<&str> {
        self.shaders
            .get(shader.0 as usize)
            .map(|record| record.source.as_str())
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drains the recorded commands, keeping device state intact.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn draw_calls(&self) -> Vec<&Command> {
        self.commands.iter().filter(|command| command.is_draw()).collect()
    }

    /// Every value written to the uniform called `name`, in call order.
    pub fn uniform_writes(&self, name: &str) -> Vec<&RecordedValue> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::SetUniform {
                    name: written,
                    value,
                    ..
                } if written == name => Some(value),
                _ => None,
            })
            .collect()
    }

    pub fn last_uniform(&self, name: &str) -> Option<&RecordedValue> {
        self.uniform_writes(name).pop()
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.enabled.contains(&capability)
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.current_program
    }

    fn record(&mut self, command: Command) {
        self.commands.push(command);
    }

    fn record_uniform(&mut self, location: UniformLocation, value: RecordedValue) {
        let Some(program) = self.current_program else {
            debug!("uniform write without a bound program ignored");
            return;
        };
        let name = self
            .programs
            .get(program.0 as usize)
            .and_then(|record| {
                record
                    .uniforms
                    .iter()
                    .find(|uniform| uniform.location == location)
            })
            .map(|uniform| uniform.name.clone());
        match name {
            Some(name) => self.record(Command::SetUniform {
                program,
                name,
                value,
            }),
            None => debug!("uniform location {} is not part of program {}", location.0, program.0),
        }
    }

    fn shader(&self, shader: ShaderId) -> Result<&ShaderRecord> {
        self.shaders
            .get(shader.0 as usize)
            .filter(|record| !record.deleted)
            .ok_or_else(|| FrameworkError::Device(format!("unknown shader {}", shader.0)))
    }
}

impl GraphicsDevice for RecordingDevice {
    fn shader_dialect(&self) -> ShaderDialect {
        self.dialect
    }

    fn compile_shader(&mut self, kind: ShaderKind, source: &str) -> Result<ShaderId> {
        let shader = ShaderId(self.shaders.len() as u32);
        let diagnostics = (!source.contains("main"))
            .then(|| "ERROR: 0:0: missing main() entry point".to_string());
        self.shaders.push(ShaderRecord {
            kind,
            source: source.to_string(),
            diagnostics,
            deleted: false,
        });
        self.record(Command::CompileShader { shader, kind });
        Ok(shader)
    }

    fn shader_diagnostics(&self, shader: ShaderId) -> Option<String> {
        self.shaders
            .get(shader.0 as usize)
            .and_then(|record| record.diagnostics.clone())
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        if let Some(record) = self.shaders.get_mut(shader.0 as usize) {
            record.deleted = true;
        }
        self.record(Command::DeleteShader(shader));
    }

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId> {
        let program = ProgramId(self.programs.len() as u32);
        let vertex_record = self.shader(vertex)?;
        let fragment_record = self.shader(fragment)?;

        let record = if vertex_record.kind != ShaderKind::Vertex
            || fragment_record.kind != ShaderKind::Fragment
        {
            ProgramRecord {
                diagnostics: Some("shader stages attached in the wrong slots".to_string()),
                ..ProgramRecord::default()
            }
        } else if vertex_record.diagnostics.is_some() || fragment_record.diagnostics.is_some() {
            ProgramRecord {
                diagnostics: Some("one or more attached shaders failed to compile".to_string()),
                ..ProgramRecord::default()
            }
        } else {
            let vertex_decls = parse_declarations(&vertex_record.source);
            let fragment_decls = parse_declarations(&fragment_record.source);

            let attributes = vertex_decls
                .inputs
                .iter()
                .enumerate()
                .map(|(location, (data_type, name))| AttributeInfo {
                    name: name.clone(),
                    location: location as u32,
                    data_type: *data_type,
                })
                .collect();

            let mut uniforms: Vec<UniformInfo> = Vec::new();
            for (data_type, name) in vertex_decls.uniforms.into_iter().chain(fragment_decls.uniforms)
            {
                if uniforms.iter().any(|uniform| uniform.name == name) {
                    continue;
                }
                uniforms.push(UniformInfo {
                    location: UniformLocation(uniforms.len() as u32),
                    name,
                    data_type,
                });
            }

            ProgramRecord {
                attributes,
                uniforms,
                diagnostics: None,
            }
        };

        self.programs.push(record);
        self.record(Command::LinkProgram { program });
        Ok(program)
    }

    fn program_diagnostics(&self, program: ProgramId) -> Option<String> {
        self.programs
            .get(program.0 as usize)
            .and_then(|record| record.diagnostics.clone())
    }

    fn active_attributes(&self, program: ProgramId) -> Vec<AttributeInfo> {
        self.programs
            .get(program.0 as usize)
            .map(|record| record.attributes.clone())
            .unwrap_or_default()
    }

    fn active_uniforms(&self, program: ProgramId) -> Vec<UniformInfo> {
        self.programs
            .get(program.0 as usize)
            .map(|record| record.uniforms.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
        self.record(Command::UseProgram(program));
    }

    fn create_buffer(&mut self) -> Result<BufferId> {
        let buffer = BufferId(self.next_buffer);
        self.next_buffer += 1;
        self.record(Command::CreateBuffer(buffer));
        Ok(buffer)
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        self.record(Command::BindBuffer { target, buffer });
    }

    fn upload_buffer(&mut self, target: BufferTarget, buffer: BufferId, data: &[u8]) {
        self.record(Command::UploadBuffer {
            target,
            buffer,
            bytes: data.len(),
        });
    }

    fn vertex_attrib_pointer(&mut self, buffer: BufferId, location: u32, components: i32) {
        self.record(Command::VertexAttribPointer {
            buffer,
            location,
            components,
        });
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayId> {
        let vertex_array = VertexArrayId(self.next_vertex_array);
        self.next_vertex_array += 1;
        self.record(Command::CreateVertexArray(vertex_array));
        Ok(vertex_array)
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.record(Command::BindVertexArray(vertex_array));
    }

    fn create_texture(&mut self) -> Result<TextureId> {
        let texture = TextureId(self.next_texture);
        self.next_texture += 1;
        self.record(Command::CreateTexture(texture));
        Ok(texture)
    }

    fn upload_texture(&mut self, texture: TextureId, image: &TextureImage<'_>, params: TextureParams) {
        self.record(Command::UploadTexture {
            texture,
            width: image.width,
            height: image.height,
            params,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.record(Command::BindTexture { unit, texture });
    }

    fn uniform_i32(&mut self, location: UniformLocation, value: i32) {
        self.record_uniform(location, RecordedValue::Int(value));
    }

    fn uniform_f32(&mut self, location: UniformLocation, value: f32) {
        self.record_uniform(location, RecordedValue::Float(value));
    }

    fn uniform_vec2(&mut self, location: UniformLocation, value: Vec2) {
        self.record_uniform(location, RecordedValue::Vec2(value));
    }

    fn uniform_vec3(&mut self, location: UniformLocation, value: Vec3) {
        self.record_uniform(location, RecordedValue::Vec3(value));
    }

    fn uniform_vec4(&mut self, location: UniformLocation, value: Vec4) {
        self.record_uniform(location, RecordedValue::Vec4(value));
    }

    fn uniform_mat4(&mut self, location: UniformLocation, value: &Mat4) {
        self.record_uniform(location, RecordedValue::Mat4(*value));
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: i32, count: i32) {
        self.record(Command::DrawArrays { mode, first, count });
    }

    fn draw_elements(&mut self, mode: DrawMode, count: i32, index_type: IndexType, offset: i32) {
        self.record(Command::DrawElements {
            mode,
            count,
            index_type,
            offset,
        });
    }

    fn clear(&mut self, mask: ClearMask) {
        self.record(Command::Clear(mask));
    }

    fn clear_color(&mut self, color: Vec4) {
        self.record(Command::ClearColor(color));
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.record(Command::Viewport {
            x,
            y,
            width,
            height,
        });
    }

    fn drawing_buffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn set_enabled(&mut self, capability: Capability, enabled: bool) {
        if enabled {
            self.enabled.insert(capability);
        } else {
            self.enabled.remove(&capability);
        }
        self.record(Command::SetEnabled {
            capability,
            enabled,
        });
    }

    fn blend_func(&mut self, source: BlendFactor, destination: BlendFactor) {
        self.record(Command::BlendFunc {
            source,
            destination,
        });
    }
}

#[derive(Debug, Default)]
struct Declarations {
    inputs: Vec<(GlslType, String)>,
    uniforms: Vec<(GlslType, String)>,
}

const QUALIFIERS: &[&str] = &["lowp", "mediump", "highp", "flat", "smooth"];

fn parse_declarations(source: &str) -> Declarations {
    let cleaned: String = source
        .lines()
        .map(|line| line.split("//").next().unwrap_or_default())
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    let structs = parse_structs(&cleaned);
    let mut declarations = Declarations::default();

    for statement in cleaned.split(|c| matches!(c, ';' | '{' | '}')) {
        let statement = strip_layout(statement.trim());
        let mut tokens = statement
            .split_whitespace()
            .filter(|token| !QUALIFIERS.contains(token));
        let storage = tokens.next();
        let (Some(type_name), Some(declarator)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        let (name, length) = split_array(declarator);
        match storage {
            Some("in") => {
                if let Some(data_type) = GlslType::from_keyword(type_name) {
                    declarations.inputs.push((data_type, name.to_string()));
                }
            }
            Some("uniform") => {
                let names: Vec<String> = match length {
                    Some(length) => (0..length).map(|i| format!("{name}[{i}]")).collect(),
                    None => vec![name.to_string()],
                };
                for element in names {
                    if let Some(fields) = structs.get(type_name) {
                        for (data_type, field) in fields {
                            declarations
                                .uniforms
                                .push((*data_type, format!("{element}.{field}")));
                        }
                    } else if let Some(data_type) = GlslType::from_keyword(type_name) {
                        declarations.uniforms.push((data_type, element));
                    }
                }
            }
            _ => {}
        }
    }
    declarations
}

fn parse_structs(source: &str) -> HashMap<String, Vec<(GlslType, String)>> {
    let mut structs = HashMap::new();
    let mut rest = source;
    while let Some(start) = rest.find("struct ") {
        rest = &rest[start + "struct ".len()..];
        let (Some(open), Some(close)) = (rest.find('{'), rest.find('}')) else {
            break;
        };
        if close < open {
            rest = &rest[close + 1..];
            continue;
        }
        let name = rest[..open].trim().to_string();
        let fields = rest[open + 1..close]
            .split(';')
            .filter_map(|field| {
                let mut tokens = field
                    .split_whitespace()
                    .filter(|token| !QUALIFIERS.contains(token));
                let data_type = GlslType::from_keyword(tokens.next()?)?;
                Some((data_type, tokens.next()?.to_string()))
            })
            .collect();
        structs.insert(name, fields);
        rest = &rest[close + 1..];
    }
    structs
}

fn strip_layout(statement: &str) -> &str {
    if statement.starts_with("layout") {
        if let Some(end) = statement.find(')') {
            return statement[end + 1..].trim_start();
        }
    }
    statement
}

fn split_array(declarator: &str) -> (&str, Option<usize>) {
    match declarator.split_once('[') {
        Some((name, rest)) => {
            let length = rest.trim_end_matches(']').trim().parse().ok();
            (name, length)
        }
        None => (declarator, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"
        struct Light {
            int lightType;
            vec3 color;
        };
        in vec4 a_position;
        layout(location = 3) in vec3 a_normal; // trailing comment
        uniform mat4 u_ModelMatrix;
        uniform Light lights[2];
        uniform int lightCount;
        void main() {
            for (int i = 0; i < lightCount; i++) {}
            gl_Position = u_ModelMatrix * a_position;
        }
    "#;

    const FRAGMENT: &str = r#"
        precision mediump float;
        in vec3 v_Normal;
        uniform highp vec3 u_BaseColor;
        uniform mat4 u_ModelMatrix;
        out vec4 fragColor;
        void main() { fragColor = vec4(u_BaseColor, 1.0); }
    "#;

    fn link(device: &mut RecordingDevice) -> ProgramId {
        let vertex = device.compile_shader(ShaderKind::Vertex, VERTEX).unwrap();
        let fragment = device.compile_shader(ShaderKind::Fragment, FRAGMENT).unwrap();
        device.link_program(vertex, fragment).unwrap()
    }

    #[test]
    fn reflects_vertex_inputs_as_attributes() {
        let mut device = RecordingDevice::default();
        let program = link(&mut device);
        let names: Vec<_> = device
            .active_attributes(program)
            .into_iter()
            .map(|attribute| attribute.name)
            .collect();
        assert_eq!(names, vec!["a_position", "a_normal"]);
    }

    #[test]
    fn expands_struct_arrays_and_merges_stages() {
        let mut device = RecordingDevice::default();
        let program = link(&mut device);
        let names: Vec<_> = device
            .active_uniforms(program)
            .into_iter()
            .map(|uniform| uniform.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "u_ModelMatrix",
                "lights[0].lightType",
                "lights[0].color",
                "lights[1].lightType",
                "lights[1].color",
                "lightCount",
                "u_BaseColor",
            ]
        );
    }

    #[test]
    fn missing_main_reports_diagnostics() {
        let mut device = RecordingDevice::default();
        let vertex = device
            .compile_shader(ShaderKind::Vertex, "in vec4 a_position;")
            .unwrap();
        let fragment = device.compile_shader(ShaderKind::Fragment, FRAGMENT).unwrap();
        assert!(device.shader_diagnostics(vertex).is_some());
        let program = device.link_program(vertex, fragment).unwrap();
        assert!(device.program_diagnostics(program).is_some());
        assert!(device.active_uniforms(program).is_empty());
    }

    #[test]
    fn uniform_writes_resolve_names_through_bound_program() {
        let mut device = RecordingDevice::default();
        let program = link(&mut device);
        let location = device
            .active_uniforms(program)
            .into_iter()
            .find(|uniform| uniform.name == "lightCount")
            .unwrap()
            .location;
        device.uniform_i32(location, 7);
        assert!(device.uniform_writes("lightCount").is_empty());
        device.use_program(program);
        device.uniform_i32(location, 3);
        assert_eq!(device.last_uniform("lightCount"), Some(&RecordedValue::Int(3)));
    }

    #[test]
    fn deleted_shaders_cannot_be_linked_again() {
        let mut device = RecordingDevice::default();
        let vertex = device.compile_shader(ShaderKind::Vertex, VERTEX).unwrap();
        let fragment = device.compile_shader(ShaderKind::Fragment, FRAGMENT).unwrap();
        device.link_program(vertex, fragment).unwrap();
        device.delete_shader(vertex);
        assert!(device.link_program(vertex, fragment).is_err());
        assert!(device.commands().contains(&Command::DeleteShader(vertex)));
    }
}

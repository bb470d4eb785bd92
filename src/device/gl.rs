//! OpenGL 3.3, OpenGL ES 3 and WebGL2 backend over `glow`.

use glam::{Mat4, Vec2, Vec3, Vec4};
use glow::HasContext;
use log::debug;

use super::{
    AttributeInfo, BlendFactor, BufferId, BufferTarget, Capability, ClearMask, DrawMode, GlslType,
    GraphicsDevice, IndexType, MagFilter, MinFilter, ProgramId, ShaderDialect, ShaderId,
    ShaderKind, TextureId,
    TextureImage, TextureParams, UniformInfo, UniformLocation, VertexArrayId, Wrap,
};
use crate::error::{FrameworkError, Result};

struct LinkedProgram<G: HasContext> {
    program: G::Program,
    diagnostics: Option<String>,
    attributes: Vec<AttributeInfo>,
    uniforms: Vec<UniformInfo>,
}

/// [`GraphicsDevice`] backed by a live GL context.
///
/// Handles index into per-kind tables; uniform locations index into one
/// table shared by every program. Objects still alive when the device is
/// dropped are released then.
pub struct GlowDevice<G: HasContext> {
    gl: G,
    dialect: ShaderDialect,
    width: u32,
    height: u32,
    shaders: Vec<(Option<G::Shader>, Option<String>)>,
    programs: Vec<LinkedProgram<G>>,
    buffers: Vec<G::Buffer>,
    vertex_arrays: Vec<G::VertexArray>,
    textures: Vec<G::Texture>,
    uniform_locations: Vec<G::UniformLocation>,
}

impl<G: HasContext> GlowDevice<G> {
    /// Embedded contexts (GLES, WebGL2) compile GLSL ES 3.00, desktop ones
    /// GLSL 3.30 core.
    pub fn new(gl: G, width: u32, height: u32) -> Self {
        let version = gl.version();
        let dialect = if version.is_embedded {
            ShaderDialect::Es300
        } else {
            ShaderDialect::Core330
        };
        debug!(
            "GL {}.{} (embedded: {}), compiling {dialect:?}",
            version.major, version.minor, version.is_embedded
        );
        Self::with_dialect(gl, dialect, width, height)
    }

    pub fn with_dialect(gl: G, dialect: ShaderDialect, width: u32, height: u32) -> Self {
        Self {
            gl,
            dialect,
            width,
            height,
            shaders: Vec::new(),
            programs: Vec::new(),
            buffers: Vec::new(),
            vertex_arrays: Vec::new(),
            textures: Vec::new(),
            uniform_locations: Vec::new(),
        }
    }

    pub fn gl(&self) -> &G {
        &self.gl
    }

    /// Records the new surface size reported by the window.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn buffer(&self, buffer: BufferId) -> Option<G::Buffer> {
        self.buffers.get(buffer.0 as usize).copied()
    }

    fn texture(&self, texture: TextureId) -> Option<G::Texture> {
        self.textures.get(texture.0 as usize).copied()
    }

    fn location(&self, location: UniformLocation) -> Option<&G::UniformLocation> {
        self.uniform_locations.get(location.0 as usize)
    }

    fn reflect(&mut self, program: G::Program) -> (Vec<AttributeInfo>, Vec<UniformInfo>) {
        let mut attributes = Vec::new();
        let mut uniforms = Vec::new();
        unsafe {
            for index in 0..self.gl.get_active_attributes(program) {
                let Some(active) = self.gl.get_active_attribute(program, index) else {
                    continue;
                };
                let Some(location) = self.gl.get_attrib_location(program, &active.name) else {
                    continue;
                };
                attributes.push(AttributeInfo {
                    name: active.name,
                    location,
                    data_type: glsl_type(active.atype),
                });
            }
            for index in 0..self.gl.get_active_uniforms(program) {
                let Some(active) = self.gl.get_active_uniform(program, index) else {
                    continue;
                };
                let Some(location) = self.gl.get_uniform_location(program, &active.name) else {
                    continue;
                };
                let handle = UniformLocation(self.uniform_locations.len() as u32);
                self.uniform_locations.push(location);
                // Arrays of primitives report only their first element.
                let name = active
                    .name
                    .strip_suffix("[0]")
                    .filter(|_| active.size > 1)
                    .map(str::to_string)
                    .unwrap_or(active.name);
                uniforms.push(UniformInfo {
                    name,
                    location: handle,
                    data_type: glsl_type(active.utype),
                });
            }
        }
        (attributes, uniforms)
    }
}

fn glsl_type(gl_type: u32) -> GlslType {
    match gl_type {
        glow::BOOL => GlslType::Bool,
        glow::INT => GlslType::Int,
        glow::FLOAT => GlslType::Float,
        glow::FLOAT_VEC2 => GlslType::Vec2,
        glow::FLOAT_VEC3 => GlslType::Vec3,
        glow::FLOAT_VEC4 => GlslType::Vec4,
        glow::FLOAT_MAT3 => GlslType::Mat3,
        glow::FLOAT_MAT4 => GlslType::Mat4,
        glow::SAMPLER_2D => GlslType::Sampler2D,
        other => GlslType::Other(other),
    }
}

fn buffer_target(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Vertex => glow::ARRAY_BUFFER,
        BufferTarget::Index => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn draw_mode(mode: DrawMode) -> u32 {
    match mode {
        DrawMode::Points => glow::POINTS,
        DrawMode::Lines => glow::LINES,
        DrawMode::LineStrip => glow::LINE_STRIP,
        DrawMode::LineLoop => glow::LINE_LOOP,
        DrawMode::Triangles => glow::TRIANGLES,
        DrawMode::TriangleStrip => glow::TRIANGLE_STRIP,
        DrawMode::TriangleFan => glow::TRIANGLE_FAN,
    }
}

fn capability(capability: Capability) -> u32 {
    match capability {
        Capability::Blend => glow::BLEND,
        Capability::DepthTest => glow::DEPTH_TEST,
        Capability::CullFace => glow::CULL_FACE,
    }
}

fn blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::One => glow::ONE,
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
    }
}

fn min_filter(filter: MinFilter) -> i32 {
    (match filter {
        MinFilter::Nearest => glow::NEAREST,
        MinFilter::Linear => glow::LINEAR,
        MinFilter::NearestMipmapNearest => glow::NEAREST_MIPMAP_NEAREST,
        MinFilter::NearestMipmapLinear => glow::NEAREST_MIPMAP_LINEAR,
        MinFilter::LinearMipmapLinear => glow::LINEAR_MIPMAP_LINEAR,
    }) as i32
}

fn mag_filter(filter: MagFilter) -> i32 {
    (match filter {
        MagFilter::Nearest => glow::NEAREST,
        MagFilter::Linear => glow::LINEAR,
    }) as i32
}

fn wrap(wrap: Wrap) -> i32 {
    (match wrap {
        Wrap::Repeat => glow::REPEAT,
        Wrap::ClampToEdge => glow::CLAMP_TO_EDGE,
        Wrap::MirroredRepeat => glow::MIRRORED_REPEAT,
    }) as i32
}

impl<G: HasContext> Drop for GlowDevice<G> {
    fn drop(&mut self) {
        unsafe {
            for shader in self.shaders.iter_mut().filter_map(|(shader, _)| shader.take()) {
                self.gl.delete_shader(shader);
            }
            for linked in self.programs.drain(..) {
                self.gl.delete_program(linked.program);
            }
            for buffer in self.buffers.drain(..) {
                self.gl.delete_buffer(buffer);
            }
            for vertex_array in self.vertex_arrays.drain(..) {
                self.gl.delete_vertex_array(vertex_array);
            }
            for texture in self.textures.drain(..) {
                self.gl.delete_texture(texture);
            }
        }
    }
}

impl<G: HasContext> GraphicsDevice for GlowDevice<G> {
    fn shader_dialect(&self) -> ShaderDialect {
        self.dialect
    }

    fn compile_shader(&mut self, kind: ShaderKind, source: &str) -> Result<ShaderId> {
        let shader_type = match kind {
            ShaderKind::Vertex => glow::VERTEX_SHADER,
            ShaderKind::Fragment => glow::FRAGMENT_SHADER,
        };
        let (shader, diagnostics) = unsafe {
            let shader = self.gl.create_shader(shader_type).map_err(FrameworkError::Device)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            let diagnostics = if self.gl.get_shader_compile_status(shader) {
                None
            } else {
                Some(self.gl.get_shader_info_log(shader))
            };
            (shader, diagnostics)
        };
        self.shaders.push((Some(shader), diagnostics));
        Ok(ShaderId(self.shaders.len() as u32 - 1))
    }

    fn shader_diagnostics(&self, shader: ShaderId) -> Option<String> {
        self.shaders
            .get(shader.0 as usize)
            .and_then(|(_, diagnostics)| diagnostics.clone())
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        if let Some(shader) = self
            .shaders
            .get_mut(shader.0 as usize)
            .and_then(|(shader, _)| shader.take())
        {
            unsafe { self.gl.delete_shader(shader) };
        }
    }

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId> {
        let shader = |id: ShaderId| self.shaders.get(id.0 as usize).and_then(|(shader, _)| *shader);
        let (Some(vertex_shader), Some(fragment_shader)) = (shader(vertex), shader(fragment)) else {
            return Err(FrameworkError::Device(
                "unknown or deleted shader handle".to_string(),
            ));
        };
        let (program, diagnostics) = unsafe {
            let program = self.gl.create_program().map_err(FrameworkError::Device)?;
            self.gl.attach_shader(program, vertex_shader);
            self.gl.attach_shader(program, fragment_shader);
            self.gl.link_program(program);
            let diagnostics = if self.gl.get_program_link_status(program) {
                None
            } else {
                Some(self.gl.get_program_info_log(program))
            };
            self.gl.detach_shader(program, vertex_shader);
            self.gl.detach_shader(program, fragment_shader);
            (program, diagnostics)
        };

        let (attributes, uniforms) = if diagnostics.is_none() {
            self.reflect(program)
        } else {
            (Vec::new(), Vec::new())
        };
        debug!(
            "linked program with {} attributes and {} uniforms",
            attributes.len(),
            uniforms.len()
        );
        self.programs.push(LinkedProgram {
            program,
            diagnostics,
            attributes,
            uniforms,
        });
        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    fn program_diagnostics(&self, program: ProgramId) -> Option<String> {
        self.programs
            .get(program.0 as usize)
            .and_then(|linked| linked.diagnostics.clone())
    }

    fn active_attributes(&self, program: ProgramId) -> Vec<AttributeInfo> {
        self.programs
            .get(program.0 as usize)
            .map(|linked| linked.attributes.clone())
            .unwrap_or_default()
    }

    fn active_uniforms(&self, program: ProgramId) -> Vec<UniformInfo> {
        self.programs
            .get(program.0 as usize)
            .map(|linked| linked.uniforms.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: ProgramId) {
        let program = self.programs.get(program.0 as usize).map(|linked| linked.program);
        unsafe { self.gl.use_program(program) };
    }

    fn create_buffer(&mut self) -> Result<BufferId> {
        let buffer = unsafe { self.gl.create_buffer() }.map_err(FrameworkError::Device)?;
        self.buffers.push(buffer);
        Ok(BufferId(self.buffers.len() as u32 - 1))
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        let buffer = buffer.and_then(|buffer| self.buffer(buffer));
        unsafe { self.gl.bind_buffer(buffer_target(target), buffer) };
    }

    fn upload_buffer(&mut self, target: BufferTarget, buffer: BufferId, data: &[u8]) {
        let target = buffer_target(target);
        unsafe {
            self.gl.bind_buffer(target, self.buffer(buffer));
            self.gl.buffer_data_u8_slice(target, data, glow::STATIC_DRAW);
        }
    }

    fn vertex_attrib_pointer(&mut self, buffer: BufferId, location: u32, components: i32) {
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, self.buffer(buffer));
            self.gl
                .vertex_attrib_pointer_f32(location, components, glow::FLOAT, false, 0, 0);
            self.gl.enable_vertex_attrib_array(location);
        }
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayId> {
        let vertex_array = unsafe { self.gl.create_vertex_array() }.map_err(FrameworkError::Device)?;
        self.vertex_arrays.push(vertex_array);
        Ok(VertexArrayId(self.vertex_arrays.len() as u32 - 1))
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        let vertex_array =
            vertex_array.and_then(|id| self.vertex_arrays.get(id.0 as usize).copied());
        unsafe { self.gl.bind_vertex_array(vertex_array) };
    }

    fn create_texture(&mut self) -> Result<TextureId> {
        let texture = unsafe { self.gl.create_texture() }.map_err(FrameworkError::Device)?;
        self.textures.push(texture);
        Ok(TextureId(self.textures.len() as u32 - 1))
    }

    fn upload_texture(&mut self, texture: TextureId, image: &TextureImage<'_>, params: TextureParams) {
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, self.texture(texture));
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                image.width as i32,
                image.height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                Some(image.pixels),
            );
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                mag_filter(params.mag_filter),
            );
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                min_filter(params.min_filter),
            );
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap(params.wrap));
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap(params.wrap));
            if params.min_filter.uses_mipmaps() {
                self.gl.generate_mipmap(glow::TEXTURE_2D);
            }
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, self.texture(texture));
        }
    }

    fn uniform_i32(&mut self, location: UniformLocation, value: i32) {
        unsafe { self.gl.uniform_1_i32(self.location(location), value) };
    }

    fn uniform_f32(&mut self, location: UniformLocation, value: f32) {
        unsafe { self.gl.uniform_1_f32(self.location(location), value) };
    }

    fn uniform_vec2(&mut self, location: UniformLocation, value: Vec2) {
        unsafe { self.gl.uniform_2_f32(self.location(location), value.x, value.y) };
    }

    fn uniform_vec3(&mut self, location: UniformLocation, value: Vec3) {
        unsafe {
            self.gl
                .uniform_3_f32(self.location(location), value.x, value.y, value.z)
        };
    }

    fn uniform_vec4(&mut self, location: UniformLocation, value: Vec4) {
        unsafe {
            self.gl
                .uniform_4_f32(self.location(location), value.x, value.y, value.z, value.w)
        };
    }

    fn uniform_mat4(&mut self, location: UniformLocation, value: &Mat4) {
        unsafe {
            self.gl.uniform_matrix_4_f32_slice(
                self.location(location),
                false,
                &value.to_cols_array(),
            )
        };
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: i32, count: i32) {
        unsafe { self.gl.draw_arrays(draw_mode(mode), first, count) };
    }

    fn draw_elements(&mut self, mode: DrawMode, count: i32, index_type: IndexType, offset: i32) {
        let element_type = match index_type {
            IndexType::UnsignedShort => glow::UNSIGNED_SHORT,
        };
        unsafe {
            self.gl
                .draw_elements(draw_mode(mode), count, element_type, offset)
        };
    }

    fn clear(&mut self, mask: ClearMask) {
        let mut bits = 0;
        if mask.color {
            bits |= glow::COLOR_BUFFER_BIT;
        }
        if mask.depth {
            bits |= glow::DEPTH_BUFFER_BIT;
        }
        unsafe { self.gl.clear(bits) };
    }

    fn clear_color(&mut self, color: Vec4) {
        unsafe { self.gl.clear_color(color.x, color.y, color.z, color.w) };
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) };
    }

    fn drawing_buffer_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_enabled(&mut self, cap: Capability, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(capability(cap));
            } else {
                self.gl.disable(capability(cap));
            }
        }
    }

    fn blend_func(&mut self, source: BlendFactor, destination: BlendFactor) {
        unsafe {
            self.gl
                .blend_func(blend_factor(source), blend_factor(destination))
        };
    }
}

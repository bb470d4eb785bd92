//! The boundary between the framework and the GPU.
//!
//! Everything the scene graph, materials and renderer need from the graphics
//! API goes through [`GraphicsDevice`]. Handles are plain integer newtypes so
//! the rest of the crate never depends on a backend's object types; each
//! backend maps them onto its own objects.

#[cfg(feature = "gl")]
pub mod gl;
pub mod recording;

use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[cfg(feature = "gl")]
pub use gl::GlowDevice;
pub use recording::{Command, RecordedValue, RecordingDevice};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    };
}

handle!(
    /// Compiled shader stage.
    ShaderId
);
handle!(
    /// Linked shader program.
    ProgramId
);
handle!(BufferId);
handle!(VertexArrayId);
handle!(TextureId);
handle!(
    /// Location of an active uniform inside a linked program.
    UniformLocation
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

/// GLSL flavour a device compiles; picks the `#version` header prepended to
/// shader sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShaderDialect {
    /// GLSL ES 3.00 for OpenGL ES 3 and WebGL2.
    #[default]
    Es300,
    /// GLSL 3.30 core for desktop OpenGL 3.3.
    Core330,
}

impl ShaderDialect {
    pub fn header(self, kind: ShaderKind) -> &'static str {
        match (self, kind) {
            (Self::Es300, ShaderKind::Vertex) => "#version 300 es\n",
            (Self::Es300, ShaderKind::Fragment) => "#version 300 es\nprecision mediump float;\n",
            (Self::Core330, _) => "#version 330 core\n",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
}

/// Element type of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    UnsignedShort,
}

/// Primitive assembly mode for draw calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DrawMode {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// Fixed-function switches toggled through [`GraphicsDevice::set_enabled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Blend,
    DepthTest,
    CullFace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    One,
    Zero,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Buffers cleared by [`GraphicsDevice::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
}

impl ClearMask {
    pub const COLOR_AND_DEPTH: Self = Self {
        color: true,
        depth: true,
    };
}

/// GLSL type reported by program reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlslType {
    Bool,
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
    Sampler2D,
    Other(u32),
}

impl GlslType {
    /// Parses a GLSL type keyword such as `vec3`.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "bool" => Self::Bool,
            "int" => Self::Int,
            "float" => Self::Float,
            "vec2" => Self::Vec2,
            "vec3" => Self::Vec3,
            "vec4" => Self::Vec4,
            "mat3" => Self::Mat3,
            "mat4" => Self::Mat4,
            "sampler2D" => Self::Sampler2D,
            _ => return None,
        })
    }
}

/// Active vertex attribute of a linked program.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
    pub name: String,
    pub location: u32,
    pub data_type: GlslType,
}

/// Active uniform of a linked program.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformInfo {
    pub name: String,
    pub location: UniformLocation,
    pub data_type: GlslType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MagFilter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    #[default]
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl MinFilter {
    pub fn uses_mipmaps(self) -> bool {
        matches!(
            self,
            Self::NearestMipmapNearest | Self::NearestMipmapLinear | Self::LinearMipmapLinear
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Wrap {
    #[default]
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

/// Sampling parameters applied when texture data is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextureParams {
    pub mag_filter: MagFilter,
    pub min_filter: MinFilter,
    pub wrap: Wrap,
}

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
}

/// Capability surface of the GPU API consumed by the framework.
///
/// Calls are immediate-mode: state set by one call (bound program, bound
/// vertex array) stays in effect for the following calls, the same way the
/// underlying rasterization API behaves.
pub trait GraphicsDevice {
    fn shader_dialect(&self) -> ShaderDialect;
    fn compile_shader(&mut self, kind: ShaderKind, source: &str) -> Result<ShaderId>;
    /// Compile log of a shader that failed to compile, `None` on success.
    fn shader_diagnostics(&self, shader: ShaderId) -> Option<String>;
    /// Releases a shader stage; programs it was linked into keep working.
    fn delete_shader(&mut self, shader: ShaderId);
    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId>;
    /// Link log of a program that failed to link, `None` on success.
    fn program_diagnostics(&self, program: ProgramId) -> Option<String>;
    fn active_attributes(&self, program: ProgramId) -> Vec<AttributeInfo>;
    fn active_uniforms(&self, program: ProgramId) -> Vec<UniformInfo>;
    fn use_program(&mut self, program: ProgramId);

    fn create_buffer(&mut self) -> Result<BufferId>;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>);
    /// Binds `buffer` to `target` and replaces its contents.
    fn upload_buffer(&mut self, target: BufferTarget, buffer: BufferId, data: &[u8]);
    /// Points attribute `location` at float data of `components` width in `buffer` and enables it.
    fn vertex_attrib_pointer(&mut self, buffer: BufferId, location: u32, components: i32);

    fn create_vertex_array(&mut self) -> Result<VertexArrayId>;
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>);

    fn create_texture(&mut self) -> Result<TextureId>;
    fn upload_texture(&mut self, texture: TextureId, image: &TextureImage<'_>, params: TextureParams);
    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    fn uniform_i32(&mut self, location: UniformLocation, value: i32);
    fn uniform_f32(&mut self, location: UniformLocation, value: f32);
    fn uniform_vec2(&mut self, location: UniformLocation, value: Vec2);
    fn uniform_vec3(&mut self, location: UniformLocation, value: Vec3);
    fn uniform_vec4(&mut self, location: UniformLocation, value: Vec4);
    fn uniform_mat4(&mut self, location: UniformLocation, value: &Mat4);

    fn draw_arrays(&mut self, mode: DrawMode, first: i32, count: i32);
    fn draw_elements(&mut self, mode: DrawMode, count: i32, index_type: IndexType, offset: i32);

    fn clear(&mut self, mask: ClearMask);
    fn clear_color(&mut self, color: Vec4);
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    /// Size of the drawable surface in pixels.
    fn drawing_buffer_size(&self) -> (u32, u32);
    fn set_enabled(&mut self, capability: Capability, enabled: bool);
    fn blend_func(&mut self, source: BlendFactor, destination: BlendFactor);
}

use glam::{Mat4, Vec2, Vec3};

use crate::device::{GraphicsDevice, UniformLocation};
use crate::program::Program;
use crate::texture::Sampler2D;

/// Value of a shader uniform, tagged with its GLSL type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Mat4(Mat4),
    Sampler2D(Sampler2D),
}

impl UniformValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Vec2(_) => "vec2",
            Self::Vec3(_) => "vec3",
            Self::Mat4(_) => "mat4",
            Self::Sampler2D(_) => "sampler2D",
        }
    }

    /// Writes the value to `location` of the bound program.
    pub fn upload(&self, device: &mut dyn GraphicsDevice, location: UniformLocation) {
        match *self {
            Self::Bool(value) => device.uniform_i32(location, i32::from(value)),
            Self::Int(value) => device.uniform_i32(location, value),
            Self::Float(value) => device.uniform_f32(location, value),
            Self::Vec2(value) => device.uniform_vec2(location, value),
            Self::Vec3(value) => device.uniform_vec3(location, value),
            Self::Mat4(ref value) => device.uniform_mat4(location, value),
            Self::Sampler2D(sampler) => {
                device.bind_texture(sampler.unit, sampler.texture);
                device.uniform_i32(location, sampler.unit as i32);
            }
        }
    }

    /// Uploads to the uniform `name` when the program declares it.
    pub fn upload_named(&self, device: &mut dyn GraphicsDevice, program: &Program, name: &str) {
        if let Some(active) = program.uniform(name) {
            self.upload(device, active.location);
        }
    }
}

/// Rust types that can live in a uniform slot.
pub trait UniformData: Sized {
    fn into_value(self) -> UniformValue;
    fn from_value(value: &UniformValue) -> Option<Self>;
}

macro_rules! uniform_data {
    ($ty:ty, $variant:ident) => {
        impl UniformData for $ty {
            fn into_value(self) -> UniformValue {
                UniformValue::$variant(self)
            }

            fn from_value(value: &UniformValue) -> Option<Self> {
                match value {
                    UniformValue::$variant(inner) => Some(*inner),
                    _ => None,
                }
            }
        }
    };
}

uniform_data!(bool, Bool);
uniform_data!(i32, Int);
uniform_data!(f32, Float);
uniform_data!(Vec2, Vec2);
uniform_data!(Vec3, Vec3);
uniform_data!(Mat4, Mat4);
uniform_data!(Sampler2D, Sampler2D);

impl UniformData for UniformValue {
    fn into_value(self) -> UniformValue {
        self
    }

    fn from_value(value: &UniformValue) -> Option<Self> {
        Some(*value)
    }
}

/// Something that knows how to write itself into a (possibly struct-typed) uniform.
///
/// `name` is the full uniform name, e.g. `lights[2]` for an array element.
pub trait UniformUpdater {
    fn update_data(&self, device: &mut dyn GraphicsDevice, name: &str, program: &Program);
}

/// Uniform value plus the location it resolved to in the owning program.
#[derive(Debug, Clone, PartialEq)]
pub struct Uniform {
    value: UniformValue,
    location: Option<UniformLocation>,
}

impl Uniform {
    pub(crate) fn resolve(name: &str, value: UniformValue, program: &Program) -> Self {
        Self {
            value,
            location: program.uniform(name).map(|active| active.location),
        }
    }

    pub fn value(&self) -> &UniformValue {
        &self.value
    }

    pub(crate) fn value_mut(&mut self) -> &mut UniformValue {
        &mut self.value
    }

    /// `None` when the compiled program does not use this uniform.
    pub fn location(&self) -> Option<UniformLocation> {
        self.location
    }

    pub fn upload(&self, device: &mut dyn GraphicsDevice) {
        if let Some(location) = self.location {
            self.value.upload(device, location);
        }
    }
}

/// Ordered list of named initial uniform values handed to a material.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformMap {
    entries: Vec<(String, UniformValue)>,
}

impl UniformMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the uniform `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl UniformData) {
        let name = name.into();
        let value = value.into_value();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl UniformData) -> Self {
        self.insert(name, value);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl IntoIterator for UniformMap {
    type Item = (String, UniformValue);
    type IntoIter = std::vec::IntoIter<(String, UniformValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

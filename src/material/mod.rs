//! Shader program plus the named uniform values it is drawn with.

pub mod presets;

use std::collections::BTreeMap;

use glam::Mat4;
use log::warn;

use crate::device::{Capability, GraphicsDevice};
use crate::error::{FrameworkError, Result};
use crate::program::Program;
use crate::uniform::{Uniform, UniformData, UniformMap, UniformUpdater, UniformValue};

pub use presets::{BasicOptions, TextureOptions, MAX_LIGHTS};

pub const MODEL_MATRIX: &str = "u_ModelMatrix";
pub const VIEW_MATRIX: &str = "u_ViewMatrix";
pub const PROJECTION_MATRIX: &str = "u_ProjectionMatrix";

/// Compiled program, its uniform values and render flags.
///
/// The set of uniform names is fixed when the material is built; only the
/// values change afterwards.
#[derive(Debug)]
pub struct Material {
    program: Program,
    uniforms: BTreeMap<String, Uniform>,
    double_sided: bool,
}

impl Material {
    /// Builds the program and resolves every uniform against it.
    ///
    /// The model, view and projection matrices are always present and start
    /// as identity; `uniforms` may not override their type.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        vertex_source: &str,
        fragment_source: &str,
        uniforms: UniformMap,
        double_sided: bool,
    ) -> Result<Self> {
        let program = Program::build(device, vertex_source, fragment_source)?;
        let mut resolved = BTreeMap::new();
        for name in [MODEL_MATRIX, VIEW_MATRIX, PROJECTION_MATRIX] {
            resolved.insert(
                name.to_string(),
                Uniform::resolve(name, UniformValue::Mat4(Mat4::IDENTITY), &program),
            );
        }
        for (name, value) in uniforms {
            if let Some(existing) = resolved.get(&name) {
                if existing.value().type_name() != value.type_name() {
                    warn!(
                        "ignoring {} value for reserved uniform {name}",
                        value.type_name()
                    );
                    continue;
                }
            }
            let uniform = Uniform::resolve(&name, value, &program);
            resolved.insert(name, uniform);
        }
        Ok(Self {
            program,
            uniforms: resolved,
            double_sided,
        })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn double_sided(&self) -> bool {
        self.double_sided
    }

    pub fn set_double_sided(&mut self, double_sided: bool) {
        self.double_sided = double_sided;
    }

    /// Current value of `name`, or `None` when unknown or of another type.
    pub fn uniform<T: UniformData>(&self, name: &str) -> Option<T> {
        self.uniforms
            .get(name)
            .and_then(|uniform| T::from_value(uniform.value()))
    }

    /// Replaces the value of `name`.
    ///
    /// Unknown names are ignored so one call site can drive materials that
    /// only declare part of a uniform set. A value of the wrong type is
    /// dropped with a warning.
    pub fn set_uniform<T: UniformData>(&mut self, name: &str, value: T) {
        let Some(uniform) = self.uniforms.get_mut(name) else {
            return;
        };
        let value = value.into_value();
        let slot = uniform.value_mut();
        if std::mem::discriminant(slot) != std::mem::discriminant(&value) {
            warn!(
                "uniform {name} holds a {} but was given a {}",
                slot.type_name(),
                value.type_name()
            );
            return;
        }
        *slot = value;
    }

    pub fn uniform_names(&self) -> impl Iterator<Item = &str> {
        self.uniforms.keys().map(String::as_str)
    }

    /// Whether the compiled program declares `name`.
    pub fn has_uniform(&self, name: &str) -> bool {
        self.program.has_uniform(name)
    }

    /// Writes every uniform the program declares; the program must be in use.
    pub fn upload_data(&self, device: &mut dyn GraphicsDevice) {
        for uniform in self.uniforms.values() {
            uniform.upload(device);
        }
    }

    /// Back faces are culled unless the material is double sided.
    pub fn update_render_settings(&self, device: &mut dyn GraphicsDevice) {
        device.set_enabled(Capability::CullFace, !self.double_sided);
    }

    /// Declared length of the struct array `name`, `None` when the program
    /// has no such array.
    pub fn array_capacity(&self, name: &str) -> Option<usize> {
        self.program.array_len(name)
    }

    /// Writes `items.len()` to `count_name` and lets each item fill `array_name[i]`.
    ///
    /// Fails without writing anything when `items` outgrows the array the
    /// program declares.
    pub fn update_array<U: UniformUpdater>(
        &self,
        device: &mut dyn GraphicsDevice,
        items: &[U],
        array_name: &str,
        count_name: &str,
    ) -> Result<()> {
        if let Some(capacity) = self.array_capacity(array_name) {
            if items.len() > capacity {
                return Err(FrameworkError::ArrayOverflow {
                    name: array_name.to_string(),
                    count: items.len(),
                    capacity,
                });
            }
        }
        UniformValue::Int(items.len() as i32).upload_named(device, &self.program, count_name);
        for (i, item) in items.iter().enumerate() {
            item.update_data(device, &format!("{array_name}[{i}]"), &self.program);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::device::{RecordedValue, RecordingDevice};
    use crate::scene::Light;

    const VERTEX: &str = r#"
        in vec4 a_position;
        uniform mat4 u_ProjectionMatrix;
        uniform mat4 u_ViewMatrix;
        uniform mat4 u_ModelMatrix;
        void main() { gl_Position = u_ProjectionMatrix * u_ViewMatrix * u_ModelMatrix * a_position; }
    "#;

    const FRAGMENT: &str = r#"
        struct Light { int lightType; vec3 color; };
        uniform Light lights[2];
        uniform int lightCount;
        uniform vec3 u_BaseColor;
        out vec4 fragColor;
        void main() { fragColor = vec4(u_BaseColor, 1.0); }
    "#;

    fn material(device: &mut RecordingDevice) -> Material {
        let uniforms = UniformMap::new()
            .with("u_BaseColor", Vec3::ONE)
            .with("u_Unused", true);
        Material::new(device, VERTEX, FRAGMENT, uniforms, false).unwrap()
    }

    #[test]
    fn reserved_matrices_start_as_identity() {
        let mut device = RecordingDevice::default();
        let material = material(&mut device);
        for name in [MODEL_MATRIX, VIEW_MATRIX, PROJECTION_MATRIX] {
            assert_eq!(material.uniform::<Mat4>(name), Some(Mat4::IDENTITY));
        }
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut device = RecordingDevice::default();
        let mut material = material(&mut device);
        material.set_uniform("u_BaseColor", Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(
            material.uniform::<Vec3>("u_BaseColor"),
            Some(Vec3::new(1.0, 0.0, 0.0))
        );
    }

    #[test]
    fn unknown_names_and_wrong_types_are_ignored() {
        let mut device = RecordingDevice::default();
        let mut material = material(&mut device);
        material.set_uniform("u_Nope", 1.0f32);
        assert!(material.uniform::<f32>("u_Nope").is_none());
        material.set_uniform("u_BaseColor", false);
        assert_eq!(material.uniform::<Vec3>("u_BaseColor"), Some(Vec3::ONE));
    }

    #[test]
    fn upload_skips_undeclared_uniforms() {
        let mut device = RecordingDevice::default();
        let material = material(&mut device);
        material.program().use_program(&mut device);
        device.take_commands();
        material.upload_data(&mut device);
        assert_eq!(device.commands().len(), 4);
        assert_eq!(
            device.last_uniform("u_BaseColor"),
            Some(&RecordedValue::Vec3(Vec3::ONE))
        );
        assert!(device.uniform_writes("u_Unused").is_empty());
    }

    #[test]
    fn render_settings_follow_double_sided() {
        let mut device = RecordingDevice::default();
        let mut material = material(&mut device);
        material.update_render_settings(&mut device);
        assert!(device.is_enabled(Capability::CullFace));
        material.set_double_sided(true);
        material.update_render_settings(&mut device);
        assert!(!device.is_enabled(Capability::CullFace));
    }

    #[test]
    fn empty_array_writes_zero_count() {
        let mut device = RecordingDevice::default();
        let material = material(&mut device);
        material.program().use_program(&mut device);
        let lights: Vec<Light> = Vec::new();
        material
            .update_array(&mut device, &lights, "lights", "lightCount")
            .unwrap();
        assert_eq!(device.last_uniform("lightCount"), Some(&RecordedValue::Int(0)));
    }

    #[test]
    fn array_items_fill_indexed_slots() {
        let mut device = RecordingDevice::default();
        let material = material(&mut device);
        material.program().use_program(&mut device);
        let lights = vec![Light::ambient(Vec3::splat(0.2)), Light::ambient(Vec3::ONE)];
        material
            .update_array(&mut device, &lights, "lights", "lightCount")
            .unwrap();
        assert_eq!(device.last_uniform("lightCount"), Some(&RecordedValue::Int(2)));
        assert_eq!(
            device.last_uniform("lights[1].color"),
            Some(&RecordedValue::Vec3(Vec3::ONE))
        );
    }

    #[test]
    fn array_past_declared_length_is_rejected() {
        let mut device = RecordingDevice::default();
        let material = material(&mut device);
        assert_eq!(material.array_capacity("lights"), Some(2));
        material.program().use_program(&mut device);
        device.take_commands();
        let lights: Vec<Light> = (0..3).map(|_| Light::ambient(Vec3::ONE)).collect();
        assert_eq!(
            material.update_array(&mut device, &lights, "lights", "lightCount"),
            Err(FrameworkError::ArrayOverflow {
                name: "lights".to_string(),
                count: 3,
                capacity: 2,
            })
        );
        assert!(device.commands().is_empty());
    }
}

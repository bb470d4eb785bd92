use std::cell::RefCell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::node::{Node, NodeKind};
use crate::device::GraphicsDevice;
use crate::program::Program;
use crate::uniform::{UniformUpdater, UniformValue};

pub const DEFAULT_DIRECTION: Vec3 = Vec3::NEG_Y;
pub const DEFAULT_ATTENUATION: Vec3 = Vec3::new(1.0, 0.0, 0.1);

/// Discriminator written to the `lightType` member of a light uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightKind {
    Ambient,
    Directional,
    Point,
}

impl LightKind {
    pub const ALL: [LightKind; 3] = [Self::Ambient, Self::Directional, Self::Point];

    pub fn index(self) -> i32 {
        match self {
            Self::Ambient => 0,
            Self::Directional => 1,
            Self::Point => 2,
        }
    }

    pub fn glsl_name(self) -> &'static str {
        match self {
            Self::Ambient => "AMBIENT",
            Self::Directional => "DIRECTIONAL",
            Self::Point => "POINT",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.glsl_name().eq_ignore_ascii_case(name))
    }

    /// `const int` declarations matching [`LightKind::index`], for shader sources.
    pub fn glsl_declarations() -> String {
        Self::ALL
            .iter()
            .map(|kind| format!("const int {} = {};", kind.glsl_name(), kind.index()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub(crate) struct LightData {
    kind: Option<LightKind>,
    color: Vec3,
    attenuation: Vec3,
}

/// Scene node that feeds one slot of a shader's light array.
#[derive(Clone)]
pub struct Light {
    node: Node,
    data: Rc<RefCell<LightData>>,
}

impl fmt::Debug for Light {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.borrow();
        f.debug_struct("Light")
            .field("node", &self.node)
            .field("kind", &data.kind)
            .field("color", &data.color)
            .field("attenuation", &data.attenuation)
            .finish()
    }
}

impl Deref for Light {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.node
    }
}

impl Light {
    /// Light without a kind; shaders receive `-1` as its type and ignore it.
    pub fn untyped(color: Vec3) -> Self {
        Self::with_kind(None, color, Vec3::new(1.0, 0.0, 0.0))
    }

    pub fn ambient(color: Vec3) -> Self {
        Self::with_kind(Some(LightKind::Ambient), color, Vec3::new(1.0, 0.0, 0.0))
    }

    pub fn directional(color: Vec3, direction: Vec3) -> Self {
        let light = Self::with_kind(
            Some(LightKind::Directional),
            color,
            Vec3::new(1.0, 0.0, 0.0),
        );
        light.set_direction(direction);
        light
    }

    pub fn point(color: Vec3, position: Vec3, attenuation: Vec3) -> Self {
        let light = Self::with_kind(Some(LightKind::Point), color, attenuation);
        light.set_position(position);
        light
    }

    fn with_kind(kind: Option<LightKind>, color: Vec3, attenuation: Vec3) -> Self {
        let data = Rc::new(RefCell::new(LightData {
            kind,
            color,
            attenuation,
        }));
        Self {
            node: Node::with_kind(None, NodeKind::Light(data.clone())),
            data,
        }
    }

    pub(crate) fn from_parts(node: Node, data: Rc<RefCell<LightData>>) -> Self {
        Self { node, data }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn kind(&self) -> Option<LightKind> {
        self.data.borrow().kind
    }

    pub fn color(&self) -> Vec3 {
        self.data.borrow().color
    }

    pub fn set_color(&self, color: Vec3) {
        self.data.borrow_mut().color = color;
    }

    /// Constant, linear and quadratic falloff coefficients.
    pub fn attenuation(&self) -> Vec3 {
        self.data.borrow().attenuation
    }

    pub fn set_attenuation(&self, attenuation: Vec3) {
        self.data.borrow_mut().attenuation = attenuation;
    }
}

impl UniformUpdater for Light {
    /// Writes `name.lightType` and `name.color`, then the kind-specific members
    /// in world space: `direction` for directional lights, `position` and
    /// `attenuation` for point lights.
    fn update_data(&self, device: &mut dyn GraphicsDevice, name: &str, program: &Program) {
        let (kind, color, attenuation) = {
            let data = self.data.borrow();
            (data.kind, data.color, data.attenuation)
        };
        let member = |field: &str| format!("{name}.{field}");

        UniformValue::Int(kind.map_or(-1, LightKind::index)).upload_named(
            device,
            program,
            &member("lightType"),
        );
        UniformValue::Vec3(color).upload_named(device, program, &member("color"));
        match kind {
            Some(LightKind::Directional) => {
                UniformValue::Vec3(self.world_direction()).upload_named(
                    device,
                    program,
                    &member("direction"),
                );
            }
            Some(LightKind::Point) => {
                UniformValue::Vec3(self.world_position()).upload_named(
                    device,
                    program,
                    &member("position"),
                );
                UniformValue::Vec3(attenuation).upload_named(
                    device,
                    program,
                    &member("attenuation"),
                );
            }
            Some(LightKind::Ambient) | None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{RecordedValue, RecordingDevice};

    const VERTEX: &str = "struct Light { int lightType; vec3 color; vec3 direction; vec3 position; vec3 attenuation; };\nuniform Light lights[2];\nin vec4 a_position;\nvoid main() { gl_Position = a_position; }";
    const FRAGMENT: &str = "out vec4 c;\nvoid main() { c = vec4(1); }";

    fn bound_program(device: &mut RecordingDevice) -> Program {
        let program = Program::build(device, VERTEX, FRAGMENT).unwrap();
        program.use_program(device);
        program
    }

    #[test]
    fn declarations_follow_kind_indices() {
        assert_eq!(
            LightKind::glsl_declarations(),
            "const int AMBIENT = 0;\nconst int DIRECTIONAL = 1;\nconst int POINT = 2;"
        );
        assert_eq!(LightKind::from_name("point"), Some(LightKind::Point));
    }

    #[test]
    fn directional_light_uploads_its_direction() {
        let mut device = RecordingDevice::default();
        let program = bound_program(&mut device);
        let light = Light::directional(Vec3::ONE, Vec3::new(0.0, 0.0, -2.0));
        light.update_data(&mut device, "lights[1]", &program);

        assert_eq!(
            device.last_uniform("lights[1].lightType"),
            Some(&RecordedValue::Int(1))
        );
        match device.last_uniform("lights[1].direction") {
            Some(RecordedValue::Vec3(direction)) => {
                assert!(direction.abs_diff_eq(Vec3::NEG_Z, 1e-5))
            }
            other => panic!("unexpected direction upload {other:?}"),
        }
        assert!(device.last_uniform("lights[1].position").is_none());
    }

    #[test]
    fn point_light_uploads_position_and_attenuation() {
        let mut device = RecordingDevice::default();
        let program = bound_program(&mut device);
        let light = Light::point(Vec3::X, Vec3::new(1.0, 2.0, 3.0), DEFAULT_ATTENUATION);
        light.update_data(&mut device, "lights[0]", &program);
        assert_eq!(
            device.last_uniform("lights[0].position"),
            Some(&RecordedValue::Vec3(Vec3::new(1.0, 2.0, 3.0)))
        );
        assert_eq!(
            device.last_uniform("lights[0].attenuation"),
            Some(&RecordedValue::Vec3(DEFAULT_ATTENUATION))
        );
    }

    #[test]
    fn ambient_and_untyped_write_only_type_and_color() {
        let mut device = RecordingDevice::default();
        let program = bound_program(&mut device);
        Light::ambient(Vec3::splat(0.2)).update_data(&mut device, "lights[0]", &program);
        Light::untyped(Vec3::ONE).update_data(&mut device, "lights[1]", &program);
        assert_eq!(
            device.last_uniform("lights[0].color"),
            Some(&RecordedValue::Vec3(Vec3::splat(0.2)))
        );
        assert_eq!(
            device.last_uniform("lights[1].lightType"),
            Some(&RecordedValue::Int(-1))
        );
        assert!(device.last_uniform("lights[0].direction").is_none());
        assert!(device.last_uniform("lights[1].attenuation").is_none());
    }
}

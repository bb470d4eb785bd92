//! XML scene descriptions in the authoring-tool format.
//!
//! ```xml
//! <scene>
//!     <object>
//!         <name>Crate</name>
//!         <type>mesh</type>
//!         <shape>box</shape>
//!         <material>flat</material>
//!         <position>0 0.5 0</position>
//!         <rotation>0 45 0</rotation>
//!         <color>255 200 120</color>
//!     </object>
//! </scene>
//! ```

use std::collections::HashMap;
use std::rc::Rc;

use glam::{EulerRot, Mat4, Quat, Vec3};
use log::info;
use roxmltree::{Document, Node as XmlNode};
use serde::{Deserialize, Serialize};

use crate::device::{DrawMode, GraphicsDevice};
use crate::error::{FrameworkError, Result};
use crate::geometry::{shapes, Geometry};
use crate::material::presets::{self, BasicOptions};
use crate::material::Material;
use crate::scene::light::{DEFAULT_ATTENUATION, DEFAULT_DIRECTION};
use crate::scene::{Camera, Light, LightKind, Mesh, Node, Perspective};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    #[default]
    Mesh,
    Light,
    Camera,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    #[default]
    Box,
    Rectangle,
    Sphere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    #[default]
    Basic,
    Flat,
    Normal,
}

/// Parsed scene file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SceneDescription {
    pub objects: Vec<ObjectDescription>,
}

/// One `<object>` element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescription {
    pub name: String,
    #[serde(rename = "type", default)]
    pub object_type: ObjectType,
    #[serde(default)]
    pub shape: Shape,
    #[serde(default)]
    pub material: MaterialKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<LightKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DrawMode>,
    #[serde(default = "default_color")]
    pub color: Vec3,
    #[serde(default)]
    pub vertex_colors: bool,
    #[serde(default)]
    pub position: Vec3,
    /// Euler angles in degrees, applied Z * Y * X.
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Vec3>,
    #[serde(default = "default_fov")]
    pub fov: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Default for ObjectDescription {
    fn default() -> Self {
        Self {
            name: String::new(),
            object_type: ObjectType::default(),
            shape: Shape::default(),
            material: MaterialKind::default(),
            light: None,
            mode: None,
            color: default_color(),
            vertex_colors: false,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: default_scale(),
            direction: None,
            target: None,
            fov: default_fov(),
            parent: None,
        }
    }
}

fn default_color() -> Vec3 {
    Vec3::ONE
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

fn default_fov() -> f32 {
    60.0
}

impl ObjectDescription {
    /// Local transform from position, rotation and scale.
    pub fn transform(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::ZYX,
            self.rotation.z.to_radians(),
            self.rotation.y.to_radians(),
            self.rotation.x.to_radians(),
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

/// Graph built from a description.
#[derive(Debug)]
pub struct BuiltScene {
    pub root: Node,
    /// First camera in document order.
    pub camera: Option<Camera>,
}

impl SceneDescription {
    /// Parses the scene XML produced by the authoring tools.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml)
            .map_err(|err| FrameworkError::Description(format!("invalid scene XML: {err}")))?;
        let mut objects = Vec::new();

        for node in document.descendants().filter(|n| n.has_tag_name("object")) {
            let mut object = ObjectDescription {
                name: required_text(&node, "name")?,
                ..ObjectDescription::default()
            };
            object.object_type =
                parse_keyword(optional_text(&node, "type"), object.object_type, "type", |text| {
                    match text {
                        "mesh" => Some(ObjectType::Mesh),
                        "light" => Some(ObjectType::Light),
                        "camera" => Some(ObjectType::Camera),
                        "group" => Some(ObjectType::Group),
                        _ => None,
                    }
                })?;
            object.shape = parse_keyword(optional_text(&node, "shape"), object.shape, "shape", |text| {
                match text {
                    "box" => Some(Shape::Box),
                    "rectangle" => Some(Shape::Rectangle),
                    "sphere" => Some(Shape::Sphere),
                    _ => None,
                }
            })?;
            object.material = parse_keyword(
                optional_text(&node, "material"),
                object.material,
                "material",
                |text| match text {
                    "basic" => Some(MaterialKind::Basic),
                    "flat" => Some(MaterialKind::Flat),
                    "normal" => Some(MaterialKind::Normal),
                    _ => None,
                },
            )?;
            object.light = optional_text(&node, "light")
                .map(|text| {
                    LightKind::from_name(&text).ok_or_else(|| {
                        FrameworkError::Description(format!("unknown light '{text}'"))
                    })
                })
                .transpose()?;
            object.mode = optional_text(&node, "mode")
                .map(|text| parse_mode(&text))
                .transpose()?;
            object.color = parse_color(optional_text(&node, "color"), object.color)?;
            object.vertex_colors =
                parse_bool(optional_text(&node, "vertexColors"), object.vertex_colors)?;
            object.position = parse_vec3(optional_text(&node, "position"), object.position)?;
            object.rotation = parse_vec3(optional_text(&node, "rotation"), object.rotation)?;
            object.scale = parse_vec3(optional_text(&node, "scale"), object.scale)?;
            object.direction = optional_text(&node, "direction")
                .map(|text| parse_vec3(Some(text), Vec3::ZERO))
                .transpose()?;
            object.target = optional_text(&node, "target")
                .map(|text| parse_vec3(Some(text), Vec3::ZERO))
                .transpose()?;
            object.fov = parse_f32(optional_text(&node, "fov"), object.fov)?;
            object.parent = optional_text(&node, "parent");
            objects.push(object);
        }

        Ok(Self { objects })
    }

    pub fn find(&self, name: &str) -> Option<&ObjectDescription> {
        self.objects.iter().find(|object| object.name == name)
    }

    /// Creates every object and links it under its parent, or under a new root.
    ///
    /// Meshes of the same shape share one geometry.
    pub fn build(&self, device: &mut dyn GraphicsDevice) -> Result<BuiltScene> {
        let root = Node::named("root");
        let mut camera = None;
        let mut geometries: HashMap<Shape, Rc<Geometry>> = HashMap::new();
        let mut nodes: Vec<(Node, Option<&str>)> = Vec::with_capacity(self.objects.len());

        for object in &self.objects {
            let node = match object.object_type {
                ObjectType::Group => Node::new(),
                ObjectType::Camera => {
                    let built = Camera::new(Perspective {
                        angle_of_view: object.fov.to_radians(),
                        ..Perspective::default()
                    });
                    let node = built.node().clone();
                    camera.get_or_insert(built);
                    node
                }
                ObjectType::Light => build_light(object).node().clone(),
                ObjectType::Mesh => {
                    let geometry = match geometries.get(&object.shape) {
                        Some(geometry) => geometry.clone(),
                        None => {
                            let geometry = Rc::new(build_geometry(device, object.shape)?);
                            geometries.insert(object.shape, geometry.clone());
                            geometry
                        }
                    };
                    let material = build_material(device, object)?;
                    let mesh = Mesh::with_mode(
                        device,
                        geometry,
                        material,
                        object.mode.unwrap_or_default(),
                    )?;
                    mesh.node().clone()
                }
            };
            node.set_name(object.name.clone());
            node.set_transform(object.transform());
            nodes.push((node, object.parent.as_deref()));
        }

        for (node, parent) in &nodes {
            let parent_node = match parent {
                Some(name) => nodes
                    .iter()
                    .find(|(candidate, _)| candidate.name().as_deref() == Some(*name))
                    .map(|(candidate, _)| candidate)
                    .ok_or_else(|| {
                        FrameworkError::Description(format!("unknown parent '{name}'"))
                    })?,
                None => &root,
            };
            parent_node.add(node)?;
        }

        // Orientation needs the final world position, so it comes after linking.
        for ((node, _), object) in nodes.iter().zip(&self.objects) {
            if let Some(target) = object.target {
                node.look_at(target);
            } else if let Some(direction) = object.direction {
                node.set_direction(direction);
            } else if object.object_type == ObjectType::Light
                && object.light == Some(LightKind::Directional)
            {
                node.set_direction(DEFAULT_DIRECTION);
            }
        }

        info!(
            "built scene with {} objects ({} shared geometries)",
            nodes.len(),
            geometries.len()
        );
        Ok(BuiltScene { root, camera })
    }
}

fn build_light(object: &ObjectDescription) -> Light {
    match object.light.unwrap_or(LightKind::Point) {
        LightKind::Ambient => Light::ambient(object.color),
        LightKind::Directional => Light::directional(object.color, DEFAULT_DIRECTION),
        LightKind::Point => Light::point(object.color, object.position, DEFAULT_ATTENUATION),
    }
}

fn build_geometry(device: &mut dyn GraphicsDevice, shape: Shape) -> Result<Geometry> {
    match shape {
        Shape::Box => shapes::box_geometry(device, 1.0, 1.0, 1.0),
        Shape::Rectangle => shapes::rectangle_geometry(device, 1.0, 1.0),
        Shape::Sphere => shapes::sphere_geometry(device, 0.5, 32, 16),
    }
}

fn build_material(device: &mut dyn GraphicsDevice, object: &ObjectDescription) -> Result<Material> {
    match object.material {
        MaterialKind::Basic => presets::basic(
            device,
            &BasicOptions {
                base_color: object.color,
                use_vertex_colors: object.vertex_colors,
                ..BasicOptions::default()
            },
        ),
        MaterialKind::Flat => presets::flat(device, None, object.color),
        MaterialKind::Normal => presets::normal(device),
    }
}

fn required_text(node: &XmlNode<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag)
        .ok_or_else(|| FrameworkError::Description(format!("<{tag}> tag is missing")))
}

fn optional_text(node: &XmlNode<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_keyword<T>(
    value: Option<String>,
    default: T,
    what: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T> {
    match value {
        Some(value) => parse(&value.to_ascii_lowercase())
            .ok_or_else(|| FrameworkError::Description(format!("unknown {what} '{value}'"))),
        None => Ok(default),
    }
}

fn parse_mode(value: &str) -> Result<DrawMode> {
    Ok(match value.to_ascii_lowercase().as_str() {
        "points" => DrawMode::Points,
        "lines" => DrawMode::Lines,
        "linestrip" => DrawMode::LineStrip,
        "lineloop" => DrawMode::LineLoop,
        "triangles" => DrawMode::Triangles,
        "trianglestrip" => DrawMode::TriangleStrip,
        "trianglefan" => DrawMode::TriangleFan,
        _ => {
            return Err(FrameworkError::Description(format!(
                "unknown draw mode '{value}'"
            )))
        }
    })
}

fn components(value: &str, what: &str) -> Result<[f32; 3]> {
    let numbers = value
        .split_whitespace()
        .map(|component| {
            component.parse::<f32>().map_err(|err| {
                FrameworkError::Description(format!("bad {what} component '{component}': {err}"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    match numbers.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(FrameworkError::Description(format!(
            "{what} needs 3 components, got {}",
            numbers.len()
        ))),
    }
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => Ok(Vec3::from_array(components(&value, "vector")?)),
        None => Ok(default),
    }
}

fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => Ok(Vec3::from_array(components(&value, "color")?) / 255.0),
        None => Ok(default),
    }
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| FrameworkError::Description(format!("failed to parse float: {err}"))),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, default: bool) -> Result<bool> {
    match value.as_deref() {
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(FrameworkError::Description(format!(
            "expected true or false, got '{other}'"
        ))),
        None => Ok(default),
    }
}

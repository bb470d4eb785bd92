use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use glam::{Mat3, Mat4, Vec3};
use log::debug;
use serde::{Deserialize, Serialize};

use super::camera::{Camera, CameraData};
use super::light::{Light, LightData};
use super::mesh::{Mesh, MeshData};
use crate::error::{FrameworkError, Result};

/// Forward axis of an untransformed node.
pub const FORWARD: Vec3 = Vec3::NEG_Z;
/// World up used by [`Node::look_at`].
pub const WORLD_UP: Vec3 = Vec3::Y;

/// Space a transform is applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransformType {
    /// Post-multiply: move along the node's own axes.
    #[default]
    Local,
    /// Pre-multiply: move along the parent's axes.
    Global,
}

/// Capability payload attached to a node.
#[derive(Clone)]
pub(crate) enum NodeKind {
    Group,
    Camera(Rc<RefCell<CameraData>>),
    Light(Rc<RefCell<LightData>>),
    Mesh(Rc<RefCell<MeshData>>),
}

impl NodeKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Camera(_) => "camera",
            Self::Light(_) => "light",
            Self::Mesh(_) => "mesh",
        }
    }
}

pub(crate) struct NodeData {
    name: Option<String>,
    transform: Mat4,
    parent: Option<Weak<RefCell<NodeData>>>,
    children: Vec<Node>,
    kind: NodeKind,
}

/// Shared handle to a node of the scene graph.
///
/// Cloning the handle does not clone the node. A node owns its children and
/// holds only a weak link to its parent, so dropping the last handle to a
/// root drops the whole subtree.
#[derive(Clone)]
pub struct Node {
    data: Rc<RefCell<NodeData>>,
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.borrow();
        f.debug_struct("Node")
            .field("name", &data.name)
            .field("kind", &data.kind.label())
            .field("transform", &data.transform)
            .field("children", &data.children.len())
            .finish()
    }
}

impl Node {
    /// Empty group node.
    pub fn new() -> Self {
        Self::with_kind(None, NodeKind::Group)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::with_kind(Some(name.into()), NodeKind::Group)
    }

    pub(crate) fn with_kind(name: Option<String>, kind: NodeKind) -> Self {
        Self {
            data: Rc::new(RefCell::new(NodeData {
                name,
                transform: Mat4::IDENTITY,
                parent: None,
                children: Vec::new(),
                kind,
            })),
        }
    }

    pub fn name(&self) -> Option<String> {
        self.data.borrow().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.data.borrow_mut().name = Some(name.into());
    }

    /// `"group"`, `"camera"`, `"light"` or `"mesh"`.
    pub fn kind_label(&self) -> &'static str {
        self.data.borrow().kind.label()
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    pub fn parent(&self) -> Option<Node> {
        self.data
            .borrow()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|data| Node { data })
    }

    pub fn children(&self) -> Vec<Node> {
        self.data.borrow().children.clone()
    }

    /// Appends `child`, detaching it from its previous parent first.
    ///
    /// Fails with [`FrameworkError::Cycle`] when `child` is this node or one
    /// of its ancestors.
    pub fn add(&self, child: &Node) -> Result<()> {
        if self.ptr_eq(child) || self.has_ancestor(child) {
            return Err(FrameworkError::Cycle(format!(
                "cannot add {} beneath itself",
                child.display_name()
            )));
        }
        child.detach();
        child.data.borrow_mut().parent = Some(Rc::downgrade(&self.data));
        self.data.borrow_mut().children.push(child.clone());
        Ok(())
    }

    /// Removes a direct child; anything else is [`FrameworkError::NotFound`].
    pub fn remove(&self, child: &Node) -> Result<()> {
        let position = self
            .data
            .borrow()
            .children
            .iter()
            .position(|existing| existing.ptr_eq(child));
        let Some(position) = position else {
            return Err(FrameworkError::NotFound(format!(
                "{} is not a child of {}",
                child.display_name(),
                self.display_name()
            )));
        };
        self.data.borrow_mut().children.remove(position);
        child.data.borrow_mut().parent = None;
        Ok(())
    }

    /// Removes this node from its parent, if any.
    pub fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent
                .data
                .borrow_mut()
                .children
                .retain(|existing| !existing.ptr_eq(self));
        }
        self.data.borrow_mut().parent = None;
    }

    fn has_ancestor(&self, candidate: &Node) -> bool {
        let mut current = self.parent();
        while let Some(node) = current {
            if node.ptr_eq(candidate) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Local transform relative to the parent.
    pub fn transform(&self) -> Mat4 {
        self.data.borrow().transform
    }

    pub fn set_transform(&self, transform: Mat4) {
        self.data.borrow_mut().transform = transform;
    }

    /// Composition of every ancestor's local transform with this one.
    pub fn world_matrix(&self) -> Mat4 {
        let (parent, transform) = {
            let data = self.data.borrow();
            (data.parent.as_ref().and_then(Weak::upgrade), data.transform)
        };
        match parent {
            Some(data) => Node { data }.world_matrix() * transform,
            None => transform,
        }
    }

    /// Breadth-first walk over this node and everything below it.
    pub fn descendants(&self) -> Descendants {
        Descendants {
            queue: VecDeque::from([self.clone()]),
        }
    }

    /// Depth-first search for the first node called `name`, starting with this one.
    pub fn find_by_name(&self, name: &str) -> Option<Node> {
        if self.data.borrow().name.as_deref() == Some(name) {
            return Some(self.clone());
        }
        self.children()
            .iter()
            .find_map(|child| child.find_by_name(name))
    }

    pub fn apply_matrix(&self, matrix: Mat4, transform_type: TransformType) {
        let mut data = self.data.borrow_mut();
        data.transform = match transform_type {
            TransformType::Local => data.transform * matrix,
            TransformType::Global => matrix * data.transform,
        };
    }

    pub fn translate(&self, x: f32, y: f32, z: f32, transform_type: TransformType) {
        self.apply_matrix(Mat4::from_translation(Vec3::new(x, y, z)), transform_type);
    }

    pub fn rotate_x(&self, angle: f32, transform_type: TransformType) {
        self.apply_matrix(Mat4::from_rotation_x(angle), transform_type);
    }

    pub fn rotate_y(&self, angle: f32, transform_type: TransformType) {
        self.apply_matrix(Mat4::from_rotation_y(angle), transform_type);
    }

    pub fn rotate_z(&self, angle: f32, transform_type: TransformType) {
        self.apply_matrix(Mat4::from_rotation_z(angle), transform_type);
    }

    /// Uniform scale.
    pub fn scale(&self, factor: f32, transform_type: TransformType) {
        self.apply_matrix(Mat4::from_scale(Vec3::splat(factor)), transform_type);
    }

    /// Translation column of the local transform.
    pub fn position(&self) -> Vec3 {
        self.data.borrow().transform.w_axis.truncate()
    }

    pub fn set_position(&self, position: Vec3) {
        self.data.borrow_mut().transform.w_axis = position.extend(1.0);
    }

    pub fn world_position(&self) -> Vec3 {
        self.world_matrix().w_axis.truncate()
    }

    /// Upper-left 3x3 block of the local transform.
    pub fn rotation_matrix(&self) -> Mat3 {
        Mat3::from_mat4(self.transform())
    }

    /// Local forward vector.
    pub fn direction(&self) -> Vec3 {
        self.rotation_matrix() * FORWARD
    }

    /// Forward vector in world space.
    pub fn world_direction(&self) -> Vec3 {
        Mat3::from_mat4(self.world_matrix()) * FORWARD
    }

    /// Turns the node to face along `direction`.
    pub fn set_direction(&self, direction: Vec3) {
        self.look_at(self.world_position() + direction);
    }

    /// Rotates the node so its forward axis points from its world position to `target`.
    ///
    /// The local translation is kept; rotation and scale are replaced. When
    /// `target` coincides with the node's position the orientation is left
    /// untouched, and when it lies straight above or below, +z stands in for
    /// the world up vector.
    pub fn look_at(&self, target: Vec3) {
        let eye = self.world_position();
        let Some(rotation) = look_rotation(eye, target) else {
            debug!(
                "look_at target coincides with the position of {}; orientation kept",
                self.display_name()
            );
            return;
        };
        let mut data = self.data.borrow_mut();
        let translation = data.transform.w_axis;
        data.transform = Mat4::from_mat3(rotation);
        data.transform.w_axis = translation;
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.data.borrow().kind, NodeKind::Mesh(_))
    }

    pub fn is_light(&self) -> bool {
        matches!(self.data.borrow().kind, NodeKind::Light(_))
    }

    pub fn is_camera(&self) -> bool {
        matches!(self.data.borrow().kind, NodeKind::Camera(_))
    }

    /// Renderable view of this node, if it is a mesh.
    pub fn as_mesh(&self) -> Option<Mesh> {
        match &self.data.borrow().kind {
            NodeKind::Mesh(data) => Some(Mesh::from_parts(self.clone(), data.clone())),
            _ => None,
        }
    }

    /// Light-emitting view of this node, if it is a light.
    pub fn as_light(&self) -> Option<Light> {
        match &self.data.borrow().kind {
            NodeKind::Light(data) => Some(Light::from_parts(self.clone(), data.clone())),
            _ => None,
        }
    }

    pub fn as_camera(&self) -> Option<Camera> {
        match &self.data.borrow().kind {
            NodeKind::Camera(data) => Some(Camera::from_parts(self.clone(), data.clone())),
            _ => None,
        }
    }

    pub(crate) fn display_name(&self) -> String {
        let data = self.data.borrow();
        match &data.name {
            Some(name) => format!("{} '{name}'", data.kind.label()),
            None => format!("unnamed {}", data.kind.label()),
        }
    }
}

fn look_rotation(eye: Vec3, target: Vec3) -> Option<Mat3> {
    let back = (eye - target).try_normalize()?;
    let up = if back.cross(WORLD_UP).length_squared() < 1e-8 {
        Vec3::Z
    } else {
        WORLD_UP
    };
    let right = up.cross(back).normalize();
    let up = back.cross(right);
    Some(Mat3::from_cols(right, up, back))
}

/// Lazy breadth-first traversal returned by [`Node::descendants`].
pub struct Descendants {
    queue: VecDeque<Node>,
}

impl Iterator for Descendants {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let node = self.queue.pop_front()?;
        self.queue.extend(node.children());
        Some(node)
    }
}

use std::cell::RefCell;
use std::ops::Deref;
use std::rc::Rc;

use glam::Mat4;
use log::warn;
use serde::{Deserialize, Serialize};

use super::node::{Node, NodeKind};

/// Perspective parameters fixed when a camera is created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Perspective {
    /// Vertical field of view in radians.
    pub angle_of_view: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Perspective {
    fn default() -> Self {
        Self {
            angle_of_view: 60f32.to_radians(),
            near: 0.1,
            far: 1000.0,
        }
    }
}

pub(crate) struct CameraData {
    perspective: Perspective,
    aspect_ratio: f32,
    projection: Mat4,
    view: Mat4,
}

/// Scene node that owns a perspective projection and a view matrix.
#[derive(Clone)]
pub struct Camera {
    node: Node,
    data: Rc<RefCell<CameraData>>,
}

impl std::fmt::Debug for Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data.borrow();
        f.debug_struct("Camera")
            .field("node", &self.node)
            .field("perspective", &data.perspective)
            .field("aspect_ratio", &data.aspect_ratio)
            .finish()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Perspective::default())
    }
}

impl Deref for Camera {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.node
    }
}

impl Camera {
    pub fn new(perspective: Perspective) -> Self {
        let aspect_ratio = 1.0;
        let data = Rc::new(RefCell::new(CameraData {
            perspective,
            aspect_ratio,
            projection: projection(&perspective, aspect_ratio),
            view: Mat4::IDENTITY,
        }));
        Self {
            node: Node::with_kind(None, NodeKind::Camera(data.clone())),
            data,
        }
    }

    pub(crate) fn from_parts(node: Node, data: Rc<RefCell<CameraData>>) -> Self {
        Self { node, data }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn perspective(&self) -> Perspective {
        self.data.borrow().perspective
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.data.borrow().aspect_ratio
    }

    /// Stores the aspect ratio and rebuilds the projection matrix from it.
    pub fn set_aspect_ratio(&self, aspect_ratio: f32) {
        let mut data = self.data.borrow_mut();
        data.aspect_ratio = aspect_ratio;
        data.projection = projection(&data.perspective, aspect_ratio);
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.data.borrow().projection
    }

    /// View matrix as of the last [`Camera::update_view_matrix`].
    pub fn view_matrix(&self) -> Mat4 {
        self.data.borrow().view
    }

    /// Sets the view matrix to the inverse of the world matrix.
    ///
    /// A world matrix without a finite inverse (e.g. zero scale) leaves the
    /// previous view in place.
    pub fn update_view_matrix(&self) {
        let world = self.node.world_matrix();
        let inverse = world.inverse();
        if world.determinant() == 0.0 || !inverse.is_finite() {
            warn!(
                "{} has a singular world matrix; keeping the previous view",
                self.node.display_name()
            );
            return;
        }
        self.data.borrow_mut().view = inverse;
    }
}

fn projection(perspective: &Perspective, aspect_ratio: f32) -> Mat4 {
    Mat4::perspective_rh_gl(
        perspective.angle_of_view,
        aspect_ratio,
        perspective.near,
        perspective.far,
    )
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::scene::TransformType;

    #[test]
    fn projection_follows_aspect_ratio() {
        let camera = Camera::new(Perspective {
            angle_of_view: 90f32.to_radians(),
            near: 0.1,
            far: 100.0,
        });
        camera.set_aspect_ratio(2.0);
        let expected = (1.0 / 45f32.to_radians().tan()) / 2.0;
        assert!((camera.projection_matrix().x_axis.x - expected).abs() < 1e-6);
        assert_eq!(camera.aspect_ratio(), 2.0);
    }

    #[test]
    fn view_is_inverse_of_world() {
        let camera = Camera::default();
        camera.translate(0.0, 1.0, 5.0, TransformType::Local);
        camera.update_view_matrix();
        let origin = camera.view_matrix().transform_point3(Vec3::new(0.0, 1.0, 5.0));
        assert!(origin.abs_diff_eq(Vec3::ZERO, 1e-6));
    }

    #[test]
    fn singular_world_keeps_previous_view() {
        let camera = Camera::default();
        camera.translate(0.0, 0.0, 3.0, TransformType::Local);
        camera.update_view_matrix();
        let before = camera.view_matrix();
        camera.scale(0.0, TransformType::Local);
        camera.update_view_matrix();
        assert_eq!(camera.view_matrix(), before);
        assert!(!camera.view_matrix().is_nan());
    }

    #[test]
    fn tiny_uniform_scale_still_inverts() {
        let camera = Camera::default();
        camera.translate(0.0, 0.0, 3.0, TransformType::Local);
        camera.update_view_matrix();
        let before = camera.view_matrix();
        camera.scale(1e-5, TransformType::Local);
        camera.update_view_matrix();
        assert_ne!(camera.view_matrix(), before);
        let product = camera.view_matrix() * camera.world_matrix();
        assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-3));
    }

    #[test]
    fn camera_is_found_through_its_node() {
        let root = Node::new();
        let camera = Camera::default();
        root.add(&camera).unwrap();
        assert!(root.children()[0].as_camera().is_some());
        assert!(root.children()[0].is_camera());
    }
}

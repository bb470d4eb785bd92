use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use super::camera::Camera;
use super::node::{Node, NodeKind};
use crate::device::{BufferTarget, DrawMode, GraphicsDevice, VertexArrayId};
use crate::error::Result;
use crate::geometry::Geometry;
use crate::material::{Material, MODEL_MATRIX, PROJECTION_MATRIX, VIEW_MATRIX};

/// Late hook run after a mesh uploads its own uniforms and before it draws.
pub type MaterialUpdater<'a> = dyn FnMut(&Material, &mut dyn GraphicsDevice) -> Result<()> + 'a;

pub(crate) struct MeshData {
    geometry: Rc<Geometry>,
    material: Material,
    vertex_array: VertexArrayId,
    mode: DrawMode,
    visible: bool,
}

/// Scene node drawing a geometry with a material.
#[derive(Clone)]
pub struct Mesh {
    node: Node,
    data: Rc<RefCell<MeshData>>,
}

impl fmt::Debug for Mesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.borrow();
        f.debug_struct("Mesh")
            .field("node", &self.node)
            .field("mode", &data.mode)
            .field("visible", &data.visible)
            .field("vertex_count", &data.geometry.vertex_count())
            .finish()
    }
}

impl Deref for Mesh {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.node
    }
}

impl Mesh {
    /// Triangle mesh.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        geometry: Rc<Geometry>,
        material: Material,
    ) -> Result<Self> {
        Self::with_mode(device, geometry, material, DrawMode::Triangles)
    }

    /// Records the geometry's attribute bindings for the material's program in
    /// a vertex array owned by the mesh.
    pub fn with_mode(
        device: &mut dyn GraphicsDevice,
        geometry: Rc<Geometry>,
        material: Material,
        mode: DrawMode,
    ) -> Result<Self> {
        let vertex_array = device.create_vertex_array()?;
        device.bind_vertex_array(Some(vertex_array));
        geometry.build_vertex_array(device, material.program());
        device.bind_vertex_array(None);
        device.bind_buffer(BufferTarget::Vertex, None);
        if geometry.has_index() {
            device.bind_buffer(BufferTarget::Index, None);
        }

        let data = Rc::new(RefCell::new(MeshData {
            geometry,
            material,
            vertex_array,
            mode,
            visible: true,
        }));
        Ok(Self {
            node: Node::with_kind(None, NodeKind::Mesh(data.clone())),
            data,
        })
    }

    pub(crate) fn from_parts(node: Node, data: Rc<RefCell<MeshData>>) -> Self {
        Self { node, data }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn geometry(&self) -> Rc<Geometry> {
        self.data.borrow().geometry.clone()
    }

    pub fn material(&self) -> Ref<'_, Material> {
        Ref::map(self.data.borrow(), |data| &data.material)
    }

    pub fn material_mut(&self) -> RefMut<'_, Material> {
        RefMut::map(self.data.borrow_mut(), |data| &mut data.material)
    }

    pub fn mode(&self) -> DrawMode {
        self.data.borrow().mode
    }

    pub fn vertex_array(&self) -> VertexArrayId {
        self.data.borrow().vertex_array
    }

    pub fn visible(&self) -> bool {
        self.data.borrow().visible
    }

    pub fn set_visible(&self, visible: bool) {
        self.data.borrow_mut().visible = visible;
    }

    /// Draws the mesh as seen by `camera`; returns whether a draw call was issued.
    ///
    /// Matrix uniforms and the material's own values are uploaded first, then
    /// `updater` may add more (the renderer injects lights here) before render
    /// state is applied and the geometry drawn. An updater error stops the
    /// mesh before its draw call.
    pub fn render(
        &self,
        device: &mut dyn GraphicsDevice,
        camera: &Camera,
        updater: Option<&mut MaterialUpdater<'_>>,
    ) -> Result<bool> {
        if !self.visible() {
            return Ok(false);
        }
        let model = self.world_matrix();
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();

        let mut data = self.data.borrow_mut();
        let data = &mut *data;
        let material = &mut data.material;
        material.program().use_program(device);
        material.set_uniform(MODEL_MATRIX, model);
        material.set_uniform(VIEW_MATRIX, view);
        material.set_uniform(PROJECTION_MATRIX, projection);
        material.upload_data(device);
        if let Some(updater) = updater {
            updater(material, &mut *device)?;
        }
        material.update_render_settings(device);

        device.bind_vertex_array(Some(data.vertex_array));
        data.geometry.draw(device, data.mode);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::*;
    use crate::device::{Capability, Command, RecordedValue, RecordingDevice};
    use crate::error::FrameworkError;
    use crate::geometry::POSITION;
    use crate::uniform::UniformValue;
    use crate::material::presets::{self, BasicOptions};
    use crate::scene::TransformType;

    fn triangle_mesh(device: &mut RecordingDevice) -> Mesh {
        let mut builder = Geometry::builder();
        builder
            .attribute(POSITION, &[Vec3::ZERO, Vec3::X, Vec3::Y])
            .unwrap();
        let geometry = Rc::new(builder.build(device).unwrap());
        let material = presets::basic(device, &BasicOptions::default()).unwrap();
        Mesh::new(device, geometry, material).unwrap()
    }

    fn is_uniform(command: &Command, wanted: &str) -> bool {
        matches!(command, Command::SetUniform { name, .. } if name == wanted)
    }

    #[test]
    fn construction_leaves_no_vertex_array_bound() {
        let mut device = RecordingDevice::default();
        let mesh = triangle_mesh(&mut device);
        let commands = device.commands();
        let bind = commands
            .iter()
            .position(|c| *c == Command::BindVertexArray(Some(mesh.vertex_array())))
            .unwrap();
        let unbind = commands
            .iter()
            .position(|c| *c == Command::BindVertexArray(None))
            .unwrap();
        assert!(bind < unbind);
    }

    #[test]
    fn render_writes_matrices_and_draws() {
        let mut device = RecordingDevice::default();
        let mesh = triangle_mesh(&mut device);
        mesh.translate(0.0, 0.0, -2.0, TransformType::Local);
        let camera = Camera::default();
        device.take_commands();

        let mut injected = 0;
        let mut updater = |material: &Material, device: &mut dyn GraphicsDevice| -> Result<()> {
            injected += 1;
            UniformValue::Vec3(Vec3::ONE).upload_named(
                device,
                material.program(),
                presets::BASE_COLOR,
            );
            Ok(())
        };
        assert!(mesh.render(&mut device, &camera, Some(&mut updater)).unwrap());
        assert_eq!(injected, 1);

        // material upload, updater write, render state, draw
        let commands = device.commands();
        let base_color_writes: Vec<usize> = commands
            .iter()
            .enumerate()
            .filter(|(_, command)| is_uniform(command, presets::BASE_COLOR))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(base_color_writes.len(), 2);
        let model = commands
            .iter()
            .rposition(|command| is_uniform(command, MODEL_MATRIX))
            .unwrap();
        let culling = commands
            .iter()
            .position(|command| {
                matches!(command, Command::SetEnabled { capability: Capability::CullFace, .. })
            })
            .unwrap();
        let draw = commands.iter().position(Command::is_draw).unwrap();
        assert!(model < base_color_writes[1]);
        assert!(base_color_writes[0] < base_color_writes[1]);
        assert!(base_color_writes[1] < culling);
        assert!(culling < draw);

        assert_eq!(
            device.last_uniform(MODEL_MATRIX),
            Some(&RecordedValue::Mat4(Mat4::from_translation(Vec3::new(
                0.0, 0.0, -2.0
            ))))
        );
        assert_eq!(
            device.draw_calls(),
            vec![&Command::DrawArrays {
                mode: DrawMode::Triangles,
                first: 0,
                count: 3,
            }]
        );
    }

    #[test]
    fn updater_error_skips_the_draw() {
        let mut device = RecordingDevice::default();
        let mesh = triangle_mesh(&mut device);
        device.take_commands();
        let mut updater = |_: &Material, _: &mut dyn GraphicsDevice| -> Result<()> {
            Err(FrameworkError::invariant("no room"))
        };
        assert!(mesh
            .render(&mut device, &Camera::default(), Some(&mut updater))
            .is_err());
        assert!(device.draw_calls().is_empty());
    }

    #[test]
    fn hidden_mesh_is_skipped() {
        let mut device = RecordingDevice::default();
        let mesh = triangle_mesh(&mut device);
        mesh.set_visible(false);
        device.take_commands();
        assert!(!mesh.render(&mut device, &Camera::default(), None).unwrap());
        assert!(device.commands().is_empty());
    }

    #[test]
    fn material_changes_persist() {
        let mut device = RecordingDevice::default();
        let mesh = triangle_mesh(&mut device);
        mesh.material_mut()
            .set_uniform(presets::BASE_COLOR, Vec3::new(0.0, 1.0, 0.0));
        let node: &Node = &mesh;
        let again = node.as_mesh().unwrap();
        assert_eq!(
            again.material().uniform::<Vec3>(presets::BASE_COLOR),
            Some(Vec3::new(0.0, 1.0, 0.0))
        );
    }
}

//! Per-frame scene traversal: clear, update the camera, gather lights, draw meshes.

use glam::Vec3;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::device::{BlendFactor, Capability, ClearMask, GraphicsDevice};
use crate::error::{FrameworkError, Result};
use crate::material::presets::{LIGHTS, LIGHT_COUNT};
use crate::material::{Material, MAX_LIGHTS};
use crate::scene::{Camera, Light, Mesh, Node};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub clear_color: Vec3,
    pub depth_test: bool,
    /// Source-alpha blending.
    pub blending: bool,
    /// Scene-wide light limit, checked on top of each material's own
    /// light array length.
    pub max_lights: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: Vec3::ZERO,
            depth_test: true,
            blending: true,
            max_lights: MAX_LIGHTS,
        }
    }
}

/// Counters for one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub meshes: usize,
    pub draw_calls: usize,
    pub lights: usize,
}

#[derive(Debug)]
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    /// Applies the fixed render state once.
    pub fn new(device: &mut dyn GraphicsDevice, config: RendererConfig) -> Self {
        device.set_enabled(Capability::DepthTest, config.depth_test);
        device.clear_color(config.clear_color.extend(1.0));
        device.set_enabled(Capability::Blend, config.blending);
        if config.blending {
            device.blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        }
        info!(
            "renderer ready (depth test: {}, blending: {}, max lights: {})",
            config.depth_test, config.blending, config.max_lights
        );
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Draws every mesh under `scene` as seen by `camera`.
    ///
    /// Lights are collected in traversal order, which fixes the array slot
    /// each one occupies. More lights than `max_lights`, or than any mesh's
    /// shader declares in its light array, fails the frame before anything
    /// is drawn. Materials without a light array are not limited.
    pub fn render(
        &self,
        device: &mut dyn GraphicsDevice,
        scene: &Node,
        camera: &Camera,
    ) -> Result<FrameStats> {
        device.clear(ClearMask::COLOR_AND_DEPTH);

        let (width, height) = device.drawing_buffer_size();
        if height > 0 {
            camera.set_aspect_ratio(width as f32 / height as f32);
        } else {
            debug!("drawing buffer has zero height; keeping aspect ratio");
        }
        camera.update_view_matrix();

        let lights: Vec<Light> = scene.descendants().filter_map(|node| node.as_light()).collect();
        if lights.len() > self.config.max_lights {
            return Err(FrameworkError::TooManyLights {
                count: lights.len(),
                max: self.config.max_lights,
            });
        }

        let meshes: Vec<Mesh> = scene.descendants().filter_map(|node| node.as_mesh()).collect();
        for mesh in &meshes {
            if let Some(max) = mesh.material().array_capacity(LIGHTS) {
                if lights.len() > max {
                    return Err(FrameworkError::TooManyLights {
                        count: lights.len(),
                        max,
                    });
                }
            }
        }

        let mut stats = FrameStats {
            lights: lights.len(),
            ..FrameStats::default()
        };
        let mut inject_lights = |material: &Material, device: &mut dyn GraphicsDevice| {
            material.update_array(device, &lights, LIGHTS, LIGHT_COUNT)
        };
        for mesh in &meshes {
            stats.meshes += 1;
            if mesh.render(device, camera, Some(&mut inject_lights))? {
                stats.draw_calls += 1;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::device::{Command, RecordedValue, RecordingDevice};
    use crate::geometry::shapes;
    use crate::material::presets;
    use crate::scene::LightKind;
    use crate::uniform::UniformMap;

    fn lit_box(device: &mut RecordingDevice) -> Mesh {
        let geometry = Rc::new(shapes::box_geometry(device, 1.0, 1.0, 1.0).unwrap());
        let material = presets::flat(device, None, Vec3::ONE).unwrap();
        Mesh::new(device, geometry, material).unwrap()
    }

    #[test]
    fn new_applies_render_state() {
        let mut device = RecordingDevice::default();
        let renderer = Renderer::new(&mut device, RendererConfig::default());
        assert!(device.is_enabled(Capability::DepthTest));
        assert!(device.is_enabled(Capability::Blend));
        assert!(device.commands().contains(&Command::BlendFunc {
            source: BlendFactor::SrcAlpha,
            destination: BlendFactor::OneMinusSrcAlpha,
        }));
        assert_eq!(renderer.config().max_lights, MAX_LIGHTS);
    }

    #[test]
    fn ambient_light_without_meshes_draws_nothing() {
        let mut device = RecordingDevice::default();
        let renderer = Renderer::new(&mut device, RendererConfig::default());
        let scene = Node::new();
        scene.add(&Light::ambient(Vec3::splat(0.2))).unwrap();
        let camera = Camera::default();

        let stats = renderer.render(&mut device, &scene, &camera).unwrap();
        assert_eq!(stats, FrameStats { meshes: 0, draw_calls: 0, lights: 1 });
        assert!(device.draw_calls().is_empty());
        assert!(device.commands().contains(&Command::Clear(ClearMask::COLOR_AND_DEPTH)));
    }

    #[test]
    fn aspect_ratio_follows_drawing_buffer() {
        let mut device = RecordingDevice::default();
        device.resize(1000, 500);
        let renderer = Renderer::new(&mut device, RendererConfig::default());
        let camera = Camera::default();
        renderer.render(&mut device, &Node::new(), &camera).unwrap();
        assert_eq!(camera.aspect_ratio(), 2.0);

        device.resize(1000, 0);
        renderer.render(&mut device, &Node::new(), &camera).unwrap();
        assert_eq!(camera.aspect_ratio(), 2.0);
    }

    #[test]
    fn lights_fill_slots_in_traversal_order() {
        let mut device = RecordingDevice::default();
        let renderer = Renderer::new(&mut device, RendererConfig::default());
        let scene = Node::new();
        let mesh = lit_box(&mut device);
        scene.add(&mesh).unwrap();
        scene.add(&Light::ambient(Vec3::splat(0.1))).unwrap();
        scene
            .add(&Light::directional(Vec3::ONE, Vec3::NEG_Z))
            .unwrap();
        device.take_commands();

        let stats = renderer.render(&mut device, &scene, &Camera::default()).unwrap();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(device.last_uniform(LIGHT_COUNT), Some(&RecordedValue::Int(2)));
        assert_eq!(
            device.last_uniform("lights[0].lightType"),
            Some(&RecordedValue::Int(LightKind::Ambient.index()))
        );
        assert_eq!(
            device.last_uniform("lights[1].lightType"),
            Some(&RecordedValue::Int(LightKind::Directional.index()))
        );
    }

    #[test]
    fn zero_lights_still_writes_count() {
        let mut device = RecordingDevice::default();
        let renderer = Renderer::new(&mut device, RendererConfig::default());
        let scene = Node::new();
        scene.add(&lit_box(&mut device)).unwrap();
        renderer.render(&mut device, &scene, &Camera::default()).unwrap();
        assert_eq!(device.last_uniform(LIGHT_COUNT), Some(&RecordedValue::Int(0)));
        assert_eq!(device.draw_calls().len(), 1);
    }

    #[test]
    fn too_many_lights_fails_before_drawing() {
        let mut device = RecordingDevice::default();
        let renderer = Renderer::new(
            &mut device,
            RendererConfig {
                max_lights: 1,
                ..RendererConfig::default()
            },
        );
        let scene = Node::new();
        scene.add(&lit_box(&mut device)).unwrap();
        scene.add(&Light::ambient(Vec3::ONE)).unwrap();
        scene.add(&Light::ambient(Vec3::ONE)).unwrap();
        device.take_commands();

        assert_eq!(
            renderer.render(&mut device, &scene, &Camera::default()),
            Err(FrameworkError::TooManyLights { count: 2, max: 1 })
        );
        assert!(device.draw_calls().is_empty());
    }

    #[test]
    fn hidden_meshes_count_but_do_not_draw() {
        let mut device = RecordingDevice::default();
        let renderer = Renderer::new(&mut device, RendererConfig::default());
        let scene = Node::new();
        let mesh = lit_box(&mut device);
        mesh.set_visible(false);
        scene.add(&mesh).unwrap();
        let stats = renderer.render(&mut device, &scene, &Camera::default()).unwrap();
        assert_eq!(stats.meshes, 1);
        assert_eq!(stats.draw_calls, 0);
    }

    const SHORT_ARRAY_VERTEX: &str = r#"
        in vec4 a_position;
        uniform mat4 u_ProjectionMatrix;
        uniform mat4 u_ViewMatrix;
        uniform mat4 u_ModelMatrix;
        void main() { gl_Position = u_ProjectionMatrix * u_ViewMatrix * u_ModelMatrix * a_position; }
    "#;

    const SHORT_ARRAY_FRAGMENT: &str = r#"
        struct Light { int lightType; vec3 color; };
        uniform Light lights[2];
        uniform int lightCount;
        out vec4 fragColor;
        void main() { fragColor = vec4(1.0); }
    "#;

    fn two_light_box(device: &mut RecordingDevice) -> Mesh {
        let geometry = Rc::new(shapes::box_geometry(device, 1.0, 1.0, 1.0).unwrap());
        let material = Material::new(
            device,
            SHORT_ARRAY_VERTEX,
            SHORT_ARRAY_FRAGMENT,
            UniformMap::new(),
            false,
        )
        .unwrap();
        Mesh::new(device, geometry, material).unwrap()
    }

    #[test]
    fn shader_light_array_bounds_the_frame() {
        let mut device = RecordingDevice::default();
        let renderer = Renderer::new(&mut device, RendererConfig::default());
        let scene = Node::new();
        scene.add(&lit_box(&mut device)).unwrap();
        scene.add(&two_light_box(&mut device)).unwrap();
        for _ in 0..3 {
            scene.add(&Light::ambient(Vec3::splat(0.1))).unwrap();
        }
        device.take_commands();

        assert_eq!(
            renderer.render(&mut device, &scene, &Camera::default()),
            Err(FrameworkError::TooManyLights { count: 3, max: 2 })
        );
        assert!(device.draw_calls().is_empty());
        assert!(device.uniform_writes(LIGHT_COUNT).is_empty());
    }

    #[test]
    fn materials_without_light_array_ignore_light_count() {
        let mut device = RecordingDevice::default();
        let renderer = Renderer::new(&mut device, RendererConfig::default());
        let scene = Node::new();
        let geometry = Rc::new(shapes::box_geometry(&mut device, 1.0, 1.0, 1.0).unwrap());
        let material = presets::basic(&mut device, &presets::BasicOptions::default()).unwrap();
        assert_eq!(material.array_capacity(LIGHTS), None);
        scene
            .add(&Mesh::new(&mut device, geometry, material).unwrap())
            .unwrap();
        scene.add(&two_light_box(&mut device)).unwrap();
        scene.add(&Light::ambient(Vec3::ONE)).unwrap();
        scene.add(&Light::ambient(Vec3::ONE)).unwrap();

        let stats = renderer.render(&mut device, &scene, &Camera::default()).unwrap();
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(device.last_uniform(LIGHT_COUNT), Some(&RecordedValue::Int(2)));
    }
}

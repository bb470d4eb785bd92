use std::f32::consts::FRAC_PI_2;
use std::rc::Rc;

use glam::{Mat4, Quat, Vec3};

use framework3d::device::{Command, RecordedValue};
use framework3d::geometry::{COLOR, POSITION};
use framework3d::material::presets;
use framework3d::{
    Camera, DrawMode, FrameworkError, Geometry, Light, Material, Mesh, Node, Perspective,
    RecordingDevice, Renderer, RendererConfig, TransformType,
};

fn triangle(device: &mut RecordingDevice) -> Rc<Geometry> {
    let mut builder = Geometry::builder();
    builder
        .attribute(
            POSITION,
            &[
                Vec3::new(0.0, 0.5, 0.0),
                Vec3::new(-0.5, -0.5, 0.0),
                Vec3::new(0.5, -0.5, 0.0),
            ],
        )
        .unwrap();
    Rc::new(builder.build(device).unwrap())
}

#[test]
fn nested_translation_reaches_grandchild() {
    let a = Node::named("a");
    let b = Node::named("b");
    let c = Node::named("c");
    a.add(&b).unwrap();
    b.add(&c).unwrap();
    b.translate(1.0, 2.0, 3.0, TransformType::Local);
    assert_eq!(c.world_position(), Vec3::new(1.0, 2.0, 3.0));
}

#[test]
fn applying_inverse_restores_transform() {
    let node = Node::new();
    node.translate(4.0, -1.0, 2.0, TransformType::Local);
    let original = node.transform();
    let m = Mat4::from_scale_rotation_translation(
        Vec3::new(2.0, 1.0, 0.5),
        Quat::from_rotation_y(0.7),
        Vec3::new(1.0, 2.0, 3.0),
    );
    node.apply_matrix(m, TransformType::Local);
    node.apply_matrix(m.inverse(), TransformType::Local);
    assert!(node.transform().abs_diff_eq(original, 1e-5));
}

#[test]
fn translate_matches_translation_matrix() {
    let a = Node::new();
    let b = Node::new();
    a.rotate_z(0.4, TransformType::Local);
    b.rotate_z(0.4, TransformType::Local);
    a.translate(1.5, -2.0, 0.25, TransformType::Local);
    b.apply_matrix(
        Mat4::from_translation(Vec3::new(1.5, -2.0, 0.25)),
        TransformType::Local,
    );
    assert!(a.transform().abs_diff_eq(b.transform(), 1e-6));
}

#[test]
fn mismatched_attribute_counts_fail() {
    let mut device = RecordingDevice::default();
    let mut builder = Geometry::builder();
    builder
        .attribute(POSITION, &[Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z])
        .unwrap()
        .attribute(COLOR, &[Vec3::ONE, Vec3::ONE, Vec3::ONE])
        .unwrap();
    assert!(matches!(
        builder.build(&mut device),
        Err(FrameworkError::Invariant(_))
    ));
}

#[test]
fn base_color_round_trips() {
    let mut device = RecordingDevice::default();
    let mut material: Material = presets::basic(&mut device, &Default::default()).unwrap();
    material.set_uniform(presets::BASE_COLOR, Vec3::new(1.0, 0.0, 0.0));
    assert_eq!(
        material.uniform::<Vec3>(presets::BASE_COLOR),
        Some(Vec3::new(1.0, 0.0, 0.0))
    );
}

#[test]
fn ambient_light_and_no_meshes_draws_nothing() {
    let mut device = RecordingDevice::default();
    let renderer = Renderer::new(&mut device, RendererConfig::default());
    let scene = Node::new();
    scene.add(&Light::ambient(Vec3::splat(0.2))).unwrap();
    let stats = renderer
        .render(&mut device, &scene, &Camera::default())
        .unwrap();
    assert_eq!(stats.draw_calls, 0);
    assert!(device.draw_calls().is_empty());
}

#[test]
fn projection_scales_x_by_aspect() {
    let camera = Camera::new(Perspective {
        angle_of_view: FRAC_PI_2,
        near: 0.1,
        far: 100.0,
    });
    camera.set_aspect_ratio(2.0);
    let expected = (1.0 / (FRAC_PI_2 / 2.0).tan()) / 2.0;
    assert!((camera.projection_matrix().x_axis.x - expected).abs() < 1e-6);
}

#[test]
fn look_at_own_position_stays_finite() {
    let node = Node::new();
    node.set_position(Vec3::new(0.0, 0.0, 5.0));
    let before = node.transform();
    node.look_at(Vec3::new(0.0, 0.0, 5.0));
    assert!(node.transform().is_finite());
    assert_eq!(node.transform(), before);
}

#[test]
fn look_at_straight_down_stays_finite() {
    let node = Node::new();
    node.look_at(Vec3::new(0.0, -3.0, 0.0));
    assert!(node.transform().is_finite());
    assert!(node.direction().abs_diff_eq(Vec3::NEG_Y, 1e-5));
}

#[test]
fn single_triangle_issues_one_draw() {
    let mut device = RecordingDevice::default();
    let renderer = Renderer::new(&mut device, RendererConfig::default());
    let geometry = triangle(&mut device);
    let material = presets::flat(&mut device, None, Vec3::new(1.0, 0.5, 0.0)).unwrap();
    let mesh = Mesh::new(&mut device, geometry, material).unwrap();
    let scene = Node::new();
    scene.add(&mesh).unwrap();
    let camera = Camera::default();
    scene.add(&camera).unwrap();
    device.take_commands();

    renderer.render(&mut device, &scene, &camera).unwrap();
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
fn cycles_and_foreign_children_are_rejected() {
    let a = Node::new();
    let b = Node::new();
    a.add(&b).unwrap();
    assert!(matches!(b.add(&a), Err(FrameworkError::Cycle(_))));
    assert!(matches!(a.add(&a), Err(FrameworkError::Cycle(_))));
    assert!(matches!(b.remove(&a), Err(FrameworkError::NotFound(_))));
    a.remove(&b).unwrap();
    assert!(b.parent().is_none());
}

#[test]
fn reparenting_moves_the_child() {
    let first = Node::new();
    let second = Node::new();
    let child = Node::new();
    first.add(&child).unwrap();
    second.add(&child).unwrap();
    assert!(first.children().is_empty());
    assert!(child.parent().unwrap().ptr_eq(&second));
}

#[test]
fn lights_follow_their_parents() {
    let mut device = RecordingDevice::default();
    let renderer = Renderer::new(&mut device, RendererConfig::default());
    let scene = Node::new();
    let rig = Node::new();
    rig.translate(0.0, 3.0, 0.0, TransformType::Local);
    let lamp = Light::point(Vec3::ONE, Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.1));
    rig.add(&lamp).unwrap();
    scene.add(&rig).unwrap();
    let geometry = triangle(&mut device);
    let material = presets::flat(&mut device, None, Vec3::ONE).unwrap();
    scene
        .add(&Mesh::new(&mut device, geometry, material).unwrap())
        .unwrap();

    renderer
        .render(&mut device, &scene, &Camera::default())
        .unwrap();
    assert_eq!(
        device.last_uniform("lights[0].position"),
        Some(&RecordedValue::Vec3(Vec3::new(1.0, 3.0, 0.0)))
    );
}

use std::env;
use std::fs;

use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use log::info;

use framework3d::app::{print_final_state, print_scene_summary};
use framework3d::{
    Application, Camera, FrameLoop, FrameStats, GraphicsDevice, KeyCode, KeyState, NamedKey,
    Node, RecordingDevice, Renderer, RendererConfig, SceneDescription, TransformType,
};

const USAGE: &str = "Usage: framework3d [scene.xml] [--frames N] [--quiet]";

/// Turntable speed in radians per second.
const SPIN_SPEED: f32 = 0.5;

const DEMO_SCENE: &str = r#"<scene>
  <object>
    <name>Camera</name>
    <type>camera</type>
    <position>0 1.5 5</position>
    <target>0 0 0</target>
  </object>
  <object>
    <name>Ambient</name>
    <type>light</type>
    <light>ambient</light>
    <color>51 51 51</color>
  </object>
  <object>
    <name>Sun</name>
    <type>light</type>
    <light>directional</light>
    <direction>-1 -1 -2</direction>
  </object>
  <object>
    <name>Crate</name>
    <shape>box</shape>
    <material>flat</material>
    <color>255 200 120</color>
    <position>-1.2 0 0</position>
  </object>
  <object>
    <name>Globe</name>
    <shape>sphere</shape>
    <material>normal</material>
    <position>1.2 0 0</position>
  </object>
  <object>
    <name>Floor</name>
    <shape>rectangle</shape>
    <material>basic</material>
    <color>90 90 90</color>
    <position>0 -0.5 0</position>
    <rotation>-90 0 0</rotation>
    <scale>6 6 1</scale>
  </object>
</scene>
"#;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let xml = match &options.path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read scene {path}"))?
        }
        None => DEMO_SCENE.to_string(),
    };
    let description = SceneDescription::from_xml(&xml).context("failed to parse scene XML")?;

    let mut device = RecordingDevice::default();
    let built = description
        .build(&mut device)
        .context("failed to build scene")?;
    print_scene_summary(&built.root);
    let camera = match built.camera {
        Some(camera) => camera,
        None => {
            info!("scene has no camera; using the default view");
            default_camera(&built.root)?
        }
    };

    let renderer = Renderer::new(&mut device, RendererConfig::default());
    let mut demo = Demo {
        renderer,
        root: built.root,
        camera,
        quiet: options.quiet,
        paused: false,
        direction: 1.0,
        frame: 0,
        totals: FrameStats::default(),
    };
    let mut frame_loop = FrameLoop::new(device);
    frame_loop
        .run(&mut demo, options.frames)
        .context("frame loop failed")?;

    println!(
        "Rendered {} frame(s) with {} draw call(s)",
        frame_loop.frames(),
        demo.totals.draw_calls
    );
    print_final_state(&demo.root);
    Ok(())
}

fn default_camera(root: &Node) -> Result<Camera> {
    let camera = Camera::default();
    camera.set_name("Camera");
    root.add(&camera).context("failed to add default camera")?;
    camera.set_position(Vec3::new(0.0, 1.0, 5.0));
    camera.look_at(Vec3::ZERO);
    Ok(camera)
}

/// Spins every mesh about its own vertical axis. Space toggles the motion,
/// the left and right arrows pick the spin direction.
struct Demo {
    renderer: Renderer,
    root: Node,
    camera: Camera,
    quiet: bool,
    paused: bool,
    direction: f32,
    frame: u64,
    totals: FrameStats,
}

impl Application for Demo {
    fn start(&mut self, _device: &mut dyn GraphicsDevice) -> framework3d::Result<()> {
        info!("starting demo with camera {:?}", self.camera.name());
        Ok(())
    }

    fn update(&mut self, elapsed_ms: f64, keys: &dyn KeyState) -> framework3d::Result<()> {
        if keys.is_down(KeyCode::Named(NamedKey::Space)) {
            self.paused = !self.paused;
        }
        if keys.is_pressed(KeyCode::Named(NamedKey::Left)) {
            self.direction = -1.0;
        } else if keys.is_pressed(KeyCode::Named(NamedKey::Right)) {
            self.direction = 1.0;
        }
        if self.paused {
            return Ok(());
        }
        let angle = self.direction * SPIN_SPEED * (elapsed_ms / 1000.0) as f32;
        for mesh in self.root.descendants().filter(Node::is_mesh) {
            mesh.rotate_y(angle, TransformType::Local);
        }
        Ok(())
    }

    fn render(&mut self, device: &mut dyn GraphicsDevice) -> framework3d::Result<()> {
        let stats = self.renderer.render(device, &self.root, &self.camera)?;
        self.frame += 1;
        self.totals.meshes += stats.meshes;
        self.totals.draw_calls += stats.draw_calls;
        self.totals.lights = stats.lights;
        if !self.quiet {
            println!(
                "frame {}: {} meshes, {} draw calls, {} lights",
                self.frame, stats.meshes, stats.draw_calls, stats.lights
            );
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
struct CliOptions {
    path: Option<String>,
    frames: u64,
    quiet: bool,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let mut path = None;
        let mut frames = 1;
        let mut quiet = false;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--frames" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--frames needs a value. {USAGE}"))?;
                    frames = value
                        .parse()
                        .with_context(|| format!("invalid frame count {value}"))?;
                }
                "--quiet" => quiet = true,
                other if other.starts_with("--") => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
                other => {
                    if path.is_some() {
                        return Err(anyhow!("Unexpected extra argument: {other}. {USAGE}"));
                    }
                    path = Some(other.to_string());
                }
            }
        }
        Ok(Self {
            path,
            frames,
            quiet,
        })
    }
}

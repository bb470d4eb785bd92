use std::sync::Arc;

use log::info;

use crate::device::GraphicsDevice;
use crate::error::Result;
use crate::input::{InputState, KeyState};
use crate::scene::Node;

/// Frame length used when no display clock drives the loop.
pub const DEFAULT_FRAME_MS: f64 = 1000.0 / 60.0;

/// Program driven by a [`FrameLoop`].
pub trait Application {
    /// Called once before the first frame.
    fn start(&mut self, device: &mut dyn GraphicsDevice) -> Result<()>;
    /// Advances state by `elapsed_ms` since the previous frame.
    fn update(&mut self, elapsed_ms: f64, keys: &dyn KeyState) -> Result<()>;
    fn render(&mut self, device: &mut dyn GraphicsDevice) -> Result<()>;
}

/// Fixed-step frame driver for headless runs.
///
/// Each frame sets the viewport to the drawing buffer, updates the
/// application, clears the per-frame key transitions and renders.
pub struct FrameLoop<D: GraphicsDevice> {
    device: D,
    input: Arc<InputState>,
    frame_ms: f64,
    frames: u64,
    started: bool,
}

impl<D: GraphicsDevice> FrameLoop<D> {
    pub fn new(device: D) -> Self {
        Self::with_input(device, Arc::new(InputState::new()))
    }

    /// Shares `input` with whatever feeds key events.
    pub fn with_input(device: D, input: Arc<InputState>) -> Self {
        Self {
            device,
            input,
            frame_ms: DEFAULT_FRAME_MS,
            frames: 0,
            started: false,
        }
    }

    pub fn set_frame_ms(&mut self, frame_ms: f64) {
        self.frame_ms = frame_ms;
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn input(&self) -> &Arc<InputState> {
        &self.input
    }

    /// Frames completed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn into_device(self) -> D {
        self.device
    }

    /// Runs one frame, starting the application first if needed.
    pub fn step<A: Application>(&mut self, app: &mut A) -> Result<()> {
        if !self.started {
            app.start(&mut self.device)?;
            self.started = true;
            info!("application started");
        }
        let (width, height) = self.device.drawing_buffer_size();
        self.device.viewport(0, 0, width as i32, height as i32);
        app.update(self.frame_ms, &*self.input)?;
        self.input.reset();
        app.render(&mut self.device)?;
        self.frames += 1;
        Ok(())
    }

    pub fn run<A: Application>(&mut self, app: &mut A, frames: u64) -> Result<()> {
        for _ in 0..frames {
            self.step(app)?;
        }
        info!("ran {frames} frame(s)");
        Ok(())
    }
}

/// Prints every node below `root` with its world position.
pub fn print_final_state(root: &Node) {
    println!("Final node states:");
    for node in root.descendants().skip(1) {
        let position = node.world_position();
        println!(
            " - {} ({}) pos=({:.2}, {:.2}, {:.2})",
            node.name().unwrap_or_else(|| "<unnamed>".to_string()),
            node.kind_label(),
            position.x,
            position.y,
            position.z
        );
    }
}

/// Prints the node list of a freshly loaded scene.
pub fn print_scene_summary(root: &Node) {
    let nodes: Vec<Node> = root.descendants().skip(1).collect();
    let lights = nodes.iter().filter(|node| node.is_light()).count();
    println!("Loaded scene with {} objects ({lights} lights)", nodes.len());
    for node in &nodes {
        println!(
            " - {} ({})",
            node.name().unwrap_or_else(|| "<unnamed>".to_string()),
            node.kind_label()
        );
    }
}

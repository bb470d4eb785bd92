//! Scene-graph rendering framework over a pluggable graphics device.
//!
//! Nodes form a transform hierarchy; cameras, lights and meshes are nodes
//! with an extra capability. A [`Renderer`] walks the graph each frame,
//! gathers the lights and draws every mesh through a [`GraphicsDevice`].
//! The headless [`RecordingDevice`] captures the resulting command stream,
//! and the `gl` feature adds a `glow` backend.

pub mod app;
pub mod description;
pub mod device;
pub mod error;
pub mod geometry;
pub mod input;
pub mod material;
pub mod program;
pub mod renderer;
pub mod scene;
pub mod texture;
pub mod uniform;

pub use app::{Application, FrameLoop};
pub use description::{BuiltScene, SceneDescription};
#[cfg(feature = "gl")]
pub use device::GlowDevice;
pub use device::{DrawMode, GraphicsDevice, RecordingDevice, ShaderDialect};
pub use error::{FrameworkError, Result};
pub use geometry::{Geometry, GeometryBuilder};
pub use input::{InputState, KeyCode, KeyState, NamedKey};
pub use material::Material;
pub use program::Program;
pub use renderer::{FrameStats, Renderer, RendererConfig};
pub use scene::{Camera, Group, Light, LightKind, Mesh, Node, Perspective, Scene, TransformType};
pub use texture::{Sampler2D, Texture};
pub use uniform::{UniformMap, UniformUpdater, UniformValue};

//! Scene graph: transform nodes and the cameras, lights and meshes built on them.
//!
//! Every node is a [`Node`]; cameras, lights and meshes are typed views over
//! a node carrying the matching capability. The renderer finds them by
//! walking the graph and asking each node for [`Node::as_light`] or
//! [`Node::as_mesh`].

pub mod camera;
pub mod light;
pub mod mesh;
pub mod node;

pub use camera::{Camera, Perspective};
pub use light::{Light, LightKind};
pub use mesh::{MaterialUpdater, Mesh};
pub use node::{Descendants, Node, TransformType};

/// Root of a scene graph.
pub type Scene = Node;
/// Node used only to group and transform its children.
pub type Group = Node;

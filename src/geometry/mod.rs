//! Vertex data: named attribute streams plus an optional index stream.

pub mod shapes;

use std::collections::BTreeMap;

use glam::{Vec2, Vec3, Vec4};
use log::debug;

use crate::device::{BufferId, BufferTarget, DrawMode, GraphicsDevice, IndexType};
use crate::error::{FrameworkError, Result};
use crate::program::Program;

pub const POSITION: &str = "a_position";
pub const COLOR: &str = "a_color_0";
pub const TEXCOORD: &str = "a_texcoord_0";
pub const NORMAL: &str = "a_normal";

/// Per-vertex value that flattens into a fixed number of floats.
pub trait VertexData {
    const COMPONENTS: usize;
    fn write(&self, out: &mut Vec<f32>);
}

impl<const N: usize> VertexData for [f32; N] {
    const COMPONENTS: usize = N;

    fn write(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(self);
    }
}

impl VertexData for Vec2 {
    const COMPONENTS: usize = 2;

    fn write(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(&self.to_array());
    }
}

impl VertexData for Vec3 {
    const COMPONENTS: usize = 3;

    fn write(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(&self.to_array());
    }
}

impl VertexData for Vec4 {
    const COMPONENTS: usize = 4;

    fn write(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(&self.to_array());
    }
}

/// Float vertex stream living in its own GPU buffer.
#[derive(Debug)]
pub struct Attribute {
    buffer: BufferId,
    data: Vec<f32>,
    components: usize,
}

impl Attribute {
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn components(&self) -> usize {
        self.components
    }

    /// Number of vertices in the stream.
    pub fn count(&self) -> usize {
        self.data.len() / self.components
    }

    fn upload(&self, device: &mut dyn GraphicsDevice) {
        device.upload_buffer(
            BufferTarget::Vertex,
            self.buffer,
            bytemuck::cast_slice(&self.data),
        );
    }
}

/// Unsigned short element buffer.
#[derive(Debug)]
pub struct Index {
    buffer: BufferId,
    count: usize,
}

impl Index {
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Immutable vertex data uploaded once at construction.
#[derive(Debug)]
pub struct Geometry {
    attributes: BTreeMap<String, Attribute>,
    index: Option<Index>,
    vertex_count: usize,
}

impl Geometry {
    pub fn builder() -> GeometryBuilder {
        GeometryBuilder::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn index(&self) -> Option<&Index> {
        self.index.as_ref()
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    /// Number of elements a draw call covers.
    pub fn draw_count(&self) -> usize {
        self.index.as_ref().map_or(self.vertex_count, Index::count)
    }

    /// Wires every attribute the program declares into the bound vertex array.
    ///
    /// Attributes the program does not reference are skipped, so one geometry
    /// can serve materials that use different subsets of its streams.
    pub fn build_vertex_array(&self, device: &mut dyn GraphicsDevice, program: &Program) {
        for (name, attribute) in &self.attributes {
            match program.attribute(name) {
                Some(active) => device.vertex_attrib_pointer(
                    attribute.buffer,
                    active.location,
                    attribute.components as i32,
                ),
                None => debug!("program {} does not use attribute {name}", program.id().0),
            }
        }
        if let Some(index) = &self.index {
            device.bind_buffer(BufferTarget::Index, Some(index.buffer));
        }
    }

    pub fn draw(&self, device: &mut dyn GraphicsDevice, mode: DrawMode) {
        match &self.index {
            Some(index) => {
                device.draw_elements(mode, index.count as i32, IndexType::UnsignedShort, 0)
            }
            None => device.draw_arrays(mode, 0, self.vertex_count as i32),
        }
    }
}

/// Collects vertex data; nothing touches the device until [`GeometryBuilder::build`].
#[derive(Debug, Default, Clone)]
pub struct GeometryBuilder {
    attributes: BTreeMap<String, (Vec<f32>, usize)>,
    index: Option<Vec<u16>>,
}

impl GeometryBuilder {
    /// Adds (or replaces) the attribute `name` from one value per vertex.
    pub fn attribute<V: VertexData>(&mut self, name: &str, values: &[V]) -> Result<&mut Self> {
        if values.is_empty() {
            return Err(FrameworkError::invariant(format!(
                "attribute {name} has no vertices"
            )));
        }
        let mut data = Vec::with_capacity(values.len() * V::COMPONENTS);
        for value in values {
            value.write(&mut data);
        }
        self.attribute_flat(name, data, V::COMPONENTS)
    }

    /// Adds the attribute `name` from tightly packed floats of `components` width.
    pub fn attribute_flat(
        &mut self,
        name: &str,
        data: Vec<f32>,
        components: usize,
    ) -> Result<&mut Self> {
        if components == 0 || components > 4 {
            return Err(FrameworkError::invariant(format!(
                "attribute {name} needs 1 to 4 components, got {components}"
            )));
        }
        if data.is_empty() {
            return Err(FrameworkError::invariant(format!(
                "attribute {name} has no vertices"
            )));
        }
        if data.len() % components != 0 {
            return Err(FrameworkError::invariant(format!(
                "attribute {name}: {} floats do not split into {components}-component vertices",
                data.len()
            )));
        }
        self.attributes.insert(name.to_string(), (data, components));
        Ok(self)
    }

    /// Sets the index stream; a geometry has at most one.
    pub fn index(&mut self, indices: &[u16]) -> Result<&mut Self> {
        if self.index.is_some() {
            return Err(FrameworkError::invariant("index buffer assigned twice"));
        }
        if indices.is_empty() {
            return Err(FrameworkError::invariant("index buffer is empty"));
        }
        self.index = Some(indices.to_vec());
        Ok(self)
    }

    /// Validates vertex counts and uploads every stream to the device.
    pub fn build(&self, device: &mut dyn GraphicsDevice) -> Result<Geometry> {
        let mut counts = self
            .attributes
            .iter()
            .map(|(name, (data, components))| (name, data.len() / components));
        let Some((first_name, vertex_count)) = counts.next() else {
            return Err(FrameworkError::invariant("geometry has no attributes"));
        };
        if let Some((name, count)) = counts.find(|(_, count)| *count != vertex_count) {
            return Err(FrameworkError::invariant(format!(
                "attribute {name} has {count} vertices but {first_name} has {vertex_count}"
            )));
        }
        if let Some(indices) = &self.index {
            if let Some(out_of_range) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(FrameworkError::invariant(format!(
                    "index {out_of_range} is out of range for {vertex_count} vertices"
                )));
            }
        }

        let mut attributes = BTreeMap::new();
        for (name, (data, components)) in &self.attributes {
            let attribute = Attribute {
                buffer: device.create_buffer()?,
                data: data.clone(),
                components: *components,
            };
            attribute.upload(device);
            attributes.insert(name.clone(), attribute);
        }

        let index = match &self.index {
            Some(indices) => {
                let buffer = device.create_buffer()?;
                device.upload_buffer(BufferTarget::Index, buffer, bytemuck::cast_slice(indices));
                Some(Index {
                    buffer,
                    count: indices.len(),
                })
            }
            None => None,
        };

        Ok(Geometry {
            attributes,
            index,
            vertex_count,
        })
    }
}

//! Ready-made geometries.

use std::f32::consts::PI;
use std::ops::RangeInclusive;

use glam::{Vec2, Vec3};

use super::{Geometry, GeometryBuilder, COLOR, NORMAL, POSITION, TEXCOORD};
use crate::device::GraphicsDevice;
use crate::error::{FrameworkError, Result};

const FACE_COLORS: [Vec3; 6] = [
    Vec3::new(1.0, 0.5, 0.5),
    Vec3::new(0.5, 0.0, 0.0),
    Vec3::new(0.5, 1.0, 0.5),
    Vec3::new(0.0, 0.5, 0.0),
    Vec3::new(0.5, 0.5, 1.0),
    Vec3::new(0.0, 0.0, 0.5),
];

// Corner indices per face, two counter-clockwise triangles each: +x, -x, +y, -y, +z, -z.
const BOX_FACES: [usize; 36] = [
    5, 1, 3, 5, 3, 7, //
    0, 4, 6, 0, 6, 2, //
    6, 7, 3, 6, 3, 2, //
    0, 1, 5, 0, 5, 4, //
    4, 5, 7, 4, 7, 6, //
    1, 0, 2, 1, 2, 3,
];

const FACE_TEXCOORDS: [Vec2; 6] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 1.0),
];

/// Axis-aligned box centred on the origin, 36 unindexed vertices with a flat colour per face.
pub fn box_builder(width: f32, height: f32, depth: f32) -> Result<GeometryBuilder> {
    let half = Vec3::new(width, height, depth) / 2.0;
    let corners: Vec<Vec3> = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 == 0 { -half.x } else { half.x },
                if i & 2 == 0 { -half.y } else { half.y },
                if i & 4 == 0 { -half.z } else { half.z },
            )
        })
        .collect();

    let positions: Vec<Vec3> = BOX_FACES.iter().map(|&i| corners[i]).collect();
    let colors: Vec<Vec3> = FACE_COLORS
        .iter()
        .flat_map(|&color| std::iter::repeat(color).take(6))
        .collect();
    let texcoords: Vec<Vec2> = std::iter::repeat(FACE_TEXCOORDS).take(6).flatten().collect();
    let normals: Vec<Vec3> = positions
        .chunks(6)
        .flat_map(|face| {
            let normal = (face[1] - face[0]).cross(face[2] - face[0]).normalize_or_zero();
            std::iter::repeat(normal).take(6)
        })
        .collect();

    let mut builder = Geometry::builder();
    builder
        .attribute(POSITION, &positions)?
        .attribute(COLOR, &colors)?
        .attribute(TEXCOORD, &texcoords)?
        .attribute(NORMAL, &normals)?;
    Ok(builder)
}

pub fn box_geometry(
    device: &mut dyn GraphicsDevice,
    width: f32,
    height: f32,
    depth: f32,
) -> Result<Geometry> {
    box_builder(width, height, depth)?.build(device)
}

/// Rectangle in the XY plane facing +z: four vertices, two indexed triangles.
pub fn rectangle_builder(width: f32, height: f32) -> Result<GeometryBuilder> {
    let (w, h) = (width / 2.0, height / 2.0);
    let mut builder = Geometry::builder();
    builder
        .attribute(
            POSITION,
            &[
                Vec3::new(-w, -h, 0.0),
                Vec3::new(w, -h, 0.0),
                Vec3::new(-w, h, 0.0),
                Vec3::new(w, h, 0.0),
            ],
        )?
        .attribute(COLOR, &[Vec3::ONE, Vec3::X, Vec3::Y, Vec3::Z])?
        .attribute(
            TEXCOORD,
            &[Vec2::ZERO, Vec2::X, Vec2::Y, Vec2::ONE],
        )?
        .attribute(NORMAL, &[Vec3::Z; 4])?
        .index(&[0, 1, 3, 0, 3, 2])?;
    Ok(builder)
}

pub fn rectangle_geometry(
    device: &mut dyn GraphicsDevice,
    width: f32,
    height: f32,
) -> Result<Geometry> {
    rectangle_builder(width, height)?.build(device)
}

/// Step used for finite-difference normals.
const H: f32 = 0.0001;

/// Surface sampled on a regular (u, v) grid.
pub struct ParametricSurface<F> {
    u_range: RangeInclusive<f32>,
    u_resolution: usize,
    v_range: RangeInclusive<f32>,
    v_resolution: usize,
    function: F,
}

impl<F: Fn(f32, f32) -> Vec3> ParametricSurface<F> {
    pub fn new(
        u_range: RangeInclusive<f32>,
        u_resolution: usize,
        v_range: RangeInclusive<f32>,
        v_resolution: usize,
        function: F,
    ) -> Result<Self> {
        if u_resolution == 0 || v_resolution == 0 {
            return Err(FrameworkError::invariant(
                "parametric surface needs at least one segment per direction",
            ));
        }
        if (u_resolution + 1) * (v_resolution + 1) > usize::from(u16::MAX) + 1 {
            return Err(FrameworkError::invariant(format!(
                "{u_resolution}x{v_resolution} segments exceed 16-bit indices"
            )));
        }
        Ok(Self {
            u_range,
            u_resolution,
            v_range,
            v_resolution,
            function,
        })
    }

    fn samples(&self) -> impl Iterator<Item = (usize, usize, f32, f32)> + '_ {
        let u_delta = (self.u_range.end() - self.u_range.start()) / self.u_resolution as f32;
        let v_delta = (self.v_range.end() - self.v_range.start()) / self.v_resolution as f32;
        (0..=self.u_resolution).flat_map(move |ui| {
            (0..=self.v_resolution).map(move |vi| {
                (
                    ui,
                    vi,
                    self.u_range.start() + ui as f32 * u_delta,
                    self.v_range.start() + vi as f32 * v_delta,
                )
            })
        })
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.samples()
            .map(|(_, _, u, v)| (self.function)(u, v))
            .collect()
    }

    pub fn normals(&self) -> Vec<Vec3> {
        self.samples()
            .map(|(_, _, u, v)| {
                let p0 = (self.function)(u, v);
                let p1 = (self.function)(u + H, v);
                let p2 = (self.function)(u, v + H);
                (p1 - p0).cross(p2 - p0).normalize_or_zero()
            })
            .collect()
    }

    pub fn texcoords(&self) -> Vec<Vec2> {
        self.samples()
            .map(|(ui, vi, _, _)| {
                Vec2::new(
                    ui as f32 / self.u_resolution as f32,
                    vi as f32 / self.v_resolution as f32,
                )
            })
            .collect()
    }

    pub fn indices(&self) -> Vec<u16> {
        let offset = |ui: usize, vi: usize| (ui * (self.v_resolution + 1) + vi) as u16;
        let mut indices = Vec::with_capacity(6 * self.u_resolution * self.v_resolution);
        for ui in 0..self.u_resolution {
            for vi in 0..self.v_resolution {
                let (i, j) = (offset(ui, vi), offset(ui + 1, vi));
                let (k, l) = (offset(ui, vi + 1), offset(ui + 1, vi + 1));
                indices.extend_from_slice(&[i, j, k, k, j, l]);
            }
        }
        indices
    }

    pub fn builder(&self) -> Result<GeometryBuilder> {
        let positions = self.positions();
        let colors = vec![Vec3::ONE; positions.len()];
        let mut builder = Geometry::builder();
        builder
            .attribute(POSITION, &positions)?
            .attribute(COLOR, &colors)?
            .attribute(TEXCOORD, &self.texcoords())?
            .attribute(NORMAL, &self.normals())?
            .index(&self.indices())?;
        Ok(builder)
    }
}

pub fn sphere(
    radius: f32,
    radius_segments: usize,
    height_segments: usize,
) -> Result<ParametricSurface<impl Fn(f32, f32) -> Vec3>> {
    ParametricSurface::new(
        0.0..=2.0 * PI,
        radius_segments,
        -PI / 2.0..=PI / 2.0,
        height_segments,
        move |u, v| {
            Vec3::new(
                radius * u.sin() * v.cos(),
                radius * v.sin(),
                radius * u.cos() * v.cos(),
            )
        },
    )
}

pub fn sphere_geometry(
    device: &mut dyn GraphicsDevice,
    radius: f32,
    radius_segments: usize,
    height_segments: usize,
) -> Result<Geometry> {
    sphere(radius, radius_segments, height_segments)?
        .builder()?
        .build(device)
}

/// Parallelogram spanned by `u_edge` and `v_edge` from `origin`.
pub fn plane(
    origin: Vec3,
    u_edge: Vec3,
    v_edge: Vec3,
    u_resolution: usize,
    v_resolution: usize,
) -> Result<ParametricSurface<impl Fn(f32, f32) -> Vec3>> {
    ParametricSurface::new(0.0..=1.0, u_resolution, 0.0..=1.0, v_resolution, move |u, v| {
        origin + u_edge * u + v_edge * v
    })
}

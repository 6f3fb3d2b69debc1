use std::thread::{self, JoinHandle};

use clone_macro::clone;
use nalgebra::Vector3;
use thiserror::Error;

use common::{progress::Progress, serde::SliceDeserializer, units::LengthUnit};

pub mod stl;

/// An indexed triangle mesh. Vertices are deduplicated by exact bit
/// pattern during parsing; per-face normals are kept as parsed but are
/// informational only.
#[derive(Debug, Default, Clone)]
pub struct Mesh {
    pub verts: Vec<Vector3<f32>>,
    pub faces: Vec<[u32; 3]>,
    pub normals: Vec<Vector3<f32>>,
}

impl Mesh {
    /// The three vertex positions of a face.
    pub fn face_verts(&self, face: usize) -> [Vector3<f32>; 3] {
        let [a, b, c] = self.faces[face];
        [
            self.verts[a as usize],
            self.verts[b as usize],
            self.verts[c as usize],
        ]
    }

    /// Scales every vertex by the unit's millimeter factor so all
    /// downstream geometry runs in canonical mm.
    pub fn normalize_units(&mut self, unit: LengthUnit) {
        let scale = unit.scale();
        if scale != 1.0 {
            for vert in &mut self.verts {
                *vert *= scale;
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed mesh file: {0}")]
    Malformed(&'static str),
    #[error("file truncated: read {triangles_read} of {declared} declared triangles")]
    Truncated {
        triangles_read: u32,
        declared: u32,
    },
    #[error("unsupported mesh format: {0}")]
    UnsupportedFormat(String),
}

/// Parses a mesh on a worker thread, reporting per-triangle progress.
/// Used by interactive callers; the estimation pipeline parses inline
/// with [`stl::parse`].
pub fn load_mesh(data: Vec<u8>, format: &str) -> (Progress, JoinHandle<Result<Mesh, ParseError>>) {
    let progress = Progress::new();

    let format = format.to_ascii_lowercase();
    let join = thread::spawn(clone!([progress], move || {
        let result = match format.as_str() {
            "stl" => stl::parse(&mut SliceDeserializer::new(&data), &progress),
            other => Err(ParseError::UnsupportedFormat(other.to_owned())),
        };

        progress.finish();
        result
    }));

    (progress, join)
}

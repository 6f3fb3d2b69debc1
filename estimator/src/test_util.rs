//! Hand-built fixtures shared across the crate's test modules.

use nalgebra::Vector3;

use mesh_format::Mesh;

/// Axis-aligned unit cube with consistent outward winding: 8 vertices,
/// 12 faces, volume 1, surface area 6.
pub fn unit_cube() -> Mesh {
    cube(1.0)
}

pub fn cube(side: f32) -> Mesh {
    let verts = vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(side, 0.0, 0.0),
        Vector3::new(side, side, 0.0),
        Vector3::new(0.0, side, 0.0),
        Vector3::new(0.0, 0.0, side),
        Vector3::new(side, 0.0, side),
        Vector3::new(side, side, side),
        Vector3::new(0.0, side, side),
    ];

    let faces = vec![
        [0, 3, 2], [0, 2, 1], // bottom
        [4, 5, 6], [4, 6, 7], // top
        [0, 1, 5], [0, 5, 4], // front
        [3, 7, 6], [3, 6, 2], // back
        [0, 4, 7], [0, 7, 3], // left
        [1, 2, 6], [1, 6, 5], // right
    ];

    Mesh {
        verts,
        faces,
        normals: Vec::new(),
    }
}

/// Binary STL bytes for a cube of the given side length. The declared
/// triangle count can be overridden to fabricate truncated files.
pub fn cube_stl(side: f32, declared: Option<u32>) -> Vec<u8> {
    let mesh = cube(side);

    let mut out = vec![0u8; 80];
    out.extend_from_slice(&declared.unwrap_or(mesh.faces.len() as u32).to_le_bytes());
    for &face in &mesh.faces {
        out.extend_from_slice(&[0; 12]); // normal
        for idx in face {
            let vert = mesh.verts[idx as usize];
            for component in [vert.x, vert.y, vert.z] {
                out.extend_from_slice(&component.to_le_bytes());
            }
        }
        out.extend_from_slice(&[0; 2]);
    }

    out
}

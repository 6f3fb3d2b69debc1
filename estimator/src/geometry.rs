//! Volume, surface area, and watertightness of triangle meshes, plus a
//! best-effort hole filler for open surfaces.

use std::collections::HashMap;

use nalgebra::Vector3;
use tracing::{debug, warn};

use mesh_format::Mesh;

use crate::Pos;

/// Immutable geometric snapshot of a mesh. Must be recomputed from
/// scratch if the mesh is repaired; a repair produces a new mesh and a
/// new summary, never a patched one.
#[derive(Debug, Clone, Copy)]
pub struct GeometrySummary {
    /// Signed volume in mm³. Magnitude is correct even if the mesh's
    /// global orientation is inverted; take `abs()` for physical volume.
    pub volume: f64,
    /// Total surface area in mm².
    pub surface_area: f64,
    pub min: Pos,
    pub max: Pos,
    pub watertight: bool,
}

impl GeometrySummary {
    /// Returns `None` for a mesh with no vertices.
    pub fn compute(mesh: &Mesh) -> Option<Self> {
        let (min, max) = bounds(mesh)?;
        Some(Self {
            volume: compute_volume(mesh),
            surface_area: compute_surface_area(mesh),
            min,
            max,
            watertight: is_watertight(mesh),
        })
    }

    pub fn extents(&self) -> Pos {
        self.max - self.min
    }
}

/// Signed volume of the surface via tetrahedron decomposition: each
/// triangle forms a signed tetrahedron with the origin, and for a
/// closed consistently-oriented surface the sum is exact. The anchor
/// point is arbitrary, which is why the result is invariant under
/// translating every vertex. Accumulated in f64 so large meshes don't
/// lose precision to f32 rounding.
pub fn compute_volume(mesh: &Mesh) -> f64 {
    let mut volume = 0.0;
    for face in 0..mesh.faces.len() {
        let [v1, v2, v3] = mesh.face_verts(face).map(|v| v.cast::<f64>());
        volume += (v2 - v1).cross(&(v3 - v1)).dot(&v1) / 6.0;
    }

    volume
}

pub fn compute_surface_area(mesh: &Mesh) -> f64 {
    let mut area = 0.0;
    for face in 0..mesh.faces.len() {
        let [v1, v2, v3] = mesh.face_verts(face).map(|v| v.cast::<f64>());
        area += (v2 - v1).cross(&(v3 - v1)).norm() / 2.0;
    }

    area
}

/// Axis-aligned bounding box, or `None` for an empty mesh.
pub fn bounds(mesh: &Mesh) -> Option<(Pos, Pos)> {
    let first = *mesh.verts.first()?;
    let mut min = first;
    let mut max = first;
    for vert in &mesh.verts {
        min = min.inf(vert);
        max = max.sup(vert);
    }

    Some((min, max))
}

/// A mesh is watertight when every directed edge is matched by exactly
/// one oppositely-directed edge somewhere else in the mesh. Fails open
/// (returns false) when faces with repeated vertex indices make the
/// edge multiset meaningless.
pub fn is_watertight(mesh: &Mesh) -> bool {
    if mesh.faces.is_empty() {
        return false;
    }

    let mut edges = HashMap::new();
    for &[a, b, c] in &mesh.faces {
        if a == b || b == c || c == a {
            return false;
        }

        for edge in [(a, b), (b, c), (c, a)] {
            *edges.entry(edge).or_insert(0u32) += 1;
        }
    }

    (edges.iter()).all(|(&(a, b), &count)| count == 1 && edges.get(&(b, a)) == Some(&1))
}

/// Result of a hole-filling pass. `closed` reports whether every
/// boundary loop was filled; callers must not assume the mesh is now
/// watertight when it is false.
#[derive(Debug)]
pub struct RepairOutcome {
    pub mesh: Mesh,
    pub closed: bool,
    pub filled_loops: usize,
}

/// Closes boundary loops by fanning each one around its centroid. The
/// fan triangles run against the boundary direction so the new faces
/// pair up with the existing directed edges. Loops that cannot be
/// walked (junction vertices, dangling edges) are left open and
/// reported through `closed = false`.
pub fn repair(mesh: &Mesh) -> RepairOutcome {
    let mut counts = HashMap::new();
    for &[a, b, c] in &mesh.faces {
        for edge in [(a, b), (b, c), (c, a)] {
            *counts.entry(edge).or_insert(0u32) += 1;
        }
    }

    // A directed edge with no opposite partner lies on a hole boundary.
    // Boundary edges chain head-to-tail around each hole.
    let mut successor = HashMap::new();
    let mut walkable = true;
    for (&(a, b), &count) in &counts {
        let opposite = counts.get(&(b, a)).copied().unwrap_or(0);
        if count > opposite {
            // Two boundary edges leaving one vertex means a non-manifold
            // junction; the loop walk below will dead-end there.
            walkable &= successor.insert(a, b).is_none();
        }
    }

    if successor.is_empty() {
        return RepairOutcome {
            mesh: mesh.clone(),
            closed: true,
            filled_loops: 0,
        };
    }

    debug!("found {} boundary edges", successor.len());

    let mut verts = mesh.verts.clone();
    let mut faces = mesh.faces.clone();
    let mut normals = mesh.normals.clone();
    let mut closed = walkable;
    let mut filled_loops = 0;

    while let Some((&start, _)) = successor.iter().next() {
        let mut loop_verts = vec![start];
        let mut current = successor.remove(&start).unwrap_or(start);

        let complete = loop {
            if current == start {
                break true;
            }
            loop_verts.push(current);
            match successor.remove(&current) {
                Some(next) => current = next,
                None => break false,
            }
        };

        if !complete || loop_verts.len() < 3 {
            warn!("boundary loop at vertex {start} is not closed, leaving it open");
            closed = false;
            continue;
        }

        let centroid = (loop_verts.iter())
            .map(|&idx| verts[idx as usize].cast::<f64>())
            .fold(Vector3::zeros(), |acc, vert| acc + vert)
            / loop_verts.len() as f64;
        let centroid_idx = verts.len() as u32;
        verts.push(centroid.map(|x| x as f32));

        for i in 0..loop_verts.len() {
            let a = loop_verts[i];
            let b = loop_verts[(i + 1) % loop_verts.len()];
            faces.push([b, a, centroid_idx]);
            normals.push(face_normal(&verts, [b, a, centroid_idx]));
        }

        filled_loops += 1;
    }

    debug!(filled_loops, closed, "hole fill finished");

    RepairOutcome {
        mesh: Mesh {
            verts,
            faces,
            normals,
        },
        closed,
        filled_loops,
    }
}

fn face_normal(verts: &[Pos], [a, b, c]: [u32; 3]) -> Pos {
    let (a, b, c) = (
        verts[a as usize],
        verts[b as usize],
        verts[c as usize],
    );
    let normal = (b - a).cross(&(c - a));
    if normal.norm() > 0.0 {
        normal.normalize()
    } else {
        Vector3::zeros()
    }
}

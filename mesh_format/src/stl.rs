use std::collections::HashMap;

use nalgebra::Vector3;
use tracing::debug;

use common::{progress::Progress, serde::Deserializer};

use crate::{Mesh, ParseError};

/// Bytes per binary STL triangle record: a normal, three vertices, and
/// a two byte attribute count.
const RECORD_SIZE: usize = 50;
/// 80 byte comment header plus the u32 triangle count.
const HEADER_SIZE: usize = 84;

/// Parse an STL file, failing with [`ParseError::Truncated`] if the
/// declared triangle count exceeds the bytes actually present.
///
/// ```text
/// UINT8[80]    – Header                 - 80 bytes
/// UINT32       – Number of triangles    - 04 bytes
/// foreach triangle                      - 50 bytes
///     REAL32[3] – Normal vector         - 12 bytes
///     REAL32[3] – Vertex 1              - 12 bytes
///     REAL32[3] – Vertex 2              - 12 bytes
///     REAL32[3] – Vertex 3              - 12 bytes
///     UINT16    – Attribute byte count  - 02 bytes
/// end
/// ```
///
/// All fields are little-endian; no other byte order exists on disk.
pub fn parse<T: Deserializer>(des: &mut T, progress: &Progress) -> Result<Mesh, ParseError> {
    parse_inner(des, progress, false)
}

/// Like [`parse`], but a truncated binary file yields the triangles
/// that were fully present instead of an error. Used by the
/// bounding-box fallback, which only needs enough geometry for extents.
pub fn parse_lenient<T: Deserializer>(
    des: &mut T,
    progress: &Progress,
) -> Result<Mesh, ParseError> {
    parse_inner(des, progress, true)
}

fn parse_inner<T: Deserializer>(
    des: &mut T,
    progress: &Progress,
    lenient: bool,
) -> Result<Mesh, ParseError> {
    if des.remaining() == 0 {
        return Err(ParseError::Malformed("empty input"));
    }

    if is_ascii(des) {
        return ascii::parse(des, progress);
    }

    if des.remaining() < HEADER_SIZE {
        return Err(ParseError::Malformed("shorter than the binary header"));
    }

    des.advance_by(80); // comment header, ignored
    let declared = des.read_u32_le();
    let available = (des.remaining() / RECORD_SIZE) as u32;

    let count = if available < declared {
        if !lenient {
            return Err(ParseError::Truncated {
                triangles_read: available,
                declared,
            });
        }
        debug!("truncated stl: {available} of {declared} records present");
        available
    } else {
        declared
    };

    if lenient && count == 0 {
        return Err(ParseError::Malformed("no complete triangle records"));
    }

    progress.set_total(count as u64);

    let mut builder = MeshBuilder::default();
    for i in 0..count {
        progress.set_complete(i as u64);
        let normal = read_vec3(des);
        let triangle = [read_vec3(des), read_vec3(des), read_vec3(des)];
        des.advance_by(2); // attribute byte count
        builder.push(triangle, normal);
    }

    Ok(builder.finish())
}

/// Binary files occasionally begin with the bytes `solid` too, so only
/// treat the input as ASCII if a `facet` keyword shows up near the top
/// as well.
fn is_ascii<T: Deserializer>(des: &mut T) -> bool {
    let start = des.pos();
    let head = des.read_bytes(1024).to_vec();
    des.jump_to(start);

    head.starts_with(b"solid") && head.windows(5).any(|window| window == b"facet")
}

mod ascii {
    use super::*;

    /// ```text
    /// solid name
    /// facet normal ni nj nk
    ///     outer loop
    ///         vertex v1x v1y v1z
    ///         vertex v2x v2y v2z
    ///         vertex v3x v3y v3z
    ///     endloop
    /// endfacet
    /// endsolid name
    /// ```
    pub fn parse<T: Deserializer>(des: &mut T, progress: &Progress) -> Result<Mesh, ParseError> {
        progress.set_total(des.remaining() as u64);
        let start = des.pos();
        let text = String::from_utf8_lossy(des.read_bytes(des.remaining())).into_owned();

        let mut builder = MeshBuilder::default();
        let mut normal = Vector3::zeros();
        let mut corners = [Vector3::zeros(); 3];
        let mut filled = 0;

        // Numbers only ever follow a `normal` or `vertex` keyword, so a
        // flat token walk is enough. `pending` is where the next parsed
        // floats land.
        let mut pending: Option<(usize, usize)> = None; // (target, component)
        for token in text.split_ascii_whitespace() {
            if let Some((target, component)) = pending {
                let Ok(value) = token.parse::<f32>() else {
                    return Err(ParseError::Malformed("non-numeric ascii coordinate"));
                };

                if target == 3 {
                    normal[component] = value;
                } else {
                    corners[target][component] = value;
                }

                pending = (component < 2).then_some((target, component + 1));
                continue;
            }

            match token {
                "normal" => pending = Some((3, 0)),
                "vertex" => {
                    if filled == 3 {
                        return Err(ParseError::Malformed("more than three vertices in facet"));
                    }
                    pending = Some((filled, 0));
                    filled += 1;
                }
                "endfacet" => {
                    if filled != 3 {
                        return Err(ParseError::Malformed("facet with fewer than three vertices"));
                    }
                    builder.push(corners, normal);
                    filled = 0;
                }
                _ => {}
            }
        }

        if builder.is_empty() {
            return Err(ParseError::Malformed("ascii stl with no facets"));
        }

        progress.set_complete((des.pos() - start) as u64);
        Ok(builder.finish())
    }
}

/// Deduplicates vertices by exact bit pattern while keeping faces in
/// file order.
#[derive(Default)]
struct MeshBuilder {
    verts: HashMap<Vector3<u32>, u32>,
    faces: Vec<[u32; 3]>,
    normals: Vec<Vector3<f32>>,
}

impl MeshBuilder {
    fn push(&mut self, triangle: [Vector3<f32>; 3], normal: Vector3<f32>) {
        let face = triangle.map(|vert| self.vert_idx(vert));
        self.faces.push(face);
        self.normals.push(normal);
    }

    fn vert_idx(&mut self, vert: Vector3<f32>) -> u32 {
        let size = self.verts.len() as u32;
        *self.verts.entry(vert.map(f32::to_bits)).or_insert(size)
    }

    fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    fn finish(self) -> Mesh {
        let mut verts = self.verts.into_iter().collect::<Vec<_>>();
        verts.sort_by_key(|(_vert, idx)| *idx);
        let verts = (verts.into_iter())
            .map(|(vert, _idx)| vert.map(f32::from_bits))
            .collect();

        Mesh {
            verts,
            faces: self.faces,
            normals: self.normals,
        }
    }
}

fn read_vec3<T: Deserializer>(des: &mut T) -> Vector3<f32> {
    Vector3::new(des.read_f32_le(), des.read_f32_le(), des.read_f32_le())
}

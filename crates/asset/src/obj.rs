//! Wavefront OBJ loader producing non-indexed triangle lists.
//!
//! Faces may reference positions, texture coordinates and normals in any of
//! the `v`, `v/vt`, `v//vn` and `v/vt/vn` forms. Polygons are split into a
//! triangle fan and every corner is copied out, so the result can be drawn
//! with a plain `draw(0..n)`.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};

use crate::mesh::MeshData;

const DEFAULT_UV: [f32; 2] = [0.0, 0.0];
const DEFAULT_NORMAL: [f32; 3] = [0.0, 0.0, 1.0];

/// Load an OBJ mesh from a file path.
pub fn load_obj_from_path(path: impl AsRef<Path>) -> Result<MeshData> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open OBJ file: {}", path.display()))?;
    let mesh = load_obj_from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse OBJ file: {}", path.display()))?;
    log::info!(
        "Loaded {} ({} triangles, {} vertices)",
        path.display(),
        mesh.triangle_count(),
        mesh.vertex_count()
    );
    Ok(mesh)
}

/// Load an OBJ mesh from a [`BufRead`] implementation.
pub fn load_obj_from_reader<R: BufRead>(reader: R) -> Result<MeshData> {
    ObjParser::default().parse(reader)
}

/// Convenience helper to parse an OBJ string literal.
pub fn load_obj_from_str(contents: &str) -> Result<MeshData> {
    load_obj_from_reader(io::Cursor::new(contents))
}

/// One face corner: position index plus optional uv/normal indices (0-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Corner {
    position: usize,
    uv: Option<usize>,
    normal: Option<usize>,
}

#[derive(Default)]
struct ObjParser {
    positions: Vec<[f32; 3]>,
    texcoords: Vec<[f32; 2]>,
    normals: Vec<[f32; 3]>,
    out: MeshData,
}

impl ObjParser {
    fn parse<R: BufRead>(mut self, reader: R) -> Result<MeshData> {
        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.with_context(|| format!("Failed to read line {line_no}"))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut parts = trimmed.split_whitespace();
            let Some(tag) = parts.next() else {
                continue;
            };

            match tag {
                "v" => {
                    let x = parse_f32(parts.next(), line_no, "x coordinate")?;
                    let y = parse_f32(parts.next(), line_no, "y coordinate")?;
                    let z = parse_f32(parts.next(), line_no, "z coordinate")?;
                    self.positions.push([x, y, z]);
                }
                "vt" => {
                    let u = parse_f32(parts.next(), line_no, "u coordinate")?;
                    let v = parse_f32(parts.next(), line_no, "v coordinate")?;
                    self.texcoords.push([u, v]);
                }
                "vn" => {
                    let nx = parse_f32(parts.next(), line_no, "nx coordinate")?;
                    let ny = parse_f32(parts.next(), line_no, "ny coordinate")?;
                    let nz = parse_f32(parts.next(), line_no, "nz coordinate")?;
                    self.normals.push([nx, ny, nz]);
                }
                "f" => {
                    let corners = parts
                        .map(|token| self.parse_corner(token, line_no))
                        .collect::<Result<Vec<_>>>()?;
                    if corners.len() < 3 {
                        bail!(
                            "Face on line {} has {} corners, need at least 3",
                            line_no,
                            corners.len()
                        );
                    }
                    for i in 1..corners.len() - 1 {
                        for corner in [corners[0], corners[i], corners[i + 1]] {
                            self.emit(corner);
                        }
                    }
                }
                // o/g/s/usemtl/mtllib carry nothing we render.
                _ => {}
            }
        }

        if self.out.vertices.is_empty() {
            bail!("OBJ contained no triangles");
        }
        Ok(self.out)
    }

    fn parse_corner(&self, token: &str, line_no: usize) -> Result<Corner> {
        let mut split = token.split('/');
        let pos = split
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("Malformed face element '{token}' on line {line_no}"))?;
        let position = resolve_index(pos, self.positions.len(), line_no)?;

        let uv = match split.next() {
            Some(value) if !value.is_empty() => {
                Some(resolve_index(value, self.texcoords.len(), line_no)?)
            }
            _ => None,
        };
        let normal = match split.next() {
            Some(value) if !value.is_empty() => {
                Some(resolve_index(value, self.normals.len(), line_no)?)
            }
            _ => None,
        };

        Ok(Corner {
            position,
            uv,
            normal,
        })
    }

    /// Indices were range-checked in `parse_corner`.
    fn emit(&mut self, corner: Corner) {
        self.out.vertices.push(self.positions[corner.position]);
        self.out
            .uvs
            .push(corner.uv.map_or(DEFAULT_UV, |i| self.texcoords[i]));
        self.out
            .normals
            .push(corner.normal.map_or(DEFAULT_NORMAL, |i| self.normals[i]));
    }
}

fn parse_f32(value: Option<&str>, line_no: usize, what: &str) -> Result<f32> {
    let token = value.ok_or_else(|| anyhow!("Missing {what} on line {line_no}"))?;
    token
        .parse::<f32>()
        .with_context(|| format!("Failed to parse {what} '{token}' on line {line_no}"))
}

/// OBJ indices are 1-based; negative values count back from the latest element.
fn resolve_index(token: &str, len: usize, line_no: usize) -> Result<usize> {
    let raw = token
        .parse::<i64>()
        .with_context(|| format!("Invalid index '{token}' on line {line_no}"))?;
    if raw == 0 {
        bail!("OBJ indices are 1-based; found 0 on line {line_no}");
    }

    let idx = if raw > 0 { raw - 1 } else { len as i64 + raw };
    if idx < 0 || idx as usize >= len {
        bail!("OBJ index {raw} resolved out of bounds (len={len}) on line {line_no}");
    }

    Ok(idx as usize)
}

//! CPU-side mesh representation used by loaders.

/// Non-indexed triangle list stored as parallel attribute arrays.
///
/// Entry `i` of every array belongs to the same vertex and every three
/// consecutive vertices form one triangle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    /// Parsed but not consumed by the renderer.
    pub normals: Vec<[f32; 3]>,
}

impl MeshData {
    pub fn new(vertices: Vec<[f32; 3]>, uvs: Vec<[f32; 2]>, normals: Vec<[f32; 3]>) -> Self {
        Self {
            vertices,
            uvs,
            normals,
        }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Non-empty, whole triangles, and all attribute arrays line up.
    pub fn is_valid(&self) -> bool {
        let n = self.vertices.len();
        n > 0 && n % 3 == 0 && self.uvs.len() == n && self.normals.len() == n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_data_validity() {
        let tri = MeshData::new(vec![[0.0; 3]; 3], vec![[0.0; 2]; 3], vec![[0.0; 3]; 3]);
        assert!(tri.is_valid());
        assert_eq!(tri.triangle_count(), 1);

        let ragged = MeshData::new(vec![[0.0; 3]; 3], vec![[0.0; 2]; 2], vec![[0.0; 3]; 3]);
        assert!(!ragged.is_valid());

        assert!(!MeshData::default().is_valid());
    }
}

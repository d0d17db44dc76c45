//! Asset loading/parsers (meshes, textures, shaders).
//! OBJ meshes become non-indexed triangle lists, images become RGBA8,
//! shader stages are read from disk and checked before GPU upload.

pub mod mesh;
pub mod obj;
pub mod shader;
pub mod texture;

pub use mesh::MeshData;
pub use shader::{CompiledShaders, ShaderSources};
pub use texture::TextureData;

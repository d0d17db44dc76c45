use std::path::PathBuf;

/// Compile-time settings for the viewer window and its assets.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Requested MSAA sample count; falls back to 1 when unsupported.
    pub sample_count: u32,
    pub clear_color: [f64; 4],
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub model: PathBuf,
    pub texture: PathBuf,
}

impl AppConfig {
    /// Defaults with every asset path resolved under `dir`.
    pub fn with_asset_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            vertex_shader: dir.join("shaders/transform.vert.wgsl"),
            fragment_shader: dir.join("shaders/texture.frag.wgsl"),
            model: dir.join("cube.obj"),
            texture: dir.join("uvmap.bmp"),
            ..Self::default()
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Tutorial 07 - Model Loading".to_string(),
            width: 1024,
            height: 768,
            sample_count: 4,
            // Dark blue
            clear_color: [0.0, 0.0, 0.4, 0.0],
            vertex_shader: PathBuf::from("assets/shaders/transform.vert.wgsl"),
            fragment_shader: PathBuf::from("assets/shaders/texture.frag.wgsl"),
            model: PathBuf::from("assets/cube.obj"),
            texture: PathBuf::from("assets/uvmap.bmp"),
        }
    }
}

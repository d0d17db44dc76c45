//! Shader program sources: one WGSL file per stage.
//!
//! `compile` front-loads the checks the GPU driver would otherwise report at
//! pipeline creation: both stages must parse, validate, and export the entry
//! point the renderer links against.

use std::{fmt, fs, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use naga::{
    ShaderStage,
    valid::{Capabilities, ValidationFlags, Validator},
};

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    pub fn entry_point(self) -> &'static str {
        match self {
            Stage::Vertex => VERTEX_ENTRY,
            Stage::Fragment => FRAGMENT_ENTRY,
        }
    }

    fn naga_stage(self) -> ShaderStage {
        match self {
            Stage::Vertex => ShaderStage::Vertex,
            Stage::Fragment => ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

/// WGSL source for the vertex and fragment stages.
#[derive(Clone, Debug)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

/// Sources that passed [`ShaderSources::compile`].
#[derive(Clone, Debug)]
pub struct CompiledShaders {
    sources: ShaderSources,
}

impl CompiledShaders {
    pub fn vertex_source(&self) -> &str {
        &self.sources.vertex
    }

    pub fn fragment_source(&self) -> &str {
        &self.sources.fragment
    }
}

impl ShaderSources {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// Read both stage files.
    pub fn load(vertex_path: impl AsRef<Path>, fragment_path: impl AsRef<Path>) -> Result<Self> {
        let read = |path: &Path, stage: Stage| {
            log::info!("Loading {stage} shader from {:?}", path);
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read {stage} shader {path:?}"))
        };
        Ok(Self {
            vertex: read(vertex_path.as_ref(), Stage::Vertex)?,
            fragment: read(fragment_path.as_ref(), Stage::Fragment)?,
        })
    }

    /// Parse and validate both stages and check their entry points.
    pub fn compile(self) -> Result<CompiledShaders> {
        check_stage(&self.vertex, Stage::Vertex)?;
        check_stage(&self.fragment, Stage::Fragment)?;
        Ok(CompiledShaders { sources: self })
    }
}

fn check_stage(source: &str, stage: Stage) -> Result<()> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| anyhow!("{stage} shader failed to parse:\n{}", e.emit_to_string(source)))?;

    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| anyhow!("{stage} shader failed validation: {e}"))?;

    let entry = stage.entry_point();
    let found = module
        .entry_points
        .iter()
        .any(|ep| ep.name == entry && ep.stage == stage.naga_stage());
    if !found {
        bail!("{stage} shader has no {stage} entry point named `{entry}`");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERT_PATH: &str = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../assets/shaders/transform.vert.wgsl"
    );
    const FRAG_PATH: &str = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../assets/shaders/texture.frag.wgsl"
    );

    const FLAT_FRAG: &str = r#"
        @fragment
        fn fs_main() -> @location(0) vec4<f32> {
            return vec4<f32>(1.0, 0.0, 0.0, 1.0);
        }
    "#;

    #[test]
    fn bundled_shaders_compile() {
        let sources = ShaderSources::load(VERT_PATH, FRAG_PATH).expect("read shaders");
        let compiled = sources.compile().expect("compile shaders");
        assert!(compiled.vertex_source().contains(VERTEX_ENTRY));
        assert!(compiled.fragment_source().contains(FRAGMENT_ENTRY));
    }

    #[test]
    fn syntax_error_names_the_stage() {
        let vert = std::fs::read_to_string(VERT_PATH).expect("read vertex");
        let err = ShaderSources::new(vert, "@fragment fn fs_main( {")
            .compile()
            .unwrap_err();
        assert!(err.to_string().contains("fragment shader failed to parse"));
    }

    #[test]
    fn swapped_stages_fail_to_link() {
        let vert = std::fs::read_to_string(VERT_PATH).expect("read vertex");
        let err = ShaderSources::new(FLAT_FRAG, vert).compile().unwrap_err();
        assert!(err.to_string().contains("no vertex entry point"));
    }

    #[test]
    fn type_error_fails_validation() {
        let bad = r#"
            @vertex
            fn vs_main() -> @builtin(position) vec4<f32> {
                let v: vec4<f32> = 1u;
                return v;
            }
        "#;
        assert!(ShaderSources::new(bad, FLAT_FRAG).compile().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ShaderSources::load("nope.vert.wgsl", FRAG_PATH).unwrap_err();
        assert!(err.to_string().contains("Failed to read vertex shader"));
    }
}

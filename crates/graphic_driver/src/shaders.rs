//! Precompiled shader binaries
//!
//! The triangle pipeline consumes two SPIR-V blobs produced ahead of time.
//! They are read once at start-up and kept in memory so every pipeline
//! rebuild after a resize can recreate its shader modules without touching
//! the filesystem.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::config::ShaderConfig;
use crate::error::{DriverError, DriverResult};

/// SPIR-V words of the vertex and fragment stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBinaries {
    /// Vertex stage code
    pub vertex: Vec<u32>,
    /// Fragment stage code
    pub fragment: Vec<u32>,
}

impl ShaderBinaries {
    /// Read both stages from the configured location
    pub fn load(config: &ShaderConfig) -> DriverResult<Self> {
        let (vertex_path, fragment_path) = config.resolve_paths()?;
        log::info!("Loading shaders from {}", vertex_path.parent().unwrap_or(vertex_path.as_path()).display());

        Ok(Self {
            vertex: read_spirv_file(&vertex_path)?,
            fragment: read_spirv_file(&fragment_path)?,
        })
    }

    /// Parse both stages from in-memory bytes
    pub fn from_bytes(vertex: &[u8], fragment: &[u8]) -> DriverResult<Self> {
        Ok(Self {
            vertex: parse_spirv(vertex, Path::new("<vertex>"))?,
            fragment: parse_spirv(fragment, Path::new("<fragment>"))?,
        })
    }
}

fn read_spirv_file(path: &Path) -> DriverResult<Vec<u32>> {
    let bytes = std::fs::read(path).map_err(|source| DriverError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    })?;
    parse_spirv(&bytes, path)
}

fn parse_spirv(bytes: &[u8], origin: &Path) -> DriverResult<Vec<u32>> {
    if bytes.is_empty() {
        return Err(invalid(origin, "file is empty"));
    }

    ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| invalid(origin, &e.to_string()))
}

fn invalid(origin: &Path, reason: &str) -> DriverError {
    DriverError::InvalidShader {
        path: PathBuf::from(origin),
        reason: reason.to_string(),
    }
}

//! Manifest file loader
//!
//! Load a single manifest file, or every manifest in a directory. A manifest
//! file is named `manifest` or ends in `.manifest`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::parser::{parse, ParseError};
use super::step::Manifest;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {file}: {error}")]
    Parse { file: String, error: ParseError },

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },
}

pub struct ManifestLoader;

impl ManifestLoader {
    /// Parse `path`; the manifest is named after the file stem
    pub fn load_file(path: &Path, env: &HashMap<String, String>) -> Result<Manifest, LoadError> {
        let content = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("manifest");
        parse(name, &content, env).map_err(|error| LoadError::Parse {
            file: path.display().to_string(),
            error,
        })
    }

    /// Parse every manifest file directly inside `dir`, in file name order
    pub fn load_directory(
        dir: &Path,
        env: &HashMap<String, String>,
    ) -> Result<Vec<Manifest>, LoadError> {
        Self::manifest_files(dir)?
            .iter()
            .map(|path| Self::load_file(path, env))
            .collect()
    }

    pub fn manifest_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
        let mut files = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_manifest_file(&path) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

fn is_manifest_file(path: &Path) -> bool {
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    filename == "manifest" || path.extension().and_then(|e| e.to_str()) == Some("manifest")
}

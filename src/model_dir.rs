//! Model directory scanning
//!
//! An RVC model directory holds one `.pth` weights file and, optionally, one
//! `.index` retrieval index. Anything else in the folder is ignored.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{Result, RvcError};

/// Extension of the voice model weights
pub const WEIGHTS_EXTENSION: &str = ".pth";

/// Extension of the feature retrieval index
pub const INDEX_EXTENSION: &str = ".index";

/// Artifacts resolved from a model directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFiles {
    /// Path to the `.pth` weights file
    pub model_path: PathBuf,

    /// Path to the `.index` file, empty when the directory has none
    pub index_path: PathBuf,
}

impl ModelFiles {
    /// Whether a retrieval index was found
    pub fn has_index(&self) -> bool {
        !self.index_path.as_os_str().is_empty()
    }

    /// Index path as the string handed to the inference backend ("" if absent)
    pub fn index_path_str(&self) -> String {
        self.index_path.to_string_lossy().into_owned()
    }

    /// SHA-256 of the weights file, hex encoded
    pub fn weights_fingerprint(&self) -> Result<String> {
        sha256_file(&self.model_path)
    }
}

/// SHA-256 of a file's contents, hex encoded
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| RvcError::FileNotFound {
        path: path.display().to_string(),
        source: Some(e),
    })?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Locate the weights file and the optional index file in `model_dir`.
///
/// Only direct children are considered. Entries are visited in file name
/// order and a later match replaces an earlier one, so with several
/// candidates the lexicographically greatest name wins.
///
/// # Errors
/// * `FileNotFound` - `model_dir` does not exist or is not a directory
/// * `ModelWeightsNotFound` - no `.pth` file in the directory
pub fn get_rvc_model(model_dir: &Path) -> Result<ModelFiles> {
    if !model_dir.is_dir() {
        return Err(RvcError::FileNotFound {
            path: model_dir.display().to_string(),
            source: None,
        });
    }

    let mut model_path: Option<PathBuf> = None;
    let mut index_path: Option<PathBuf> = None;

    let entries = WalkDir::new(model_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for entry in entries {
        // dangling links and unreadable entries are not candidates
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Skipping entry in {}: {}", model_dir.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        let slot = if name.ends_with(WEIGHTS_EXTENSION) {
            &mut model_path
        } else if name.ends_with(INDEX_EXTENSION) {
            &mut index_path
        } else {
            continue;
        };

        if let Some(previous) = slot.replace(entry.path().to_path_buf()) {
            tracing::warn!(
                "Multiple candidates in {}: {} replaced by {}",
                model_dir.display(),
                previous.display(),
                entry.path().display()
            );
        }
    }

    let model_path = model_path.ok_or_else(|| RvcError::ModelWeightsNotFound {
        dir: model_dir.to_path_buf(),
    })?;

    tracing::debug!(
        model = %model_path.display(),
        index = %index_path.as_deref().map(|p| p.display().to_string()).unwrap_or_default(),
        "Resolved model directory"
    );

    Ok(ModelFiles {
        model_path,
        index_path: index_path.unwrap_or_default(),
    })
}

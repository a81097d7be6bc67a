//! Destination writer: hands the finished artifact to its final location.
//!
//! Only local filesystem destinations exist; any other `type` fails when the
//! configuration is parsed.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LoadError, LoadResult};
use crate::logs::log_info_indent;

/// Where the artifact ends up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Destination {
    Local {
        path: PathBuf,
    },
}

impl Destination {
    pub fn kind(&self) -> &'static str {
        match self {
            Destination::Local { .. } => "local",
        }
    }
}

/// The `load` section of a pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadConfig {
    pub destination: Destination,
}

impl LoadConfig {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            destination: Destination::Local { path: path.into() },
        }
    }
}

/// Move `artifact` to the configured destination and return where it landed.
pub fn load(artifact: &Path, config: &LoadConfig) -> LoadResult<PathBuf> {
    if !artifact.exists() {
        return Err(LoadError::SourceMissing(artifact.to_path_buf()));
    }

    match &config.destination {
        Destination::Local { path } => {
            move_file(artifact, path)?;
            log_info_indent(
                format!("{} -> {} ({})", artifact.display(), path.display(), config.destination.kind()),
                1,
            );
            Ok(path.clone())
        }
    }
}

fn move_file(from: &Path, to: &Path) -> LoadResult<()> {
    let io_error = |source| LoadError::Io {
        path: to.to_path_buf(),
        source,
    };

    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    if from == to {
        return Ok(());
    }

    // rename fails across filesystems
    if fs::rename(from, to).is_err() {
        fs::copy(from, to).map_err(io_error)?;
        fs::remove_file(from).map_err(|source| LoadError::Io {
            path: from.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

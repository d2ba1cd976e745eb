use std::path::PathBuf;

use thiserror::Error;

use crate::story::SceneId;

/// Errors raised while loading and validating a scene graph.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML story: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON story: {0}")]
    Json(#[from] serde_json::Error),

    /// The file extension is not one of `.yaml`, `.yml` or `.json`.
    #[error("unsupported story format: {} (expected .yaml, .yml or .json)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("story has no scenes")]
    Empty,

    /// Scene ids are positive integers.
    #[error("scene id 0 is not allowed; ids start at 1")]
    InvalidSceneId,

    #[error("scene {0} is missing required field `text`")]
    MissingText(SceneId),

    /// A choice entry must be a mapping with exactly one `label: action` key.
    #[error("scene {scene}, choice {index}: expected a single `label: action` entry, found {keys} keys")]
    MalformedChoice {
        scene: SceneId,
        index: usize,
        keys: usize,
    },

    #[error("scene {from} references scene {target}, which does not exist")]
    DanglingReference { from: SceneId, target: SceneId },

    #[error("start scene {0} does not exist")]
    UnknownStart(SceneId),
}

/// Errors raised by session transitions. These indicate a caller bug: the
/// operation was not valid for the current state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("choice {index} is out of range for scene {scene} ({available} choices)")]
    InvalidChoice {
        scene: SceneId,
        index: usize,
        available: usize,
    },

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },
}

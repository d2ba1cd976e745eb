pub mod graph;
pub mod scene;

pub use graph::SceneGraph;
pub use scene::{Action, Check, Ending, Scene, SceneId};

use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Bundled adventure
// ---------------------------------------------------------------------------

const RAT_QUEEN: &str = include_str!("../adventures/rat_queen.yaml");

/// The adventure played when no story file is given.
pub fn builtin() -> Result<SceneGraph, LoadError> {
    SceneGraph::from_yaml_str(RAT_QUEEN)
}

//! Scene model consumed by the compiler
//!
//! A scene is the editor's layer table frozen into plain data: ordered
//! layers, each with laser settings and a tree of items. It deserializes
//! from the editor's JSON snapshot.

mod bounds;
mod types;

pub use bounds::Bounds;
pub use types::*;

use crate::error::Result;

impl Scene {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self {
            layers,
            workspace: Workspace::default(),
        }
    }

    /// Parse a scene snapshot from JSON text
    pub fn from_json(json: &str) -> Result<Scene> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a scene snapshot from a JSON file
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Scene> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

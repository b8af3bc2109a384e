use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::foundation::core::NodeId;
use crate::foundation::error::VidgraphResult;

/// Persisted graph topology: nodes with their parameters, connections and output routes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDef {
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub edges: Vec<EdgeDef>,
    /// Output name to the node whose texture it shows.
    #[serde(default)]
    pub outputs: BTreeMap<String, NodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: NodeId,
    pub kind: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDef {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub slot: usize,
}

impl ModelDef {
    pub fn from_json_str(text: &str) -> VidgraphResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<std::path::Path>) -> VidgraphResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> VidgraphResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

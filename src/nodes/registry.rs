use std::collections::BTreeMap;
use std::sync::Arc;

use crate::foundation::config::MediaConfig;
use crate::foundation::error::{VidgraphError, VidgraphResult};
use crate::graph::node::VideoNode;
use crate::nodes::{filter, movie, pattern};

/// Builds a live node from its persisted parameters.
pub type NodeFactory =
    Arc<dyn Fn(&serde_json::Value) -> VidgraphResult<Box<dyn VideoNode>> + Send + Sync>;

/// Node kinds by name.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    factories: BTreeMap<String, NodeFactory>,
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `pattern`, `filter` and `movie`.
    pub fn with_builtins(media: &MediaConfig) -> Self {
        let mut reg = Self::new();
        reg.register(pattern::KIND, |v| {
            Ok(Box::new(pattern::PatternNode::from_value(v)?) as Box<dyn VideoNode>)
        });
        reg.register(filter::KIND, |v| {
            Ok(Box::new(filter::FilterNode::from_value(v)?) as Box<dyn VideoNode>)
        });
        let media = media.clone();
        reg.register(movie::KIND, move |v| {
            Ok(Box::new(movie::MovieNode::from_value(v, &media)?) as Box<dyn VideoNode>)
        });
        reg
    }

    /// Register `kind`, replacing any earlier factory of that name.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Value) -> VidgraphResult<Box<dyn VideoNode>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn create(
        &self,
        kind: &str,
        params: &serde_json::Value,
    ) -> VidgraphResult<Box<dyn VideoNode>> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| VidgraphError::graph(format!("unknown node kind '{kind}'")))?;
        factory(params)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/nodes/registry.rs"]
mod tests;

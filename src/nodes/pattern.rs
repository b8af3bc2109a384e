use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::foundation::core::{Rgba8Premul, TextureId};
use crate::foundation::error::{VidgraphError, VidgraphResult};
use crate::gpu::{ChainTexture, kernels};
use crate::graph::chain::{Chain, ChainId};
use crate::graph::node::{RenderStates, VideoNode};
use crate::nodes::params;

pub const KIND: &str = "pattern";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    #[default]
    Solid,
    Checker,
    Gradient,
}

/// Colours are straight-alpha RGBA8.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatternParams {
    pub pattern: PatternKind,
    pub color: [u8; 4],
    pub color2: [u8; 4],
    /// Checker cell edge in pixels.
    pub cell: u32,
    pub vertical: bool,
}

impl Default for PatternParams {
    fn default() -> Self {
        Self {
            pattern: PatternKind::Solid,
            color: [255, 255, 255, 255],
            color2: [0, 0, 0, 255],
            cell: 16,
            vertical: false,
        }
    }
}

impl PatternParams {
    fn validate(&self) -> VidgraphResult<()> {
        if self.cell == 0 {
            return Err(VidgraphError::validation("pattern.cell must be > 0"));
        }
        Ok(())
    }
}

fn premul(c: [u8; 4]) -> Rgba8Premul {
    Rgba8Premul::from_straight_rgba(c[0], c[1], c[2], c[3])
}

#[derive(Debug)]
struct PatternState {
    texture: ChainTexture,
    /// Parameters the texture currently shows.
    painted: Option<PatternParams>,
}

/// Generator with no inputs. Each chain keeps its own texture, repainted only when the
/// parameters change.
#[derive(Debug)]
pub struct PatternNode {
    params: PatternParams,
    states: RenderStates<PatternState>,
}

impl PatternNode {
    pub fn new(params: PatternParams) -> VidgraphResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            states: RenderStates::new(),
        })
    }

    pub fn from_value(value: &serde_json::Value) -> VidgraphResult<Self> {
        Self::new(params::parse(KIND, value)?)
    }

    pub fn params(&self) -> &PatternParams {
        &self.params
    }

    /// Chains this node currently holds a texture for.
    pub fn cached_chains(&self) -> Vec<ChainId> {
        self.states.chains()
    }
}

impl VideoNode for PatternNode {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn input_count(&self) -> usize {
        0
    }

    fn copy_for_rendering(&self, _chain: &Arc<Chain>) -> VidgraphResult<Box<dyn VideoNode>> {
        Ok(Box::new(Self {
            params: self.params.clone(),
            states: self.states.clone(),
        }))
    }

    fn paint(&mut self, chain: &Arc<Chain>, _inputs: &[TextureId]) -> VidgraphResult<TextureId> {
        let p = &self.params;
        self.states.with_state(
            chain,
            || {
                Ok(PatternState {
                    texture: ChainTexture::allocate(chain.gpu(), chain.size())?,
                    painted: None,
                })
            },
            |state| {
                if state.painted.as_ref() != Some(p) {
                    let (a, b) = (premul(p.color), premul(p.color2));
                    chain.gpu().render_to(state.texture.id(), &[], |dst, _| {
                        match p.pattern {
                            PatternKind::Solid => kernels::fill(dst, a),
                            PatternKind::Checker => kernels::checker(dst, p.cell, a, b),
                            PatternKind::Gradient => kernels::gradient(dst, a, b, p.vertical),
                        }
                    })?;
                    state.painted = Some(p.clone());
                }
                Ok(state.texture.id())
            },
        )
    }

    fn serialize(&self) -> serde_json::Value {
        params::to_value(&self.params)
    }

    fn set_param(&mut self, key: &str, value: &serde_json::Value) -> VidgraphResult<()> {
        let next: PatternParams = params::update(KIND, &self.params, key, value)?;
        next.validate()?;
        self.params = next;
        Ok(())
    }

    fn retain_chains(&mut self, live: &HashSet<ChainId>) -> usize {
        self.states.retain(live)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/nodes/pattern.rs"]
mod tests;

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::foundation::core::{Rgba8Premul, TextureId};
use crate::foundation::error::{VidgraphError, VidgraphResult};
use crate::gpu::{ChainTexture, kernels};
use crate::graph::chain::{Chain, ChainId};
use crate::graph::node::{RenderStates, VideoNode};
use crate::nodes::params;

pub const KIND: &str = "filter";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    #[default]
    Invert,
    Tint,
    /// Crossfade from input 0 to input 1 by `amount`.
    Mix,
    /// Input 1 over input 0 at `amount` opacity.
    Over,
}

impl FilterOp {
    pub fn input_count(self) -> usize {
        match self {
            Self::Invert | Self::Tint => 1,
            Self::Mix | Self::Over => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterParams {
    pub op: FilterOp,
    /// Straight-alpha RGBA8 used by `tint`.
    pub color: [u8; 4],
    pub amount: f32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            op: FilterOp::Invert,
            color: [255, 255, 255, 255],
            amount: 1.0,
        }
    }
}

/// Texture filter with one or two inputs. Unconnected inputs read as transparent.
#[derive(Debug)]
pub struct FilterNode {
    params: FilterParams,
    states: RenderStates<ChainTexture>,
}

impl FilterNode {
    pub fn new(params: FilterParams) -> VidgraphResult<Self> {
        params::check_unit(KIND, "amount", params.amount)?;
        Ok(Self {
            params,
            states: RenderStates::new(),
        })
    }

    pub fn from_value(value: &serde_json::Value) -> VidgraphResult<Self> {
        Self::new(params::parse(KIND, value)?)
    }

    pub fn op(&self) -> FilterOp {
        self.params.op
    }

    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    pub fn cached_chains(&self) -> Vec<ChainId> {
        self.states.chains()
    }
}

impl VideoNode for FilterNode {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn input_count(&self) -> usize {
        self.params.op.input_count()
    }

    fn copy_for_rendering(&self, _chain: &Arc<Chain>) -> VidgraphResult<Box<dyn VideoNode>> {
        Ok(Box::new(Self {
            params: self.params.clone(),
            states: self.states.clone(),
        }))
    }

    fn paint(&mut self, chain: &Arc<Chain>, inputs: &[TextureId]) -> VidgraphResult<TextureId> {
        let p = &self.params;
        self.states.with_state(
            chain,
            || ChainTexture::allocate(chain.gpu(), chain.size()),
            |texture| {
                chain.gpu().render_to(texture.id(), inputs, |dst, srcs| {
                    let input = |i: usize| srcs.get(i).copied().flatten();
                    match p.op {
                        FilterOp::Invert => kernels::invert(dst, input(0)),
                        FilterOp::Tint => {
                            let c = Rgba8Premul::from_straight_rgba(
                                p.color[0], p.color[1], p.color[2], p.color[3],
                            );
                            kernels::tint(dst, input(0), c)
                        }
                        FilterOp::Mix => kernels::mix(dst, input(0), input(1), p.amount),
                        FilterOp::Over => {
                            kernels::composite_over(dst, input(0), input(1), p.amount)
                        }
                    }
                })?;
                Ok(texture.id())
            },
        )
    }

    fn serialize(&self) -> serde_json::Value {
        params::to_value(&self.params)
    }

    fn set_param(&mut self, key: &str, value: &serde_json::Value) -> VidgraphResult<()> {
        let next: FilterParams = params::update(KIND, &self.params, key, value)?;
        if next.op != self.params.op {
            return Err(VidgraphError::validation(
                "filter.op cannot change on a live node",
            ));
        }
        params::check_unit(KIND, "amount", next.amount)?;
        self.params = next;
        Ok(())
    }

    fn retain_chains(&mut self, live: &HashSet<ChainId>) -> usize {
        self.states.retain(live)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/nodes/filter.rs"]
mod tests;

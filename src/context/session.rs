use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::context::display::DisplaySurface;
use crate::context::output::{Binding, Output};
use crate::foundation::config::{DEFAULT_PREVIEW_SIZE, EngineConfig};
use crate::foundation::core::{NodeId, Size, TextureId};
use crate::foundation::error::{VidgraphError, VidgraphResult};
use crate::foundation::thread::OwnerThread;
use crate::gpu::{FrameRGBA, GpuContext};
use crate::graph::chain::{Chain, ChainId};
use crate::graph::model::Model;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextOptions {
    pub preview: bool,
    pub preview_size: Size,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            preview: true,
            preview_size: DEFAULT_PREVIEW_SIZE,
        }
    }
}

impl From<&EngineConfig> for ContextOptions {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            preview: cfg.preview,
            preview_size: cfg.preview_size,
        }
    }
}

/// Change notifications delivered to [`Context::subscribe`] receivers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContextNotification {
    ModelChanged,
    OutputsChanged(Vec<String>),
    PreviewSizeChanged(Size),
    PreviewWindowChanged { attached: bool },
    ChainsChanged(Vec<ChainId>),
}

/// Sent by outputs from any thread, applied on the owner thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ContextEvent {
    ChainChanged(String),
}

struct PreviewState {
    size: Size,
    chain: Option<Arc<Chain>>,
    window: Option<Arc<DisplaySurface>>,
    last_render: HashMap<NodeId, TextureId>,
}

/// The part of a context that render threads reach through outputs and surfaces.
pub(crate) struct ContextShared {
    model: Mutex<Option<Arc<Model>>>,
    preview: Mutex<PreviewState>,
}

impl ContextShared {
    fn model(&self) -> Option<Arc<Model>> {
        self.model.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn preview(&self) -> MutexGuard<'_, PreviewState> {
        self.preview.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Render only what `output` shows. An unrouted output gets `NONE` without rendering.
    #[tracing::instrument(level = "debug", skip_all, fields(output = output.name()))]
    pub(crate) fn render_output(&self, output: &Output) -> TextureId {
        let Some(model) = self.model() else {
            return TextureId::NONE;
        };
        let chain = output.chain();
        let mut snapshot = model.create_copy_for_rendering(&chain);
        let Some(node) = snapshot.output_node(output.name()) else {
            return TextureId::NONE;
        };
        snapshot.render_for(&[node]).texture(node)
    }

    /// Render every node into the preview chain and keep the whole texture map.
    #[tracing::instrument(level = "debug", skip_all)]
    pub(crate) fn render_preview(&self) -> usize {
        let chain = self.preview().chain.clone();
        let (Some(chain), Some(model)) = (chain, self.model()) else {
            return 0;
        };
        let result = model.create_copy_for_rendering(&chain).render();
        let count = result.len();
        let mut preview = self.preview();
        // A resize during the render makes this result stale.
        if preview.chain.as_ref().is_some_and(|c| c.id() == chain.id()) {
            preview.last_render = result.into_map();
        }
        count
    }
}

/// One edit session: the live model, its outputs and an optional preview chain.
///
/// Mutating calls must come from the thread that created the context and panic
/// otherwise. Rendering happens on whichever thread asks through an [`Output`] or a
/// [`DisplaySurface`].
pub struct Context {
    owner: OwnerThread,
    has_preview: bool,
    gpu: Arc<GpuContext>,
    shared: Arc<ContextShared>,
    outputs: Vec<Arc<Output>>,
    events_tx: Sender<ContextEvent>,
    events_rx: Receiver<ContextEvent>,
    subscribers: Vec<Sender<ContextNotification>>,
    chain_ids: Vec<ChainId>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("has_preview", &self.has_preview)
            .field(
                "outputs",
                &self.outputs.iter().map(|o| o.name()).collect::<Vec<_>>(),
            )
            .field("chains", &self.chain_ids)
            .finish()
    }
}

impl Context {
    pub fn new(opts: ContextOptions, gpu: Arc<GpuContext>) -> Self {
        let chain = opts
            .preview
            .then(|| Chain::new(opts.preview_size, Arc::clone(&gpu)));
        let (events_tx, events_rx) = unbounded();
        tracing::debug!(preview = opts.preview, size = %opts.preview_size, "new context");
        Self {
            owner: OwnerThread::current(),
            has_preview: opts.preview,
            gpu,
            shared: Arc::new(ContextShared {
                model: Mutex::new(None),
                preview: Mutex::new(PreviewState {
                    size: opts.preview_size,
                    chain,
                    window: None,
                    last_render: HashMap::new(),
                }),
            }),
            outputs: Vec::new(),
            events_tx,
            events_rx,
            subscribers: Vec::new(),
            chain_ids: Vec::new(),
        }
    }

    /// Context with its own texture device configured from `cfg`.
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(ContextOptions::from(cfg), GpuContext::shared(&cfg.gpu))
    }

    pub fn gpu(&self) -> &Arc<GpuContext> {
        &self.gpu
    }

    pub fn has_preview(&self) -> bool {
        self.has_preview
    }

    /// New output on this context's texture device. It is not attached until passed to
    /// [`set_outputs`](Self::set_outputs).
    pub fn create_output(&self, name: impl Into<String>, size: Size) -> VidgraphResult<Arc<Output>> {
        let size = Size::try_new(size.width, size.height)?;
        Ok(Output::new(name, Chain::new(size, Arc::clone(&self.gpu))))
    }

    pub fn subscribe(&mut self) -> Receiver<ContextNotification> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn notify(&mut self, n: ContextNotification) {
        self.subscribers.retain(|tx| tx.send(n.clone()).is_ok());
    }

    pub fn model(&self) -> Option<Arc<Model>> {
        self.owner.assert_current("Context::model");
        self.shared.model()
    }

    pub fn set_model(&mut self, model: Option<Arc<Model>>) {
        self.owner.assert_current("Context::set_model");
        let previous = {
            let mut slot = self.shared.model.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *slot, model.clone())
        };
        if let Some(old) = previous
            && !model.as_ref().is_some_and(|m| Arc::ptr_eq(m, &old))
        {
            // The old model no longer renders here; free its per-chain state.
            old.set_chains(Vec::new());
        }
        self.chain_ids.clear();
        self.chains_changed();
        self.notify(ContextNotification::ModelChanged);
    }

    pub fn outputs(&self) -> Vec<Arc<Output>> {
        self.owner.assert_current("Context::outputs");
        self.outputs.clone()
    }

    /// Replace the output list: detach the old outputs, attach the new ones, then
    /// recompute the chain set.
    pub fn set_outputs(&mut self, outputs: Vec<Arc<Output>>) {
        self.owner.assert_current("Context::set_outputs");
        let same = outputs.len() == self.outputs.len()
            && outputs
                .iter()
                .zip(&self.outputs)
                .all(|(a, b)| Arc::ptr_eq(a, b));
        if same {
            return;
        }
        for o in &self.outputs {
            o.detach();
        }
        for o in &outputs {
            o.attach(Binding {
                context: Arc::downgrade(&self.shared),
                events: self.events_tx.clone(),
            });
        }
        self.outputs = outputs;
        self.chains_changed();
        let names = self.outputs.iter().map(|o| o.name().to_owned()).collect();
        self.notify(ContextNotification::OutputsChanged(names));
    }

    /// Thread-safe.
    pub fn preview_size(&self) -> Option<Size> {
        self.has_preview.then(|| self.shared.preview().size)
    }

    pub fn set_preview_size(&mut self, size: Size) -> VidgraphResult<()> {
        self.owner.assert_current("Context::set_preview_size");
        self.require_preview()?;
        let size = Size::try_new(size.width, size.height)?;
        {
            let mut p = self.shared.preview();
            if p.size == size {
                return Ok(());
            }
            p.size = size;
            p.chain = Some(Chain::new(size, Arc::clone(&self.gpu)));
            p.last_render.clear();
        }
        self.chains_changed();
        self.notify(ContextNotification::PreviewSizeChanged(size));
        Ok(())
    }

    /// Thread-safe.
    pub fn preview_window(&self) -> Option<Arc<DisplaySurface>> {
        self.shared.preview().window.clone()
    }

    pub fn set_preview_window(&mut self, window: Option<Arc<DisplaySurface>>) -> VidgraphResult<()> {
        self.owner.assert_current("Context::set_preview_window");
        self.require_preview()?;
        {
            let mut p = self.shared.preview();
            if let Some(old) = p.window.take() {
                old.detach();
            }
            if let Some(w) = &window {
                w.attach(Arc::downgrade(&self.shared));
            }
            p.window = window;
        }
        let attached = self.preview_window().is_some();
        self.notify(ContextNotification::PreviewWindowChanged { attached });
        Ok(())
    }

    fn require_preview(&self) -> VidgraphResult<()> {
        if self.has_preview {
            Ok(())
        } else {
            Err(VidgraphError::validation("context was created without a preview"))
        }
    }

    /// Preview texture last rendered for `node`, or `NONE`. Thread-safe.
    pub fn preview_texture(&self, node: NodeId) -> TextureId {
        self.shared
            .preview()
            .last_render
            .get(&node)
            .copied()
            .unwrap_or(TextureId::NONE)
    }

    /// Read back the preview texture of `node`.
    pub fn preview_frame(&self, node: NodeId) -> Option<FrameRGBA> {
        let (texture, chain) = {
            let p = self.shared.preview();
            (p.last_render.get(&node).copied()?, p.chain.clone()?)
        };
        chain.gpu().read_pixels(texture)
    }

    /// Render the preview chain now. A [`DisplaySurface`] does this on
    /// `about_to_synchronize`.
    pub fn on_before_synchronizing(&self) -> usize {
        self.shared.render_preview()
    }

    /// Render `output` on the calling thread. Detached outputs fail.
    pub fn on_render_requested(&self, output: &Output) -> VidgraphResult<TextureId> {
        output.request_render()
    }

    /// Preview chain first, then each output's chain in list order, without duplicates.
    pub fn chains(&self) -> Vec<Arc<Chain>> {
        let mut seen = HashSet::new();
        let preview = self.shared.preview().chain.clone();
        preview
            .into_iter()
            .chain(self.outputs.iter().map(|o| o.chain()))
            .filter(|c| seen.insert(c.id()))
            .collect()
    }

    /// Push the current chain set to the model. Returns `false` when nothing changed.
    pub fn chains_changed(&mut self) -> bool {
        self.owner.assert_current("Context::chains_changed");
        let chains = self.chains();
        let ids: Vec<ChainId> = chains.iter().map(|c| c.id()).collect();
        let model_changed = self
            .shared
            .model()
            .is_some_and(|m| m.set_chains(chains));
        if ids == self.chain_ids && !model_changed {
            return false;
        }
        tracing::debug!(chains = ?ids, "chain set changed");
        self.chain_ids = ids.clone();
        self.notify(ContextNotification::ChainsChanged(ids));
        true
    }

    /// Apply queued output events and let nodes drain worker notifications.
    /// Returns how many output events were applied.
    pub fn process_events(&mut self) -> usize {
        self.owner.assert_current("Context::process_events");
        let mut applied = 0;
        for evt in self.events_rx.try_iter() {
            match evt {
                ContextEvent::ChainChanged(name) => {
                    tracing::debug!(output = %name, "output chain changed");
                }
            }
            applied += 1;
        }
        if applied > 0 {
            self.chains_changed();
        }
        if let Some(model) = self.shared.model() {
            model.poll();
        }
        applied
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        for o in &self.outputs {
            o.detach();
        }
        if let Some(w) = self.shared.preview().window.take() {
            w.detach();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/context/session.rs"]
mod tests;

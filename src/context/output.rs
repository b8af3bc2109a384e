use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crossbeam_channel::Sender;

use crate::context::session::{ContextEvent, ContextShared};
use crate::foundation::core::{Size, TextureId};
use crate::foundation::error::{VidgraphError, VidgraphResult};
use crate::gpu::FrameRGBA;
use crate::graph::chain::Chain;

/// Receives each texture an [`Output`] renders.
///
/// Called on the thread that requested the render, while the texture is still valid.
pub trait FrameConsumer: Send + Sync {
    fn render_ready(&self, output: &Output, texture: TextureId);
}

/// Consumer that reads every frame back into memory.
#[derive(Debug, Default)]
pub struct InMemoryConsumer {
    frames: Mutex<Vec<(TextureId, Option<FrameRGBA>)>>,
}

impl InMemoryConsumer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Frames in delivery order. `None` for a `NONE` texture.
    pub fn frames(&self) -> Vec<(TextureId, Option<FrameRGBA>)> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameConsumer for InMemoryConsumer {
    fn render_ready(&self, output: &Output, texture: TextureId) {
        let frame = output.chain().gpu().read_pixels(texture);
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((texture, frame));
    }
}

pub(crate) struct Binding {
    pub(crate) context: Weak<ContextShared>,
    pub(crate) events: Sender<ContextEvent>,
}

/// A named render destination bound to one chain.
///
/// Outputs are shared handles. A [`Context`](crate::context::Context) attaches them in
/// `set_outputs`; only an attached output can render.
pub struct Output {
    name: String,
    chain: Mutex<Arc<Chain>>,
    binding: Mutex<Option<Binding>>,
    consumer: Mutex<Option<Arc<dyn FrameConsumer>>>,
    last_texture: AtomicU32,
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output")
            .field("name", &self.name)
            .field("chain", &self.chain())
            .field("attached", &self.is_attached())
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Output {
    pub fn new(name: impl Into<String>, chain: Arc<Chain>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            chain: Mutex::new(chain),
            binding: Mutex::new(None),
            consumer: Mutex::new(None),
            last_texture: AtomicU32::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chain(&self) -> Arc<Chain> {
        Arc::clone(&lock(&self.chain))
    }

    /// Retarget this output. The attached context learns about it on its next
    /// [`process_events`](crate::context::Context::process_events).
    pub fn set_chain(&self, chain: Arc<Chain>) {
        {
            let mut current = lock(&self.chain);
            if current.id() == chain.id() {
                return;
            }
            *current = chain;
        }
        if let Some(b) = lock(&self.binding).as_ref()
            && b
                .events
                .try_send(ContextEvent::ChainChanged(self.name.clone()))
                .is_err()
        {
            tracing::debug!(output = %self.name, "context gone, chain change not delivered");
        }
    }

    /// Retarget to a new chain of `size` on the same texture device.
    pub fn resize(&self, size: Size) -> VidgraphResult<()> {
        let size = Size::try_new(size.width, size.height)?;
        let current = self.chain();
        if current.size() == size {
            return Ok(());
        }
        self.set_chain(Chain::new(size, Arc::clone(current.gpu())));
        Ok(())
    }

    pub fn set_consumer(&self, consumer: Option<Arc<dyn FrameConsumer>>) {
        *lock(&self.consumer) = consumer;
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.binding)
            .as_ref()
            .is_some_and(|b| b.context.strong_count() > 0)
    }

    /// Texture delivered by the most recent render.
    pub fn last_texture(&self) -> TextureId {
        TextureId(self.last_texture.load(Ordering::Acquire))
    }

    /// Render this output now, on the calling thread.
    pub fn request_render(&self) -> VidgraphResult<TextureId> {
        let context = lock(&self.binding)
            .as_ref()
            .and_then(|b| b.context.upgrade())
            .ok_or_else(|| VidgraphError::Detached(self.name.clone()))?;
        let texture = context.render_output(self);
        self.render_ready(texture);
        Ok(texture)
    }

    fn render_ready(&self, texture: TextureId) {
        self.last_texture.store(texture.0, Ordering::Release);
        let consumer = lock(&self.consumer).clone();
        if let Some(c) = consumer {
            c.render_ready(self, texture);
        }
    }

    pub(crate) fn attach(&self, binding: Binding) {
        let previous = lock(&self.binding).replace(binding);
        if previous.is_some_and(|b| b.context.strong_count() > 0) {
            tracing::warn!(output = %self.name, "output moved to another context");
        }
    }

    pub(crate) fn detach(&self) {
        lock(&self.binding).take();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/context/output.rs"]
mod tests;

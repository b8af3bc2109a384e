use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::context::session::ContextShared;

/// On-screen preview surface.
///
/// The embedding calls [`about_to_synchronize`](Self::about_to_synchronize) before each
/// display frame; the attached context renders its preview chain right then, on the
/// calling thread.
#[derive(Default)]
pub struct DisplaySurface {
    binding: Mutex<Option<Weak<ContextShared>>>,
}

impl std::fmt::Debug for DisplaySurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplaySurface")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl DisplaySurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn binding(&self) -> MutexGuard<'_, Option<Weak<ContextShared>>> {
        self.binding.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_attached(&self) -> bool {
        self.binding()
            .as_ref()
            .is_some_and(|w| w.strong_count() > 0)
    }

    /// Render the attached context's preview. Returns how many node textures it produced,
    /// or `None` when no context is attached.
    pub fn about_to_synchronize(&self) -> Option<usize> {
        let context = self.binding().as_ref().and_then(Weak::upgrade)?;
        Some(context.render_preview())
    }

    pub(crate) fn attach(&self, context: Weak<ContextShared>) {
        *self.binding() = Some(context);
    }

    pub(crate) fn detach(&self) {
        self.binding().take();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/context/display.rs"]
mod tests;

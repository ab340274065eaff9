//! Convenience handler types for plugin development.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::hooks::callbacks::HookHandler;
use crate::hooks::definitions::HandlerResult;

/// A closure-based hook handler for quick handler creation.
///
/// The closure runs synchronously inside the firing; handlers that need to
/// await should implement [`HookHandler`] directly.
pub struct FnHandler<P, F> {
    /// Handler function.
    handler: F,
    _payload: PhantomData<fn(&mut P)>,
}

impl<P, F> FnHandler<P, F>
where
    P: Send + 'static,
    F: Fn(&mut P) -> HandlerResult + Send + Sync + 'static,
{
    /// Creates a new closure-based handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _payload: PhantomData,
        }
    }

    /// Wraps a closure into an `Arc<dyn HookHandler<P>>`.
    pub fn wrap(handler: F) -> Arc<dyn HookHandler<P>> {
        Arc::new(Self::new(handler))
    }
}

impl<P, F> fmt::Debug for FnHandler<P, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler")
            .field("handler", &"<closure>")
            .finish()
    }
}

#[async_trait]
impl<P, F> HookHandler<P> for FnHandler<P, F>
where
    P: Send + 'static,
    F: Fn(&mut P) -> HandlerResult + Send + Sync + 'static,
{
    async fn handle(&self, payload: &mut P) -> HandlerResult {
        (self.handler)(payload)
    }
}

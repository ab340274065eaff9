//! Callback list: the ordered handler entries of one hook.
//!
//! Subscribing only appends; the effective order is materialized lazily the
//! next time the list is snapshotted for a firing. A firing iterates an
//! immutable snapshot, so subscriptions changed mid-firing (including by the
//! handlers themselves) only take effect from the next firing.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::descriptor::Constraint;
use crate::topo::{self, CycleError};

use super::definitions::HandlerResult;

/// Trait for hook handler implementations over payload type `P`.
#[async_trait]
pub trait HookHandler<P: Send + 'static>: Send + Sync {
    /// Handles one firing. The payload may be mutated in place.
    async fn handle(&self, payload: &mut P) -> HandlerResult;
}

/// Entry in the callback list.
pub(crate) struct Callback<P> {
    /// Registration sequence number, unique within the list.
    pub(crate) id: u64,
    /// Plugin that registered this handler.
    pub(crate) plugin_id: String,
    /// Ordering constraints declared for this entry.
    pub(crate) constraints: Vec<Constraint>,
    /// The handler.
    pub(crate) handler: Arc<dyn HookHandler<P>>,
}

impl<P> fmt::Debug for Callback<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("id", &self.id)
            .field("plugin_id", &self.plugin_id)
            .field("constraints", &self.constraints)
            .finish()
    }
}

/// An ordered chain of callbacks, as seen by one firing.
pub(crate) type Chain<P> = Arc<[Arc<Callback<P>>]>;

struct CallbackState<P> {
    entries: Vec<Arc<Callback<P>>>,
    /// Plugin id → position in the last global dependency order.
    ranks: HashMap<String, usize>,
    resolved: Chain<P>,
    dirty: bool,
    next_id: u64,
}

/// Ordered collection of callbacks for one hook signature.
pub struct CallbackList<P> {
    state: RwLock<CallbackState<P>>,
}

impl<P: Send + 'static> CallbackList<P> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CallbackState {
                entries: Vec::new(),
                ranks: HashMap::new(),
                resolved: Arc::from(Vec::new()),
                dirty: false,
                next_id: 1,
            }),
        }
    }

    /// Appends a callback and returns its id. Ordering is deferred.
    pub async fn insert(
        &self,
        plugin_id: &str,
        handler: Arc<dyn HookHandler<P>>,
        constraints: Vec<Constraint>,
    ) -> u64 {
        let mut state = self.state.write().await;
        let id = state.next_id;
        state.next_id += 1;
        state.entries.push(Arc::new(Callback {
            id,
            plugin_id: plugin_id.to_string(),
            constraints,
            handler,
        }));
        state.dirty = true;
        id
    }

    /// Removes the callback with `id`. Returns whether it existed.
    pub async fn remove(&self, id: u64) -> bool {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|entry| entry.id != id);
        let removed = state.entries.len() != before;
        if removed {
            state.dirty = true;
        }
        removed
    }

    /// Removes every callback registered by `plugin_id`.
    pub async fn remove_plugin(&self, plugin_id: &str) -> usize {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|entry| entry.plugin_id != plugin_id);
        let removed = before - state.entries.len();
        if removed > 0 {
            state.dirty = true;
            info!(plugin_id = %plugin_id, removed, "Callbacks removed for plugin");
        }
        removed
    }

    /// Replaces the global order keys used to break ties.
    pub async fn set_ranks(&self, ranks: HashMap<String, usize>) {
        let mut state = self.state.write().await;
        state.ranks = ranks;
        state.dirty = true;
    }

    /// Returns the number of callbacks.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Returns whether the list is empty.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Returns the plugin id of each callback in effective order.
    pub async fn plugin_ids(&self) -> Result<Vec<String>, CycleError<String>> {
        let chain = self.snapshot().await?;
        Ok(chain.iter().map(|entry| entry.plugin_id.clone()).collect())
    }

    /// Returns the effective chain, re-resolving it if the list changed.
    pub(crate) async fn snapshot(&self) -> Result<Chain<P>, CycleError<String>> {
        {
            let state = self.state.read().await;
            if !state.dirty {
                return Ok(Arc::clone(&state.resolved));
            }
        }

        let mut state = self.state.write().await;
        if state.dirty {
            let resolved = resolve(&state.entries, &state.ranks)?;
            debug!(callbacks = resolved.len(), "Callback order materialized");
            state.resolved = Arc::from(resolved);
            state.dirty = false;
        }
        Ok(Arc::clone(&state.resolved))
    }
}

impl<P: Send + 'static> Default for CallbackList<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for CallbackList<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackList").finish_non_exhaustive()
    }
}

/// Orders entries by the dependency order of their plugins.
///
/// Plugins are registered with the resolver by global rank (unranked last),
/// then by registration sequence. Only constraints between plugins present in
/// this list take part. Entries of one plugin keep their registration order.
fn resolve<P>(
    entries: &[Arc<Callback<P>>],
    ranks: &HashMap<String, usize>,
) -> Result<Vec<Arc<Callback<P>>>, CycleError<String>> {
    let mut sorted: Vec<Arc<Callback<P>>> = entries.to_vec();
    sorted.sort_by_key(|entry| {
        (
            ranks.get(&entry.plugin_id).copied().unwrap_or(usize::MAX),
            entry.id,
        )
    });

    let mut plugins: Vec<String> = Vec::new();
    for entry in &sorted {
        if !plugins.contains(&entry.plugin_id) {
            plugins.push(entry.plugin_id.clone());
        }
    }

    let edges: Vec<(String, String)> = sorted
        .iter()
        .flat_map(|entry| {
            entry
                .constraints
                .iter()
                .map(move |constraint| constraint.edge(&entry.plugin_id))
        })
        .collect();

    let order = topo::order(&plugins, &edges)?;
    let position: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(pos, id)| (id.as_str(), pos))
        .collect();

    sorted.sort_by_key(|entry| position[entry.plugin_id.as_str()]);
    Ok(sorted)
}

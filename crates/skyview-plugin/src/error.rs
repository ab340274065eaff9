//! Error taxonomy of the plugin engine.
//!
//! Configuration errors are fatal to a whole load batch. Activation and
//! handler errors are collected into reports so that a batch can partially
//! succeed. Unload errors are reported but never fatal.

use thiserror::Error;

use skyview_core::error::AppError;

use crate::descriptor::Relation;

/// A plugin catalog could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Two descriptors share an id, or the id is already loaded.
    #[error("plugin id '{0}' is declared more than once")]
    DuplicateId(String),
    /// A constraint references a plugin that is neither loaded nor pending.
    #[error("plugin '{plugin}' must run {relation} unknown plugin '{target}'")]
    UnknownTarget {
        /// Plugin declaring the constraint.
        plugin: String,
        /// Declared relation.
        relation: Relation,
        /// The missing peer.
        target: String,
    },
    /// A descriptor names a hook that does not exist.
    #[error("plugin '{plugin}' subscribes to unknown hook '{hook}'")]
    UnknownHook {
        /// Plugin declaring the subscription.
        plugin: String,
        /// The unrecognised hook name.
        hook: String,
    },
    /// A constraint uses a relation other than `before` / `after`.
    #[error("plugin '{plugin}' declares unknown relation '{relation}'")]
    UnknownRelation {
        /// Plugin declaring the constraint.
        plugin: String,
        /// The unrecognised relation.
        relation: String,
    },
    /// Ordering constraints form at least one cycle.
    #[error("cyclic ordering constraints among plugins: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// A plugin failed to come up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivationError {
    /// No factory is registered under the descriptor's entry point.
    #[error("plugin '{plugin}' has no registered entry point '{entry_point}'")]
    UnknownEntryPoint {
        /// The plugin being activated.
        plugin: String,
        /// The missing entry point name.
        entry_point: String,
    },
    /// The entry point returned an error.
    #[error("plugin '{plugin}' failed to instantiate: {reason}")]
    Instantiation {
        /// The plugin being activated.
        plugin: String,
        /// Factory-supplied reason.
        reason: String,
    },
    /// The plugin refused or failed to declare its subscriptions.
    #[error("plugin '{plugin}' failed to subscribe: {reason}")]
    Subscription {
        /// The plugin being activated.
        plugin: String,
        /// Plugin-supplied reason.
        reason: String,
    },
    /// The plugin subscribed to a hook its descriptor does not declare.
    #[error("plugin '{plugin}' subscribed to undeclared hook '{hook}'")]
    UndeclaredHook {
        /// The plugin being activated.
        plugin: String,
        /// The hook it attempted to join.
        hook: String,
    },
}

impl ActivationError {
    /// Returns the id of the plugin that failed.
    pub fn plugin_id(&self) -> &str {
        match self {
            Self::UnknownEntryPoint { plugin, .. }
            | Self::Instantiation { plugin, .. }
            | Self::Subscription { plugin, .. }
            | Self::UndeclaredHook { plugin, .. } => plugin,
        }
    }
}

/// A hook handler faulted during a firing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("handler of plugin '{plugin_id}' failed on hook '{hook}': {message}")]
pub struct HandlerError {
    /// Plugin owning the handler.
    pub plugin_id: String,
    /// Hook being fired.
    pub hook: &'static str,
    /// Error message, or the panic message if the handler panicked.
    pub message: String,
}

/// A plugin could not be unloaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnloadError {
    /// No plugin with this id was ever loaded.
    #[error("plugin '{0}' is not loaded")]
    UnknownPlugin(String),
    /// The plugin was already unloaded.
    #[error("plugin '{0}' is already unloaded")]
    AlreadyUnloaded(String),
}

impl From<ConfigurationError> for AppError {
    fn from(err: ConfigurationError) -> Self {
        AppError::with_source(
            skyview_core::error::ErrorKind::Configuration,
            format!("Plugin configuration rejected: {err}"),
            err,
        )
    }
}

impl From<ActivationError> for AppError {
    fn from(err: ActivationError) -> Self {
        AppError::with_source(
            skyview_core::error::ErrorKind::Activation,
            format!("Plugin activation failed: {err}"),
            err,
        )
    }
}

impl From<HandlerError> for AppError {
    fn from(err: HandlerError) -> Self {
        AppError::with_source(
            skyview_core::error::ErrorKind::Handler,
            err.to_string(),
            err,
        )
    }
}

impl From<UnloadError> for AppError {
    fn from(err: UnloadError) -> Self {
        let kind = match err {
            UnloadError::UnknownPlugin(_) => skyview_core::error::ErrorKind::NotFound,
            UnloadError::AlreadyUnloaded(_) => skyview_core::error::ErrorKind::Unload,
        };
        AppError::with_source(kind, err.to_string(), err)
    }
}

//! Connector capability: external commands and state reporting.

use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use skyview_core::config::PlatformKind;

/// Capacity of the server state-change broadcast channel.
const STATE_CHANNEL_CAPACITY: usize = 256;

/// Receiving end of a connector's command queue, held by the host.
pub type CommandReceiver = mpsc::UnboundedReceiver<ConnectorCommand>;

/// A command addressed to the host shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorCommand {
    /// Command name.
    pub name: String,
    /// Command arguments.
    #[serde(default)]
    pub args: serde_json::Value,
    /// Plugin or component that issued the command.
    pub source: String,
}

impl ConnectorCommand {
    /// Creates a command without arguments.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: serde_json::Value::Null,
            source: source.into(),
        }
    }

    /// Attaches arguments.
    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }
}

/// A state value reported through a connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    /// State key.
    pub key: String,
    /// New value.
    pub value: serde_json::Value,
    /// When the change was reported.
    pub changed_at: DateTime<Utc>,
}

/// Command and state channel between plugins and the host shell.
pub trait Connector: Send + Sync + fmt::Debug {
    /// Returns which shell variant this is.
    fn kind(&self) -> PlatformKind;

    /// Queues a command for the host.
    fn deliver_command(&self, command: ConnectorCommand) -> Result<(), String>;

    /// Records a state change.
    fn report_state(&self, key: &str, value: serde_json::Value);

    /// Returns the last value reported for `key`.
    fn state(&self, key: &str) -> Option<serde_json::Value>;
}

fn queue(
    commands: &mpsc::UnboundedSender<ConnectorCommand>,
    command: ConnectorCommand,
) -> Result<(), String> {
    debug!(command = %command.name, source = %command.source, "Command delivered");
    commands
        .send(command)
        .map_err(|e| format!("command queue closed: {}", e.0.name))
}

/// In-process connector of the desktop shell.
#[derive(Debug)]
pub struct DesktopConnector {
    commands: mpsc::UnboundedSender<ConnectorCommand>,
    state: DashMap<String, serde_json::Value>,
}

impl DesktopConnector {
    /// Creates the connector and the host's end of its command queue.
    pub fn new() -> (Self, CommandReceiver) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let connector = Self {
            commands,
            state: DashMap::new(),
        };
        (connector, receiver)
    }
}

impl Connector for DesktopConnector {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Desktop
    }

    fn deliver_command(&self, command: ConnectorCommand) -> Result<(), String> {
        queue(&self.commands, command)
    }

    fn report_state(&self, key: &str, value: serde_json::Value) {
        debug!(key = %key, "State reported");
        self.state.insert(key.to_string(), value);
    }

    fn state(&self, key: &str) -> Option<serde_json::Value> {
        self.state.get(key).map(|entry| entry.value().clone())
    }
}

/// Connector of the server shell; state changes are broadcast to listeners.
#[derive(Debug)]
pub struct ServerConnector {
    commands: mpsc::UnboundedSender<ConnectorCommand>,
    state: DashMap<String, serde_json::Value>,
    changes: broadcast::Sender<StateChange>,
}

impl ServerConnector {
    /// Creates the connector and the host's end of its command queue.
    pub fn new() -> (Self, CommandReceiver) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (changes, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        let connector = Self {
            commands,
            state: DashMap::new(),
            changes,
        };
        (connector, receiver)
    }

    /// Subscribes a listener to state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// Returns the number of connected listeners.
    pub fn listener_count(&self) -> usize {
        self.changes.receiver_count()
    }
}

impl Connector for ServerConnector {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Server
    }

    fn deliver_command(&self, command: ConnectorCommand) -> Result<(), String> {
        queue(&self.commands, command)
    }

    fn report_state(&self, key: &str, value: serde_json::Value) {
        self.state.insert(key.to_string(), value.clone());
        let change = StateChange {
            key: key.to_string(),
            value,
            changed_at: Utc::now(),
        };
        if self.changes.send(change).is_err() {
            debug!(key = %key, "State change dropped, no listeners");
        }
    }

    fn state(&self, key: &str) -> Option<serde_json::Value> {
        self.state.get(key).map(|entry| entry.value().clone())
    }
}

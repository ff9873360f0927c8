use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use shared::protocol::{ClientMessage, ComponentUpdate, RpcResult, ServerMessage};
use tracing::{debug, error, info, warn};

use crate::{ActionOutcome, Component, Engine};

/// Protocol state for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Channel open, nothing received yet.
    Connecting,
    /// Processing the leading `init` message.
    Initializing,
    /// Steady state: dispatching messages one at a time.
    Active,
    /// Channel closed or cancelled; all instances discarded.
    Closed,
}

struct LiveComponent {
    vm_name: String,
    component: Box<dyn Component>,
}

/// Server-side state for one persistent client channel.
///
/// A session is driven by a single reader loop: every inbound message —
/// actions and rpc calls alike — is decoded and dispatched to completion
/// before the next one is read, so one session never runs two handlers
/// concurrently and the N-th `update` it emits corresponds to the N-th
/// successfully completed action in arrival order. The instance map is owned
/// exclusively; nothing outside the session ever references its instances.
pub struct Session {
    engine: Arc<Engine>,
    instances: HashMap<String, LiveComponent>,
    state: SessionState,
}

impl Session {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            instances: HashMap::new(),
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Decodes one raw frame and dispatches it.
    ///
    /// Tolerant by design: malformed frames and unrecognized message types
    /// are logged and dropped, and the session keeps running. Returns the
    /// outbound messages this frame produced, in emission order.
    pub async fn handle_text(&mut self, raw: &str) -> Vec<ServerMessage> {
        if self.state == SessionState::Closed {
            debug!("frame received after close, dropping");
            return Vec::new();
        }

        let message: ClientMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(decode_err) => {
                match serde_json::from_str::<Value>(raw) {
                    Ok(value) => warn!(
                        kind = value.get("type").and_then(serde_json::Value::as_str).unwrap_or("?"),
                        "unrecognized message shape, ignoring"
                    ),
                    Err(_) => warn!(%decode_err, "malformed frame, ignoring"),
                }
                return Vec::new();
            }
        };

        self.handle(message).await
    }

    /// Dispatches one decoded message.
    pub async fn handle(&mut self, message: ClientMessage) -> Vec<ServerMessage> {
        match self.state {
            SessionState::Closed => Vec::new(),
            SessionState::Connecting => match message {
                ClientMessage::Init { components } => {
                    self.state = SessionState::Initializing;
                    self.initialize(components).await;
                    self.state = SessionState::Active;
                    Vec::new()
                }
                // Tolerant start: no leading init means no pre-populated
                // instances, but the first message is still dispatched.
                other => {
                    self.state = SessionState::Active;
                    self.dispatch(other).await
                }
            },
            SessionState::Initializing | SessionState::Active => self.dispatch(message).await,
        }
    }

    /// Discards all owned instances. Safe to call more than once.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            debug!(instances = self.instances.len(), "session closed");
        }
        self.state = SessionState::Closed;
        self.instances.clear();
    }

    async fn initialize(&mut self, components: Vec<shared::protocol::InitComponent>) {
        for entry in components {
            match self.engine.instantiate(&entry.vm_name).await {
                Ok(component) => {
                    info!(vm_name = %entry.vm_name, hy_id = %entry.hy_id, "initialized component");
                    // Duplicate hy_id within one init: last write wins.
                    self.instances.insert(
                        entry.hy_id,
                        LiveComponent {
                            vm_name: entry.vm_name,
                            component,
                        },
                    );
                }
                Err(err) => {
                    warn!(vm_name = %entry.vm_name, hy_id = %entry.hy_id, %err,
                        "skipping init entry");
                }
            }
        }
    }

    async fn dispatch(&mut self, message: ClientMessage) -> Vec<ServerMessage> {
        match message {
            ClientMessage::Action { hy_id, name, args } => {
                self.dispatch_action(hy_id, name, args).await
            }
            ClientMessage::Rpc { id, name, args } => {
                vec![ServerMessage::Rpc(self.dispatch_rpc(id, name, args).await)]
            }
            ClientMessage::Init { .. } => {
                warn!("init after the first message, ignoring");
                Vec::new()
            }
        }
    }

    async fn dispatch_action(
        &mut self,
        hy_id: String,
        name: String,
        args: Vec<Value>,
    ) -> Vec<ServerMessage> {
        let engine = Arc::clone(&self.engine);
        let Some(live) = self.instances.get_mut(&hy_id) else {
            // Stale client reference, not a session fault.
            warn!(%hy_id, action = %name, "action for unknown component id, ignoring");
            return Vec::new();
        };

        match live
            .component
            .action(&name, &args, engine.storage())
            .await
        {
            Ok(ActionOutcome::Handled) => {
                match engine
                    .render_instance(&live.vm_name, live.component.as_ref(), &hy_id)
                    .await
                {
                    Ok(html) => vec![ServerMessage::Update(ComponentUpdate { id: hy_id, html })],
                    Err(err) => {
                        error!(%hy_id, action = %name, %err, "re-render failed, no update sent");
                        Vec::new()
                    }
                }
            }
            Ok(ActionOutcome::Unknown) => {
                if let Some(trimmed) = name.strip_suffix("()") {
                    warn!(vm_name = %live.vm_name, action = %name,
                        "unknown action, perhaps you meant '{trimmed}'");
                } else {
                    warn!(vm_name = %live.vm_name, action = %name, "unknown action, ignoring");
                }
                Vec::new()
            }
            Err(err) => {
                // The transaction wrapper already rolled back; the client
                // keeps its last fragment and the session stays open.
                error!(%hy_id, action = %name, err = ?err, "action failed, no update sent");
                Vec::new()
            }
        }
    }

    async fn dispatch_rpc(&self, id: String, name: String, args: Vec<Value>) -> RpcResult {
        let Some(function) = self.engine.functions().resolve(&name) else {
            warn!(call_id = %id, function = %name, "rpc for unregistered function");
            return RpcResult::failure(id, "not found");
        };

        match function(args).await {
            Ok(result) => RpcResult::success(id, result),
            Err(err) => RpcResult::failure(id, err.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of an `init` message: a component already present in the
/// server-rendered page that the session must instantiate and retain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitComponent {
    pub vm_name: String,
    pub hy_id: String,
}

/// Messages received over the persistent channel, tagged by `type`.
///
/// Unknown tags and malformed payloads are not represented here; decoding
/// them fails and the session logs and ignores the frame (tolerant protocol).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Init {
        #[serde(default)]
        components: Vec<InitComponent>,
    },
    Action {
        hy_id: String,
        name: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    Rpc {
        id: String,
        name: String,
        #[serde(default)]
        args: Vec<Value>,
    },
}

/// Re-rendered fragment for one component instance, pushed after a
/// successfully completed action. `id` is the instance id the client-side
/// reconciler matches against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "update")]
pub struct ComponentUpdate {
    pub id: String,
    pub html: String,
}

/// Unary RPC response, keyed by the caller-supplied call id. Carries no
/// `type` tag on the wire; the client correlates purely by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcResult {
    Success { id: String, result: Value },
    Failure { id: String, error: String },
}

impl RpcResult {
    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self::Success {
            id: id.into(),
            result,
        }
    }

    pub fn failure(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Failure {
            id: id.into(),
            error: error.into(),
        }
    }

    pub fn call_id(&self) -> &str {
        match self {
            Self::Success { id, .. } | Self::Failure { id, .. } => id,
        }
    }
}

/// Messages sent over the persistent channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Update(ComponentUpdate),
    Rpc(RpcResult),
}

use thiserror::Error;

/// Failure taxonomy for the view-synchronization engine.
///
/// Only `DuplicateComponent` is fatal, and only at startup while registries
/// are being populated. Everything else is survivable for a running session:
/// unknown components reject a single render, unknown actions and transport
/// failures are logged and dropped, and a failed action leaves the session
/// open for subsequent messages.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("component type '{0}' is already registered")]
    DuplicateComponent(String),

    #[error("unknown component type '{0}'")]
    UnknownComponent(String),

    #[error("unknown action '{name}' on component '{vm_name}'")]
    UnknownAction { vm_name: String, name: String },

    #[error("action '{name}' failed")]
    ActionFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("template render failed")]
    Render(#[source] anyhow::Error),

    #[error("transport: {0}")]
    Transport(String),
}

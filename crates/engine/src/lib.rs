//! Server-driven view synchronization core.
//!
//! A process builds one [`Engine`] at startup: a component registry, an
//! exposed-function registry, a templating collaborator, and the data store.
//! Each connected client then gets its own [`Session`], which owns the live
//! component instances for that connection and turns inbound protocol
//! messages into re-rendered HTML fragments.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use shared::error::EngineError;
use storage::Storage;

pub mod expose;
pub mod registry;
pub mod render;
pub mod session;
pub mod transaction;

pub use expose::ExposedFunctions;
pub use registry::{ComponentDefinition, ComponentRegistry, Constructor};
pub use render::{NewComponent, TemplateEngine};
pub use session::{Session, SessionState};
pub use transaction::with_transaction;

/// Result of dispatching an action name against a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The name matched an action method and it completed.
    Handled,
    /// No action method by that name; the session logs and drops the message.
    Unknown,
}

/// A server-held unit of UI state.
///
/// `state` must expose only serializable observable fields; keys starting
/// with an underscore are stripped by the render pipeline before they reach
/// the template context. `mount` runs exactly once per instance, before any
/// action, and may read the store. `action` is the per-type mapping from an
/// action name to its handler; return [`ActionOutcome::Unknown`] for names
/// the component does not implement.
#[async_trait]
pub trait Component: Send + Sync {
    fn state(&self) -> Map<String, Value>;

    async fn mount(&mut self, storage: &Storage) -> Result<()> {
        let _ = storage;
        Ok(())
    }

    async fn action(
        &mut self,
        name: &str,
        args: &[Value],
        storage: &Storage,
    ) -> Result<ActionOutcome>;
}

/// Immutable-after-startup wiring shared by every session.
pub struct Engine {
    components: ComponentRegistry,
    functions: ExposedFunctions,
    templates: Arc<dyn TemplateEngine>,
    storage: Storage,
}

impl Engine {
    pub fn new(
        components: ComponentRegistry,
        functions: ExposedFunctions,
        templates: Arc<dyn TemplateEngine>,
        storage: Storage,
    ) -> Self {
        Self {
            components,
            functions,
            templates,
            storage,
        }
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    pub fn functions(&self) -> &ExposedFunctions {
        &self.functions
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub(crate) fn templates(&self) -> &dyn TemplateEngine {
        self.templates.as_ref()
    }

    /// Constructs and mounts a fresh instance of a registered component type.
    pub(crate) async fn instantiate(&self, vm_name: &str) -> Result<Box<dyn Component>, EngineError> {
        let definition = self.components.resolve(vm_name)?;
        let mut component = (definition.construct)();
        component
            .mount(&self.storage)
            .await
            .map_err(|source| EngineError::ActionFailed {
                name: format!("{vm_name}.mount"),
                source,
            })?;
        Ok(component)
    }
}

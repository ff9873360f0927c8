use serde_json::{Map, Value};
use shared::{
    domain::{COMPONENT_ATTR, INSTANCE_ID_KEY, PRIVATE_FIELD_PREFIX},
    error::EngineError,
};
use uuid::Uuid;

use crate::{Component, Engine};

/// Templating collaborator: turns a template reference plus a flat context
/// mapping into raw markup. The engine never inspects the markup it returns.
#[async_trait::async_trait]
pub trait TemplateEngine: Send + Sync {
    async fn render(&self, template: &str, ctx: &Map<String, Value>) -> anyhow::Result<String>;
}

/// A freshly constructed, mounted, and rendered instance from the full-page
/// render path. The instance itself is discarded; the client re-announces it
/// through `init` once its channel opens.
#[derive(Debug, Clone)]
pub struct NewComponent {
    pub hy_id: String,
    pub vm_name: String,
    pub html: String,
}

impl Engine {
    /// Renders one component instance to its wrapped HTML fragment.
    ///
    /// Deterministic: the same observable state always yields byte-identical
    /// markup, so the client-side reconciler can diff successive fragments
    /// structurally. Nothing here may introduce randomness or timestamps.
    pub async fn render_instance(
        &self,
        vm_name: &str,
        component: &dyn Component,
        hy_id: &str,
    ) -> Result<String, EngineError> {
        let definition = self.components().resolve(vm_name)?;

        let mut ctx = component.state();
        ctx.retain(|key, _| !key.starts_with(PRIVATE_FIELD_PREFIX));
        ctx.insert(
            INSTANCE_ID_KEY.to_string(),
            Value::String(hy_id.to_string()),
        );

        let markup = self
            .templates()
            .render(&definition.template, &ctx)
            .await
            .map_err(EngineError::Render)?;

        Ok(format!(
            r#"<div id="{hy_id}" {COMPONENT_ATTR}="{vm_name}">{markup}</div>"#
        ))
    }

    /// Full-page render entry point: constructs an instance of `vm_name`,
    /// runs its mount hook, and renders it under a generated instance id.
    pub async fn render_new(&self, vm_name: &str) -> Result<NewComponent, EngineError> {
        let component = self.instantiate(vm_name).await?;
        let hy_id = generate_instance_id(vm_name);
        let html = self
            .render_instance(vm_name, component.as_ref(), &hy_id)
            .await?;
        Ok(NewComponent {
            hy_id,
            vm_name: vm_name.to_string(),
            html,
        })
    }
}

fn generate_instance_id(vm_name: &str) -> String {
    let entropy = Uuid::new_v4().simple().to_string();
    format!("hy-{}-{}", vm_name.to_lowercase(), &entropy[..8])
}

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use engine::TemplateEngine;
use serde_json::{Map, Value};

pub type TemplateFn = fn(&Map<String, Value>) -> String;

/// Function-backed template table.
///
/// The real templating collaborator is out of scope for the engine; here
/// each template reference resolves to a Rust function that formats the
/// context mapping. Render functions must stay deterministic: markup is a
/// pure function of the context they receive.
#[derive(Default)]
pub struct StaticTemplates {
    templates: HashMap<String, TemplateFn>,
}

impl StaticTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.insert("todo_list.html", todo_list);
        table
    }

    pub fn insert(&mut self, name: &str, template: TemplateFn) {
        self.templates.insert(name.to_string(), template);
    }
}

#[async_trait]
impl TemplateEngine for StaticTemplates {
    async fn render(&self, template: &str, ctx: &Map<String, Value>) -> Result<String> {
        let render_fn = self
            .templates
            .get(template)
            .ok_or_else(|| anyhow!("unknown template '{template}'"))?;
        Ok(render_fn(ctx))
    }
}

fn todo_list(ctx: &Map<String, Value>) -> String {
    let mut items = String::new();
    if let Some(todos) = ctx.get("todos").and_then(Value::as_array) {
        for todo in todos {
            let id = todo.get("id").and_then(Value::as_i64).unwrap_or(0);
            let text = todo.get("text").and_then(Value::as_str).unwrap_or("");
            let done = todo.get("done").and_then(Value::as_bool).unwrap_or(false);
            let class = if done { " class=\"done\"" } else { "" };
            items.push_str(&format!(
                "<li data-todo-id=\"{id}\"{class}>{}</li>",
                escape(text)
            ));
        }
    }

    let new_todo_text = ctx
        .get("new_todo_text")
        .and_then(Value::as_str)
        .unwrap_or("");
    format!(
        "<ul>{items}</ul><input name=\"new_todo_text\" value=\"{}\">",
        escape(new_todo_text)
    )
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

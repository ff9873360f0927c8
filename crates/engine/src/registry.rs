use std::collections::HashMap;

use shared::error::EngineError;

use crate::Component;

pub type Constructor = fn() -> Box<dyn Component>;

/// What the process knows about one component type: the template the
/// collaborator resolves, and how to build a default instance.
#[derive(Debug)]
pub struct ComponentDefinition {
    pub template: String,
    pub construct: Constructor,
}

/// Process-wide mapping from component type name to definition. Populated at
/// startup, then shared immutably through the [`crate::Engine`].
#[derive(Default)]
pub struct ComponentRegistry {
    definitions: HashMap<String, ComponentDefinition>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component type. Unlike exposed functions, component names
    /// may not collide; a duplicate is a startup bug.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        template: impl Into<String>,
        construct: Constructor,
    ) -> Result<(), EngineError> {
        let name = name.into();
        if self.definitions.contains_key(&name) {
            return Err(EngineError::DuplicateComponent(name));
        }
        self.definitions.insert(
            name,
            ComponentDefinition {
                template: template.into(),
                construct,
            },
        );
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&ComponentDefinition, EngineError> {
        self.definitions
            .get(name)
            .ok_or_else(|| EngineError::UnknownComponent(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    struct Stub;

    #[async_trait::async_trait]
    impl Component for Stub {
        fn state(&self) -> Map<String, serde_json::Value> {
            Map::new()
        }

        async fn action(
            &mut self,
            _name: &str,
            _args: &[serde_json::Value],
            _storage: &storage::Storage,
        ) -> anyhow::Result<crate::ActionOutcome> {
            Ok(crate::ActionOutcome::Unknown)
        }
    }

    fn construct() -> Box<dyn Component> {
        Box::new(Stub)
    }

    #[test]
    fn resolves_registered_definitions() {
        let mut registry = ComponentRegistry::new();
        registry
            .register("TodoList", "todo_list.html", construct)
            .expect("register");

        let definition = registry.resolve("TodoList").expect("resolve");
        assert_eq!(definition.template, "todo_list.html");
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut registry = ComponentRegistry::new();
        registry
            .register("TodoList", "todo_list.html", construct)
            .expect("register");

        let err = registry
            .register("TodoList", "other.html", construct)
            .expect_err("duplicate");
        assert!(matches!(err, EngineError::DuplicateComponent(name) if name == "TodoList"));
    }

    #[test]
    fn unknown_name_is_an_error() {
        let registry = ComponentRegistry::new();
        let err = registry.resolve("Missing").expect_err("unknown");
        assert!(matches!(err, EngineError::UnknownComponent(name) if name == "Missing"));
    }
}

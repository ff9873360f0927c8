use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::Value;

/// A callable reachable over the unary RPC path, independent of any session
/// or component state.
pub type ExposedFn = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Process-wide mapping from function name to callable.
///
/// Last registration for a name wins; exposed functions are meant to be
/// freely re-declared during iterative development, unlike component types.
#[derive(Default, Clone)]
pub struct ExposedFunctions {
    functions: HashMap<String, ExposedFn>,
}

impl ExposedFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn resolve(&self, name: &str) -> Option<ExposedFn> {
        self.functions.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn resolves_registered_function() {
        let mut functions = ExposedFunctions::new();
        functions.register("add", |args| {
            Box::pin(async move {
                let a = args.first().and_then(Value::as_i64).unwrap_or(0);
                let b = args.get(1).and_then(Value::as_i64).unwrap_or(0);
                Ok(json!(a + b))
            })
        });

        let function = functions.resolve("add").expect("resolve");
        let result = function(vec![json!(2), json!(3)]).await.expect("call");
        assert_eq!(result, json!(5));
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let mut functions = ExposedFunctions::new();
        functions.register("answer", |_| Box::pin(async { Ok(json!(1)) }));
        functions.register("answer", |_| Box::pin(async { Ok(json!(42)) }));
        assert_eq!(functions.len(), 1);

        let function = functions.resolve("answer").expect("resolve");
        assert_eq!(function(vec![]).await.expect("call"), json!(42));
    }

    #[test]
    fn unregistered_name_is_absent() {
        assert!(ExposedFunctions::new().resolve("missing").is_none());
    }
}

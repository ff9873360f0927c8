use anyhow::{Context, Result};
use async_trait::async_trait;
use engine::{with_transaction, ActionOutcome, Component};
use serde::Serialize;
use serde_json::{Map, Value};
use storage::{Storage, Todo};

/// The demo component: a persisted todo list.
///
/// `todos` mirrors the rows in the store; `new_todo_text` echoes the input
/// box. Every persisted mutation runs through the transaction wrapper, and
/// local state is only touched after the commit succeeds, so a rolled-back
/// action leaves both the store and the next render unchanged.
#[derive(Default, Serialize)]
pub struct TodoList {
    todos: Vec<Todo>,
    new_todo_text: String,
}

#[async_trait]
impl Component for TodoList {
    fn state(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    async fn mount(&mut self, storage: &Storage) -> Result<()> {
        self.todos = storage.list_todos().await?;
        Ok(())
    }

    async fn action(
        &mut self,
        name: &str,
        args: &[Value],
        storage: &Storage,
    ) -> Result<ActionOutcome> {
        match name {
            "add_todo" => self.add_todo(args, storage).await?,
            "toggle_todo" => self.toggle_todo(args, storage).await?,
            "delete_todo" => self.delete_todo(args, storage).await?,
            _ => return Ok(ActionOutcome::Unknown),
        }
        Ok(ActionOutcome::Handled)
    }
}

impl TodoList {
    async fn add_todo(&mut self, args: &[Value], storage: &Storage) -> Result<()> {
        let text = args
            .first()
            .and_then(Value::as_object)
            .and_then(|payload| payload.get("new_todo_text"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string();
        self.new_todo_text.clear();
        if text.is_empty() {
            // Empty submissions are a successful no-op; the re-render is
            // identical to the previous fragment.
            return Ok(());
        }

        let todo = with_transaction(storage, move |conn| {
            Box::pin(async move { storage::insert_todo(&mut *conn, &text).await })
        })
        .await?;

        self.todos.push(todo);
        Ok(())
    }

    async fn toggle_todo(&mut self, args: &[Value], storage: &Storage) -> Result<()> {
        let todo_id = args
            .first()
            .and_then(Value::as_i64)
            .context("toggle_todo expects a todo id")?;

        let flipped = with_transaction(storage, move |conn| {
            Box::pin(async move {
                let Some(todo) = storage::todo_by_id(&mut *conn, todo_id).await? else {
                    return Ok(None);
                };
                storage::set_todo_done(&mut *conn, todo_id, !todo.done).await?;
                Ok(Some(!todo.done))
            })
        })
        .await?;

        if let Some(done) = flipped {
            if let Some(todo) = self.todos.iter_mut().find(|todo| todo.id == todo_id) {
                todo.done = done;
            }
        }
        Ok(())
    }

    async fn delete_todo(&mut self, args: &[Value], storage: &Storage) -> Result<()> {
        let todo_id = args
            .first()
            .and_then(Value::as_i64)
            .context("delete_todo expects a todo id")?;

        let removed = with_transaction(storage, move |conn| {
            Box::pin(async move { storage::delete_todo(&mut *conn, todo_id).await })
        })
        .await?;

        if removed {
            self.todos.retain(|todo| todo.id != todo_id);
        }
        Ok(())
    }
}

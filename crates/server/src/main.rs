use std::{net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use engine::{ComponentRegistry, Engine, ExposedFunctions, Session};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use shared::{domain::PAGE_CONTAINER_ID, error::EngineError};
use storage::Storage;
use tracing::{error, info};

mod components;
mod config;
mod templates;

use components::TodoList;
use config::{load_settings, prepare_database_url};
use templates::StaticTemplates;

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    root_component: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let engine = build_engine(storage)?;
    let state = AppState {
        engine: Arc::new(engine),
        root_component: settings.root_component,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "failed to install shutdown handler");
        return;
    }
    info!("shutdown signal received");
}

/// Wires the process-wide registries. Everything a session can reach is
/// declared here, at startup; nothing registers later.
fn build_engine(storage: Storage) -> anyhow::Result<Engine> {
    let mut components = ComponentRegistry::new();
    components
        .register("TodoList", "todo_list.html", || {
            Box::new(TodoList::default())
        })
        .context("component registration")?;

    let mut functions = ExposedFunctions::new();
    functions.register("add", |args| {
        Box::pin(async move {
            let a = args
                .first()
                .and_then(Value::as_f64)
                .context("add expects two numeric arguments")?;
            let b = args
                .get(1)
                .and_then(Value::as_f64)
                .context("add expects two numeric arguments")?;
            Ok(json!(a + b))
        })
    });

    Ok(Engine::new(
        components,
        functions,
        Arc::new(StaticTemplates::with_defaults()),
        storage,
    ))
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(index))
        .route("/components/:vm_name", get(render_component))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.engine.storage().health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(err) => {
            error!(%err, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "storage unavailable")
        }
    }
}

async fn index(
    State(state): State<Arc<AppState>>,
) -> Result<Html<String>, (StatusCode, String)> {
    let rendered = state
        .engine
        .render_new(&state.root_component)
        .await
        .map_err(|err| {
            error!(%err, vm_name = %state.root_component, "page render failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "page render failed".to_string(),
            )
        })?;
    Ok(Html(page_shell(&rendered.html)))
}

async fn render_component(
    State(state): State<Arc<AppState>>,
    Path(vm_name): Path<String>,
) -> Result<Html<String>, (StatusCode, String)> {
    match state.engine.render_new(&vm_name).await {
        Ok(rendered) => Ok(Html(rendered.html)),
        Err(EngineError::UnknownComponent(name)) => Err((
            StatusCode::NOT_FOUND,
            format!("unknown component '{name}'"),
        )),
        Err(err) => {
            error!(%err, %vm_name, "component render failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "component render failed".to_string(),
            ))
        }
    }
}

fn page_shell(fragment: &str) -> String {
    format!(
        "<!DOCTYPE html>\
         <html><head><meta charset=\"utf-8\"></head>\
         <body><main id=\"{PAGE_CONTAINER_ID}\">{fragment}</main></body></html>"
    )
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

/// One task per channel; the session serializes everything this connection
/// sends through this single reader loop.
async fn ws_connection(state: Arc<AppState>, socket: WebSocket) {
    info!("client connected");
    let mut session = Session::new(Arc::clone(&state.engine));
    let (mut sender, mut receiver) = socket.split();

    'read: while let Some(Ok(frame)) = receiver.next().await {
        let raw = match frame {
            Message::Text(raw) => raw,
            Message::Close(_) => break,
            _ => continue,
        };

        for outbound in session.handle_text(&raw).await {
            let text = match serde_json::to_string(&outbound) {
                Ok(text) => text,
                Err(err) => {
                    error!(%err, "failed to encode outbound message");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break 'read;
            }
        }
    }

    session.close();
    info!("client disconnected");
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;

use super::*;
use axum::{body, body::Body, http::Request};
use shared::protocol::{ClientMessage, InitComponent, ServerMessage};
use tower::ServiceExt;

async fn test_state() -> Arc<AppState> {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let engine = build_engine(storage).expect("engine");
    Arc::new(AppState {
        engine: Arc::new(engine),
        root_component: "TodoList".into(),
    })
}

fn init_todolist(hy_id: &str) -> ClientMessage {
    ClientMessage::Init {
        components: vec![InitComponent {
            vm_name: "TodoList".into(),
            hy_id: hy_id.into(),
        }],
    }
}

fn action(hy_id: &str, name: &str, args: Vec<Value>) -> ClientMessage {
    ClientMessage::Action {
        hy_id: hy_id.into(),
        name: name.into(),
        args,
    }
}

fn expect_update(out: &[ServerMessage]) -> &shared::protocol::ComponentUpdate {
    assert_eq!(out.len(), 1, "expected exactly one outbound message");
    let ServerMessage::Update(update) = &out[0] else {
        panic!("expected update, got {:?}", out[0]);
    };
    update
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let state = test_state().await;
    let app = build_router(state);

    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(bytes.as_ref(), b"ok");
}

#[tokio::test]
async fn index_embeds_the_root_container_and_fragment() {
    let state = test_state().await;
    let app = build_router(state);

    let request = Request::get("/").body(Body::empty()).expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let html = String::from_utf8(bytes.to_vec()).expect("utf8");
    assert!(html.contains(&format!(r#"<main id="{PAGE_CONTAINER_ID}">"#)));
    assert!(html.contains(r#"hy-vm="TodoList""#));
}

#[tokio::test]
async fn component_route_renders_known_types_and_rejects_unknown_ones() {
    let state = test_state().await;
    let app = build_router(state);

    let request = Request::get("/components/TodoList")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let html = String::from_utf8(bytes.to_vec()).expect("utf8");
    assert!(html.contains(r#"hy-vm="TodoList""#));
    assert!(html.contains(r#"id="hy-todolist-"#));

    let request = Request::get("/components/Ghost")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn add_todo_emits_one_update_and_keeps_earlier_todos() {
    let state = test_state().await;
    storage::insert_todo(state.engine.storage().pool(), "existing chore")
        .await
        .expect("seed");

    let mut session = Session::new(Arc::clone(&state.engine));
    session.handle(init_todolist("hy-todolist-ab12")).await;

    let out = session
        .handle(action(
            "hy-todolist-ab12",
            "add_todo",
            vec![json!({"new_todo_text": "buy milk"})],
        ))
        .await;

    let update = expect_update(&out);
    assert_eq!(update.id, "hy-todolist-ab12");
    assert!(update.html.contains("buy milk"));
    assert!(
        update.html.contains("existing chore"),
        "earlier todo text must not be lost"
    );

    let todos = state.engine.storage().list_todos().await.expect("list");
    assert_eq!(todos.len(), 2);
    assert_eq!(todos[1].text, "buy milk");
}

#[tokio::test]
async fn whitespace_only_add_todo_re_renders_the_identical_fragment() {
    let state = test_state().await;
    let mut session = Session::new(Arc::clone(&state.engine));
    session.handle(init_todolist("hy-todolist-ab12")).await;

    let out = session
        .handle(action(
            "hy-todolist-ab12",
            "add_todo",
            vec![json!({"new_todo_text": "buy milk"})],
        ))
        .await;
    let before = expect_update(&out).html.clone();

    let out = session
        .handle(action(
            "hy-todolist-ab12",
            "add_todo",
            vec![json!({"new_todo_text": "   "})],
        ))
        .await;
    let after = expect_update(&out);

    assert_eq!(after.html, before, "no-op action must render byte-identical");
    let todos = state.engine.storage().list_todos().await.expect("list");
    assert_eq!(todos.len(), 1, "no todo may be appended");
}

#[tokio::test]
async fn toggle_and_delete_round_trip_through_store_and_fragment() {
    let state = test_state().await;
    let seeded = storage::insert_todo(state.engine.storage().pool(), "buy milk")
        .await
        .expect("seed");

    let mut session = Session::new(Arc::clone(&state.engine));
    session.handle(init_todolist("hy-todolist-ab12")).await;

    let out = session
        .handle(action(
            "hy-todolist-ab12",
            "toggle_todo",
            vec![json!(seeded.id)],
        ))
        .await;
    let update = expect_update(&out);
    assert!(update
        .html
        .contains(&format!("data-todo-id=\"{}\" class=\"done\"", seeded.id)));

    let reloaded = storage::todo_by_id(state.engine.storage().pool(), seeded.id)
        .await
        .expect("reload")
        .expect("present");
    assert!(reloaded.done);

    let out = session
        .handle(action(
            "hy-todolist-ab12",
            "delete_todo",
            vec![json!(seeded.id)],
        ))
        .await;
    let update = expect_update(&out);
    assert!(!update.html.contains("buy milk"));
    assert!(state
        .engine
        .storage()
        .list_todos()
        .await
        .expect("list")
        .is_empty());
}

#[tokio::test]
async fn rpc_add_works_against_the_same_session() {
    let state = test_state().await;
    let mut session = Session::new(Arc::clone(&state.engine));
    session.handle(init_todolist("hy-todolist-ab12")).await;

    let out = session
        .handle(ClientMessage::Rpc {
            id: "call-1".into(),
            name: "add".into(),
            args: vec![json!(19.0), json!(23.0)],
        })
        .await;
    assert_eq!(out.len(), 1);
    let ServerMessage::Rpc(result) = &out[0] else {
        panic!("expected rpc result");
    };
    assert_eq!(result.call_id(), "call-1");
    assert_eq!(
        serde_json::to_value(result).expect("encode"),
        json!({"id": "call-1", "result": 42.0})
    );
}

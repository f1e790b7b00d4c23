use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use blockflow::chat::{CONTEXT_PREAMBLE, ChatClient, ChatSession};
use blockflow::error::ChatError;
use serde_json::{Value, json};

type Prompts = Arc<Mutex<Vec<String>>>;

/// Chat backend state: every prompt received, and whether to answer 500.
#[derive(Clone, Default)]
struct Backend {
    prompts: Prompts,
    failing: Arc<AtomicBool>,
}

async fn bot(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    if backend.failing.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
    let turn = {
        let mut seen = backend.prompts.lock().unwrap();
        seen.push(prompt);
        seen.len()
    };
    Json(json!({ "msg": format!("```html\n<div id=\"turn-{}\"></div>\n```", turn) }))
        .into_response()
}

/// Serve the mock chat backend on an ephemeral port; returns its base URL.
async fn spawn_backend(backend: Backend) -> Result<String> {
    let app = Router::new()
        .route("/api/bot", post(bot))
        .with_state(backend);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{}", addr))
}

#[tokio::test]
async fn test_reply_is_unfenced_and_untrusted() -> Result<()> {
    let backend = Backend::default();
    let prompts = backend.prompts.clone();
    let base = spawn_backend(backend).await?;
    let client = ChatClient::new(format!("{}/api/bot", base));

    let reply = client.ask("a login card", "").await?;
    assert_eq!(reply.as_raw(), "<div id=\"turn-1\"></div>");
    assert_eq!(reply.escaped(), "&lt;div id=\"turn-1\"&gt;&lt;/div&gt;");

    let sent = prompts.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with(CONTEXT_PREAMBLE));
    assert!(sent[0].contains("a login card"));
    Ok(())
}

#[tokio::test]
async fn test_session_sends_previous_output_back() -> Result<()> {
    let backend = Backend::default();
    let prompts = backend.prompts.clone();
    let base = spawn_backend(backend).await?;
    let mut session = ChatSession::new(ChatClient::new(format!("{}/api/bot", base)));

    assert!(session.send("first").await?);
    assert!(session.send("make it darker").await?);
    assert_eq!(session.output().as_raw(), "<div id=\"turn-2\"></div>");

    let sent = prompts.lock().unwrap().clone();
    assert!(sent[1].contains("make it darker"));
    assert!(sent[1].ends_with("<div id=\"turn-1\"></div>"));
    Ok(())
}

#[tokio::test]
async fn test_server_error_keeps_previous_output() -> Result<()> {
    let backend = Backend::default();
    let base = spawn_backend(backend.clone()).await?;
    let mut session = ChatSession::new(ChatClient::new(format!("{}/api/bot", base)));
    assert!(session.send("first").await?);
    assert_eq!(session.output().as_raw(), "<div id=\"turn-1\"></div>");

    backend.failing.store(true, Ordering::SeqCst);
    let err = session.send("second").await.unwrap_err();
    assert!(matches!(err, ChatError::Status(500)));
    assert_eq!(session.output().as_raw(), "<div id=\"turn-1\"></div>");

    // The backend recovers and the next reply replaces the kept output.
    backend.failing.store(false, Ordering::SeqCst);
    assert!(session.send("third").await?);
    assert_eq!(session.output().as_raw(), "<div id=\"turn-2\"></div>");
    Ok(())
}

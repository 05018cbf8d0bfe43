//! Shared utilities for integration tests.

use std::net::SocketAddr;

use action_server::{ActionServer, Context, HttpServer, Result, Shutdown};
use axum::{
    body::{to_bytes, Body},
    http::StatusCode,
    response::Response,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Debug, Deserialize, Serialize)]
pub struct ExecRequest {
    #[serde(default, alias = "Action")]
    pub action: String,
    #[serde(default)]
    pub test: i64,
}

/// Binds `{action, test}` and echoes it in the success envelope.
pub async fn exec(ctx: &mut Context) -> Result<()> {
    let request: ExecRequest = ctx.bind().await?;
    ctx.jsonp(
        StatusCode::OK,
        &json!({"code": 0, "message": "succeed", "data": request}),
    )
}

/// Server with the `exec` action registered and no middleware.
pub fn exec_server() -> ActionServer {
    let server = ActionServer::new();
    server.register("exec", |ctx| Box::pin(exec(ctx)));
    server
}

#[allow(dead_code)]
pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[allow(dead_code)]
pub fn post_json(uri: &str, body: &str) -> axum::http::Request<Body> {
    axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Serve `server` on an ephemeral port until the returned `Shutdown` fires.
#[allow(dead_code)]
pub async fn spawn_server(server: ActionServer) -> (SocketAddr, Shutdown, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let signal = shutdown.clone();
    let handle = tokio::spawn(async move {
        HttpServer::new(server).run(listener, &signal).await.unwrap();
    });

    (addr, shutdown, handle)
}

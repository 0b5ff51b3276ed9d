//! HTTP API round trips against a scripted orchestrator.

#![cfg(feature = "server")]

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use common::{Reply, Script, ScriptedProvider, config, orchestrator};

struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    http: reqwest::Client,
}

impl TestServer {
    async fn start(script: Script) -> Self {
        let provider = ScriptedProvider::new(script);
        let orch = Arc::new(orchestrator(&provider, None, config().max_agents(4)));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|e| unreachable!("{e}"));
        let addr = listener.local_addr().unwrap_or_else(|e| unreachable!("{e}"));
        let shutdown = CancellationToken::new();
        tokio::spawn(heavy_rs::server::serve_on(listener, orch, shutdown.clone()));
        Self {
            addr,
            shutdown,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .unwrap_or_else(|e| unreachable!("{e}"));
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, body: Value) -> (u16, Value) {
        let response = self
            .http
            .post(self.url("/orchestrate"))
            .json(&body)
            .send()
            .await
            .unwrap_or_else(|e| unreachable!("{e}"));
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    /// Polls the result until it is no longer pending.
    async fn result(&self, task_id: &str) -> (u16, Value) {
        for _ in 0..100 {
            let (status, body) = self.get(&format!("/orchestrate/{task_id}/result")).await;
            if status != 202 {
                return (status, body);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        unreachable!("task {task_id} never finished")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn task_id(body: &Value) -> String {
    body["taskId"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start(Script::default()).await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_out_of_range_agent_count_is_rejected() {
    let server = TestServer::start(Script::default()).await;
    let (status, body) = server.post(json!({ "query": "q", "agentCount": 9 })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "InvalidRequest");
    assert!(body["reason"].as_str().is_some_and(|r| r.contains("agentCount")));
}

#[tokio::test]
async fn test_unknown_task_is_not_found() {
    let server = TestServer::start(Script::default()).await;
    let id = uuid::Uuid::new_v4();
    let (status, _) = server.get(&format!("/orchestrate/{id}/result")).await;
    assert_eq!(status, 404);
    let (status, _) = server.get(&format!("/orchestrate/{id}/progress")).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_accepted_call_produces_result_and_progress() {
    let server = TestServer::start(Script::default().synthesis(Some("the merged answer"))).await;

    let (status, body) = server.post(json!({ "query": "Compare solar vs wind", "agentCount": 2 })).await;
    assert_eq!(status, 202);
    let id = task_id(&body);

    let (status, result) = server.result(&id).await;
    assert_eq!(status, 200);
    assert_eq!(result["finalAnswer"], "the merged answer");
    assert_eq!(result["degraded"], false);
    assert_eq!(result["contributingAgents"], json!([0, 1]));

    let (status, progress) = server.get(&format!("/orchestrate/{id}/progress")).await;
    assert_eq!(status, 200);
    assert_eq!(progress["phase"], "done");
    assert_eq!(progress["tasks"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_failed_call_reports_all_agents_failed() {
    let server = TestServer::start(Script::default().default_worker(Reply::Fail)).await;

    let (_, body) = server.post(json!({ "query": "q", "agentCount": 2 })).await;
    let (status, result) = server.result(&task_id(&body)).await;

    assert_eq!(status, 500);
    assert_eq!(result["error"], "AllAgentsFailed");
}

#[tokio::test]
async fn test_cancel_stops_a_running_call() {
    let server = TestServer::start(Script::default().default_worker(Reply::Hang)).await;

    let (_, body) = server.post(json!({ "query": "q", "agentCount": 2 })).await;
    let id = task_id(&body);

    let response = server
        .http
        .delete(server.url(&format!("/orchestrate/{id}")))
        .send()
        .await
        .unwrap_or_else(|e| unreachable!("{e}"));
    assert_eq!(response.status().as_u16(), 204);

    let (status, result) = server.result(&id).await;
    assert_eq!(status, 500);
    assert_eq!(result["error"], "AllAgentsFailed");
}

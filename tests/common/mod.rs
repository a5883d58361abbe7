//! Purpose: Shared helpers for integration tests.
//! Exports: Fixture loading from `tests/fixtures` and a loopback stub of the management API.
//! Role: Lets client and CLI tests run without a broker.
//! Invariants: The stub answers canned responses in arrival order; extra requests get a 500.
//! Invariants: A request is recorded before its response is sent.
#![allow(dead_code)]

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Runtime;

pub type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn fixture_text(name: &str) -> TestResult<String> {
    let path = fixture_path(name);
    std::fs::read_to_string(&path)
        .map_err(|err| format!("failed to read fixture {}: {err}", path.display()).into())
}

pub fn load_fixture<T: DeserializeOwned>(name: &str) -> TestResult<T> {
    let text = fixture_text(name)?;
    Ok(serde_json::from_str(&text)?)
}

#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json_body(&self) -> TestResult<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

pub struct Canned {
    pub status: u16,
    pub body: String,
}

impl Canned {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self::json(status, "")
    }
}

/// Serves `responses` in request order from an axum router on its own runtime.
pub struct StubServer {
    pub base_url: String,
    requests: Receiver<Recorded>,
    runtime: Runtime,
}

struct StubState {
    responses: Mutex<VecDeque<Canned>>,
    recorded: Sender<Recorded>,
}

impl StubServer {
    pub fn start(responses: Vec<Canned>) -> TestResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;
        let listener = runtime.block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))?;
        let base_url = format!("http://{}", listener.local_addr()?);

        let (recorded, requests) = mpsc::channel();
        let state = Arc::new(StubState {
            responses: Mutex::new(responses.into()),
            recorded,
        });
        let app = Router::new().fallback(answer).with_state(state);
        runtime.spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url,
            requests,
            runtime,
        })
    }

    /// Stops the server and returns every request it recorded.
    pub fn finish(self) -> Vec<Recorded> {
        let recorded = self.requests.try_iter().collect();
        self.runtime.shutdown_background();
        recorded
    }

    pub fn next_request(&self) -> TestResult<Recorded> {
        Ok(self.requests.recv_timeout(Duration::from_secs(5))?)
    }
}

async fn answer(
    State(state): State<Arc<StubState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            (name.as_str().to_string(), value)
        })
        .collect();
    let _ = state.recorded.send(Recorded {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let next = match state.responses.lock() {
        Ok(mut responses) => responses.pop_front(),
        Err(_) => None,
    };
    let Some(canned) = next else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "no canned response left").into_response();
    };
    let status = StatusCode::from_u16(canned.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        canned.body,
    )
        .into_response()
}

/// A loopback port with nothing listening on it.
pub fn closed_port_url() -> TestResult<String> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}"))
}

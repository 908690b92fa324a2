//! In-process HTTP stub for adapter tests.
//!
//! An axum router with a single fallback handler serves canned responses on
//! a loopback port and records every request, so adapters are exercised
//! through reqwest exactly as in production.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// One canned response. A route matches when `pattern` occurs in the request
/// target or body; the first matching route wins.
#[derive(Debug, Clone)]
pub struct Route {
    pub pattern: &'static str,
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl Route {
    pub fn ok(pattern: &'static str, body: impl Into<String>) -> Self {
        Self {
            pattern,
            status: 200,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Hold the response back, simulating a slow upstream.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub body: String,
}

#[derive(Clone)]
struct StubState {
    routes: Arc<Vec<Route>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    pub async fn start(routes: Vec<Route>) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            routes: Arc::new(routes),
            requests: Arc::clone(&requests),
        };
        let app = Router::new().fallback(respond).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn respond(State(state): State<StubState>, method: Method, uri: Uri, body: Bytes) -> Response {
    let target = uri.to_string();
    let body = String::from_utf8_lossy(&body).into_owned();

    let route = state
        .routes
        .iter()
        .find(|r| target.contains(r.pattern) || body.contains(r.pattern))
        .cloned();
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.to_string(),
        target,
        body,
    });

    match route {
        Some(route) => {
            if !route.delay.is_zero() {
                tokio::time::sleep(route.delay).await;
            }
            let status = StatusCode::from_u16(route.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, route.body).into_response()
        }
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

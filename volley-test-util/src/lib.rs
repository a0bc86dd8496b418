//! In-process HTTP target for exercising volley against real sockets.

use std::collections::BTreeMap;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Counts requests that reached the stub, shared with the handlers.
#[derive(Clone, Default)]
pub struct HitCounter {
    count: Arc<AtomicUsize>,
}

impl HitCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn hit(&self) -> usize {
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    #[inline]
    #[must_use]
    pub fn get(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserPage {
    pub page: u32,
    pub data: Vec<User>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedUser {
    pub id: u32,
    pub name: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlowParams {
    ms: u64,
}

/// Routes:
/// - `GET /api/users` a small JSON page
/// - `POST /api/users` 201, echoes the JSON user back
/// - `POST /upload` 201, replies with the byte count received
/// - `GET /headers` request headers as a JSON object
/// - `GET /gzip` the users page, gzip encoded
/// - `GET /status/:code` empty reply with that status
/// - `GET /slow?ms=N` answers after N milliseconds
pub fn router(counter: HitCounter) -> Router {
    Router::new()
        .route("/api/users", get(get_users).post(post_user))
        .route("/upload", post(upload))
        .route("/headers", get(echo_headers))
        .route("/gzip", get(gzip_users))
        .route("/status/:code", get(status))
        .route("/slow", get(slow))
        .with_state(counter)
}

fn users_page() -> UserPage {
    UserPage {
        page: 1,
        data: vec![
            User {
                id: 1,
                name: "George".to_string(),
            },
            User {
                id: 2,
                name: "Janet".to_string(),
            },
        ],
    }
}

async fn get_users(State(counter): State<HitCounter>) -> Json<UserPage> {
    counter.hit();
    Json(users_page())
}

async fn post_user(
    State(counter): State<HitCounter>,
    headers: HeaderMap,
    Json(user): Json<User>,
) -> (StatusCode, Json<CreatedUser>) {
    counter.hit();
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|hv| hv.to_str().ok())
        .map(str::to_string);
    (
        StatusCode::CREATED,
        Json(CreatedUser {
            id: user.id,
            name: user.name,
            content_type,
        }),
    )
}

async fn upload(State(counter): State<HitCounter>, body: Bytes) -> (StatusCode, String) {
    counter.hit();
    (StatusCode::CREATED, body.len().to_string())
}

async fn echo_headers(
    State(counter): State<HitCounter>,
    headers: HeaderMap,
) -> Json<BTreeMap<String, String>> {
    counter.hit();
    let map = headers
        .iter()
        .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
        .collect();
    Json(map)
}

async fn gzip_users(State(counter): State<HitCounter>) -> impl IntoResponse {
    counter.hit();
    let raw = serde_json::to_vec(&users_page()).unwrap_or_default();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    let body = encoder
        .write_all(&raw)
        .and_then(|()| encoder.finish())
        .unwrap_or_default();
    (
        [
            (CONTENT_ENCODING, "gzip"),
            (CONTENT_TYPE, "application/json"),
        ],
        body,
    )
}

async fn status(State(counter): State<HitCounter>, Path(code): Path<u16>) -> StatusCode {
    counter.hit();
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn slow(State(counter): State<HitCounter>, Query(params): Query<SlowParams>) -> &'static str {
    counter.hit();
    tokio::time::sleep(Duration::from_millis(params.ms)).await;
    "done"
}

/// Stub bound to an ephemeral localhost port, served on a background task.
pub struct StubServer {
    addr: SocketAddr,
    counter: HitCounter,
}

impl StubServer {
    pub async fn spawn() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind stub listener")?;
        let addr = listener.local_addr().context("Failed to read stub address")?;
        let counter = HitCounter::new();
        let app = router(counter.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self { addr, counter })
    }

    #[inline]
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    #[inline]
    #[must_use]
    pub fn hits(&self) -> usize {
        self.counter.get()
    }
}

/// URL on a localhost port nothing listens on.
pub fn refused_url() -> Result<String> {
    let listener =
        std::net::TcpListener::bind("127.0.0.1:0").context("Failed to bind probe listener")?;
    let addr = listener.local_addr().context("Failed to read probe address")?;
    drop(listener);
    Ok(format!("http://{addr}/api/users"))
}

//! In-process mock of the xkcd and explainxkcd APIs
//!
//! Serves generated comics for every number up to `latest` (404 for comic
//! 404, like the real site), counts requests and concurrent occupancy, and
//! lets a test replace any single response.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use sxkcd_dl::{DownloadSettings, RetryPolicy};

/// Replacement response for one comic number
#[derive(Debug, Clone)]
pub enum Canned {
    /// Bare status code with an empty body
    Status(u16),
    /// 200 with exactly these bytes
    Body(Vec<u8>),
    /// Normal response after an extra delay
    Delay(Duration),
}

#[derive(Default)]
struct MockState {
    latest: AtomicU32,
    delay_ms: AtomicU64,
    xkcd_overrides: Mutex<HashMap<u32, Canned>>,
    explain_overrides: Mutex<HashMap<u32, Canned>>,
    archive: Mutex<Option<Vec<u8>>>,
    requests: AtomicUsize,
    xkcd_requests: Mutex<Vec<u32>>,
    explain_requests: Mutex<Vec<u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Decrements the in-flight counter even if the client hangs up
struct InFlight<'a>(&'a MockState);

impl<'a> InFlight<'a> {
    fn enter(state: &'a MockState) -> Self {
        state.requests.fetch_add(1, Ordering::SeqCst);
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Running mock server
pub struct MockUpstream {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockUpstream {
    /// Start a server publishing comics `1..=latest`
    pub async fn start(latest: u32) -> Self {
        let state = Arc::new(MockState::default());
        state.latest.store(latest, Ordering::SeqCst);

        let app = Router::new()
            .route("/info.0.json", get(latest_comic))
            .route("/:num/info.0.json", get(xkcd_comic))
            .route("/wiki/api.php", get(explain))
            .route("/archive.json", get(archive))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn explain_url(&self) -> String {
        format!("http://{}/wiki/api.php", self.addr)
    }

    pub fn archive_url(&self) -> String {
        format!("http://{}/archive.json", self.addr)
    }

    pub fn set_latest(&self, latest: u32) {
        self.state.latest.store(latest, Ordering::SeqCst);
    }

    /// Delay applied to every request
    pub fn set_delay(&self, delay: Duration) {
        self.state.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_xkcd(&self, num: u32, canned: Canned) {
        self.state.xkcd_overrides.lock().unwrap().insert(num, canned);
    }

    pub fn set_explain(&self, num: u32, canned: Canned) {
        self.state.explain_overrides.lock().unwrap().insert(num, canned);
    }

    pub fn set_archive(&self, body: Vec<u8>) {
        *self.state.archive.lock().unwrap() = Some(body);
    }

    /// Total requests received on any route
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Comic numbers requested from the xkcd route, sorted (0 = latest)
    pub fn xkcd_requests(&self) -> Vec<u32> {
        let mut ids = self.state.xkcd_requests.lock().unwrap().clone();
        ids.sort_unstable();
        ids
    }

    pub fn explain_requests(&self) -> Vec<u32> {
        let mut ids = self.state.explain_requests.lock().unwrap().clone();
        ids.sort_unstable();
        ids
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Settings pointing at `server` with millisecond backoff
pub fn test_settings(server: &MockUpstream) -> DownloadSettings {
    DownloadSettings {
        xkcd_base_url: server.url(),
        explain_base_url: server.explain_url(),
        http_timeout: Duration::from_secs(5),
        max_body_bytes: 1024 * 1024,
        retry: RetryPolicy::new(3, Duration::from_millis(10)).without_jitter(),
        concurrency: 8,
        output_file: PathBuf::from("comics.json"),
        watch_interval: Duration::from_secs(60),
    }
}

/// Generated xkcd payload for comic `num`
pub fn xkcd_body(num: u32) -> Vec<u8> {
    json!({
        "title": format!("Comic {}", num),
        "safe_title": format!("Comic {}", num),
        "num": num,
        "alt": format!("Alt text {}", num),
        "img": format!("https://imgs.xkcd.com/comics/comic_{}.png", num),
        "transcript": "",
        "day": (num % 28 + 1).to_string(),
        "month": (num % 12 + 1).to_string(),
        "year": "2010",
        "link": "",
        "news": ""
    })
    .to_string()
    .into_bytes()
}

/// Generated explainxkcd payload for comic `num`
pub fn explain_body(num: u32) -> Vec<u8> {
    let wikitext = format!(
        "{{{{comic\n| number = {0}\n}}}}\n==Explanation==\nExplanation of comic {0}. See https://xkcd.com/{0}/ for details.\n==Transcript==\nTranscript of comic {0}\n",
        num
    );
    json!({
        "parse": {
            "title": format!("{}: Comic {}", num, num),
            "pageid": num + 1000,
            "wikitext": { "*": wikitext }
        }
    })
    .to_string()
    .into_bytes()
}

/// Explanation the pipeline should extract from [`explain_body`]
pub fn expected_explanation(num: u32) -> String {
    format!("Explanation of comic {}. See  for details.", num)
}

fn json_response(body: Vec<u8>) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn respond(state: &MockState, canned: Option<Canned>, body: impl FnOnce() -> Response) -> Response {
    let _in_flight = InFlight::enter(state);

    let delay = Duration::from_millis(state.delay_ms.load(Ordering::SeqCst));
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    match canned {
        Some(Canned::Status(code)) => StatusCode::from_u16(code).unwrap().into_response(),
        Some(Canned::Body(bytes)) => json_response(bytes),
        Some(Canned::Delay(extra)) => {
            tokio::time::sleep(extra).await;
            body()
        }
        None => body(),
    }
}

fn comic_response(num: u32, latest: u32) -> Response {
    if num == 404 || num > latest {
        StatusCode::NOT_FOUND.into_response()
    } else {
        json_response(xkcd_body(num))
    }
}

async fn latest_comic(State(state): State<Arc<MockState>>) -> Response {
    state.xkcd_requests.lock().unwrap().push(0);
    let canned = state.xkcd_overrides.lock().unwrap().get(&0).cloned();
    let latest = state.latest.load(Ordering::SeqCst);
    respond(&state, canned, || comic_response(latest, latest)).await
}

async fn xkcd_comic(State(state): State<Arc<MockState>>, Path(num): Path<u32>) -> Response {
    state.xkcd_requests.lock().unwrap().push(num);
    let canned = state.xkcd_overrides.lock().unwrap().get(&num).cloned();
    let latest = state.latest.load(Ordering::SeqCst);
    respond(&state, canned, || comic_response(num, latest)).await
}

async fn explain(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(num) = params.get("page").and_then(|p| p.parse::<u32>().ok()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    state.explain_requests.lock().unwrap().push(num);
    let canned = state.explain_overrides.lock().unwrap().get(&num).cloned();
    respond(&state, canned, || json_response(explain_body(num))).await
}

async fn archive(State(state): State<Arc<MockState>>) -> Response {
    let body = state.archive.lock().unwrap().clone();
    respond(&state, None, || match body {
        Some(bytes) => json_response(bytes),
        None => StatusCode::NOT_FOUND.into_response(),
    })
    .await
}

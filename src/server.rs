//! HTTP thumbnail service.
//!
//! Serves thumbnails of images fetched from an upstream HTTP server. The
//! request path carries the thumbnail arguments followed by the upstream
//! location:
//!
//! ```text
//! GET /w=128,h=128,a=0,q=95/images.example.com/photos/dawn.jpg
//!      └──── arguments ────┘└──────── fetched as http://… ───────┘
//! ```
//!
//! | Arg | Meaning | Type |
//! |-----|---------|------|
//! | `w`, `h` | thumbnail size (required) | integer |
//! | `q` | JPEG quality, 0–100 | integer |
//! | `u` | allow upscaling | integer, non-zero = true |
//! | `a` | force exact aspect | integer, non-zero = true |
//! | `o` | optimise Huffman tables | integer, non-zero = true |
//! | `p` | prescale factor | float |
//!
//! Missing arguments take their values from the `[defaults]` config section.
//! Unknown argument names are ignored.
//!
//! ## Responses
//!
//! | Situation | Status |
//! |-----------|--------|
//! | thumbnail produced | 200, `image/jpeg`, upstream `Last-Modified` relayed |
//! | bad arguments | 400 |
//! | upstream answered anything but 200 (including 304) | upstream status |
//! | upstream unreachable, or failed mid-body | 502 |
//! | the image could not be thumbnailed | 500 |
//!
//! `GET /server-status` returns plain-text counters.
//!
//! Each thumbnail runs on a blocking worker thread with its own buffers; the
//! only state shared between requests is the counters in [`Stats`].

use crate::config::{LimitsConfig, RequestDefaults, ThumberConfig};
use crate::imaging::{
    DecodeError, Quality, ThumbnailError, ThumbnailParameters, make_thumbnail,
};
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use log::{info, warn};
use std::fmt::Write as _;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid listen address {0:?}")]
    Listen(String),
}

/// A request the service refuses with 400.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgError {
    #[error("Path should start with /")]
    NoLeadingSlash,
    #[error("Path needs to have at least two components")]
    TooFewComponents,
    #[error("Arguments must have the form name=value")]
    Malformed,
    #[error("Invalid integer value for {0}")]
    InvalidInteger(String),
    #[error("Invalid float value for {0}")]
    InvalidFloat(String),
    #[error("Width (w) not specified or invalid")]
    Width,
    #[error("Height (h) not specified or invalid")]
    Height,
    #[error("Image dimensions are insane")]
    TooManyPixels,
    #[error("Quality must be between 0 and 100")]
    Quality,
}

/// A parsed thumbnail request.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbRequest {
    pub params: ThumbnailParameters,
    /// Upstream location without the scheme, e.g. `host:port/path?query`.
    pub upstream: String,
}

impl ThumbRequest {
    pub fn upstream_url(&self) -> String {
        format!("http://{}", self.upstream)
    }
}

/// Parse a request path (with query) into thumbnail parameters and the
/// upstream location.
pub fn parse_request(
    path: &str,
    defaults: &RequestDefaults,
    limits: &LimitsConfig,
) -> Result<ThumbRequest, ArgError> {
    let rest = path.strip_prefix('/').ok_or(ArgError::NoLeadingSlash)?;
    let (args, upstream) = rest.split_once('/').ok_or(ArgError::TooFewComponents)?;

    let mut width: i64 = 0;
    let mut height: i64 = 0;
    let mut quality = i64::from(defaults.quality);
    let mut params = defaults.thumbnail_parameters(0, 0);

    for arg in args.split(',') {
        let (name, value) = arg.split_once('=').ok_or(ArgError::Malformed)?;
        match name {
            "w" | "h" | "q" | "u" | "a" | "o" => {
                let val: i64 = value
                    .parse()
                    .map_err(|_| ArgError::InvalidInteger(name.to_string()))?;
                match name {
                    "w" => width = val,
                    "h" => height = val,
                    "q" => quality = val,
                    "u" => params.upscale = val != 0,
                    "a" => params.force_aspect = val != 0,
                    _ => params.optimize = val != 0,
                }
            }
            "p" => {
                params.prescale_factor = value
                    .parse()
                    .map_err(|_| ArgError::InvalidFloat(name.to_string()))?;
            }
            _ => {}
        }
    }

    let max_dimension = i64::try_from(limits.max_dimension).unwrap_or(i64::MAX);
    let max_pixels = i64::try_from(limits.max_pixels).unwrap_or(i64::MAX);
    if width <= 0 || width > max_dimension {
        return Err(ArgError::Width);
    }
    if height <= 0 || height > max_dimension {
        return Err(ArgError::Height);
    }
    if width.saturating_mul(height) > max_pixels {
        return Err(ArgError::TooManyPixels);
    }
    if !(0..=100).contains(&quality) {
        return Err(ArgError::Quality);
    }

    params.width = width as usize;
    params.height = height as usize;
    params.quality = Quality::new(quality as u32);
    Ok(ThumbRequest {
        params,
        upstream: upstream.to_string(),
    })
}

// ============================================================================
// Counters
// ============================================================================

/// Request counters reported by `/server-status`.
#[derive(Debug, Default)]
pub struct Stats {
    pub received: AtomicI64,
    pub inflight: AtomicI64,
    pub ok: AtomicI64,
    pub thumb_error: AtomicI64,
    pub upstream_error: AtomicI64,
    pub arg_error: AtomicI64,
    pub total_time_us: AtomicI64,
}

impl Stats {
    /// Plain-text report, one `name value` pair per line.
    pub fn render(&self, version: &str) -> String {
        let mut out = format!("version {version}\n");
        for (name, counter) in [
            ("received", &self.received),
            ("inflight", &self.inflight),
            ("ok", &self.ok),
            ("thumb_error", &self.thumb_error),
            ("upstream_error", &self.upstream_error),
            ("arg_error", &self.arg_error),
            ("total_time_us", &self.total_time_us),
        ] {
            let _ = writeln!(out, "{name} {}", counter.load(Ordering::Relaxed));
        }
        out
    }

    fn bump(counter: &AtomicI64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Tracks one in-flight request; records its duration on drop.
struct InflightGuard<'a> {
    stats: &'a Stats,
    started: Instant,
}

impl<'a> InflightGuard<'a> {
    fn enter(stats: &'a Stats) -> Self {
        Stats::bump(&stats.received);
        Stats::bump(&stats.inflight);
        Self {
            stats,
            started: Instant::now(),
        }
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        let elapsed = i64::try_from(self.started.elapsed().as_micros()).unwrap_or(i64::MAX);
        self.stats.total_time_us.fetch_add(elapsed, Ordering::Relaxed);
        self.stats.inflight.fetch_sub(1, Ordering::Relaxed);
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Shared service state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ThumberConfig>,
    pub stats: Arc<Stats>,
    pub version: &'static str,
    agent: ureq::Agent,
}

impl AppState {
    pub fn new(config: ThumberConfig, version: &'static str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.server.upstream_timeout())
            .build();
        Self {
            config: Arc::new(config),
            stats: Arc::new(Stats::default()),
            version,
            agent,
        }
    }
}

/// How a thumbnail request failed after its arguments were accepted.
#[derive(Debug)]
enum Failure {
    /// Upstream answered with something other than 200.
    UpstreamStatus(u16, String),
    /// Upstream could not be reached or its body could not be read.
    Upstream(String),
    Thumbnail(ThumbnailError),
}

struct Thumbnail {
    body: Vec<u8>,
    last_modified: Option<String>,
}

/// Fetch the upstream image and thumbnail it. Blocking.
fn fetch_and_thumbnail(
    agent: &ureq::Agent,
    request: &ThumbRequest,
    if_modified_since: Option<&str>,
) -> Result<Thumbnail, Failure> {
    let mut call = agent.get(&request.upstream_url());
    if let Some(since) = if_modified_since {
        call = call.set("If-Modified-Since", since);
    }
    let response = match call.call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, response)) => {
            return Err(Failure::UpstreamStatus(
                code,
                format!("{code} {}", response.status_text()),
            ));
        }
        Err(ureq::Error::Transport(err)) => return Err(Failure::Upstream(err.to_string())),
    };
    if response.status() != 200 {
        return Err(Failure::UpstreamStatus(
            response.status(),
            format!("{} {}", response.status(), response.status_text()),
        ));
    }

    let last_modified = response.header("Last-Modified").map(str::to_owned);
    let mut body = Vec::new();
    match make_thumbnail(response.into_reader(), &mut body, &request.params) {
        Ok(_) => Ok(Thumbnail {
            body,
            last_modified,
        }),
        Err(ThumbnailError::Decode(DecodeError::Io(err))) => Err(Failure::Upstream(err.to_string())),
        Err(err) => Err(Failure::Thumbnail(err)),
    }
}

fn text_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("{message}\n"),
    )
        .into_response()
}

async fn server_status(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain")],
        state.stats.render(state.version),
    )
        .into_response()
}

async fn thumbnail(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    let stats = state.stats.clone();
    let _guard = InflightGuard::enter(&stats);
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    let request = match parse_request(path, &state.config.defaults, &state.config.limits) {
        Ok(request) => request,
        Err(err) => {
            Stats::bump(&stats.arg_error);
            info!("{path}: 400 {err}");
            return text_response(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };
    let if_modified_since = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let agent = state.agent.clone();
    let job = request.clone();
    let result = tokio::task::spawn_blocking(move || {
        fetch_and_thumbnail(&agent, &job, if_modified_since.as_deref())
    })
    .await;

    match result {
        Ok(Ok(thumb)) => {
            Stats::bump(&stats.ok);
            info!(
                "{path}: 200 {}x{} ({} bytes)",
                request.params.width,
                request.params.height,
                thumb.body.len()
            );
            let mut response = thumb.body.into_response();
            let response_headers = response.headers_mut();
            response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
            if let Some(value) = thumb
                .last_modified
                .and_then(|v| HeaderValue::from_str(&v).ok())
            {
                response_headers.insert(header::LAST_MODIFIED, value);
            }
            response
        }
        Ok(Err(Failure::UpstreamStatus(code, status))) => {
            Stats::bump(&stats.upstream_error);
            info!("{path}: upstream answered {status}");
            let status_code = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY);
            if status_code == StatusCode::NOT_MODIFIED {
                return status_code.into_response();
            }
            text_response(status_code, &format!("Upstream failed: {status}"))
        }
        Ok(Err(Failure::Upstream(message))) => {
            Stats::bump(&stats.upstream_error);
            warn!("{path}: upstream failed: {message}");
            text_response(
                StatusCode::BAD_GATEWAY,
                &format!("Upstream failed: {message}"),
            )
        }
        Ok(Err(Failure::Thumbnail(err))) => {
            Stats::bump(&stats.thumb_error);
            warn!("{path}: thumbnailing failed: {err}");
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Thumbnailing failed: {err}"),
            )
        }
        Err(err) => {
            Stats::bump(&stats.thumb_error);
            warn!("{path}: worker failed: {err}");
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Thumbnailing failed: {err}"),
            )
        }
    }
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/server-status", get(server_status))
        .fallback(thumbnail)
        .with_state(state)
}

/// Serve on an already-bound listener until the listener fails.
pub async fn serve(listener: TcpListener, state: AppState) -> io::Result<()> {
    axum::serve(listener, router(state)).await
}

/// Start the service from config. Blocks for the life of the server.
pub fn run(config: ThumberConfig, version: &'static str) -> Result<(), ServerError> {
    let listen = config.server.listen.clone();
    let addr: std::net::SocketAddr = listen
        .parse()
        .map_err(|_| ServerError::Listen(listen.clone()))?;
    let state = AppState::new(config, version);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let listener = TcpListener::bind(addr).await?;
        info!("listening on http://{}", listener.local_addr()?);
        serve(listener, state).await
    })?;
    Ok(())
}

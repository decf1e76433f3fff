//! Common Log Format access logging for axum.
//!
//! Wraps a router so that every request emits exactly one line in the
//! [Common Log Format](https://en.wikipedia.org/wiki/Common_Log_Format),
//! after the inner handler has finished and the response body has been
//! written:
//!
//! ```text
//! 127.0.0.1 - - [02/Jan/2006:15:04:05 -0700] "GET /user/keys/testing HTTP/1.1" 500 21 "-" "TestAgent/1.0"
//! ```
//!
//! ```no_run
//! use accesslog_axum::AccessLog;
//! use axum::{routing::get, Router};
//!
//! # async fn serve() {
//! let log = AccessLog::new();
//! let app = log.wrap(Router::new().route("/hello", get(|| async { "Hello!" })));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await.unwrap();
//! axum::serve(
//!     listener,
//!     app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
//! )
//! .await
//! .unwrap();
//! # }
//! ```
//!
//! The client address in the line comes from the `ConnectInfo` extension, so
//! the server must be built with `into_make_service_with_connect_info` as
//! above; without it the address renders as `-`.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum::Router;

mod line;
mod observe;
mod sink;

pub use sink::{FallibleFnSink, FnSink, LogSink, Sink, StdoutSink};

use line::Entry;
use observe::{LogGuard, MeteredBody};

/// Access logger. Holds only the sink; all per-request state lives in the
/// guard created for that request.
#[derive(Clone)]
pub struct AccessLog {
    /// Where the formatted lines go. Swap it after construction and before
    /// handing the logger to a router to redirect output.
    pub sink: Arc<dyn Sink>,
}

impl AccessLog {
    pub fn new() -> AccessLog {
        AccessLog {
            sink: Arc::new(StdoutSink),
        }
    }

    /// Returns the router with the logging middleware layered on, so that
    /// every route it serves gets one access-log line per request.
    pub fn wrap(&self, router: Router) -> Router {
        router.layer(axum::middleware::from_fn_with_state(self.clone(), record))
    }
}

impl Default for AccessLog {
    fn default() -> AccessLog {
        AccessLog::new()
    }
}

/// The middleware itself, for handler chains that compose with
/// `axum::middleware::from_fn_with_state` directly instead of [`AccessLog::wrap`].
///
/// The guard is created before the inner handler runs and emits on drop, so
/// the line fires exactly once whether the handler returns normally, panics,
/// or the request is cancelled. On normal completion the guard rides along
/// inside the response body and emits once the body has been fully forwarded,
/// which is when the byte count is final.
pub async fn record(State(log): State<AccessLog>, req: Request, next: Next) -> Response {
    let mut guard = LogGuard::new(Entry::capture(&req), log.sink.clone());

    let response = next.run(req).await;

    guard.set_status(response.status());
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(MeteredBody::new(body, guard)))
}

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::StatusCode;
use chrono::Local;
use http_body::{Body as HttpBody, Frame, SizeHint};

use crate::line::Entry;
use crate::sink::Sink;

/// Owns one entry for the duration of one request and hands the rendered
/// line to the sink exactly once, when dropped. Created before the inner
/// handler runs, so the line fires no matter how the request ends.
pub(crate) struct LogGuard {
    entry: Entry,
    sink: Arc<dyn Sink>,
}

impl LogGuard {
    pub(crate) fn new(entry: Entry, sink: Arc<dyn Sink>) -> LogGuard {
        LogGuard { entry, sink }
    }

    pub(crate) fn set_status(&mut self, status: StatusCode) {
        self.entry.set_status(status);
    }

    pub(crate) fn add_bytes(&mut self, count: u64) {
        self.entry.add_bytes(count);
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        self.sink.write_line(&self.entry.render(Local::now()));
    }
}

/// Response body decorator: forwards every frame of the inner body unchanged
/// while accumulating data-frame sizes into the guard. The guard is released
/// at end of stream, on a body error, or when the body is dropped unread, so
/// the byte count reflects exactly what was forwarded downstream.
pub(crate) struct MeteredBody {
    inner: Body,
    guard: Option<LogGuard>,
}

impl MeteredBody {
    pub(crate) fn new(inner: Body, guard: LogGuard) -> MeteredBody {
        MeteredBody {
            inner,
            guard: Some(guard),
        }
    }
}

impl HttpBody for MeteredBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let (Some(guard), Some(data)) = (this.guard.as_mut(), frame.data_ref()) {
                    guard.add_bytes(data.len() as u64);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(err))) => {
                // Emit with the bytes accumulated so far; the error itself
                // passes through untouched.
                this.guard = None;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.guard = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        HttpBody::size_hint(&self.inner)
    }
}

use std::marker::PhantomData;

/// Destination for formatted access-log lines. Implementations must be safe
/// to call from concurrent requests; the middleware never serializes calls.
pub trait Sink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Default sink: writes each line to standard output with no extra
/// decoration, since the line already carries its own timestamp.
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn write_line(&self, line: &str) {
        println!("{}", line);
    }
}

/// Adapts a plain callback into a [`Sink`].
pub struct FnSink<F>(F);

impl<F> FnSink<F>
where
    F: Fn(&str) + Send + Sync,
{
    pub fn new(f: F) -> FnSink<F> {
        FnSink(f)
    }
}

impl<F> Sink for FnSink<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn write_line(&self, line: &str) {
        (self.0)(line)
    }
}

/// Adapts an error-returning callback, such as a syslog writer, into a
/// [`Sink`]. Delivery is best-effort: a failed write is reported at warn
/// level and never reaches the request path.
pub struct FallibleFnSink<F, E> {
    f: F,
    _err: PhantomData<fn() -> E>,
}

impl<F, E> FallibleFnSink<F, E>
where
    F: Fn(&str) -> Result<(), E> + Send + Sync,
{
    pub fn new(f: F) -> FallibleFnSink<F, E> {
        FallibleFnSink {
            f,
            _err: PhantomData,
        }
    }
}

impl<F, E> Sink for FallibleFnSink<F, E>
where
    F: Fn(&str) -> Result<(), E> + Send + Sync,
    E: std::fmt::Display,
{
    fn write_line(&self, line: &str) {
        if let Err(err) = (self.f)(line) {
            log::warn!("access log sink failed: {}", err);
        }
    }
}

/// Emits lines through the `log` facade at info level under the `accesslog`
/// target, for hosts that already run a logging backend.
pub struct LogSink;

impl Sink for LogSink {
    fn write_line(&self, line: &str) {
        log::info!(target: "accesslog", "{}", line);
    }
}

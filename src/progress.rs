/// Receives coarse progress updates from a running engine.
///
/// `fraction` is in `[0, 1]`. Reports are purely informational and may be ignored; they never
/// affect the result of a run. Reports can arrive from analysis worker threads.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str, fraction: f32);
}

impl<F> ProgressSink for F
where
    F: Fn(&str, f32) + Send + Sync,
{
    fn report(&self, message: &str, fraction: f32) {
        self(message, fraction)
    }
}

/// Discards all progress updates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _message: &str, _fraction: f32) {}
}

/// Emits progress updates as `tracing` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, message: &str, fraction: f32) {
        tracing::info!(progress = %format!("{:.0}%", fraction * 100.0), "{}", message);
    }
}

use crate::api::{AnalyzeRequest, ApiError, Backend, ByteStream, HighlightStreamRequest};
use crate::api::{ANALYZE_PATH, HIGHLIGHTS_STREAM_PATH};
use crate::highlight::ChunkResult;
use crate::sse::{SseDecoder, SseFrame};
use futures_util::StreamExt;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub mod events;
pub mod progress;
pub mod state;

pub use events::{AnalysisEvent, HighlightEvent};
pub use progress::{DoneSummary, ProgressInfo};
pub use state::SessionState;

/// Receives the routed events of a highlight stream.
///
/// At most one of `on_done` / `on_error` is called, and neither after the
/// session was cancelled.
pub trait HighlightCallbacks: Send + 'static {
    fn on_chunk(&mut self, chunk: ChunkResult);
    fn on_progress(&mut self, info: ProgressInfo);
    fn on_done(&mut self, summary: DoneSummary);
    fn on_error(&mut self, message: String);
}

/// Receives the routed events of an analysis stream.
pub trait AnalysisCallbacks: Send + 'static {
    fn on_event(&mut self, event: AnalysisEvent);
    fn on_done(&mut self);
    fn on_error(&mut self, message: String);
}

/// Handle on a running stream session.
pub struct StreamHandle {
    id: String,
    token: CancellationToken,
    state: watch::Receiver<SessionState>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Aborts the transfer. Safe to call any number of times, including
    /// after the session settled.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!("Cancelling stream session {}", self.id);
        }
        self.token.cancel();
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Resolves once the session reached a settled state, leaving the handle
    /// usable.
    pub async fn until_settled(&mut self) -> SessionState {
        let settled = self
            .state
            .wait_for(SessionState::is_settled)
            .await
            .map(|state| *state);
        settled.unwrap_or_else(|_| *self.state.borrow())
    }

    /// Waits for the session task to end and returns its final state.
    pub async fn settled(self) -> SessionState {
        if let Err(e) = self.task.await {
            tracing::error!("Stream session {} task failed: {}", self.id, e);
        }
        *self.state.borrow()
    }
}

/// How a body pump ended.
enum PumpEnd {
    /// A frame asked to stop (terminal event seen).
    Terminated,
    /// The body ended on its own.
    Exhausted,
    Cancelled,
    Failed(ApiError),
}

async fn pump<F>(mut body: ByteStream, token: &CancellationToken, mut on_frame: F) -> PumpEnd
where
    F: FnMut(SseFrame) -> ControlFlow<()>,
{
    let mut decoder = SseDecoder::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return PumpEnd::Cancelled,
            next = body.next() => next,
        };

        match next {
            Some(Ok(bytes)) => {
                for frame in decoder.feed(&bytes) {
                    if token.is_cancelled() {
                        return PumpEnd::Cancelled;
                    }
                    if on_frame(frame).is_break() {
                        return PumpEnd::Terminated;
                    }
                }
            }
            Some(Err(e)) => return PumpEnd::Failed(e),
            None => break,
        }
    }

    for frame in decoder.finish() {
        if token.is_cancelled() {
            return PumpEnd::Cancelled;
        }
        if on_frame(frame).is_break() {
            return PumpEnd::Terminated;
        }
    }
    PumpEnd::Exhausted
}

/// A cancel that arrived after the last frame still wins over the outcome.
fn settle(end: PumpEnd, token: &CancellationToken) -> PumpEnd {
    if token.is_cancelled() {
        PumpEnd::Cancelled
    } else {
        end
    }
}

/// Opens the stream unless cancelled first. `None` means cancelled.
async fn open(
    backend: &dyn Backend,
    path: &str,
    body: Result<serde_json::Value, serde_json::Error>,
    token: &CancellationToken,
) -> Option<Result<ByteStream, ApiError>> {
    let body = match body {
        Ok(body) => body,
        Err(e) => return Some(Err(ApiError::Decode(e.to_string()))),
    };

    let opened = tokio::select! {
        biased;
        _ = token.cancelled() => return None,
        opened = backend.open_stream(path, body) => opened,
    };
    if token.is_cancelled() {
        return None;
    }
    Some(opened)
}

fn spawn_session<Fut>(
    kind: &'static str,
    token: CancellationToken,
    run: impl FnOnce(String, CancellationToken, watch::Sender<SessionState>) -> Fut,
) -> StreamHandle
where
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let id = Uuid::new_v4().to_string();
    let (state_tx, state_rx) = watch::channel(SessionState::Active);

    tracing::info!("Started {} session: {}", kind, id);
    let task = tokio::spawn(run(id.clone(), token.clone(), state_tx));

    StreamHandle {
        id,
        token,
        state: state_rx,
        task,
    }
}

/// Starts the highlight stream for one loaded video.
pub fn start_highlight_stream<C: HighlightCallbacks>(
    backend: Arc<dyn Backend>,
    request: HighlightStreamRequest,
    callbacks: C,
) -> StreamHandle {
    highlight_session(CancellationToken::new(), backend, request, callbacks)
}

/// Starts the persona analysis stream.
pub fn start_analysis_stream<C: AnalysisCallbacks>(
    backend: Arc<dyn Backend>,
    request: AnalyzeRequest,
    callbacks: C,
) -> StreamHandle {
    analysis_session(CancellationToken::new(), backend, request, callbacks)
}

/// Like [`start_highlight_stream`], cancelled together with `token`.
pub(crate) fn highlight_session<C: HighlightCallbacks>(
    token: CancellationToken,
    backend: Arc<dyn Backend>,
    request: HighlightStreamRequest,
    mut callbacks: C,
) -> StreamHandle {
    spawn_session("highlight", token, move |id, token, state| async move {
        let body = serde_json::to_value(&request);
        let stream = match open(backend.as_ref(), HIGHLIGHTS_STREAM_PATH, body, &token).await {
            None => {
                state.send_replace(SessionState::Aborted);
                return;
            }
            Some(Err(e)) => {
                tracing::warn!("Highlight session {} failed to open: {}", id, e);
                state.send_replace(SessionState::Errored);
                callbacks.on_error(e.to_string());
                return;
            }
            Some(Ok(stream)) => stream,
        };

        let mut summary = None;
        let mut chunks = 0usize;
        let end = pump(stream, &token, |frame| {
            match HighlightEvent::parse(&frame) {
                Ok(Some(HighlightEvent::Chunk(chunk))) => {
                    chunks += 1;
                    callbacks.on_chunk(chunk);
                }
                Ok(Some(HighlightEvent::Progress(info))) => callbacks.on_progress(info),
                Ok(Some(HighlightEvent::Done(done))) => {
                    summary = Some(done);
                    return ControlFlow::Break(());
                }
                Ok(None) => tracing::trace!("Ignoring '{}' event", frame.event),
                Err(e) => tracing::warn!("Skipping malformed '{}' event: {}", frame.event, e),
            }
            ControlFlow::Continue(())
        })
        .await;

        match settle(end, &token) {
            PumpEnd::Cancelled => {
                tracing::info!("Highlight session {} aborted after {} chunks", id, chunks);
                state.send_replace(SessionState::Aborted);
            }
            PumpEnd::Failed(e) => {
                tracing::warn!("Highlight session {} failed after {} chunks: {}", id, chunks, e);
                state.send_replace(SessionState::Errored);
                callbacks.on_error(e.to_string());
            }
            PumpEnd::Terminated | PumpEnd::Exhausted => {
                let summary = summary.unwrap_or_else(|| {
                    tracing::warn!(
                        "Highlight session {} ended without a done event ({} chunks)",
                        id,
                        chunks
                    );
                    DoneSummary::implicit()
                });
                tracing::info!(
                    "Highlight session {} completed: {} chunks, total={}, failed={}",
                    id,
                    chunks,
                    summary.total,
                    summary.failed_chunks.len()
                );
                state.send_replace(SessionState::Completed);
                callbacks.on_done(summary);
            }
        }
    })
}

pub(crate) fn analysis_session<C: AnalysisCallbacks>(
    token: CancellationToken,
    backend: Arc<dyn Backend>,
    request: AnalyzeRequest,
    mut callbacks: C,
) -> StreamHandle {
    spawn_session("analysis", token, move |id, token, state| async move {
        let body = serde_json::to_value(&request);
        let stream = match open(backend.as_ref(), ANALYZE_PATH, body, &token).await {
            None => {
                state.send_replace(SessionState::Aborted);
                return;
            }
            Some(Err(e)) => {
                tracing::warn!("Analysis session {} failed to open: {}", id, e);
                state.send_replace(SessionState::Errored);
                callbacks.on_error(e.to_string());
                return;
            }
            Some(Ok(stream)) => stream,
        };

        let end = pump(stream, &token, |frame| {
            if frame.event == events::DONE {
                return ControlFlow::Break(());
            }
            match AnalysisEvent::parse(&frame) {
                Ok(Some(event)) => callbacks.on_event(event),
                Ok(None) => tracing::trace!("Ignoring '{}' event", frame.event),
                Err(e) => tracing::warn!("Skipping malformed '{}' event: {}", frame.event, e),
            }
            ControlFlow::Continue(())
        })
        .await;

        match settle(end, &token) {
            PumpEnd::Cancelled => {
                state.send_replace(SessionState::Aborted);
            }
            PumpEnd::Failed(e) => {
                tracing::warn!("Analysis session {} failed: {}", id, e);
                state.send_replace(SessionState::Errored);
                callbacks.on_error(e.to_string());
            }
            PumpEnd::Terminated | PumpEnd::Exhausted => {
                tracing::info!("Analysis session {} completed", id);
                state.send_replace(SessionState::Completed);
                callbacks.on_done();
            }
        }
    })
}

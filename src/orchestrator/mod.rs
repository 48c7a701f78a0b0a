use crate::api::{
    AnalyzeRequest, ApiError, Backend, GenerationRequest, HighlightStreamRequest, SegmentPayload,
};
use crate::highlight::ChunkResult;
use crate::session::{
    analysis_session, highlight_session, AnalysisCallbacks, AnalysisEvent, DoneSummary,
    HighlightCallbacks, ProgressInfo, StreamHandle,
};
use crate::transcript::{extract_video_id, joined_text};
use crate::view::{PipelineEvent, Tagged};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Interval of the elapsed-time ticker shown next to the highlight progress.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

pub type EventSender = mpsc::UnboundedSender<Tagged<PipelineEvent>>;
pub type EventReceiver = mpsc::UnboundedReceiver<Tagged<PipelineEvent>>;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to load transcript: {0}")]
    Transcript(#[from] ApiError),

    #[error("Transcript for {0} has no segments")]
    EmptyTranscript(String),
}

/// Stamps events with the generation of the load that produced them.
#[derive(Clone)]
struct Emitter {
    generation: u64,
    tx: EventSender,
}

impl Emitter {
    fn emit(&self, event: PipelineEvent) {
        let tagged = Tagged {
            generation: self.generation,
            event,
        };
        if self.tx.send(tagged).is_err() {
            tracing::trace!("View receiver gone, dropping event");
        }
    }
}

struct HighlightForwarder(Emitter);

impl HighlightCallbacks for HighlightForwarder {
    fn on_chunk(&mut self, chunk: ChunkResult) {
        self.0.emit(PipelineEvent::HighlightChunk(chunk));
    }

    fn on_progress(&mut self, info: ProgressInfo) {
        self.0.emit(PipelineEvent::HighlightProgress(info));
    }

    fn on_done(&mut self, summary: DoneSummary) {
        self.0.emit(PipelineEvent::HighlightsDone(summary));
    }

    fn on_error(&mut self, message: String) {
        self.0.emit(PipelineEvent::HighlightsFailed(message));
    }
}

struct AnalysisForwarder(Emitter);

impl AnalysisCallbacks for AnalysisForwarder {
    fn on_event(&mut self, event: AnalysisEvent) {
        self.0.emit(PipelineEvent::Analysis(event));
    }

    fn on_done(&mut self) {
        self.0.emit(PipelineEvent::AnalysisDone);
    }

    fn on_error(&mut self, message: String) {
        self.0.emit(PipelineEvent::AnalysisFailed(message));
    }
}

/// Runs the per-video pipelines and feeds their events to one receiver.
///
/// Every [`load`](Orchestrator::load) supersedes the previous one: its
/// requests and streams are cancelled and its events carry an older
/// generation, so the view ignores whatever still arrives from it.
pub struct Orchestrator {
    backend: Arc<dyn Backend>,
    tx: EventSender,
    generation: u64,
    current: Option<CancellationToken>,
    tasks: Vec<JoinHandle<()>>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn Backend>) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            backend,
            tx,
            generation: 0,
            current: None,
            tasks: Vec::new(),
        };
        (orchestrator, rx)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Loads a video and starts its pipelines. Returns the segment count.
    ///
    /// Chapters run first and feed the highlight stream; context notes and
    /// the persona analysis (when `persona` is set) run alongside.
    pub async fn load(&mut self, url: &str, persona: Option<&str>) -> Result<usize, LoadError> {
        self.cancel_current();
        self.tasks.retain(|task| !task.is_finished());

        self.generation += 1;
        let token = CancellationToken::new();
        self.current = Some(token.clone());
        let emitter = Emitter {
            generation: self.generation,
            tx: self.tx.clone(),
        };

        emitter.emit(PipelineEvent::Reset {
            video_id: extract_video_id(url).unwrap_or_default(),
        });
        tracing::info!("Loading {} (generation {})", url, self.generation);

        let response = match self.backend.transcript(url).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Transcript fetch failed for {}: {}", url, e);
                emitter.emit(PipelineEvent::LoadFailed(e.to_string()));
                return Err(e.into());
            }
        };

        if response.segments.is_empty() {
            let error = LoadError::EmptyTranscript(response.video_id);
            emitter.emit(PipelineEvent::LoadFailed(error.to_string()));
            return Err(error);
        }

        let segment_count = response.segments.len();
        tracing::info!(
            "Transcript loaded: video={} segments={}",
            response.video_id,
            segment_count
        );

        let request = GenerationRequest {
            segments: response.segments.iter().map(SegmentPayload::from).collect(),
            video_id: Some(response.video_id.clone()).filter(|id| !id.is_empty()),
        };
        let transcript_text = joined_text(&response.segments);

        emitter.emit(PipelineEvent::TranscriptLoaded {
            video_id: response.video_id,
            segments: response.segments,
        });

        self.tasks.push(tokio::spawn(chapters_then_highlights(
            self.backend.clone(),
            emitter.clone(),
            token.clone(),
            request.clone(),
        )));
        self.tasks.push(tokio::spawn(context_notes(
            self.backend.clone(),
            emitter.clone(),
            token.clone(),
            request,
        )));

        if let Some(persona) = persona.map(str::trim).filter(|p| !p.is_empty()) {
            self.tasks.push(tokio::spawn(analysis(
                self.backend.clone(),
                emitter,
                token,
                AnalyzeRequest {
                    transcript: transcript_text,
                    persona: persona.to_string(),
                },
            )));
        }

        Ok(segment_count)
    }

    /// Waits until every pipeline of the current load has settled.
    pub async fn wait(&mut self) {
        while let Some(task) = self.tasks.last_mut() {
            if let Err(e) = task.await {
                tracing::error!("Pipeline task failed: {}", e);
            }
            self.tasks.pop();
        }
    }

    /// Cancels everything in flight and marks the current view aborted.
    pub async fn shutdown(&mut self) {
        if self.cancel_current() {
            let aborted = Tagged {
                generation: self.generation,
                event: PipelineEvent::Aborted,
            };
            if self.tx.send(aborted).is_err() {
                tracing::trace!("View receiver gone, dropping abort");
            }
        }
        self.wait().await;
    }

    fn cancel_current(&mut self) -> bool {
        match self.current.take() {
            Some(token) => {
                tracing::debug!("Cancelling pipelines of generation {}", self.generation);
                token.cancel();
                true
            }
            None => false,
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.cancel_current();
    }
}

async fn chapters_then_highlights(
    backend: Arc<dyn Backend>,
    emitter: Emitter,
    token: CancellationToken,
    request: GenerationRequest,
) {
    emitter.emit(PipelineEvent::TocStarted);
    let toc = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        toc = backend.generate_toc(&request) => toc,
    };

    let chapters = match toc {
        Ok(toc) => {
            tracing::info!("Generated {} chapters", toc.chapters.len());
            emitter.emit(PipelineEvent::TocReady(toc.chapters.clone()));
            Some(toc.chapters).filter(|chapters| !chapters.is_empty())
        }
        Err(e) => {
            tracing::warn!("ToC generation failed, highlighting without chapters: {}", e);
            emitter.emit(PipelineEvent::TocFailed(e.to_string()));
            None
        }
    };

    if token.is_cancelled() {
        return;
    }

    emitter.emit(PipelineEvent::HighlightsStarted {
        total_chunks: chapters.as_ref().map_or(0, Vec::len),
    });
    let mut handle = highlight_session(
        token.child_token(),
        backend,
        HighlightStreamRequest {
            segments: request.segments,
            video_id: request.video_id,
            chapters,
        },
        HighlightForwarder(emitter.clone()),
    );

    tick_until_settled(&mut handle, &emitter, &token).await;
    handle.settled().await;
}

async fn tick_until_settled(handle: &mut StreamHandle, emitter: &Emitter, token: &CancellationToken) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    // first tick fires immediately
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = handle.until_settled() => break,
            _ = interval.tick() => emitter.emit(PipelineEvent::Tick),
        }
    }
}

async fn context_notes(
    backend: Arc<dyn Backend>,
    emitter: Emitter,
    token: CancellationToken,
    request: GenerationRequest,
) {
    emitter.emit(PipelineEvent::NotesStarted);
    let notes = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        notes = backend.generate_context_notes(&request) => notes,
    };

    match notes {
        Ok(response) => {
            tracing::info!("Generated {} context notes", response.notes.len());
            emitter.emit(PipelineEvent::NotesReady(response.notes));
        }
        Err(e) => {
            tracing::warn!("Context notes generation failed: {}", e);
            emitter.emit(PipelineEvent::NotesFailed(e.to_string()));
        }
    }
}

async fn analysis(
    backend: Arc<dyn Backend>,
    emitter: Emitter,
    token: CancellationToken,
    request: AnalyzeRequest,
) {
    emitter.emit(PipelineEvent::AnalysisStarted);
    let handle = analysis_session(
        token.child_token(),
        backend,
        request,
        AnalysisForwarder(emitter),
    );
    handle.settled().await;
}

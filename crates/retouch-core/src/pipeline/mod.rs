//! Commit pipeline.
//!
//! Bakes an edit session into a new image:
//! 1. Snapshot the session synchronously and mark a commit in flight
//! 2. Read the source bytes from the store
//! 3. Decode, apply the operation list and encode, off the async executor
//! 4. Write the result under a fresh reference
//!
//! Every failure becomes a [`CommitError`] value. Nothing is written unless
//! all steps succeed, and a second commit while one is pending is rejected
//! without touching the store.

mod operations;
mod processor;

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

pub use operations::{build_operations, select_output_format, CommitSnapshot, EditOperation};
pub use processor::{ImageProcessor, NativeProcessor};

use processor::process;

use crate::decode::DecodeError;
use crate::encode::{EncodeError, OutputFormat};
use crate::session::{CommitRequest, EditSession};
use crate::store::{ImageRef, ImageStore, StoreError};

/// Why a commit produced no image.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommitError {
    /// The source could not be read or decoded.
    #[error("invalid source: {0}")]
    InvalidSource(String),

    /// An operation or the encoder failed.
    #[error("processing failed: {0}")]
    Processing(String),

    /// The result could not be stored.
    #[error("storage failed: {0}")]
    Storage(String),

    /// Another commit on the same session has not resolved yet.
    #[error("commit already in progress")]
    AlreadyInProgress,
}

impl From<DecodeError> for CommitError {
    fn from(err: DecodeError) -> Self {
        CommitError::InvalidSource(err.to_string())
    }
}

impl From<EncodeError> for CommitError {
    fn from(err: EncodeError) -> Self {
        CommitError::Processing(err.to_string())
    }
}

/// A successfully committed image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitOutput {
    pub image: ImageRef,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    /// Operations applied, in order. Empty for a plain re-encode.
    pub operations: Vec<EditOperation>,
}

pub type CommitResult = Result<CommitOutput, CommitError>;

/// Runs commits for edit sessions against one store.
pub struct CommitPipeline<S, P = NativeProcessor> {
    store: Arc<S>,
    processor: Arc<P>,
}

impl<S, P> Clone for CommitPipeline<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            processor: Arc::clone(&self.processor),
        }
    }
}

impl<S> CommitPipeline<S, NativeProcessor>
where
    S: ImageStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_processor(store, Arc::new(NativeProcessor::default()))
    }
}

impl<S, P> CommitPipeline<S, P>
where
    S: ImageStore + 'static,
    P: ImageProcessor + 'static,
{
    pub fn with_processor(store: Arc<S>, processor: Arc<P>) -> Self {
        Self { store, processor }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Commit `session`.
    ///
    /// The session is snapshotted and marked busy before this returns, so
    /// the future does not borrow it. A second call while the first future
    /// is alive resolves at once to [`CommitError::AlreadyInProgress`].
    pub fn commit(
        &self,
        session: &EditSession,
    ) -> impl Future<Output = CommitResult> + Send + 'static {
        let request = session.begin_commit();
        let quality = session.config().quality_percent();
        let store = Arc::clone(&self.store);
        let processor = Arc::clone(&self.processor);

        async move {
            match request {
                Ok(request) => run(store, processor, request, quality).await,
                Err(e) => Err(e),
            }
        }
    }
}

/// Run one commit, holding the session's in-flight guard until it resolves.
async fn run<S, P>(
    store: Arc<S>,
    processor: Arc<P>,
    request: CommitRequest,
    quality: u8,
) -> CommitResult
where
    S: ImageStore + 'static,
    P: ImageProcessor + 'static,
{
    let CommitRequest { snapshot, guard } = request;
    let session_id = snapshot.session_id;
    let timer = Timer::start();

    let result = execute(store, processor, snapshot, quality).await;
    match &result {
        Ok(output) => info!(
            session = %session_id,
            image = %output.image,
            format = %output.format,
            operations = output.operations.len(),
            elapsed_ms = timer.elapsed_ms(),
            "commit finished"
        ),
        Err(e) => error!(
            session = %session_id,
            error = %e,
            elapsed_ms = timer.elapsed_ms(),
            "commit failed"
        ),
    }

    // Re-enables the session's controls
    drop(guard);
    result
}

async fn execute<S, P>(
    store: Arc<S>,
    processor: Arc<P>,
    snapshot: CommitSnapshot,
    quality: u8,
) -> CommitResult
where
    S: ImageStore + 'static,
    P: ImageProcessor + 'static,
{
    let operations = build_operations(&snapshot);
    let format = select_output_format(&operations);
    info!(
        session = %snapshot.session_id,
        source = %snapshot.source,
        operations = operations.len(),
        %format,
        "commit started"
    );

    let source = store.read(&snapshot.source).await.map_err(source_error)?;

    let applied = operations.clone();
    let (bytes, image) =
        run_blocking(move || process(processor.as_ref(), &source, &operations, format, quality))
            .await?;

    let output = store
        .write(bytes, format)
        .await
        .map_err(|e| CommitError::Storage(e.to_string()))?;

    Ok(CommitOutput {
        image: output,
        format,
        width: image.width,
        height: image.height,
        operations: applied,
    })
}

fn source_error(err: StoreError) -> CommitError {
    match err {
        StoreError::NotFound(_) | StoreError::UnsupportedRef(_) => {
            CommitError::InvalidSource(err.to_string())
        }
        StoreError::Io(_) => CommitError::Storage(err.to_string()),
    }
}

/// Run CPU-bound work on tokio's blocking pool.
///
/// Outside a tokio runtime (a host driving the future with another
/// executor) the work runs in place.
#[cfg(not(target_arch = "wasm32"))]
async fn run_blocking<F, T>(f: F) -> Result<T, CommitError>
where
    F: FnOnce() -> Result<T, CommitError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle
            .spawn_blocking(f)
            .await
            .map_err(|e| CommitError::Processing(format!("worker task failed: {e}")))?,
        Err(_) => f(),
    }
}

/// The browser has no blocking pool; the work runs in place.
#[cfg(target_arch = "wasm32")]
async fn run_blocking<F, T>(f: F) -> Result<T, CommitError>
where
    F: FnOnce() -> Result<T, CommitError> + Send + 'static,
    T: Send + 'static,
{
    f()
}

/// Commit duration for logging. There is no monotonic clock on wasm32.
struct Timer {
    #[cfg(not(target_arch = "wasm32"))]
    started: std::time::Instant,
}

impl Timer {
    fn start() -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            started: std::time::Instant::now(),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    #[cfg(target_arch = "wasm32")]
    fn elapsed_ms(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::adjustments::ColorChannel;
    use crate::config::EditorConfig;
    use crate::decode::{decode_image, DecodedImage};
    use crate::encode::encode_jpeg;
    use crate::gesture::{GestureEvent, GesturePhase};
    use crate::store::{FsImageStore, MemoryImageStore};
    use crate::transform::Vec2;

    fn source_jpeg(width: u32, height: u32) -> Vec<u8> {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, 100]);
            }
        }
        encode_jpeg(&pixels, width, height, 90).unwrap()
    }

    fn session_for(store: &MemoryImageStore, width: u32, height: u32) -> EditSession {
        let source = store.insert(source_jpeg(width, height));
        EditSession::new(source, EditorConfig::default()).unwrap()
    }

    /// Records what the pipeline asks of it and optionally fails one channel.
    #[derive(Default)]
    struct RecordingProcessor {
        decodes: AtomicUsize,
        applied: parking_lot::Mutex<Vec<EditOperation>>,
        fail_on: Option<ColorChannel>,
    }

    impl ImageProcessor for RecordingProcessor {
        fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CommitError> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            NativeProcessor::default().decode(bytes)
        }

        fn apply(
            &self,
            image: DecodedImage,
            operation: &EditOperation,
        ) -> Result<DecodedImage, CommitError> {
            self.applied.lock().push(*operation);
            if let EditOperation::Adjust { channel, .. } = operation {
                if Some(*channel) == self.fail_on {
                    return Err(CommitError::Processing(format!("{channel} exploded")));
                }
            }
            NativeProcessor::default().apply(image, operation)
        }

        fn encode(
            &self,
            image: &DecodedImage,
            format: OutputFormat,
            quality: u8,
        ) -> Result<Vec<u8>, CommitError> {
            NativeProcessor::default().encode(image, format, quality)
        }
    }

    #[tokio::test]
    async fn test_defaults_commit_is_plain_reencode() {
        let store = Arc::new(MemoryImageStore::new());
        let processor = Arc::new(RecordingProcessor::default());
        let pipeline = CommitPipeline::with_processor(Arc::clone(&store), Arc::clone(&processor));
        let session = session_for(&store, 32, 24);

        let output = pipeline.commit(&session).await.unwrap();

        assert!(output.operations.is_empty());
        assert!(processor.applied.lock().is_empty());
        assert_eq!(output.format, OutputFormat::Jpeg);
        assert_eq!((output.width, output.height), (32, 24));
        assert_ne!(&output.image, session.source());
    }

    #[tokio::test]
    async fn test_failure_is_atomic() {
        let store = Arc::new(MemoryImageStore::new());
        let processor = Arc::new(RecordingProcessor {
            fail_on: Some(ColorChannel::Contrast),
            ..Default::default()
        });
        let pipeline = CommitPipeline::with_processor(Arc::clone(&store), Arc::clone(&processor));
        let mut session = session_for(&store, 16, 16);
        session.set_brightness(10.0).unwrap();
        session.set_contrast(10.0).unwrap();
        session.set_saturation(10.0).unwrap();

        let result = pipeline.commit(&session).await;

        assert!(matches!(result, Err(CommitError::Processing(_))));
        // Only the source is stored
        assert_eq!(store.len(), 1);
        // Saturation never ran
        assert_eq!(processor.applied.lock().len(), 2);
        assert!(session.controls_enabled());
    }

    #[tokio::test]
    async fn test_second_commit_rejected_while_pending() {
        let store = Arc::new(MemoryImageStore::new());
        let processor = Arc::new(RecordingProcessor::default());
        let pipeline = CommitPipeline::with_processor(Arc::clone(&store), Arc::clone(&processor));
        let session = session_for(&store, 16, 16);

        let first = pipeline.commit(&session);
        let second = pipeline.commit(&session);
        assert!(!session.controls_enabled());

        let (first, second) = tokio::join!(first, second);

        assert!(first.is_ok());
        assert_eq!(second, Err(CommitError::AlreadyInProgress));
        assert_eq!(processor.decodes.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 2);

        // Released once the first commit resolved
        assert!(session.controls_enabled());
        assert!(pipeline.commit(&session).await.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_commit_releases_session() {
        let store = Arc::new(MemoryImageStore::new());
        let pipeline = CommitPipeline::new(Arc::clone(&store));
        let session = session_for(&store, 8, 8);

        drop(pipeline.commit(&session));
        assert!(session.controls_enabled());
    }

    #[tokio::test]
    async fn test_missing_source_is_invalid_source() {
        let store = Arc::new(MemoryImageStore::new());
        let pipeline = CommitPipeline::new(Arc::clone(&store));
        let session =
            EditSession::new(ImageRef::from("memory://gone"), EditorConfig::default()).unwrap();

        let result = pipeline.commit(&session).await;
        assert!(matches!(result, Err(CommitError::InvalidSource(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_source_is_invalid_source() {
        let store = Arc::new(MemoryImageStore::new());
        let pipeline = CommitPipeline::new(Arc::clone(&store));
        let source = store.insert(b"not an image".to_vec());
        let session = EditSession::new(source, EditorConfig::default()).unwrap();

        let result = pipeline.commit(&session).await;
        assert!(matches!(result, Err(CommitError::InvalidSource(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_rotation_only_is_lossless_png() {
        let store = Arc::new(MemoryImageStore::new());
        let pipeline = CommitPipeline::new(Arc::clone(&store));
        let mut session = session_for(&store, 40, 20);
        session.rotate_step().unwrap();

        let output = pipeline.commit(&session).await.unwrap();
        assert_eq!(output.format, OutputFormat::Png);
        assert_eq!((output.width, output.height), (20, 40));

        let bytes = store.get(&output.image).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let store = Arc::new(MemoryImageStore::new());
        let pipeline = CommitPipeline::new(Arc::clone(&store));
        let mut session = session_for(&store, 1000, 1000);

        for event in [
            GestureEvent::Pan(GesturePhase::Start),
            GestureEvent::Pan(GesturePhase::Active(Vec2::new(50.0, -30.0))),
            GestureEvent::Pan(GesturePhase::End),
            GestureEvent::Pinch(GesturePhase::Start),
            GestureEvent::Pinch(GesturePhase::Active(2.0)),
            GestureEvent::Pinch(GesturePhase::End),
        ] {
            session.apply_gesture(event).unwrap();
        }
        session.rotate_step().unwrap();
        session.set_brightness(20.0).unwrap();

        let output = pipeline.commit(&session).await.unwrap();

        assert_ne!(&output.image, session.source());
        assert_eq!(output.format, OutputFormat::Jpeg);
        assert_eq!(
            output.operations.iter().map(EditOperation::name).collect::<Vec<_>>(),
            vec!["rotate", "crop", "brightness"]
        );
        assert_eq!((output.width, output.height), (500, 500));

        let decoded = decode_image(&store.get(&output.image).unwrap()).unwrap();
        assert_eq!((decoded.width, decoded.height), (500, 500));
    }

    #[tokio::test]
    async fn test_commit_to_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("source.jpg");
        std::fs::write(&source_path, source_jpeg(24, 24)).unwrap();

        let store = Arc::new(FsImageStore::new(dir.path().join("edits")));
        let pipeline = CommitPipeline::new(Arc::clone(&store));
        let mut session =
            EditSession::new(FsImageStore::image_ref(&source_path), EditorConfig::default())
                .unwrap();
        session.set_saturation(-100.0).unwrap();

        let output = pipeline.commit(&session).await.unwrap();
        let path = FsImageStore::path_of(&output.image).unwrap();
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("jpg"));
        // Source untouched
        assert_eq!(std::fs::read(&source_path).unwrap(), source_jpeg(24, 24));
    }
}

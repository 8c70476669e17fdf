//! Editor facade tying a session to a pipeline and the host's callbacks.
//!
//! The host sees two outcomes only: `on_save(image)` or `on_cancel()`, and
//! exactly one of them, once. A cancel that arrives while a commit is running
//! is honored once the commit resolves; whatever it produced is discarded.
//! After either callback the editor is finished and refuses further saves.

use std::fmt;
use std::sync::Arc;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{info, warn};

use crate::pipeline::{CommitError, CommitPipeline, ImageProcessor, NativeProcessor};
use crate::session::EditSession;
use crate::store::{ImageRef, ImageStore};

/// Host callbacks. Exactly one of them fires per editor.
pub trait EditorDelegate: Send + Sync {
    fn on_save(&self, image: &ImageRef);

    fn on_cancel(&self);
}

/// Lifecycle of an editor. `Saved` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorState {
    #[default]
    Open,
    Saved,
    Cancelled,
}

impl EditorState {
    pub fn is_finished(self) -> bool {
        self != EditorState::Open
    }
}

impl fmt::Display for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EditorState::Open => "open",
            EditorState::Saved => "saved",
            EditorState::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditorError {
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// The delegate has already been told the outcome.
    #[error("editor is already {0}")]
    Finished(EditorState),
}

/// What [`Editor::save`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The delegate received the new image.
    Saved(ImageRef),
    /// The user cancelled during the commit; the result was dropped.
    Discarded,
}

/// What [`Editor::cancel`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelDisposition {
    /// No commit was running; the delegate was told right away.
    Immediate,
    /// A commit is running; the delegate is told once it resolves.
    AfterCommit,
    /// The editor had already finished; nothing was sent.
    Ignored(EditorState),
}

/// Session plus lifecycle, behind one lock so a cancel decision and the
/// commit's start or finish can never interleave.
#[derive(Debug)]
struct Inner {
    session: EditSession,
    state: EditorState,
    cancel_pending: bool,
}

impl Inner {
    /// Leave `Open` with a pending cancel. Returns true when the caller must
    /// deliver `on_cancel`.
    fn settle_pending_cancel(&mut self) -> bool {
        if std::mem::take(&mut self.cancel_pending) && self.state == EditorState::Open {
            self.state = EditorState::Cancelled;
            true
        } else {
            false
        }
    }
}

pub struct Editor<S, D, P = NativeProcessor> {
    inner: Mutex<Inner>,
    pipeline: CommitPipeline<S, P>,
    delegate: D,
}

impl<S, D> Editor<S, D, NativeProcessor>
where
    S: ImageStore + 'static,
    D: EditorDelegate,
{
    pub fn new(session: EditSession, store: Arc<S>, delegate: D) -> Self {
        Self::with_pipeline(session, CommitPipeline::new(store), delegate)
    }
}

impl<S, D, P> Editor<S, D, P>
where
    S: ImageStore + 'static,
    D: EditorDelegate,
    P: ImageProcessor + 'static,
{
    pub fn with_pipeline(
        session: EditSession,
        pipeline: CommitPipeline<S, P>,
        delegate: D,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                session,
                state: EditorState::Open,
                cancel_pending: false,
            }),
            pipeline,
            delegate,
        }
    }

    /// Lock the session for edits. Do not hold the guard across an await.
    pub fn session(&self) -> MappedMutexGuard<'_, EditSession> {
        MutexGuard::map(self.inner.lock(), |inner| &mut inner.session)
    }

    pub fn state(&self) -> EditorState {
        self.inner.lock().state
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    /// Commit the session and report the result to the delegate.
    ///
    /// Errors are returned to the caller and the session stays editable so
    /// the user can retry. A concurrent save is rejected with
    /// [`CommitError::AlreadyInProgress`] and fires no callback; so is any
    /// save once the editor has finished.
    pub async fn save(&self) -> Result<SaveOutcome, EditorError> {
        let pending = {
            let inner = self.inner.lock();
            if inner.state.is_finished() {
                warn!(state = %inner.state, "save after editor finished");
                return Err(EditorError::Finished(inner.state));
            }
            if !inner.session.controls_enabled() {
                return Err(CommitError::AlreadyInProgress.into());
            }
            self.pipeline.commit(&inner.session)
        };

        let mut abandoned = AbandonedSave { editor: self, armed: true };
        let result = pending.await;

        let mut inner = self.inner.lock();
        abandoned.armed = false;

        if inner.state.is_finished() {
            // Cancelled after the commit resolved but before we got here
            info!(state = %inner.state, "dropping commit result for finished editor");
            return Ok(SaveOutcome::Discarded);
        }
        if inner.settle_pending_cancel() {
            drop(inner);
            info!(committed = result.is_ok(), "discarding commit after cancel");
            self.delegate.on_cancel();
            return Ok(SaveOutcome::Discarded);
        }

        let output = result?;
        inner.state = EditorState::Saved;
        drop(inner);
        self.delegate.on_save(&output.image);
        Ok(SaveOutcome::Saved(output.image))
    }

    /// Cancel the edit. No commit running means the delegate hears now.
    pub fn cancel(&self) -> CancelDisposition {
        let mut inner = self.inner.lock();
        if inner.state.is_finished() {
            return CancelDisposition::Ignored(inner.state);
        }
        if !inner.session.controls_enabled() {
            inner.cancel_pending = true;
            info!("cancel deferred until commit resolves");
            return CancelDisposition::AfterCommit;
        }

        inner.state = EditorState::Cancelled;
        drop(inner);
        self.delegate.on_cancel();
        CancelDisposition::Immediate
    }
}

/// Delivers a deferred cancel when a save future is dropped before its
/// commit resolves.
struct AbandonedSave<'a, S, D, P>
where
    S: ImageStore + 'static,
    D: EditorDelegate,
    P: ImageProcessor + 'static,
{
    editor: &'a Editor<S, D, P>,
    armed: bool,
}

impl<S, D, P> Drop for AbandonedSave<'_, S, D, P>
where
    S: ImageStore + 'static,
    D: EditorDelegate,
    P: ImageProcessor + 'static,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let cancelled = self.editor.inner.lock().settle_pending_cancel();
        if cancelled {
            info!("save dropped with a pending cancel");
            self.editor.delegate.on_cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Barrier;
    use std::task::Poll;

    use crate::config::EditorConfig;
    use crate::decode::DecodedImage;
    use crate::encode::{encode_jpeg, OutputFormat};
    use crate::pipeline::EditOperation;
    use crate::store::MemoryImageStore;

    #[derive(Default)]
    struct RecordingDelegate {
        calls: Mutex<Vec<String>>,
    }

    impl EditorDelegate for RecordingDelegate {
        fn on_save(&self, image: &ImageRef) {
            self.calls.lock().push(format!("save {image}"));
        }

        fn on_cancel(&self) {
            self.calls.lock().push("cancel".to_string());
        }
    }

    impl RecordingDelegate {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    fn editor(store: &Arc<MemoryImageStore>) -> Editor<MemoryImageStore, RecordingDelegate> {
        let jpeg = encode_jpeg(&vec![120u8; 16 * 16 * 3], 16, 16, 90).unwrap();
        let source = store.insert(jpeg);
        let session = EditSession::new(source, EditorConfig::default()).unwrap();
        Editor::new(session, Arc::clone(store), RecordingDelegate::default())
    }

    #[tokio::test]
    async fn test_save_calls_on_save() {
        let store = Arc::new(MemoryImageStore::new());
        let editor = editor(&store);
        editor.session().set_brightness(20.0).unwrap();

        let outcome = editor.save().await.unwrap();

        let SaveOutcome::Saved(image) = outcome else {
            panic!("expected saved outcome");
        };
        assert_ne!(&image, editor.session().source());
        assert_eq!(editor.delegate().calls(), vec![format!("save {image}")]);
    }

    #[test]
    fn test_cancel_when_idle_is_immediate() {
        let store = Arc::new(MemoryImageStore::new());
        let editor = editor(&store);

        assert_eq!(editor.cancel(), CancelDisposition::Immediate);
        assert_eq!(editor.delegate().calls(), vec!["cancel".to_string()]);
    }

    /// Blocks the first decode until the test opens the gate.
    struct Gated {
        gate: Mutex<Option<Arc<Barrier>>>,
    }

    impl Gated {
        fn new(gate: &Arc<Barrier>) -> Self {
            Self {
                gate: Mutex::new(Some(Arc::clone(gate))),
            }
        }
    }

    impl Gated {
        /// Wait until a decode has picked up the gate.
        fn wait_until_entered(&self) {
            while self.gate.lock().is_some() {
                std::thread::yield_now();
            }
        }
    }

    impl ImageProcessor for Gated {
        fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CommitError> {
            let gate = self.gate.lock().take();
            if let Some(gate) = gate {
                gate.wait();
            }
            NativeProcessor::default().decode(bytes)
        }

        fn apply(
            &self,
            image: DecodedImage,
            operation: &EditOperation,
        ) -> Result<DecodedImage, CommitError> {
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

    fn gated_editor(
        store: &Arc<MemoryImageStore>,
        gate: &Arc<Barrier>,
    ) -> (Editor<MemoryImageStore, RecordingDelegate, Gated>, Arc<Gated>) {
        let jpeg = encode_jpeg(&vec![120u8; 16 * 16 * 3], 16, 16, 90).unwrap();
        let session = EditSession::new(store.insert(jpeg), EditorConfig::default()).unwrap();
        let processor = Arc::new(Gated::new(gate));
        let pipeline = CommitPipeline::with_processor(Arc::clone(store), Arc::clone(&processor));
        let editor = Editor::with_pipeline(session, pipeline, RecordingDelegate::default());
        (editor, processor)
    }

    #[tokio::test]
    async fn test_cancel_during_commit_discards_result() {
        let store = Arc::new(MemoryImageStore::new());
        let gate = Arc::new(Barrier::new(2));
        let (editor, _processor) = gated_editor(&store, &gate);

        let save = editor.save();
        tokio::pin!(save);
        // First poll parks the commit on the gate
        assert!(poll_once(save.as_mut()).await.is_none());
        assert!(!editor.session().controls_enabled());

        assert_eq!(editor.cancel(), CancelDisposition::AfterCommit);
        assert_eq!(editor.cancel(), CancelDisposition::AfterCommit);
        assert!(editor.delegate().calls().is_empty());

        gate.wait();
        assert_eq!(save.await.unwrap(), SaveOutcome::Discarded);
        assert_eq!(editor.delegate().calls(), vec!["cancel".to_string()]);
        assert_eq!(editor.state(), EditorState::Cancelled);
        assert!(editor.session().controls_enabled());
        // The commit itself completed and was written
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_is_terminal() {
        let store = Arc::new(MemoryImageStore::new());
        let editor = editor(&store);

        assert_eq!(editor.cancel(), CancelDisposition::Immediate);
        assert_eq!(
            editor.cancel(),
            CancelDisposition::Ignored(EditorState::Cancelled)
        );
        assert_eq!(
            editor.save().await,
            Err(EditorError::Finished(EditorState::Cancelled))
        );

        assert_eq!(editor.delegate().calls(), vec!["cancel".to_string()]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_save_is_terminal() {
        let store = Arc::new(MemoryImageStore::new());
        let editor = editor(&store);

        let SaveOutcome::Saved(image) = editor.save().await.unwrap() else {
            panic!("expected saved outcome");
        };
        assert_eq!(editor.cancel(), CancelDisposition::Ignored(EditorState::Saved));
        assert_eq!(
            editor.save().await,
            Err(EditorError::Finished(EditorState::Saved))
        );

        assert_eq!(editor.delegate().calls(), vec![format!("save {image}")]);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_save_leaves_editor_open() {
        let store = Arc::new(MemoryImageStore::new());
        let gate = Arc::new(Barrier::new(2));
        let (editor, processor) = gated_editor(&store, &gate);

        let mut save = Box::pin(editor.save());
        assert!(poll_once(save.as_mut()).await.is_none());
        processor.wait_until_entered();
        drop(save);

        assert_eq!(editor.state(), EditorState::Open);
        assert!(editor.session().controls_enabled());
        assert!(editor.delegate().calls().is_empty());

        // A fresh save goes through and is not mistaken for a cancelled one
        let outcome = editor.save().await.unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved(_)));
        assert_eq!(editor.delegate().calls().len(), 1);

        // Let the abandoned decode finish
        gate.wait();
    }

    #[tokio::test]
    async fn test_dropped_save_delivers_pending_cancel() {
        let store = Arc::new(MemoryImageStore::new());
        let gate = Arc::new(Barrier::new(2));
        let (editor, _processor) = gated_editor(&store, &gate);

        let mut save = Box::pin(editor.save());
        assert!(poll_once(save.as_mut()).await.is_none());
        assert_eq!(editor.cancel(), CancelDisposition::AfterCommit);
        drop(save);

        assert_eq!(editor.state(), EditorState::Cancelled);
        assert_eq!(editor.delegate().calls(), vec!["cancel".to_string()]);
        assert_eq!(
            editor.save().await,
            Err(EditorError::Finished(EditorState::Cancelled))
        );

        gate.wait();
    }

    #[tokio::test]
    async fn test_concurrent_save_is_rejected() {
        let store = Arc::new(MemoryImageStore::new());
        let gate = Arc::new(Barrier::new(2));
        let (editor, _processor) = gated_editor(&store, &gate);

        let first = editor.save();
        tokio::pin!(first);
        assert!(poll_once(first.as_mut()).await.is_none());

        assert_eq!(
            editor.save().await,
            Err(EditorError::Commit(CommitError::AlreadyInProgress))
        );
        assert!(editor.delegate().calls().is_empty());

        gate.wait();
        assert!(matches!(first.await.unwrap(), SaveOutcome::Saved(_)));
        assert_eq!(editor.delegate().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_session_editable() {
        struct Failing;

        impl ImageProcessor for Failing {
            fn decode(&self, _bytes: &[u8]) -> Result<DecodedImage, CommitError> {
                Err(CommitError::Processing("out of memory".to_string()))
            }

            fn apply(
                &self,
                image: DecodedImage,
                _operation: &EditOperation,
            ) -> Result<DecodedImage, CommitError> {
                Ok(image)
            }

            fn encode(
                &self,
                _image: &DecodedImage,
                _format: OutputFormat,
                _quality: u8,
            ) -> Result<Vec<u8>, CommitError> {
                Ok(Vec::new())
            }
        }

        let store = Arc::new(MemoryImageStore::new());
        let source = store.insert(vec![1, 2, 3]);
        let session = EditSession::new(source, EditorConfig::default()).unwrap();
        let pipeline = CommitPipeline::with_processor(Arc::clone(&store), Arc::new(Failing));
        let editor = Editor::with_pipeline(session, pipeline, RecordingDelegate::default());

        let result = editor.save().await;
        assert_eq!(
            result,
            Err(EditorError::Commit(CommitError::Processing("out of memory".to_string())))
        );
        assert_eq!(editor.state(), EditorState::Open);
        assert!(editor.delegate().calls().is_empty());
        assert!(editor.session().controls_enabled());
        editor.session().set_contrast(5.0).unwrap();
    }

    /// Poll a future exactly once, yielding its output if it finished.
    async fn poll_once<F>(mut fut: Pin<&mut F>) -> Option<F::Output>
    where
        F: Future,
    {
        std::future::poll_fn(|cx| match fut.as_mut().poll(cx) {
            Poll::Ready(output) => Poll::Ready(Some(output)),
            Poll::Pending => Poll::Ready(None),
        })
        .await
    }
}

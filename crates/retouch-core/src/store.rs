//! Where source images come from and committed images go.
//!
//! The engine only ever sees opaque [`ImageRef`]s. Reading a reference is
//! deferred until something needs pixels (preview probe or commit), so a
//! broken reference surfaces there and not at session creation.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::encode::OutputFormat;

const MEMORY_SCHEME: &str = "memory://";

/// Opaque handle to an image, usually a URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageRef {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("image not found: {0}")]
    NotFound(ImageRef),

    #[error("unsupported image reference: {0}")]
    UnsupportedRef(ImageRef),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Backing storage for source and output images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Read the encoded bytes behind `image`.
    async fn read(&self, image: &ImageRef) -> Result<Vec<u8>, StoreError>;

    /// Persist encoded bytes under a fresh reference.
    ///
    /// The returned reference never equals any existing one.
    async fn write(&self, bytes: Vec<u8>, format: OutputFormat) -> Result<ImageRef, StoreError>;
}

/// In-memory store. Used by the wasm binding and by tests.
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    images: Mutex<HashMap<ImageRef, Vec<u8>>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image and return its new reference.
    pub fn insert(&self, bytes: Vec<u8>) -> ImageRef {
        let image = ImageRef::new(format!("{MEMORY_SCHEME}{}", Uuid::new_v4()));
        self.images.lock().insert(image.clone(), bytes);
        image
    }

    pub fn get(&self, image: &ImageRef) -> Option<Vec<u8>> {
        self.images.lock().get(image).cloned()
    }

    pub fn remove(&self, image: &ImageRef) -> Option<Vec<u8>> {
        self.images.lock().remove(image)
    }

    pub fn len(&self) -> usize {
        self.images.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.lock().is_empty()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn read(&self, image: &ImageRef) -> Result<Vec<u8>, StoreError> {
        self.get(image)
            .ok_or_else(|| StoreError::NotFound(image.clone()))
    }

    async fn write(&self, bytes: Vec<u8>, _format: OutputFormat) -> Result<ImageRef, StoreError> {
        Ok(self.insert(bytes))
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use fs::FsImageStore;

#[cfg(not(target_arch = "wasm32"))]
mod fs {
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;
    use tracing::{debug, warn};
    use uuid::Uuid;

    use super::{ImageRef, ImageStore, StoreError};
    use crate::encode::OutputFormat;

    const FILE_SCHEME: &str = "file://";

    /// Filesystem store. Outputs land in `output_dir` as `<uuid>.<ext>`.
    ///
    /// Sources may be `file://` URIs or plain paths.
    #[derive(Debug, Clone)]
    pub struct FsImageStore {
        output_dir: PathBuf,
    }

    impl FsImageStore {
        pub fn new(output_dir: impl Into<PathBuf>) -> Self {
            Self {
                output_dir: output_dir.into(),
            }
        }

        pub fn output_dir(&self) -> &Path {
            &self.output_dir
        }

        /// Reference for an existing file.
        pub fn image_ref(path: impl AsRef<Path>) -> ImageRef {
            ImageRef::new(format!("{FILE_SCHEME}{}", path.as_ref().display()))
        }

        /// Filesystem path behind a reference.
        pub fn path_of(image: &ImageRef) -> Result<PathBuf, StoreError> {
            let uri = image.as_str();
            if let Some(path) = uri.strip_prefix(FILE_SCHEME) {
                return Ok(PathBuf::from(path));
            }
            if uri.contains("://") {
                return Err(StoreError::UnsupportedRef(image.clone()));
            }
            Ok(PathBuf::from(uri))
        }
    }

    #[async_trait]
    impl ImageStore for FsImageStore {
        async fn read(&self, image: &ImageRef) -> Result<Vec<u8>, StoreError> {
            let path = Self::path_of(image)?;
            match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(StoreError::NotFound(image.clone()))
                }
                Err(e) => Err(e.into()),
            }
        }

        async fn write(
            &self,
            bytes: Vec<u8>,
            format: OutputFormat,
        ) -> Result<ImageRef, StoreError> {
            tokio::fs::create_dir_all(&self.output_dir).await?;

            let name = format!("{}.{}", Uuid::new_v4(), format.extension());
            let path = self.output_dir.join(name);

            // Write to temp file, then rename so readers never see a partial image
            let temp_path = path.with_extension("tmp");
            if let Err(e) = tokio::fs::write(&temp_path, &bytes).await {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(e.into());
            }
            persist(&temp_path, &path).await?;

            debug!(path = %path.display(), size = bytes.len(), "wrote image");
            Ok(Self::image_ref(&path))
        }
    }

    /// Move a finished temp file into place. The temp file is removed when
    /// the move fails.
    pub(super) async fn persist(temp_path: &Path, path: &Path) -> std::io::Result<()> {
        if let Err(e) = tokio::fs::rename(temp_path, path).await {
            warn!(path = %temp_path.display(), error = %e, "rename failed, removing temp file");
            let _ = tokio::fs::remove_file(temp_path).await;
            return Err(e);
        }
        Ok(())
    }
}

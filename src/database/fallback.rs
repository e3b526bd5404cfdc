use std::path::PathBuf;
use tracing::warn;

/// File-backed single-value store for the provider key. Used only when the
/// remote `app_config` table is unavailable; a successful remote write
/// clears it so the two stores cannot disagree about the key in effect.
#[derive(Debug, Clone)]
pub struct FallbackStore {
    path: PathBuf,
}

impl FallbackStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn read(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(value) => {
                let value = value.trim().to_string();
                if value.is_empty() {
                    None
                } else {
                    Some(value)
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "fallback read failed");
                None
            }
        }
    }

    pub async fn write(&self, value: &str) -> bool {
        match tokio::fs::write(&self.path, value).await {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "fallback write failed");
                false
            }
        }
    }

    /// Remove the stored value. Missing file counts as already cleared.
    pub async fn clear(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "fallback clear failed");
            }
        }
    }
}

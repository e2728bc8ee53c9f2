use crate::api::error::AppError;
use crate::utils::validation::{sanitize_filename, validate_file_size, validate_mime_type};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

/// An upload that passed the gate and was fully written to the staging
/// directory. Exists if and only if the stream passed validation and the
/// write completed.
#[derive(Debug)]
pub struct StagedFile {
    pub path: PathBuf,
    /// Sanitized original filename, kept for traceability
    pub filename: String,
    pub size: u64,
}

impl StagedFile {
    /// Removes the staged file. Must run after the transformation call
    /// resolves or fails so the staging directory does not grow unbounded.
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            tracing::warn!(
                "failed to remove staged file {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

/// Writes accepted upload streams to a local directory under unique names.
pub struct DiskStager {
    upload_dir: PathBuf,
    max_file_size: usize,
}

impl DiskStager {
    pub fn new(upload_dir: PathBuf, max_file_size: usize) -> Self {
        Self {
            upload_dir,
            max_file_size,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Gates the declared MIME type, then streams the body to disk under
    /// `<uuid>-<sanitized filename>`. The size cap is enforced while the
    /// stream is consumed; on overrun the partial file is deleted and no
    /// staged file persists.
    pub async fn stage<R>(
        &self,
        original_filename: &str,
        content_type: Option<&str>,
        mut reader: R,
    ) -> Result<StagedFile, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let filename =
            sanitize_filename(original_filename).map_err(|e| AppError::BadRequest(e.to_string()))?;

        let declared = content_type.unwrap_or("application/octet-stream");
        validate_mime_type(declared).map_err(|e| AppError::BadRequest(e.to_string()))?;

        // Unique per request even for identical original filenames
        let path = self
            .upload_dir
            .join(format!("{}-{}", Uuid::new_v4(), filename));

        let mut file = tokio::fs::File::create(&path).await?;

        let write_result: Result<u64, AppError> = async {
            let mut total: usize = 0;
            let mut buffer = vec![0u8; 64 * 1024];

            loop {
                let n = reader.read(&mut buffer).await?;
                if n == 0 {
                    break;
                }

                total += n;
                validate_file_size(total, self.max_file_size)
                    .map_err(|e| AppError::PayloadTooLarge(e.to_string()))?;

                file.write_all(&buffer[..n]).await?;
            }

            file.flush().await?;
            Ok(total as u64)
        }
        .await;

        match write_result {
            Ok(size) => {
                tracing::info!(
                    "staged upload {} ({} bytes) at {}",
                    filename,
                    size,
                    path.display()
                );
                Ok(StagedFile {
                    path,
                    filename,
                    size,
                })
            }
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                Err(e)
            }
        }
    }
}

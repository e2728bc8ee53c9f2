use thiserror::Error;

/// Maximum upload size: 1 MiB
pub const DEFAULT_MAX_FILE_SIZE: usize = 1024 * 1024;

/// Only raster avatar formats are accepted
pub const ALLOWED_MIME_TYPES: &[&str] = &["image/png", "image/jpeg"];

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("MIME type '{0}' is not allowed; only PNG and JPEG images are accepted")]
    UnsupportedMimeType(String),

    #[error("file size {size} bytes exceeds maximum allowed {max} bytes")]
    FileTooLarge { size: usize, max: usize },

    #[error("filename cannot be empty")]
    EmptyFilename,
}

/// Validates file size against the configured limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size > max_size {
        return Err(ValidationError::FileTooLarge {
            size,
            max: max_size,
        });
    }
    Ok(())
}

/// Validates the declared MIME type against the allowlist.
///
/// The declared type is trusted as-is; file contents are never inspected.
pub fn validate_mime_type(content_type: &str) -> Result<(), ValidationError> {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    if ALLOWED_MIME_TYPES
        .iter()
        .any(|&allowed| allowed == normalized)
    {
        return Ok(());
    }

    Err(ValidationError::UnsupportedMimeType(
        content_type.to_string(),
    ))
}

/// Sanitizes a client-supplied filename before it is used in a staging path.
///
/// The original name is a display label only: path components are stripped,
/// reserved and control characters are replaced, and the length is bounded.
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    // Keep only the final path component; Windows-style separators count
    // as separators regardless of the host platform
    let name = filename.rsplit(['/', '\\']).next().unwrap_or("");

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == '/'
                || c == '\\'
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Leading dots would produce hidden files in the staging directory
    let sanitized = sanitized.trim_start_matches('.').to_string();

    if sanitized.is_empty() {
        return Err(ValidationError::EmptyFilename);
    }

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    Ok(sanitized)
}

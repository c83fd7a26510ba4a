//! Turns media arguments into values stored in the archive.
//!
//! URLs are kept as given. Local files are embedded as `data:` URLs so the
//! archive stays a single self-contained document.

use base64::Engine;
use std::fs;
use std::path::{Path, PathBuf};

/// Largest video accepted for embedding.
pub const MAX_VIDEO_BYTES: u64 = 15 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaKind {
    Image,
    Video,
}

/// Resolves a URL or local file path to a storable media reference.
pub fn resolve(input: &str, kind: MediaKind) -> Result<String, MediaError> {
    let input = input.trim();
    if is_url(input) {
        return Ok(input.to_string());
    }

    let path = Path::new(input);
    let size = fs::metadata(path)
        .map_err(|e| MediaError::IoError(path.to_path_buf(), e))?
        .len();
    if kind == MediaKind::Video && size > MAX_VIDEO_BYTES {
        return Err(MediaError::TooLarge(path.to_path_buf(), size));
    }

    let mime = mime_type(path, kind)?;
    let bytes = fs::read(path).map_err(|e| MediaError::IoError(path.to_path_buf(), e))?;
    Ok(format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    ))
}

fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://") || input.starts_with("data:")
}

fn mime_type(path: &Path, kind: MediaKind) -> Result<&'static str, MediaError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let mime = match (kind, ext.as_str()) {
        (MediaKind::Image, "png") => "image/png",
        (MediaKind::Image, "jpg" | "jpeg") => "image/jpeg",
        (MediaKind::Image, "gif") => "image/gif",
        (MediaKind::Image, "webp") => "image/webp",
        (MediaKind::Image, "svg") => "image/svg+xml",
        (MediaKind::Video, "mp4") => "video/mp4",
        (MediaKind::Video, "webm") => "video/webm",
        (MediaKind::Video, "mov") => "video/quicktime",
        _ => return Err(MediaError::UnsupportedType(path.to_path_buf())),
    };
    Ok(mime)
}

#[derive(Debug)]
pub enum MediaError {
    IoError(PathBuf, std::io::Error),
    TooLarge(PathBuf, u64),
    UnsupportedType(PathBuf),
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaError::IoError(path, e) => write!(f, "Failed to read {}: {}", path.display(), e),
            MediaError::TooLarge(path, size) => write!(
                f,
                "Video {} is {:.1} MB; the limit is 15 MB",
                path.display(),
                *size as f64 / (1024.0 * 1024.0)
            ),
            MediaError::UnsupportedType(path) => {
                write!(f, "Unsupported media type: {}", path.display())
            }
        }
    }
}

impl std::error::Error for MediaError {}

use std::env;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::PathError;
use crate::server::Response;

/// Join an untrusted relative `filename` onto a trusted `root`.
///
/// Backslashes in `filename` count as separators. Any `.` or `..` component
/// is rejected and leading separators are ignored, so the result always lies
/// under `root`. The returned path is absolute (a relative root is resolved
/// against the current directory) and lexically normalised. The file need
/// not exist.
///
/// # Errors
///
/// [`PathError::IllegalComponent`] for a `.` or `..` component,
/// [`PathError::Io`] if the current directory cannot be read.
pub fn path_join_safe(root: impl AsRef<Path>, filename: &str) -> Result<PathBuf, PathError> {
    let filename = filename.replace('\\', "/");
    if filename.split('/').any(|part| part == "." || part == "..") {
        return Err(PathError::IllegalComponent(filename));
    }

    let root = root.as_ref();
    let mut joined = if root.is_absolute() {
        root.to_path_buf()
    } else {
        env::current_dir()?.join(root)
    };
    for part in filename.split('/').filter(|p| !p.is_empty()) {
        joined.push(part);
    }
    Ok(normalize(&joined))
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Serves files from beneath a root directory.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self { base_dir: base.into() }
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn content_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase()
            .as_str()
        {
            "html" | "htm" => "text/html",
            "css" => "text/css",
            "js" => "application/javascript",
            "json" => "application/json",
            "txt" => "text/plain",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "svg" => "image/svg+xml",
            "ico" => "image/x-icon",
            _ => "application/octet-stream",
        }
    }

    fn resolve(&self, filename: &str) -> Result<PathBuf, PathError> {
        let path = path_join_safe(&self.base_dir, filename).map_err(|err| {
            warn!(filename = %filename, error = %err, "Rejected static file path");
            err
        })?;
        if !path.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "file not found").into());
        }
        Ok(path)
    }

    /// Read `filename` into a raw response with a content type taken from
    /// its extension.
    ///
    /// # Errors
    ///
    /// [`PathError::IllegalComponent`] for traversal attempts,
    /// [`PathError::Io`] with [`io::ErrorKind::NotFound`] when the file does
    /// not exist or is not a regular file, or any read error.
    pub fn load(&self, filename: &str) -> Result<Response, PathError> {
        let path = self.resolve(filename)?;
        let bytes = fs::read(&path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Serving static file");
        Ok(Response::raw(bytes).with_header("Content-Type", Self::content_type(&path)))
    }

    /// Like [`Self::load`] but streams the file instead of reading it up front.
    ///
    /// # Errors
    ///
    /// As [`Self::load`].
    pub fn open(&self, filename: &str) -> Result<Response, PathError> {
        let path = self.resolve(filename)?;
        let file = File::open(&path)?;
        debug!(path = %path.display(), "Streaming static file");
        Ok(Response::stream(file).with_header("Content-Type", Self::content_type(&path)))
    }
}

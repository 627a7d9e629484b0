//! Upload directory management.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

/// Create `path` (and parents) if needed.
///
/// Fails if something other than a directory already sits at `path`.
pub async fn init_storage_dir(path: &Path) -> io::Result<()> {
    if let Ok(meta) = tokio::fs::metadata(path).await {
        if !meta.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists and is not a directory", path.display()),
            ));
        }
        return Ok(());
    }

    tokio::fs::create_dir_all(path).await?;
    tracing::info!(path = %path.display(), "Created storage directory");
    Ok(())
}

/// Unique destination for an image uploaded by `username`:
/// `{dir}/{username}-{timestamp}`.
///
/// Path separators and other unsafe characters in the username are
/// replaced so the result always stays inside `dir`.
pub fn file_path_for(dir: &Path, username: &str) -> PathBuf {
    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.6f");
    dir.join(format!("{}-{timestamp}", sanitize(username)))
}

/// Write `bytes` to a fresh path for `username` and return that path.
pub async fn save_upload(dir: &Path, username: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    let path = file_path_for(dir, username);
    tokio::fs::write(&path, bytes).await?;
    tracing::debug!(username, path = %path.display(), size = bytes.len(), "Saved upload");
    Ok(path)
}

/// Resolve `candidate` and return it only if it lies inside `dir`.
///
/// Symlinks and `..` components are resolved before the check. A file that
/// does not exist yet resolves through its parent directory, so a missing
/// image inside `dir` is still returned. `None` means the path escapes `dir`
/// or its parent does not exist.
pub async fn resolve_within(dir: &Path, candidate: &Path) -> io::Result<Option<PathBuf>> {
    let root = tokio::fs::canonicalize(dir).await?;

    let resolved = match tokio::fs::canonicalize(candidate).await {
        Ok(path) => path,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let (Some(parent), Some(name)) = (candidate.parent(), candidate.file_name()) else {
                return Ok(None);
            };
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            match tokio::fs::canonicalize(parent).await {
                Ok(parent) => parent.join(name),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e),
            }
        }
        Err(e) => return Err(e),
    };

    Ok(resolved.starts_with(&root).then_some(resolved))
}

fn sanitize(username: &str) -> String {
    username
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

use std::path::{Path, PathBuf};
use tokio::fs;
use crate::utils::{PipelineError, PipelineResult};

/// Get file size in bytes. Blocking; call from `spawn_blocking`.
pub fn get_file_size(path: impl AsRef<Path>) -> PipelineResult<u64> {
    std::fs::metadata(path.as_ref())
        .map(|m| m.len())
        .map_err(|e| PipelineError::io(format!(
            "Failed to get file size of {}: {}", path.as_ref().display(), e
        )))
}

/// Sibling path the algorithms work on when the source must stay untouched.
///
/// `photos/cat.jpg` with suffix `min` becomes `photos/cat.min.jpg`, so the
/// extension optimizers rely on is preserved.
pub fn working_copy_path(source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    let file_name = match source.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}.{suffix}.{ext}"),
        None => format!("{stem}.{suffix}"),
    };
    source.with_file_name(file_name)
}

/// Hidden scratch file next to `target` that one step writes its output to.
pub fn scratch_path(target: &Path, algorithm: &str) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    let file_name = match target.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!(".{stem}.{algorithm}-tmp.{ext}"),
        None => format!(".{stem}.{algorithm}-tmp"),
    };
    target.with_file_name(file_name)
}

/// Copies the original next to itself so optimizers never touch it.
pub async fn create_working_copy(source: &Path, destination: &Path) -> PipelineResult<u64> {
    fs::copy(source, destination).await.map_err(|e| {
        PipelineError::setup(format!(
            "Failed to copy {} to {}: {}",
            source.display(),
            destination.display(),
            e
        ))
    })
}

/// Containing directory of `path`, or the current directory for bare names.
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::info;

use crate::errors::{AppError, AppResult};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Write rendered output to `path`, creating parent directories as needed.
///
/// Content is staged in a uniquely named temporary file next to `path` and
/// persisted over it once fully written. The staging file is removed if
/// anything fails before that.
pub async fn write_output(path: &Path, content: &str, with_bom: bool) -> AppResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::output(path, format!("cannot create directory: {e}")))?;

    let mut bytes = Vec::with_capacity(content.len() + UTF8_BOM.len());
    if with_bom {
        bytes.extend_from_slice(UTF8_BOM);
    }
    bytes.extend_from_slice(content.as_bytes());
    let size = bytes.len();

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || persist_in(&dir, &target, &bytes))
        .await
        .map_err(|e| AppError::internal(format!("output write task failed: {e}")))?
        .map_err(|message| AppError::output(path, message))?;

    info!("Wrote {} bytes to {}", size, path.display());
    Ok(())
}

fn persist_in(dir: &Path, target: &Path, bytes: &[u8]) -> Result<(), String> {
    let mut staging =
        NamedTempFile::new_in(dir).map_err(|e| format!("cannot create staging file: {e}"))?;
    staging
        .write_all(bytes)
        .and_then(|_| staging.flush())
        .map_err(|e| format!("write failed: {e}"))?;
    staging
        .persist(target)
        .map_err(|e| format!("rename failed: {}", e.error))?;
    Ok(())
}

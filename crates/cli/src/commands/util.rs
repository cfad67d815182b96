use std::path::Path;

/// File name of `path` as a display string (empty for paths like `/`).
pub fn file_name_of(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

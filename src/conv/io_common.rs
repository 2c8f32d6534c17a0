use std::path::Path;

/// The name of a file without its directory nor its extension.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn display_path(path: &Path) -> String {
    path.display().to_string()
}

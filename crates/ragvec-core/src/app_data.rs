//! Where ragvec stores its own data (config, default index directory).

use std::path::PathBuf;

/// Name of the index directory inside the app data directory.
pub const INDEX_DIRNAME: &str = "index";

/// Returns the directory where ragvec stores config and indexes.
/// On macOS: `~/Library/Application Support/ragvec/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("app", "ragvec", "ragvec")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Default location of the persisted index. Not created here; saving creates it.
pub fn default_index_dir() -> Option<PathBuf> {
    app_data_dir().map(|d| d.join(INDEX_DIRNAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_dir_is_inside_app_data() {
        if let (Some(data), Some(index)) = (app_data_dir(), default_index_dir()) {
            assert_eq!(index.parent(), Some(data.as_path()));
        }
    }
}

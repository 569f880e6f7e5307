use std::path::PathBuf;

/// Returns the workspace root directory (parent of this crate's manifest).
fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent()
        .expect("common crate must live inside the workspace")
        .to_path_buf()
}

/// Returns the path to a file under `<workspace>/test_output`, creating the directory.
pub fn test_output_path(name: &str) -> PathBuf {
    let dir = workspace_root().join("test_output");
    std::fs::create_dir_all(&dir).expect("Failed to create test_output directory");
    dir.join(name)
}

/// Returns an emptied directory under `<workspace>/test_output` for one test.
pub fn fresh_test_output_dir(name: &str) -> PathBuf {
    let dir = test_output_path(name);
    if dir.exists() {
        std::fs::remove_dir_all(&dir).expect("Failed to clear test output directory");
    }
    std::fs::create_dir_all(&dir).expect("Failed to create test output directory");
    dir
}

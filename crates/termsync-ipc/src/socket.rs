use std::path::PathBuf;

pub fn socket_path() -> PathBuf {
    if let Ok(custom_path) = std::env::var("TERMSYNC_SOCKET") {
        return PathBuf::from(custom_path);
    }

    std::env::var("XDG_RUNTIME_DIR")
        .map(|dir| PathBuf::from(dir).join("termsync.sock"))
        .unwrap_or_else(|_| PathBuf::from("/tmp/termsync.sock"))
}

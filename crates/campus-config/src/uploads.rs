use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct UploadConfig {
    /// Directory files are written to.
    pub dir: PathBuf,
    /// Public URL prefix for stored files.
    pub base_url: String,
}

impl UploadConfig {
    pub fn from_env() -> Self {
        Self {
            dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("storage/uploads")),
            base_url: env::var("UPLOAD_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000/api/uploads".to_string()),
        }
    }
}

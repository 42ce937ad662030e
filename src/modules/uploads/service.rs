use campus_core::AppError;
use campus_core::file_storage::{FileStorage, LocalFileStorage, StorageError};
use tracing::{info, instrument};
use uuid::Uuid;

use super::model::{UploadKind, UploadedFile};

const MAX_EXTENSION_LEN: usize = 10;

/// A file read from a multipart body, not yet validated.
#[derive(Debug)]
pub struct IncomingFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

fn storage_error(err: StorageError) -> AppError {
    match err {
        StorageError::InvalidFileSize { .. } | StorageError::InvalidMimeType { .. } => {
            AppError::bad_request(err.to_string())
        }
        StorageError::InvalidKey(_) => AppError::bad_request(err.to_string()),
        StorageError::NotFound => AppError::not_found("File not found"),
        StorageError::Io(_) => AppError::internal(err),
    }
}

/// Lowercased alphanumeric extension of the client file name, if any.
pub fn sanitize_extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ext: String = ext
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_EXTENSION_LEN)
        .collect::<String>()
        .to_ascii_lowercase();
    (!ext.is_empty()).then_some(ext)
}

pub struct UploadService;

impl UploadService {
    pub fn validate(kind: UploadKind, file: &IncomingFile) -> Result<(), AppError> {
        if file.bytes.len() > kind.max_bytes() {
            return Err(storage_error(StorageError::InvalidFileSize {
                max_bytes: kind.max_bytes(),
            }));
        }
        if !kind.allowed_types().contains(&file.content_type.as_str()) {
            return Err(storage_error(StorageError::InvalidMimeType {
                received: file.content_type.clone(),
                allowed: kind.allowed_types().iter().map(|t| t.to_string()).collect(),
            }));
        }
        Ok(())
    }

    /// Validates every file first, then stores them under random names.
    #[instrument(skip(storage, files), fields(count = files.len()))]
    pub async fn store(
        storage: &dyn FileStorage,
        kind: UploadKind,
        files: Vec<IncomingFile>,
    ) -> Result<Vec<UploadedFile>, AppError> {
        if files.is_empty() {
            return Err(AppError::bad_request(format!(
                "No file provided in field '{}'",
                kind.field()
            )));
        }
        if files.len() > kind.max_files() {
            return Err(AppError::bad_request(format!(
                "At most {} files may be uploaded at once",
                kind.max_files()
            )));
        }
        for file in &files {
            Self::validate(kind, file)?;
        }

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            let file_name = match sanitize_extension(&file.name) {
                Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
                None => Uuid::new_v4().to_string(),
            };
            let key = format!("{}/{file_name}", kind.dir());

            storage.save(&key, &file.bytes).await.map_err(storage_error)?;
            let url = storage.get_url(&key).map_err(storage_error)?;

            info!(
                kind = kind.dir(),
                file_name = %file_name,
                size = file.bytes.len(),
                "File stored"
            );
            stored.push(UploadedFile {
                name: file.name,
                file_name,
                content_type: file.content_type,
                size: file.bytes.len(),
                url,
            });
        }
        Ok(stored)
    }

    pub async fn load(
        storage: &dyn FileStorage,
        kind: UploadKind,
        file_name: &str,
    ) -> Result<Vec<u8>, AppError> {
        if file_name.contains('/') {
            return Err(AppError::bad_request("Invalid file name"));
        }
        let key = format!("{}/{file_name}", kind.dir());
        LocalFileStorage::validate_key(&key).map_err(storage_error)?;
        storage.load(&key).await.map_err(storage_error)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn file(name: &str, content_type: &str, size: usize) -> IncomingFile {
        IncomingFile {
            name: name.to_string(),
            content_type: content_type.to_string(),
            bytes: vec![0u8; size],
        }
    }

    #[test]
    fn test_sanitize_extension() {
        assert_eq!(sanitize_extension("Photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(sanitize_extension("notes.p$d%f").as_deref(), Some("pdf"));
        assert_eq!(sanitize_extension("README"), None);
        assert_eq!(sanitize_extension("trailing."), None);
    }

    #[test]
    fn test_validate_size_and_type() {
        let small = file("a.png", "image/png", 10);
        assert!(UploadService::validate(UploadKind::Profile, &small).is_ok());

        let too_big = file("a.png", "image/png", 2 * 1024 * 1024 + 1);
        let err = UploadService::validate(UploadKind::Profile, &too_big).unwrap_err();
        assert_eq!(err.status.as_u16(), 400);

        let wrong_type = file("a.gif", "image/gif", 10);
        assert!(UploadService::validate(UploadKind::Profile, &wrong_type).is_err());
        assert!(UploadService::validate(UploadKind::Messages, &wrong_type).is_ok());
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let dir = std::env::temp_dir().join(format!("campus-uploads-{}", Uuid::new_v4()));
        let storage = LocalFileStorage::new(
            PathBuf::from(&dir),
            "http://localhost:3000/api/uploads".to_string(),
        );

        let stored = UploadService::store(
            &storage,
            UploadKind::Messages,
            vec![file("voice.wav", "audio/wav", 16)],
        )
        .await
        .unwrap();

        assert_eq!(stored.len(), 1);
        assert!(stored[0].file_name.ends_with(".wav"));
        assert!(stored[0].url.contains("/messages/"));

        let bytes = UploadService::load(&storage, UploadKind::Messages, &stored[0].file_name)
            .await
            .unwrap();
        assert_eq!(bytes.len(), 16);

        let missing = UploadService::load(&storage, UploadKind::Messages, "nope.wav")
            .await
            .unwrap_err();
        assert_eq!(missing.status.as_u16(), 404);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_store_rejects_too_many_files() {
        let storage = LocalFileStorage::new(
            std::env::temp_dir(),
            "http://localhost:3000/api/uploads".to_string(),
        );
        let files = (0..11).map(|i| file(&format!("{i}.pdf"), "application/pdf", 1)).collect();
        let err = UploadService::store(&storage, UploadKind::Materials, files)
            .await
            .unwrap_err();
        assert_eq!(err.status.as_u16(), 400);
    }
}

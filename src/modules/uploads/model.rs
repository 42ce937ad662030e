use std::str::FromStr;

use campus_core::AppError;
use serde::Serialize;
use utoipa::ToSchema;

const MIB: usize = 1024 * 1024;

const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

const MATERIAL_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
    "application/zip",
    "video/mp4",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
];

const MESSAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "application/pdf",
    "audio/mpeg",
    "audio/wav",
    "video/mp4",
];

/// Upload area. Each kind has its own directory and limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Profile,
    Materials,
    Messages,
}

impl UploadKind {
    pub fn dir(&self) -> &'static str {
        match self {
            UploadKind::Profile => "profile",
            UploadKind::Materials => "materials",
            UploadKind::Messages => "messages",
        }
    }

    /// Multipart field the files are read from.
    pub fn field(&self) -> &'static str {
        match self {
            UploadKind::Profile => "file",
            UploadKind::Materials | UploadKind::Messages => "files",
        }
    }

    pub fn max_files(&self) -> usize {
        match self {
            UploadKind::Profile => 1,
            UploadKind::Materials | UploadKind::Messages => 10,
        }
    }

    pub fn max_bytes(&self) -> usize {
        match self {
            UploadKind::Profile => 2 * MIB,
            UploadKind::Materials => 20 * MIB,
            UploadKind::Messages => 10 * MIB,
        }
    }

    pub fn allowed_types(&self) -> &'static [&'static str] {
        match self {
            UploadKind::Profile => IMAGE_TYPES,
            UploadKind::Materials => MATERIAL_TYPES,
            UploadKind::Messages => MESSAGE_TYPES,
        }
    }

    /// Profile photos are served without authentication.
    pub fn is_public(&self) -> bool {
        matches!(self, UploadKind::Profile)
    }

    /// Request body ceiling for a full upload of this kind.
    pub fn body_limit(&self) -> usize {
        self.max_files() * self.max_bytes() + MIB
    }
}

impl FromStr for UploadKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile" => Ok(UploadKind::Profile),
            "materials" => Ok(UploadKind::Materials),
            "messages" => Ok(UploadKind::Messages),
            other => Err(AppError::bad_request(format!("Unknown upload kind: {other}"))),
        }
    }
}

/// A stored file as reported back to the uploader.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadedFile {
    /// Original client-side name
    pub name: String,
    /// Generated name under the kind's directory
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
    pub url: String,
}

/// Multipart body for `POST /api/uploads/profile`
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ProfileUploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Multipart body for material and message uploads
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct FilesUploadForm {
    #[schema(value_type = Vec<String>, format = Binary)]
    pub files: Vec<Vec<u8>>,
}

/// Content type to serve a stored file with, from its extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" => "text/plain",
        "zip" => "application/zip",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("profile".parse::<UploadKind>().unwrap(), UploadKind::Profile);
        assert_eq!("messages".parse::<UploadKind>().unwrap(), UploadKind::Messages);
        let err = "avatars".parse::<UploadKind>().unwrap_err();
        assert_eq!(err.status.as_u16(), 400);
    }

    #[test]
    fn test_limits() {
        assert_eq!(UploadKind::Profile.max_bytes(), 2 * MIB);
        assert_eq!(UploadKind::Materials.max_files(), 10);
        assert!(UploadKind::Messages.allowed_types().contains(&"audio/wav"));
        assert!(!UploadKind::Profile.allowed_types().contains(&"image/gif"));
        assert!(UploadKind::Profile.is_public());
        assert!(!UploadKind::Materials.is_public());
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a1b2.PNG"), "image/png");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}

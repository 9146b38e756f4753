//! Documents known to the document service, as reported by `GET /documents/`

use crate::error::ApiError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Identifier assigned by the document service. Never changes once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(DocumentId)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub original_filename: String,
    pub file_size: u64,
    pub processed: bool,
    #[serde(default)]
    pub processing_error: Option<String>,
    #[serde(default)]
    pub chunk_count: u32,
    #[serde(with = "timestamp")]
    pub upload_date: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub processed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub total_characters: Option<u64>,
}

/// Processing state of a document, derived from `processed` and `processing_error`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentStatus {
    Ready,
    Processing,
    Failed(String),
}

impl Document {
    /// Name shown to the user: the uploaded file name without its `.pdf` extension
    pub fn display_name(&self) -> &str {
        let name = self.original_filename.as_str();
        if name.len() > 4 && name.is_char_boundary(name.len() - 4) {
            let (stem, ext) = name.split_at(name.len() - 4);
            if ext.eq_ignore_ascii_case(".pdf") {
                return stem;
            }
        }
        name
    }

    pub fn status(&self) -> DocumentStatus {
        if self.processed {
            DocumentStatus::Ready
        } else if let Some(error) = &self.processing_error {
            DocumentStatus::Failed(error.clone())
        } else {
            DocumentStatus::Processing
        }
    }

    /// Only processed documents may become the chat target
    pub fn is_selectable(&self) -> bool {
        self.processed
    }
}

/// Body of `GET /documents/`
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentList {
    pub documents: Vec<Document>,
    pub total: usize,
}

/// Body of `POST /documents/upload`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub document_id: DocumentId,
    pub message: String,
    pub filename: String,
    pub file_size: u64,
    pub processing_started: bool,
}

/// A file the user wants to upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: None,
            bytes,
        }
    }

    /// Read a file from disk. The PDF check runs first so non-PDF files are never read.
    pub async fn from_path(path: &Path) -> Result<Self, ApiError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if !is_valid_pdf(&file_name, None) {
            return Err(ApiError::InvalidFile { file_name });
        }

        let bytes = tokio::fs::read(path).await.map_err(|e| ApiError::File {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Ok(Self::new(file_name, bytes))
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if is_valid_pdf(&self.file_name, self.media_type.as_deref()) {
            Ok(())
        } else {
            Err(ApiError::InvalidFile {
                file_name: self.file_name.clone(),
            })
        }
    }
}

/// Accept a file when its declared media type or its extension says PDF
pub fn is_valid_pdf(file_name: &str, media_type: Option<&str>) -> bool {
    media_type.is_some_and(|m| m.eq_ignore_ascii_case(PDF_MEDIA_TYPE))
        || file_name.to_lowercase().ends_with(".pdf")
}

/// Human readable byte count: "0 Bytes", "512 Bytes", "1.5 KB", "2.25 MB"
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let formatted = format!("{:.2}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// Short date used in document lists: "Mar 7, 2025, 02:05 PM"
pub fn format_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    date.format("%b %-d, %Y, %I:%M %p").to_string()
}

/// The service emits ISO-8601 timestamps, sometimes without an offset. Those are UTC.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn doc(id: i64, processed: bool) -> Document {
        Document {
            id: DocumentId(id),
            filename: format!("{}_report.pdf", id),
            original_filename: format!("report-{}.pdf", id),
            file_size: 2048,
            processed,
            processing_error: None,
            chunk_count: if processed { 12 } else { 0 },
            upload_date: Utc.with_ymd_and_hms(2025, 3, 7, 14, 5, 0).unwrap(),
            processed_date: None,
            total_pages: None,
            total_characters: None,
        }
    }

    #[test]
    fn test_decode_document_list_from_service() {
        let body = r#"{
            "documents": [
                {
                    "id": 1,
                    "filename": "a1b2_notes.pdf",
                    "original_filename": "Notes.PDF",
                    "file_size": 10240,
                    "processed": false,
                    "processing_error": "Failed to extract text from PDF: encrypted",
                    "chunk_count": 0,
                    "upload_date": "2025-03-07T14:05:00.123456",
                    "processed_date": null,
                    "total_pages": null,
                    "total_characters": null
                },
                {
                    "id": 2,
                    "filename": "c3d4_paper.pdf",
                    "original_filename": "paper.pdf",
                    "file_size": 524288,
                    "processed": true,
                    "chunk_count": 41,
                    "upload_date": "2025-03-07T15:00:00Z",
                    "processed_date": "2025-03-07T15:00:09+00:00",
                    "total_pages": 12,
                    "total_characters": 38211
                }
            ],
            "total": 2
        }"#;

        let list: DocumentList = serde_json::from_str(body).unwrap();
        assert_eq!(list.documents.len(), 2);

        let notes = &list.documents[0];
        assert_eq!(notes.display_name(), "Notes");
        assert!(matches!(notes.status(), DocumentStatus::Failed(_)));
        assert!(!notes.is_selectable());

        let paper = &list.documents[1];
        assert_eq!(paper.status(), DocumentStatus::Ready);
        assert_eq!(paper.total_pages, Some(12));
        assert!(paper.processed_date.is_some());
    }

    #[test]
    fn test_unprocessed_without_error_is_processing() {
        assert_eq!(doc(3, false).status(), DocumentStatus::Processing);
    }

    #[test]
    fn test_display_name_keeps_other_extensions() {
        let mut d = doc(1, true);
        d.original_filename = "scan.tiff".to_string();
        assert_eq!(d.display_name(), "scan.tiff");
        d.original_filename = ".pdf".to_string();
        assert_eq!(d.display_name(), ".pdf");
    }

    #[test]
    fn test_is_valid_pdf() {
        assert!(is_valid_pdf("report.pdf", None));
        assert!(is_valid_pdf("REPORT.PDF", None));
        assert!(is_valid_pdf("download", Some("application/pdf")));
        assert!(!is_valid_pdf("notes.txt", None));
        assert!(!is_valid_pdf("notes.txt", Some("text/plain")));
        assert!(!is_valid_pdf("pdf", None));
    }

    #[test]
    fn test_upload_file_validate() {
        assert!(UploadFile::new("paper.pdf", vec![]).validate().is_ok());
        let err = UploadFile::new("notes.txt", b"hello".to_vec()).validate().unwrap_err();
        assert!(matches!(err, ApiError::InvalidFile { .. }));
    }

    #[tokio::test]
    async fn test_from_path_rejects_non_pdf_without_reading() {
        let err = UploadFile::from_path(Path::new("/definitely/missing/notes.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidFile { .. }));
    }

    #[tokio::test]
    async fn test_from_path_reads_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.file_name, "paper.pdf");
        assert_eq!(file.bytes, b"%PDF-1.7");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(10 * 1024 * 1024), "10 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024 * 1024), "5120 GB");
    }

    #[test]
    fn test_format_date() {
        let date = Utc.with_ymd_and_hms(2025, 3, 7, 14, 5, 0).unwrap();
        assert_eq!(format_date(&date), "Mar 7, 2025, 02:05 PM");
    }

    #[test]
    fn test_timestamp_parse_variants() {
        assert!(timestamp::parse("2025-03-07T14:05:00").is_some());
        assert!(timestamp::parse("2025-03-07 14:05:00.5").is_some());
        assert!(timestamp::parse("2025-03-07T14:05:00-05:00").is_some());
        assert!(timestamp::parse("yesterday").is_none());
    }

    #[test]
    fn test_document_id_from_str() {
        assert_eq!(" 42 ".parse::<DocumentId>().unwrap(), DocumentId(42));
        assert!("abc".parse::<DocumentId>().is_err());
    }
}

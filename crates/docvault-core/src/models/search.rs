use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use validator::Validate;

use super::document::Metadata;
use super::document_type::DocumentType;
use crate::error::AppError;
use crate::validation::search_filter_from_value;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Fields a search can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    Filename,
    FileSize,
    DocumentType,
    MimeType,
    FileExtension,
}

impl SortField {
    /// Column name in the documents table.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::Filename => "filename",
            SortField::FileSize => "file_size",
            SortField::DocumentType => "document_type",
            SortField::MimeType => "mime_type",
            SortField::FileExtension => "file_extension",
        }
    }
}

impl Display for SortField {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.column())
    }
}

impl FromStr for SortField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "created_at" | "created" | "createdtime" | "created_time" => Ok(SortField::CreatedAt),
            "filename" => Ok(SortField::Filename),
            "file_size" | "size" => Ok(SortField::FileSize),
            "document_type" | "type" => Ok(SortField::DocumentType),
            "mime_type" => Ok(SortField::MimeType),
            "file_extension" | "extension" => Ok(SortField::FileExtension),
            _ => Err(anyhow::anyhow!("Invalid sort field: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(anyhow::anyhow!("Invalid sort direction: {}", s)),
        }
    }
}

/// A document search as submitted by a caller.
///
/// At least one of `document_type` or a non-empty `metadata` filter must be
/// present; [`SearchRequest::has_criteria`] reports whether that holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    #[serde(default)]
    pub document_type: Option<DocumentType>,
    /// Key to case-insensitive substring filters on string metadata values.
    /// Every value must be a JSON string.
    #[serde(default)]
    pub metadata: Metadata,
    /// Zero-based page index
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 1000, message = "Page size must be between 1 and 1000"))]
    pub page_size: u32,
    #[serde(default)]
    pub order_by: SortField,
    #[serde(default)]
    pub direction: SortDirection,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl SearchRequest {
    pub fn has_criteria(&self) -> bool {
        self.document_type.is_some() || !self.metadata.is_empty()
    }

    /// The metadata filter as string pairs. A non-string value is a
    /// validation failure.
    pub fn metadata_filter(&self) -> Result<BTreeMap<String, String>, AppError> {
        search_filter_from_value(serde_json::Value::Object(self.metadata.clone()))
    }
}

/// One page of results plus the unpaged match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_criteria() {
        let mut request = SearchRequest {
            page_size: 10,
            ..Default::default()
        };
        assert!(!request.has_criteria());

        request
            .metadata
            .insert("customer".to_string(), serde_json::json!("acme"));
        assert!(request.has_criteria());

        request.metadata.clear();
        request.document_type = Some(DocumentType::Invoice);
        assert!(request.has_criteria());
    }

    #[test]
    fn test_page_size_range_is_validated() {
        let request = SearchRequest {
            document_type: Some(DocumentType::Invoice),
            page_size: 0,
            ..Default::default()
        };
        assert!(request.validate().is_err());

        let request = SearchRequest {
            page_size: 50,
            ..request
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_deserialize_defaults() {
        let request: SearchRequest =
            serde_json::from_str(r#"{"document_type":"contract"}"#).unwrap();
        assert_eq!(request.page, 0);
        assert_eq!(request.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(request.order_by, SortField::CreatedAt);
        assert_eq!(request.direction, SortDirection::Desc);
    }

    #[test]
    fn test_metadata_filter_rejects_non_string_values() {
        let mut request = SearchRequest {
            page_size: 10,
            ..Default::default()
        };
        request
            .metadata
            .insert("customer".to_string(), serde_json::json!("acme"));
        assert_eq!(
            request.metadata_filter().unwrap().get("customer").map(String::as_str),
            Some("acme")
        );

        request
            .metadata
            .insert("amount".to_string(), serde_json::json!(12));
        assert!(matches!(
            request.metadata_filter(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_sort_field_parsing() {
        assert_eq!("size".parse::<SortField>().unwrap(), SortField::FileSize);
        assert_eq!(SortField::MimeType.column(), "mime_type");
        assert!("uuid".parse::<SortField>().is_err());
    }
}

//! Resolved stream artifacts and the inbound API response shape

use crate::error::ResolveError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stream container inferred from the final URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Hls,
    Mp4,
    Unknown,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Hls => "hls",
            StreamType::Mp4 => "mp4",
            StreamType::Unknown => "unknown",
        }
    }
}

/// Subtitle track advertised by the terminal page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtitle {
    pub url: String,
    pub label: Option<String>,
    pub language: Option<String>,
}

/// Terminal artifact of a successful resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStream {
    pub url: String,
    #[serde(rename = "type")]
    pub stream_type: StreamType,
    pub subtitles: Vec<Subtitle>,
    pub provider: String,
    /// Id of the codec whose output passed validation
    pub codec: String,
    /// Number of pages fetched
    pub hops: usize,
    pub resolved_at: DateTime<Utc>,
}

/// One playable source in the API response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

/// Uniform `{success, sources, error}` shape handed to the web layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub success: bool,
    pub sources: Vec<Source>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub subtitles: Vec<Subtitle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl ApiResponse {
    pub fn success(stream: &ResolvedStream) -> Self {
        Self {
            success: true,
            sources: vec![Source {
                url: stream.url.clone(),
                source_type: stream.stream_type.as_str().to_string(),
                quality: None,
            }],
            subtitles: stream.subtitles.clone(),
            error: None,
            error_code: None,
        }
    }

    pub fn failure(error: &ResolveError) -> Self {
        Self {
            success: false,
            sources: Vec::new(),
            subtitles: Vec::new(),
            error: Some(error.to_string()),
            error_code: Some(error.code().to_string()),
        }
    }

    pub fn from_result(result: &Result<ResolvedStream, ResolveError>) -> Self {
        match result {
            Ok(stream) => Self::success(stream),
            Err(error) => Self::failure(error),
        }
    }
}

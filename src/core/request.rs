//! Inbound resolution requests

use crate::error::ResolveError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Movie,
    Tv,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Movie => write!(f, "movie"),
            MediaType::Tv => write!(f, "tv"),
        }
    }
}

impl FromStr for MediaType {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "movie" => Ok(MediaType::Movie),
            "tv" | "series" => Ok(MediaType::Tv),
            other => Err(ResolveError::InvalidRequest(format!(
                "unknown media type: {}",
                other
            ))),
        }
    }
}

/// Wire shape of a request as received from the web layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    pub content_id: String,
    #[serde(default)]
    pub media_type: MediaType,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub episode: Option<u32>,
    #[serde(default)]
    pub provider_hint: Option<String>,
}

/// A validated request; immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionRequest {
    content_id: String,
    media_type: MediaType,
    season: Option<u32>,
    episode: Option<u32>,
    provider_hint: Option<String>,
}

fn validate_content_id(content_id: &str) -> Result<(), ResolveError> {
    if content_id.is_empty() {
        return Err(ResolveError::InvalidRequest("content id is empty".to_string()));
    }
    if content_id
        .chars()
        .any(|c| matches!(c, '/' | '?' | '#') || c.is_whitespace())
    {
        return Err(ResolveError::InvalidRequest(format!(
            "content id contains reserved characters: {:?}",
            content_id
        )));
    }
    Ok(())
}

impl ResolutionRequest {
    pub fn new(
        content_id: impl Into<String>,
        media_type: MediaType,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<Self, ResolveError> {
        let content_id = content_id.into();
        validate_content_id(&content_id)?;

        match media_type {
            MediaType::Movie => {
                if season.is_some() || episode.is_some() {
                    return Err(ResolveError::InvalidRequest(
                        "movie requests take no season or episode".to_string(),
                    ));
                }
            }
            MediaType::Tv => match (season, episode) {
                (Some(s), Some(e)) if s >= 1 && e >= 1 => {}
                _ => {
                    return Err(ResolveError::InvalidRequest(
                        "tv requests need season and episode >= 1".to_string(),
                    ))
                }
            },
        }

        Ok(Self {
            content_id,
            media_type,
            season,
            episode,
            provider_hint: None,
        })
    }

    pub fn movie(content_id: impl Into<String>) -> Result<Self, ResolveError> {
        Self::new(content_id, MediaType::Movie, None, None)
    }

    pub fn tv(content_id: impl Into<String>, season: u32, episode: u32) -> Result<Self, ResolveError> {
        Self::new(content_id, MediaType::Tv, Some(season), Some(episode))
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        let provider = provider.into();
        self.provider_hint = (!provider.trim().is_empty()).then_some(provider);
        self
    }

    pub fn from_payload(payload: RequestPayload) -> Result<Self, ResolveError> {
        let request = Self::new(
            payload.content_id,
            payload.media_type,
            payload.season,
            payload.episode,
        )?;
        Ok(match payload.provider_hint {
            Some(hint) => request.with_provider(hint),
            None => request,
        })
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn season_episode(&self) -> Option<(u32, u32)> {
        self.season.zip(self.episode)
    }

    pub fn provider_hint(&self) -> Option<&str> {
        self.provider_hint.as_deref()
    }
}

impl fmt::Display for ResolutionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.season_episode() {
            Some((s, e)) => write!(f, "{} {} S{:02}E{:02}", self.media_type, self.content_id, s, e),
            None => write!(f, "{} {}", self.media_type, self.content_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_requests() {
        let movie = ResolutionRequest::movie("tt0111161").unwrap();
        assert_eq!(movie.media_type(), MediaType::Movie);
        assert_eq!(movie.season_episode(), None);
        assert_eq!(movie.to_string(), "movie tt0111161");

        let tv = ResolutionRequest::tv("1399", 1, 10).unwrap().with_provider("vidsrc");
        assert_eq!(tv.season_episode(), Some((1, 10)));
        assert_eq!(tv.provider_hint(), Some("vidsrc"));
        assert_eq!(tv.to_string(), "tv 1399 S01E10");
    }

    #[test]
    fn test_rejects_bad_content_ids() {
        for id in ["", "tt1/2", "tt1?x", "tt1#a", "tt 1", "tt1\n"] {
            assert!(
                matches!(ResolutionRequest::movie(id), Err(ResolveError::InvalidRequest(_))),
                "accepted {:?}",
                id
            );
        }
    }

    #[test]
    fn test_season_episode_rules() {
        assert!(ResolutionRequest::tv("1399", 0, 1).is_err());
        assert!(ResolutionRequest::tv("1399", 1, 0).is_err());
        assert!(ResolutionRequest::new("1399", MediaType::Tv, Some(1), None).is_err());
        assert!(ResolutionRequest::new("tt1", MediaType::Movie, Some(1), Some(1)).is_err());
    }

    #[test]
    fn test_from_camel_case_payload() {
        let payload: RequestPayload = serde_json::from_str(
            r#"{"contentId":"1399","mediaType":"tv","season":2,"episode":3,"providerHint":"vidsrc"}"#,
        )
        .unwrap();
        let request = ResolutionRequest::from_payload(payload).unwrap();
        assert_eq!(request.content_id(), "1399");
        assert_eq!(request.season_episode(), Some((2, 3)));
        assert_eq!(request.provider_hint(), Some("vidsrc"));

        let blank_hint: RequestPayload =
            serde_json::from_str(r#"{"contentId":"tt1","providerHint":" "}"#).unwrap();
        assert_eq!(ResolutionRequest::from_payload(blank_hint).unwrap().provider_hint(), None);
    }

    #[test]
    fn test_media_type_from_str() {
        assert_eq!("TV".parse::<MediaType>().unwrap(), MediaType::Tv);
        assert!("podcast".parse::<MediaType>().is_err());
    }
}

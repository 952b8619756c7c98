//! Locating next-hop links and encoded tokens in player markup

use crate::core::stream::Subtitle;
use crate::core::token::{Token, TokenContext};
use crate::error::ResolveError;
use crate::platform::hop::HopResult;
use crate::utils::redact::redact;
use crate::utils::url::{rebase_onto, resolve_link};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

type Cell = OnceLock<Result<Regex, regex::Error>>;

fn compiled(cell: &'static Cell, pattern: &str) -> Result<&'static Regex, ResolveError> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| ResolveError::Config(format!("invalid extraction pattern: {}", e)))
}

fn data_hash_re() -> Result<&'static Regex, ResolveError> {
    static RE: Cell = OnceLock::new();
    compiled(&RE, r#"data-hash\s*=\s*["'](?P<hash>[^"'\s]+)["']"#)
}

fn primary_src_re() -> Result<&'static Regex, ResolveError> {
    static RE: Cell = OnceLock::new();
    compiled(
        &RE,
        r#"src\s*[=:]\s*["'](?P<url>[^"'\s]*/(?P<marker>rcp|prorcp)/[^"'\s]+)["']"#,
    )
}

fn alternate_src_re() -> Result<&'static Regex, ResolveError> {
    static RE: Cell = OnceLock::new();
    compiled(
        &RE,
        r#"src\s*[=:]\s*["'](?P<url>[^"'\s]*/(?P<marker>srcrcp)/[^"'\s]+)["']"#,
    )
}

fn strict_div_re() -> Result<&'static Regex, ResolveError> {
    static RE: Cell = OnceLock::new();
    compiled(
        &RE,
        r#"<div id="(?P<id>[A-Za-z0-9]+)" style="display:none;">(?P<token>[A-Za-z0-9_:+/=\-]+)</div>"#,
    )
}

fn lenient_div_re() -> Result<&'static Regex, ResolveError> {
    static RE: Cell = OnceLock::new();
    compiled(
        &RE,
        r#"(?is)<div\b(?P<attrs>[^>]*)>\s*(?P<token>[A-Za-z0-9_:+/=\-]+)\s*</div>"#,
    )
}

fn id_attr_re() -> Result<&'static Regex, ResolveError> {
    static RE: Cell = OnceLock::new();
    compiled(&RE, r#"(?i)\bid\s*=\s*["'](?P<id>[A-Za-z0-9_\-]+)["']"#)
}

fn hidden_style_re() -> Result<&'static Regex, ResolveError> {
    static RE: Cell = OnceLock::new();
    compiled(&RE, r#"(?i)\bstyle\s*=\s*["'][^"']*display\s*:\s*none"#)
}

fn track_re() -> Result<&'static Regex, ResolveError> {
    static RE: Cell = OnceLock::new();
    compiled(&RE, r#"(?is)<track\b(?P<attrs>[^>]*)>"#)
}

fn attr_re() -> Result<&'static Regex, ResolveError> {
    static RE: Cell = OnceLock::new();
    compiled(
        &RE,
        r#"(?i)\b(?P<name>kind|src|label|srclang)\s*=\s*["'](?P<value>[^"']*)["']"#,
    )
}

/// Which group of matchers to run against a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSet {
    /// `data-hash`, `/rcp/` and `/prorcp/` links, strict hidden div
    Primary,
    /// `/srcrcp/` links, hidden div with any attribute order or quoting
    Alternate,
}

/// Outcome of running a pattern set over one page
#[derive(Debug, Clone)]
pub enum Extraction {
    /// Another page must be fetched
    NextHop { url: Url, marker: String },
    /// The page carries the encoded token
    Terminal(Token),
}

/// Ordered pattern matchers over player pages
#[derive(Debug, Clone)]
pub struct TokenExtractor {
    relay: Option<Url>,
    min_token_length: usize,
    embed_id: Option<String>,
    fingerprint: Vec<String>,
}

impl Default for TokenExtractor {
    fn default() -> Self {
        Self::new(16)
    }
}

impl TokenExtractor {
    pub fn new(min_token_length: usize) -> Self {
        Self {
            relay: None,
            min_token_length,
            embed_id: None,
            fingerprint: Vec::new(),
        }
    }

    /// Host that `data-hash` links and absolute hop links are pointed at
    pub fn with_relay(mut self, relay: Option<Url>) -> Self {
        self.relay = relay;
        self
    }

    pub fn with_embed_id(mut self, embed_id: impl Into<String>) -> Self {
        self.embed_id = Some(embed_id.into());
        self
    }

    pub fn with_fingerprint(mut self, parts: Vec<String>) -> Self {
        self.fingerprint = parts;
        self
    }

    /// Run `set` over the page; first match wins
    pub fn extract(&self, page: &HopResult, set: PatternSet) -> Result<Extraction, ResolveError> {
        let next = match set {
            PatternSet::Primary => match self.data_hash_link(page)? {
                Some(next) => Some(next),
                None => self.marker_link(page, primary_src_re()?)?,
            },
            PatternSet::Alternate => self.marker_link(page, alternate_src_re()?)?,
        };
        if let Some(next) = next {
            return Ok(next);
        }

        let hidden = match set {
            PatternSet::Primary => self.strict_div(&page.body)?,
            PatternSet::Alternate => self.lenient_div(&page.body)?,
        };

        match hidden {
            Some((div_id, raw)) => {
                debug!("Hop {}: token in #{} ({})", page.hop, div_id, redact(&raw));
                Ok(Extraction::Terminal(Token::new(
                    raw,
                    page.hop,
                    self.context(&page.url, div_id),
                )))
            }
            None => Err(ResolveError::Extraction { hop: page.hop }),
        }
    }

    fn context(&self, page: &Url, div_id: String) -> TokenContext {
        let mut context = TokenContext::for_page(page.as_str())
            .with_div_id(div_id)
            .with_fingerprint(self.fingerprint.clone());
        context.embed_path = Some(page.path().to_string());
        context.embed_id = self.embed_id.clone();
        context
    }

    fn data_hash_link(&self, page: &HopResult) -> Result<Option<Extraction>, ResolveError> {
        let Some(captures) = data_hash_re()?.captures(&page.body) else {
            return Ok(None);
        };
        let hash = &captures["hash"];
        let base = self.relay.as_ref().unwrap_or(&page.url);
        let url = resolve_link(base, &format!("/rcp/{}", hash))?;
        Ok(Some(Extraction::NextHop {
            url,
            marker: "rcp".to_string(),
        }))
    }

    fn marker_link(
        &self,
        page: &HopResult,
        pattern: &Regex,
    ) -> Result<Option<Extraction>, ResolveError> {
        let Some(captures) = pattern.captures(&page.body) else {
            return Ok(None);
        };
        let href = &captures["url"];
        let mut url = resolve_link(&page.url, href)?;

        let absolute = href.starts_with("//") || Url::parse(href).is_ok();
        if absolute {
            if let Some(relay) = &self.relay {
                url = rebase_onto(&url, relay)?;
            }
        }

        Ok(Some(Extraction::NextHop {
            url,
            marker: captures["marker"].to_string(),
        }))
    }

    fn strict_div(&self, html: &str) -> Result<Option<(String, String)>, ResolveError> {
        Ok(strict_div_re()?
            .captures_iter(html)
            .map(|c| (c["id"].to_string(), c["token"].to_string()))
            .find(|(_, token)| token.len() > self.min_token_length))
    }

    fn lenient_div(&self, html: &str) -> Result<Option<(String, String)>, ResolveError> {
        let id_re = id_attr_re()?;
        let hidden_re = hidden_style_re()?;

        for captures in lenient_div_re()?.captures_iter(html) {
            let attrs = &captures["attrs"];
            let token = &captures["token"];
            if token.len() <= self.min_token_length || !hidden_re.is_match(attrs) {
                continue;
            }
            if let Some(id) = id_re.captures(attrs) {
                return Ok(Some((id["id"].to_string(), token.to_string())));
            }
        }
        Ok(None)
    }

    /// `<track>` elements of kind subtitles or captions, resolved against `page`
    pub fn extract_subtitles(&self, html: &str, page: &Url) -> Result<Vec<Subtitle>, ResolveError> {
        let attr = attr_re()?;
        let mut subtitles = Vec::new();

        for track in track_re()?.captures_iter(html) {
            let (mut kind, mut src, mut label, mut language) = (None, None, None, None);
            for a in attr.captures_iter(&track["attrs"]) {
                let value = a["value"].to_string();
                match a["name"].to_ascii_lowercase().as_str() {
                    "kind" => kind = Some(value.to_ascii_lowercase()),
                    "src" => src = Some(value),
                    "label" => label = Some(value),
                    _ => language = Some(value),
                }
            }

            if !matches!(kind.as_deref(), None | Some("subtitles") | Some("captions")) {
                continue;
            }
            let Some(src) = src else { continue };
            match resolve_link(page, &src) {
                Ok(url) => subtitles.push(Subtitle {
                    url: url.to_string(),
                    label,
                    language,
                }),
                Err(e) => debug!("Skipping subtitle track {}: {}", src, e),
            }
        }

        Ok(subtitles)
    }
}

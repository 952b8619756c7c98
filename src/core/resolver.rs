//! The resolution pipeline: hops, extraction, decoding, validation

use crate::codec::registry::{CodecRegistry, DecodeAttempt};
use crate::codec::validator::infer_stream_type;
use crate::core::config::ResolverConfig;
use crate::core::request::{RequestPayload, ResolutionRequest};
use crate::core::stream::{ApiResponse, ResolvedStream};
use crate::core::token::Token;
use crate::error::{CancelReason, ResolveError};
use crate::platform::extractor::{Extraction, PatternSet, TokenExtractor};
use crate::platform::hop::{HopFetcher, HopRequest, HopResult, HttpHopResolver};
use crate::platform::provider::{ProviderConfig, ProviderRegistry};
use crate::utils::redact::redact;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;

/// Pipeline state; `Validated` and `Failed` are terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveState {
    Init,
    FetchingHop(usize),
    ExtractingToken,
    Decoding,
    Validated,
    Failed(String),
}

impl ResolveState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResolveState::Validated | ResolveState::Failed(_))
    }
}

impl fmt::Display for ResolveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveState::Init => write!(f, "init"),
            ResolveState::FetchingHop(hop) => write!(f, "fetching hop {}", hop),
            ResolveState::ExtractingToken => write!(f, "extracting token"),
            ResolveState::Decoding => write!(f, "decoding"),
            ResolveState::Validated => write!(f, "validated"),
            ResolveState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// One fetched page, without its body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HopSummary {
    pub hop: usize,
    pub url: String,
    pub status: u16,
    pub referer: Option<String>,
}

impl From<&HopResult> for HopSummary {
    fn from(page: &HopResult) -> Self {
        Self {
            hop: page.hop,
            url: page.url.to_string(),
            status: page.status,
            referer: page.referer.as_ref().map(Url::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptSummary {
    pub codec: String,
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl AttemptSummary {
    fn from_attempt(attempt: &DecodeAttempt, raw: bool) -> Self {
        let output = attempt.output.as_deref().map(|output| {
            if raw || attempt.success {
                output.to_string()
            } else {
                redact(output).to_string()
            }
        });
        Self {
            codec: attempt.codec.clone(),
            success: attempt.success,
            output,
            error: attempt.error.clone(),
        }
    }
}

/// Diagnostic record of one resolution
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReport {
    pub request: String,
    pub provider: Option<String>,
    pub token: Option<String>,
    pub hops: Vec<HopSummary>,
    pub attempts: Vec<AttemptSummary>,
    pub trace: Vec<ResolveState>,
    pub elapsed_ms: u128,
    pub outcome: ApiResponse,
}

/// Report options
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    /// Include tokens and failed decoder outputs unredacted
    pub raw: bool,
}

/// Per-request state owned by the orchestrator
struct Run {
    hops: Vec<HopSummary>,
    attempts: Vec<DecodeAttempt>,
    trace: Vec<ResolveState>,
    token: Option<String>,
}

impl Run {
    fn new() -> Self {
        Self {
            hops: Vec::new(),
            attempts: Vec::new(),
            trace: vec![ResolveState::Init],
            token: None,
        }
    }

    fn transition(&mut self, next: ResolveState) {
        if let Some(current) = self.trace.last() {
            if current.is_terminal() {
                return;
            }
            debug!("{} -> {}", current, next);
        }
        self.trace.push(next);
    }

    fn exhausted(&self) -> ResolveError {
        ResolveError::DecodeExhausted {
            attempts: self.attempts.len(),
        }
    }
}

enum Step {
    Next(Url),
    Done(ResolvedStream),
}

/// Drives hop fetching, token extraction and decoding for each request
pub struct Resolver {
    fetcher: Arc<dyn HopFetcher>,
    codecs: Arc<CodecRegistry>,
    providers: Arc<ProviderRegistry>,
    limits: Arc<Semaphore>,
    max_concurrent: usize,
    deadline: Duration,
    min_token_length: usize,
}

/// Builder for [`Resolver`]; unset collaborators are derived from the config
#[derive(Default)]
pub struct ResolverBuilder {
    config: ResolverConfig,
    fetcher: Option<Arc<dyn HopFetcher>>,
    codecs: Option<Arc<CodecRegistry>>,
    providers: Option<ProviderRegistry>,
}

impl ResolverBuilder {
    pub fn config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn HopFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn codecs(mut self, codecs: Arc<CodecRegistry>) -> Self {
        self.codecs = Some(codecs);
        self
    }

    pub fn providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn build(self) -> Result<Resolver, ResolveError> {
        let config = self.config;
        config.validate()?;

        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpHopResolver::new(
                &config.http,
                config.retry.clone(),
                Arc::new(config.rate_limit.build()),
            )?),
        };
        let codecs = match self.codecs {
            Some(codecs) => codecs,
            None => Arc::new(config.codec_registry()?),
        };
        let providers = match self.providers {
            Some(providers) => providers,
            None => config.provider_registry()?,
        };

        Ok(Resolver {
            fetcher,
            codecs,
            providers: Arc::new(providers),
            limits: Arc::new(Semaphore::new(config.max_concurrent_requests)),
            max_concurrent: config.max_concurrent_requests,
            deadline: config.deadline,
            min_token_length: config.min_token_length,
        })
    }
}

impl Resolver {
    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::default()
    }

    /// Resolver over real HTTP with built-in providers and codecs
    pub fn new(config: ResolverConfig) -> Result<Self, ResolveError> {
        Self::builder().config(config).build()
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub async fn resolve(&self, request: &ResolutionRequest) -> Result<ResolvedStream, ResolveError> {
        self.resolve_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Resolve, aborting as soon as `cancel` fires or the deadline passes
    pub async fn resolve_with_cancel(
        &self,
        request: &ResolutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ResolvedStream, ResolveError> {
        let mut run = Run::new();
        self.execute(request, cancel, &mut run).await
    }

    /// Resolve and return the hop chain, decode attempts and state trace
    pub async fn resolve_with_report(
        &self,
        request: &ResolutionRequest,
        cancel: &CancellationToken,
        options: ReportOptions,
    ) -> (Result<ResolvedStream, ResolveError>, ResolutionReport) {
        let started = std::time::Instant::now();
        let mut run = Run::new();
        let result = self.execute(request, cancel, &mut run).await;

        let report = ResolutionReport {
            request: request.to_string(),
            provider: self
                .providers
                .select(request.provider_hint())
                .ok()
                .map(|provider| provider.name.clone()),
            token: run.token.as_deref().map(|token| {
                if options.raw {
                    token.to_string()
                } else {
                    redact(token).to_string()
                }
            }),
            hops: run.hops,
            attempts: run
                .attempts
                .iter()
                .map(|attempt| AttemptSummary::from_attempt(attempt, options.raw))
                .collect(),
            trace: run.trace,
            elapsed_ms: started.elapsed().as_millis(),
            outcome: ApiResponse::from_result(&result),
        };
        (result, report)
    }

    /// Resolve a batch concurrently; output order matches input order
    pub async fn resolve_many(
        &self,
        requests: &[ResolutionRequest],
    ) -> Vec<Result<ResolvedStream, ResolveError>> {
        stream::iter(requests.iter().map(|request| self.resolve(request)))
            .buffered(self.max_concurrent)
            .collect()
            .await
    }

    /// Inbound API: camelCase payload in, `{success, sources, error}` out
    pub async fn respond(&self, payload: RequestPayload) -> ApiResponse {
        let result = match ResolutionRequest::from_payload(payload) {
            Ok(request) => self.resolve(&request).await,
            Err(error) => Err(error),
        };
        ApiResponse::from_result(&result)
    }

    async fn execute(
        &self,
        request: &ResolutionRequest,
        cancel: &CancellationToken,
        run: &mut Run,
    ) -> Result<ResolvedStream, ResolveError> {
        let provider = match self.providers.select(request.provider_hint()) {
            Ok(provider) => provider,
            Err(error) => {
                run.transition(ResolveState::Failed(error.to_string()));
                return Err(error);
            }
        };

        let span = info_span!("resolve", provider = %provider.name, content_id = %request.content_id());
        async {
            info!("Resolving {}", request);

            let result = {
                let work = async {
                    let _permit = self
                        .limits
                        .acquire()
                        .await
                        .map_err(|_| ResolveError::Cancelled(CancelReason::Caller))?;
                    self.drive(request, provider, run).await
                };

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(ResolveError::Cancelled(CancelReason::Caller)),
                    _ = tokio::time::sleep(self.deadline) => Err(ResolveError::Cancelled(CancelReason::Deadline)),
                    result = work => result,
                }
            };

            match &result {
                Ok(stream) => {
                    info!(
                        "Resolved {} via {} in {} hops",
                        redact(&stream.url),
                        stream.codec,
                        stream.hops
                    );
                }
                Err(error) => {
                    if matches!(error, ResolveError::Cancelled(_)) {
                        run.hops.clear();
                    }
                    warn!("Resolution failed: {}", error);
                    run.transition(ResolveState::Failed(error.to_string()));
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        request: &ResolutionRequest,
        provider: &ProviderConfig,
        run: &mut Run,
    ) -> Result<ResolvedStream, ResolveError> {
        let extractor = TokenExtractor::new(self.min_token_length)
            .with_relay(provider.relay()?)
            .with_embed_id(request.content_id());

        let mut url = provider.embed_url(request)?;
        let mut referer = provider.referer_url()?;
        let mut hop = 0;

        loop {
            if hop >= provider.max_hops {
                warn!("Hop limit {} reached at {}", provider.max_hops, url);
                return Err(ResolveError::Extraction { hop });
            }

            run.transition(ResolveState::FetchingHop(hop));
            let hop_request = HopRequest::new().with_referer(referer.take());
            let page = self.fetcher.fetch(hop, &url, &hop_request).await?;
            run.hops.push(HopSummary::from(&page));

            match self.step(provider, &extractor, &page, run).await? {
                Step::Next(next) => {
                    debug!("Hop {} links to {}", hop, next);
                    referer = Some(page.url.clone());
                    url = next;
                    hop += 1;
                }
                Step::Done(stream) => return Ok(stream),
            }
        }
    }

    /// Primary patterns first, then the alternate set once
    async fn step(
        &self,
        provider: &ProviderConfig,
        extractor: &TokenExtractor,
        page: &HopResult,
        run: &mut Run,
    ) -> Result<Step, ResolveError> {
        let mut primary_token = None;

        let primary_error = match extractor.extract(page, PatternSet::Primary) {
            Ok(Extraction::NextHop { url, .. }) => return Ok(Step::Next(url)),
            Ok(Extraction::Terminal(token)) => {
                match self.decode(provider, extractor, page, &token, run).await {
                    Ok(stream) => return Ok(Step::Done(stream)),
                    Err(error @ ResolveError::DecodeExhausted { .. }) => {
                        primary_token = Some(token);
                        error
                    }
                    Err(error) => return Err(error),
                }
            }
            Err(error @ ResolveError::Extraction { .. }) => error,
            Err(error) => return Err(error),
        };

        warn!("Hop {}: {}; trying alternate patterns", page.hop, primary_error);
        match extractor.extract(page, PatternSet::Alternate) {
            Ok(Extraction::NextHop { url, .. }) => Ok(Step::Next(url)),
            Ok(Extraction::Terminal(token)) => {
                if primary_token.as_ref() == Some(&token) {
                    return Err(run.exhausted());
                }
                self.decode(provider, extractor, page, &token, run)
                    .await
                    .map(Step::Done)
            }
            Err(_) => match primary_token {
                Some(_) => Err(run.exhausted()),
                None => Err(primary_error),
            },
        }
    }

    async fn decode(
        &self,
        provider: &ProviderConfig,
        extractor: &TokenExtractor,
        page: &HopResult,
        token: &Token,
        run: &mut Run,
    ) -> Result<ResolvedStream, ResolveError> {
        run.transition(ResolveState::ExtractingToken);
        run.token = Some(token.raw().to_string());
        debug!("Token at hop {}: {} ({:?})", token.hop(), token.raw(), token.context().div_id);

        run.transition(ResolveState::Decoding);
        let decoded = self
            .codecs
            .try_all(provider.codec_family(), token.raw(), token.context())
            .await;
        run.attempts.extend(decoded.attempts);

        let Some(winner) = decoded.resolved else {
            return Err(run.exhausted());
        };
        run.transition(ResolveState::Validated);

        let subtitles = extractor
            .extract_subtitles(&page.body, &page.url)
            .unwrap_or_default();

        Ok(ResolvedStream {
            stream_type: infer_stream_type(&winner.url),
            url: winner.url,
            subtitles,
            provider: provider.name.clone(),
            codec: winner.codec,
            hops: run.hops.len(),
            resolved_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::builtin::vidsrc_codecs;
    use crate::codec::strategy::Codec;
    use crate::core::token::TokenContext;
    use crate::error::NetworkCause;
    use async_trait::async_trait;
    use reqwest::header::HeaderMap;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const STREAM: &str = "https://example.cdn/a/b/list.m3u8";

    /// Serves canned pages by URL and records the referer of every request
    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, String>,
        seen: Mutex<Vec<(String, Option<String>)>>,
    }

    impl FakeFetcher {
        fn page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }

        fn seen(&self) -> Vec<(String, Option<String>)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HopFetcher for FakeFetcher {
        async fn fetch(
            &self,
            hop: usize,
            url: &Url,
            request: &HopRequest,
        ) -> Result<HopResult, ResolveError> {
            self.seen.lock().unwrap().push((
                url.to_string(),
                request.referer.as_ref().map(Url::to_string),
            ));
            let body = self.pages.get(url.as_str()).cloned().ok_or(ResolveError::Network {
                hop,
                cause: NetworkCause::Other("HTTP 404".to_string()),
            })?;
            Ok(HopResult {
                hop,
                url: url.clone(),
                status: 200,
                headers: HeaderMap::new(),
                body,
                referer: request.referer.clone(),
            })
        }
    }

    /// Never answers
    struct SilentFetcher;

    #[async_trait]
    impl HopFetcher for SilentFetcher {
        async fn fetch(
            &self,
            _hop: usize,
            _url: &Url,
            _request: &HopRequest,
        ) -> Result<HopResult, ResolveError> {
            std::future::pending().await
        }
    }

    fn divid_xor() -> Codec {
        vidsrc_codecs()
            .into_iter()
            .map(|(_, codec)| codec)
            .find(|codec| codec.id == "vidsrc-divid-xor")
            .unwrap()
    }

    fn token_for(div_id: &str) -> String {
        let ctx = TokenContext::for_page("https://cloudnestra.com/prorcp/H2").with_div_id(div_id);
        divid_xor().encode_text(STREAM, &ctx).unwrap()
    }

    fn chain() -> FakeFetcher {
        FakeFetcher::default()
            .page(
                "https://vidsrc.xyz/embed/movie/tt0111161",
                r#"<iframe id="player_iframe" src="//cloudnestra.com/rcp/H1" allowfullscreen></iframe>"#,
            )
            .page(
                "https://cloudnestra.com/rcp/H1",
                r#"<script>loadIframe({ src: '/prorcp/H2' });</script>"#,
            )
            .page(
                "https://cloudnestra.com/prorcp/H2",
                &format!(
                    r#"<div id="TsA2KGDGux" style="display:none;">{}</div>
                    <track kind="captions" src="/subs/en.vtt" srclang="en" label="English">"#,
                    token_for("TsA2KGDGux")
                ),
            )
    }

    fn resolver(fetcher: Arc<dyn HopFetcher>, config: ResolverConfig) -> Resolver {
        Resolver::builder()
            .config(config)
            .fetcher(fetcher)
            .codecs(Arc::new(CodecRegistry::builtin()))
            .build()
            .unwrap()
    }

    fn movie() -> ResolutionRequest {
        ResolutionRequest::movie("tt0111161").unwrap()
    }

    #[tokio::test]
    async fn test_resolves_three_hop_chain() {
        let fetcher = Arc::new(chain());
        let resolver = resolver(fetcher.clone(), ResolverConfig::default());

        let stream = resolver.resolve(&movie()).await.unwrap();
        assert_eq!(stream.url, STREAM);
        assert_eq!(stream.stream_type, crate::core::stream::StreamType::Hls);
        assert_eq!(stream.codec, "vidsrc-divid-xor");
        assert_eq!(stream.provider, "vidsrc");
        assert_eq!(stream.hops, 3);
        assert_eq!(stream.subtitles.len(), 1);
        assert_eq!(stream.subtitles[0].url, "https://cloudnestra.com/subs/en.vtt");

        assert_eq!(
            fetcher.seen(),
            vec![
                ("https://vidsrc.xyz/embed/movie/tt0111161".to_string(), None),
                (
                    "https://cloudnestra.com/rcp/H1".to_string(),
                    Some("https://vidsrc.xyz/embed/movie/tt0111161".to_string())
                ),
                (
                    "https://cloudnestra.com/prorcp/H2".to_string(),
                    Some("https://cloudnestra.com/rcp/H1".to_string())
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_report_trace_and_redaction() {
        let resolver = resolver(Arc::new(chain()), ResolverConfig::default());
        let (result, report) = resolver
            .resolve_with_report(&movie(), &CancellationToken::new(), ReportOptions::default())
            .await;
        assert!(result.is_ok());

        assert_eq!(
            report.trace,
            vec![
                ResolveState::Init,
                ResolveState::FetchingHop(0),
                ResolveState::FetchingHop(1),
                ResolveState::FetchingHop(2),
                ResolveState::ExtractingToken,
                ResolveState::Decoding,
                ResolveState::Validated,
            ]
        );
        assert_eq!(report.hops.len(), 3);
        assert_eq!(report.hops[2].referer.as_deref(), Some("https://cloudnestra.com/rcp/H1"));
        assert_eq!(report.attempts.len(), 2);
        assert!(!report.attempts[0].success);
        assert!(report.attempts[1].success);

        let token = token_for("TsA2KGDGux");
        let shown = report.token.unwrap();
        assert_ne!(shown, token);
        assert!(shown.ends_with(&format!("(len={})", token.len())));
        assert!(report.outcome.success);
    }

    #[tokio::test]
    async fn test_alternate_patterns_after_extraction_failure() {
        let fetcher = FakeFetcher::default()
            .page(
                "https://vidsrc.xyz/embed/movie/tt0111161",
                r#"<div class="server" data-hash="H1">Server</div>"#,
            )
            .page(
                "https://cloudnestra.com/rcp/H1",
                r#"<iframe src='/srcrcp/H3'></iframe>"#,
            )
            .page(
                "https://cloudnestra.com/srcrcp/H3",
                &format!(
                    "<div style='display: none' id='Kx9wQ2mZr1'>\n{}\n</div>",
                    token_for("Kx9wQ2mZr1")
                ),
            );
        let resolver = resolver(Arc::new(fetcher), ResolverConfig::default());

        let (result, report) = resolver
            .resolve_with_report(&movie(), &CancellationToken::new(), ReportOptions::default())
            .await;
        assert_eq!(result.unwrap().url, STREAM);
        assert_eq!(report.hops[2].url, "https://cloudnestra.com/srcrcp/H3");
    }

    #[tokio::test]
    async fn test_alternate_patterns_after_decode_exhaustion() {
        let fetcher = FakeFetcher::default()
            .page(
                "https://vidsrc.xyz/embed/movie/tt0111161",
                r#"<div id="TsA2KGDGux" style="display:none;">AAAAAAAAAAAAAAAAAAAAAAAA</div>
                <iframe src="/srcrcp/H3"></iframe>"#,
            )
            .page(
                "https://vidsrc.xyz/srcrcp/H3",
                &format!(
                    "<div style='display: none' id='Kx9wQ2mZr1'>\n{}\n</div>",
                    token_for("Kx9wQ2mZr1")
                ),
            );
        let resolver = resolver(Arc::new(fetcher), ResolverConfig::default());

        let (result, report) = resolver
            .resolve_with_report(&movie(), &CancellationToken::new(), ReportOptions::default())
            .await;
        assert_eq!(result.unwrap().url, STREAM);

        let urls: Vec<&str> = report.hops.iter().map(|hop| hop.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://vidsrc.xyz/embed/movie/tt0111161",
                "https://vidsrc.xyz/srcrcp/H3",
            ]
        );
        assert!(report.attempts.iter().any(|attempt| !attempt.success));
        assert_eq!(report.trace.last(), Some(&ResolveState::Validated));
    }

    #[tokio::test]
    async fn test_decode_exhausted() {
        let fetcher = FakeFetcher::default().page(
            "https://vidsrc.xyz/embed/movie/tt0111161",
            r#"<div id="TsA2KGDGux" style="display:none;">AAAAAAAAAAAAAAAAAAAAAAAA</div>"#,
        );
        let resolver = resolver(Arc::new(fetcher), ResolverConfig::default());

        let (result, report) = resolver
            .resolve_with_report(&movie(), &CancellationToken::new(), ReportOptions { raw: true })
            .await;
        match result {
            Err(ResolveError::DecodeExhausted { attempts }) => {
                assert!(attempts >= 2);
                assert_eq!(attempts, report.attempts.len());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(report.token.as_deref(), Some("AAAAAAAAAAAAAAAAAAAAAAAA"));
        assert!(matches!(report.trace.last(), Some(ResolveState::Failed(_))));
        assert_eq!(report.outcome.error_code.as_deref(), Some("decode_exhausted"));
    }

    #[tokio::test]
    async fn test_missing_token_is_extraction_error() {
        let fetcher = FakeFetcher::default()
            .page("https://vidsrc.xyz/embed/movie/tt0111161", "<html>nothing here</html>");
        let result = resolver(Arc::new(fetcher), ResolverConfig::default())
            .resolve(&movie())
            .await;
        assert!(matches!(result, Err(ResolveError::Extraction { hop: 0 })));
    }

    #[tokio::test]
    async fn test_hop_limit() {
        let fetcher = FakeFetcher::default()
            .page(
                "https://vidsrc.xyz/embed/movie/tt0111161",
                r#"<iframe src="//cloudnestra.com/rcp/loop"></iframe>"#,
            )
            .page(
                "https://cloudnestra.com/rcp/loop",
                r#"<iframe src="/rcp/loop"></iframe>"#,
            );
        let result = resolver(Arc::new(fetcher), ResolverConfig::default())
            .resolve(&movie())
            .await;
        assert!(matches!(result, Err(ResolveError::Extraction { hop: 6 })));
    }

    #[tokio::test]
    async fn test_network_error_is_fatal() {
        let result = resolver(Arc::new(FakeFetcher::default()), ResolverConfig::default())
            .resolve(&movie())
            .await;
        assert!(matches!(result, Err(ResolveError::Network { hop: 0, .. })));
    }

    #[tokio::test]
    async fn test_deadline_cancels_silent_hop() {
        let config = ResolverConfig::default().with_deadline(Duration::from_millis(100));
        let resolver = resolver(Arc::new(SilentFetcher), config);

        let (result, report) = resolver
            .resolve_with_report(&movie(), &CancellationToken::new(), ReportOptions::default())
            .await;
        assert!(matches!(
            result,
            Err(ResolveError::Cancelled(CancelReason::Deadline))
        ));
        assert!(report.hops.is_empty());
        assert_eq!(
            report.trace.last(),
            Some(&ResolveState::Failed("Resolution deadline exceeded".to_string()))
        );
    }

    #[tokio::test]
    async fn test_caller_cancellation() {
        let resolver = resolver(Arc::new(SilentFetcher), ResolverConfig::default());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = resolver.resolve_with_cancel(&movie(), &cancel).await;
        assert!(matches!(
            result,
            Err(ResolveError::Cancelled(CancelReason::Caller))
        ));
    }

    #[tokio::test]
    async fn test_resolve_many_preserves_order() {
        let resolver = resolver(Arc::new(chain()), ResolverConfig::default().with_max_concurrent_requests(2));
        let requests = vec![
            movie(),
            ResolutionRequest::movie("tt0000000").unwrap(),
            movie().with_provider("nowhere"),
            movie(),
        ];

        let results = resolver.resolve_many(&requests).await;
        assert_eq!(results.len(), 4);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ResolveError::Network { hop: 0, .. })));
        assert!(matches!(results[2], Err(ResolveError::UnknownProvider(_))));
        assert_eq!(results[3].as_ref().unwrap().url, STREAM);
    }

    #[tokio::test]
    async fn test_respond_maps_invalid_payload() {
        let resolver = resolver(Arc::new(chain()), ResolverConfig::default());

        let bad = resolver
            .respond(RequestPayload {
                content_id: "tt1/../x".to_string(),
                ..RequestPayload::default()
            })
            .await;
        assert!(!bad.success);
        assert_eq!(bad.error_code.as_deref(), Some("invalid_request"));

        let good = resolver
            .respond(RequestPayload {
                content_id: "tt0111161".to_string(),
                ..RequestPayload::default()
            })
            .await;
        assert!(good.success);
        assert_eq!(good.sources[0].url, STREAM);
        assert_eq!(good.sources[0].source_type, "hls");
    }
}

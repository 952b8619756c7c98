//! Ordered per-provider codec registry

use crate::codec::strategy::Decoder;
use crate::codec::validator::ResultValidator;
use crate::core::token::TokenContext;
use crate::error::ResolveError;
use crate::utils::redact::redact;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Record of one decoder invocation against one token
#[derive(Clone, PartialEq, Eq)]
pub struct DecodeAttempt {
    pub codec: String,
    pub output: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

impl fmt::Debug for DecodeAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeAttempt")
            .field("codec", &self.codec)
            .field("output", &self.output.as_deref().map(redact))
            .field("success", &self.success)
            .field("error", &self.error)
            .finish()
    }
}

/// The accepted URL and the codec that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedUrl {
    pub url: String,
    pub codec: String,
}

/// Every attempt made for one token, plus the winner if any
#[derive(Debug, Clone, Default)]
pub struct DecodeRun {
    pub attempts: Vec<DecodeAttempt>,
    pub resolved: Option<DecodedUrl>,
}

impl DecodeRun {
    pub fn is_success(&self) -> bool {
        self.resolved.is_some()
    }

    pub fn into_result(self) -> Result<DecodedUrl, ResolveError> {
        let attempts = self.attempts.len();
        self.resolved
            .ok_or(ResolveError::DecodeExhausted { attempts })
    }
}

struct Entry {
    priority: i32,
    decoder: Arc<dyn Decoder>,
}

fn into_ordered(mut entries: Vec<Entry>) -> Vec<Arc<dyn Decoder>> {
    // stable: equal priorities keep registration order
    entries.sort_by_key(|entry| entry.priority);
    entries.into_iter().map(|entry| entry.decoder).collect()
}

/// Collects decoders at startup; [`CodecRegistryBuilder::build`] freezes them
pub struct CodecRegistryBuilder {
    providers: HashMap<String, Vec<Entry>>,
    fallback: Vec<Entry>,
    validator: ResultValidator,
}

impl CodecRegistryBuilder {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            fallback: Vec::new(),
            validator: ResultValidator::default(),
        }
    }

    /// Register a decoder for `provider`. Lower priority values are tried first.
    pub fn register(self, provider: &str, priority: i32, decoder: impl Decoder + 'static) -> Self {
        self.register_arc(provider, priority, Arc::new(decoder))
    }

    pub fn register_arc(
        mut self,
        provider: &str,
        priority: i32,
        decoder: Arc<dyn Decoder>,
    ) -> Self {
        self.providers
            .entry(provider.to_ascii_lowercase())
            .or_default()
            .push(Entry { priority, decoder });
        self
    }

    /// Register a decoder tried for every provider after its own list
    pub fn fallback(mut self, priority: i32, decoder: Arc<dyn Decoder>) -> Self {
        self.fallback.push(Entry { priority, decoder });
        self
    }

    pub fn with_validator(mut self, validator: ResultValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn build(self) -> CodecRegistry {
        CodecRegistry {
            providers: self
                .providers
                .into_iter()
                .map(|(provider, entries)| (provider, into_ordered(entries)))
                .collect(),
            fallback: into_ordered(self.fallback),
            validator: self.validator,
        }
    }
}

impl Default for CodecRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only after construction; share it behind an `Arc`
pub struct CodecRegistry {
    providers: HashMap<String, Vec<Arc<dyn Decoder>>>,
    fallback: Vec<Arc<dyn Decoder>>,
    validator: ResultValidator,
}

impl CodecRegistry {
    pub fn builder() -> CodecRegistryBuilder {
        CodecRegistryBuilder::new()
    }

    pub fn validator(&self) -> &ResultValidator {
        &self.validator
    }

    pub fn has_provider(&self, provider: &str) -> bool {
        self.providers.contains_key(&provider.to_ascii_lowercase())
    }

    /// Decoder ids in the order they would be tried for `provider`
    pub fn codec_ids(&self, provider: &str) -> Vec<String> {
        self.ordered(provider)
            .map(|decoder| decoder.id().to_string())
            .collect()
    }

    fn ordered<'a>(&'a self, provider: &str) -> impl Iterator<Item = &'a Arc<dyn Decoder>> + 'a {
        self.providers
            .get(&provider.to_ascii_lowercase())
            .into_iter()
            .flatten()
            .chain(self.fallback.iter())
    }

    /// Try decoders in priority order until one output validates.
    ///
    /// Decoders after the first success are never invoked. Decoders whose
    /// selector rejects the context are skipped without an attempt record.
    pub async fn try_all(&self, provider: &str, token: &str, ctx: &TokenContext) -> DecodeRun {
        let mut run = DecodeRun::default();

        for decoder in self.ordered(provider) {
            if !decoder.accepts(ctx) {
                debug!("Codec {} does not apply to div {:?}", decoder.id(), ctx.div_id);
                continue;
            }

            match decoder.decode(token, ctx).await {
                Ok(output) => match self.validator.select(&output) {
                    Some(url) => {
                        info!("Codec {} produced a valid stream URL", decoder.id());
                        run.attempts.push(DecodeAttempt {
                            codec: decoder.id().to_string(),
                            output: Some(output),
                            success: true,
                            error: None,
                        });
                        run.resolved = Some(DecodedUrl {
                            url,
                            codec: decoder.id().to_string(),
                        });
                        return run;
                    }
                    None => {
                        debug!(
                            "Codec {} output {} failed validation",
                            decoder.id(),
                            redact(&output)
                        );
                        run.attempts.push(DecodeAttempt {
                            codec: decoder.id().to_string(),
                            output: Some(output),
                            success: false,
                            error: Some("output failed stream URL validation".to_string()),
                        });
                    }
                },
                Err(error) => {
                    debug!("{}", error);
                    run.attempts.push(DecodeAttempt {
                        codec: decoder.id().to_string(),
                        output: None,
                        success: false,
                        error: Some(error.reason),
                    });
                }
            }
        }

        warn!(
            "No codec decoded token {} for provider {} ({} attempts)",
            redact(token),
            provider,
            run.attempts.len()
        );
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::key::KeyStrategy;
    use crate::codec::strategy::Codec;
    use crate::codec::transform::Transform;
    use crate::error::DecodeError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Scripted {
        id: &'static str,
        output: Result<&'static str, &'static str>,
        calls: Arc<AtomicU32>,
    }

    impl Scripted {
        fn new(id: &'static str, output: Result<&'static str, &'static str>) -> (Self, Arc<AtomicU32>) {
            let calls = Arc::new(AtomicU32::new(0));
            (
                Self {
                    id,
                    output,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl Decoder for Scripted {
        fn id(&self) -> &str {
            self.id
        }

        async fn decode(&self, _token: &str, _ctx: &TokenContext) -> Result<String, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.output
                .map(str::to_string)
                .map_err(|reason| DecodeError::new(self.id, reason))
        }
    }

    fn ctx() -> TokenContext {
        TokenContext::for_page("https://cloudnestra.com/prorcp/x").with_div_id("TsA2KGDGux")
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let (a, a_calls) = Scripted::new("A", Ok("h\u{1}\u{2}garbage"));
        let (b, b_calls) = Scripted::new("B", Ok("https://cdn.example.com/x/list.m3u8"));
        let (c, c_calls) = Scripted::new("C", Ok("https://other.example.com/y/list.m3u8"));

        let registry = CodecRegistry::builder()
            .register("vidsrc", 0, a)
            .register("vidsrc", 1, b)
            .register("vidsrc", 2, c)
            .build();

        let run = registry.try_all("vidsrc", "token", &ctx()).await;

        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
        assert_eq!(run.attempts.len(), 2);
        assert!(!run.attempts[0].success);
        assert!(run.attempts[1].success);
        let decoded = run.into_result().unwrap();
        assert_eq!(decoded.codec, "B");
        assert_eq!(decoded.url, "https://cdn.example.com/x/list.m3u8");
    }

    #[tokio::test]
    async fn test_priority_overrides_registration_order() {
        let (late, late_calls) = Scripted::new("late", Ok("https://cdn.example.com/x/list.m3u8"));
        let (early, early_calls) = Scripted::new("early", Ok("https://cdn.example.com/y/list.m3u8"));

        let registry = CodecRegistry::builder()
            .register("p", 10, late)
            .register("p", -1, early)
            .build();

        assert_eq!(registry.codec_ids("p"), vec!["early", "late"]);
        let decoded = registry.try_all("P", "t", &ctx()).await.into_result().unwrap();
        assert_eq!(decoded.codec, "early");
        assert_eq!(early_calls.load(Ordering::SeqCst), 1);
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_errors_are_recorded_and_exhaustion_reported() {
        let (a, _) = Scripted::new("A", Err("invalid base64"));
        let (b, _) = Scripted::new("B", Ok("not a url"));

        let registry = CodecRegistry::builder()
            .register("p", 0, a)
            .register("p", 1, b)
            .build();

        let run = registry.try_all("p", "t", &ctx()).await;
        assert_eq!(run.attempts[0].error.as_deref(), Some("invalid base64"));
        assert_eq!(run.attempts[0].output, None);
        assert_eq!(run.attempts[1].output.as_deref(), Some("not a url"));
        assert!(matches!(
            run.into_result(),
            Err(ResolveError::DecodeExhausted { attempts: 2 })
        ));
    }

    #[tokio::test]
    async fn test_selector_skips_and_fallback_runs_last() {
        let only_other = Codec::new("other-div", KeyStrategy::None, vec![Transform::Reverse])
            .for_div_ids(&["sXnL9MQIry"]);
        let (fallback, fallback_calls) =
            Scripted::new("remote", Ok("https://cdn.example.com/stream/abc"));

        let registry = CodecRegistry::builder()
            .register("vidsrc", 0, only_other)
            .fallback(0, Arc::new(fallback))
            .build();

        let run = registry.try_all("vidsrc", "t", &ctx()).await;
        assert_eq!(run.attempts.len(), 1);
        assert_eq!(run.attempts[0].codec, "remote");
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);

        // providers without their own list still reach the fallback
        assert_eq!(registry.codec_ids("unknown"), vec!["remote"]);
        assert!(registry.has_provider("VIDSRC"));
        assert!(!registry.has_provider("unknown"));
    }

    #[tokio::test]
    async fn test_empty_registry_exhausts_with_zero_attempts() {
        let registry = CodecRegistry::builder().build();
        let run = registry.try_all("p", "t", &ctx()).await;
        assert!(!run.is_success());
        assert!(matches!(
            run.into_result(),
            Err(ResolveError::DecodeExhausted { attempts: 0 })
        ));
    }

    #[test]
    fn test_attempt_debug_redacts_output() {
        let attempt = DecodeAttempt {
            codec: "A".to_string(),
            output: Some("https://secret.example/list.m3u8".to_string()),
            success: true,
            error: None,
        };
        let shown = format!("{:?}", attempt);
        assert!(!shown.contains("secret.example"));
        assert!(shown.contains("len=32"));
    }
}

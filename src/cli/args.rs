//! Command line argument parsing

use crate::core::config::ResolverConfig;
use crate::core::request::{MediaType, ResolutionRequest};
use crate::error::ResolveError;
use crate::platform::client::BrowserProfile;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Resolve movie and episode ids to direct stream URLs through embed hop chains
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Content id (IMDb `tt...` or TMDB numeric id)
    pub content_id: String,

    /// Media type
    #[arg(short = 't', long = "type", value_enum, default_value = "movie")]
    pub media_type: MediaKind,

    /// Season number (tv only)
    #[arg(short, long)]
    pub season: Option<u32>,

    /// Episode number (tv only)
    #[arg(short, long)]
    pub episode: Option<u32>,

    /// Provider to resolve through (default: configured default)
    #[arg(short, long, value_name = "NAME")]
    pub provider: Option<String>,

    /// JSON configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Per-hop HTTP timeout (e.g., 15s, 1m)
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<humantime::Duration>,

    /// Overall resolution deadline (e.g., 45s)
    #[arg(long, value_name = "DURATION")]
    pub deadline: Option<humantime::Duration>,

    /// Browser profile for User-Agent and client hints
    #[arg(long, value_name = "PROFILE")]
    pub profile: Option<BrowserProfile>,

    /// Override User-Agent header
    #[arg(long, value_name = "USER_AGENT")]
    pub user_agent: Option<String>,

    /// Proxy URL (http/https/socks)
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Print the API response as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the resolution report (hops, codec attempts, state trace) as JSON
    #[arg(long)]
    pub report: bool,

    /// Do not redact tokens in the report
    #[arg(long, requires = "report")]
    pub raw: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Media type as accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum MediaKind {
    /// Feature film
    Movie,
    /// Series episode
    Tv,
}

impl From<MediaKind> for MediaType {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Movie => MediaType::Movie,
            MediaKind::Tv => MediaType::Tv,
        }
    }
}

impl Args {
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Into::into)
    }

    pub fn deadline_duration(&self) -> Option<Duration> {
        self.deadline.map(Into::into)
    }

    /// Validated request built from the positional id and flags
    pub fn request(&self) -> Result<ResolutionRequest, ResolveError> {
        let request = ResolutionRequest::new(
            self.content_id.trim(),
            self.media_type.into(),
            self.season,
            self.episode,
        )?;
        Ok(match &self.provider {
            Some(provider) => request.with_provider(provider),
            None => request,
        })
    }

    /// Configuration file (or defaults) with command line overrides applied
    pub fn resolver_config(&self) -> Result<ResolverConfig, ResolveError> {
        let mut config = match &self.config {
            Some(path) => ResolverConfig::from_file(path)?,
            None => ResolverConfig::default(),
        };

        if let Some(timeout) = self.timeout_duration() {
            config = config.with_timeout(timeout);
        }
        if let Some(deadline) = self.deadline_duration() {
            config = config.with_deadline(deadline);
        }
        if let Some(profile) = self.profile {
            config.http.profile = profile;
        }
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent);
        }
        if let Some(proxy) = &self.proxy {
            config = config.with_proxy(proxy);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (only errors)
    Quiet,
    Normal,
    /// Verbose (debug info)
    Verbose,
}

//! Output formatting and progress display

use crate::cli::args::VerbosityLevel;
use crate::core::resolver::ResolutionReport;
use crate::core::stream::ResolvedStream;
use crate::error::ResolveError;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Terminal output for vidhop
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
    spinner: Option<ProgressBar>,
}

impl OutputFormatter {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            spinner: None,
        }
    }

    /// Spinner shown while the hop chain is walked
    pub fn start_spinner(&mut self, message: &str) -> Option<ProgressBar> {
        if self.verbosity == VerbosityLevel::Quiet {
            return None;
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        self.spinner = Some(spinner.clone());
        Some(spinner)
    }

    pub fn finish_spinner(&self) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_and_clear();
        }
    }

    pub fn info(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            println!("{} {}", "info:".cyan().bold(), message);
        }
    }

    pub fn warning(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("{} {}", "warning:".yellow().bold(), message);
        }
    }

    /// Always printed
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "error:".red().bold(), message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity == VerbosityLevel::Verbose {
            println!("{} {}", "debug:".dimmed(), message);
        }
    }

    /// Print a resolved stream. In quiet mode only the bare URL is printed.
    pub fn print_stream(&self, stream: &ResolvedStream, elapsed: Duration) {
        if self.verbosity == VerbosityLevel::Quiet {
            println!("{}", stream.url);
            return;
        }

        println!("{} {}", "stream:".green().bold(), stream.url);
        println!("  type:     {}", stream.stream_type.as_str());
        println!("  provider: {}", stream.provider);
        println!("  codec:    {}", stream.codec);
        println!("  hops:     {}", stream.hops);
        for subtitle in &stream.subtitles {
            let label = subtitle
                .label
                .as_deref()
                .or(subtitle.language.as_deref())
                .unwrap_or("subtitle");
            println!("  {} {} {}", "sub:".blue(), label, subtitle.url);
        }
        println!("  time:     {}", format_duration(elapsed));
    }

    pub fn print_failure(&self, error: &ResolveError) {
        self.error(&error.to_string());
        if let Some(hop) = error.hop() {
            self.debug(&format!("failed at hop {} ({})", hop, error.code()));
        }
    }

    /// Human-readable report summary for verbose runs
    pub fn print_report_summary(&self, report: &ResolutionReport) {
        if self.verbosity != VerbosityLevel::Verbose {
            return;
        }

        for hop in &report.hops {
            self.debug(&format!(
                "hop {} {} {} (referer {})",
                hop.hop,
                hop.status,
                hop.url,
                hop.referer.as_deref().unwrap_or("none")
            ));
        }
        for attempt in &report.attempts {
            let verdict = if attempt.success { "ok".green() } else { "rejected".red() };
            self.debug(&format!("codec {} {}", attempt.codec, verdict));
        }
        let trace: Vec<String> = report.trace.iter().map(ToString::to_string).collect();
        self.debug(&trace.join(" -> "));
    }
}

/// Format duration as human-readable string
fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        return format!("{}ms", millis);
    }

    let total_seconds = duration.as_secs();
    if total_seconds < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        if seconds == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m {}s", minutes, seconds)
        }
    }
}

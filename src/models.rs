//! Data models for the site analyzer.
//!
//! This module contains the core data structures shared by the sequencer,
//! the step producers, the report generators and the local store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Device the analysis is labelled for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Desktop,
    Mobile,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Desktop => write!(f, "desktop"),
            DeviceType::Mobile => write!(f, "mobile"),
        }
    }
}

/// Language used for step titles, findings and comments.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Tr,
}

impl Locale {
    /// Returns the short language code.
    pub fn code(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Tr => "tr",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Lifecycle of a single analysis step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

impl StepStatus {
    /// Returns a short marker used in progress output and reports.
    pub fn marker(&self) -> &'static str {
        match self {
            StepStatus::Pending => "⏳",
            StepStatus::InProgress => "🔄",
            StepStatus::Completed => "✅",
            StepStatus::Error => "❌",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "Pending"),
            StepStatus::InProgress => write!(f, "In Progress"),
            StepStatus::Completed => write!(f, "Completed"),
            StepStatus::Error => write!(f, "Error"),
        }
    }
}

/// One named unit of the guided analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Stable identifier; ordering is given by position in the list.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Current status.
    pub status: StepStatus,
    /// Short description shown while the step runs.
    pub description: String,
}

impl Step {
    /// Creates a pending step.
    pub fn pending(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: StepStatus::Pending,
            description: description.into(),
        }
    }

    /// Returns a copy of this step with a different status.
    pub fn with_status(&self, status: StepStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

/// Certificate details reported by the SSL probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SslCertificate {
    pub issuer: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub protocol: String,
    pub key_exchange: String,
    pub cipher: String,
    pub is_valid: bool,
    pub days_until_expiry: i64,
}

impl SslCertificate {
    /// Placeholder certificate used when nothing could be determined.
    pub fn unknown(now: DateTime<Utc>) -> Self {
        Self {
            issuer: "Unknown".to_string(),
            valid_from: now,
            valid_to: now,
            protocol: "Unknown".to_string(),
            key_exchange: "Unknown".to_string(),
            cipher: "Unknown".to_string(),
            is_valid: false,
            days_until_expiry: 0,
        }
    }
}

/// Presence of a single security header on the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityHeader {
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// Result of the SSL certificate check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SslAnalysis {
    pub certificate: SslCertificate,
    pub security_score: u32,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    /// Keyed by header name, sorted for stable output.
    pub security_headers: BTreeMap<String, SecurityHeader>,
}

/// Outcome kind of a finding or comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentKind {
    Success,
    Info,
    Warning,
    Error,
}

impl CommentKind {
    /// Returns an emoji representation of the kind.
    pub fn emoji(&self) -> &'static str {
        match self {
            CommentKind::Success => "🟢",
            CommentKind::Info => "🔵",
            CommentKind::Warning => "🟡",
            CommentKind::Error => "🔴",
        }
    }
}

/// Audit category a comment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommentCategory {
    Performance,
    Accessibility,
    BestPractices,
    Seo,
}

impl fmt::Display for CommentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentCategory::Performance => write!(f, "Performance"),
            CommentCategory::Accessibility => write!(f, "Accessibility"),
            CommentCategory::BestPractices => write!(f, "Best Practices"),
            CommentCategory::Seo => write!(f, "SEO"),
        }
    }
}

/// Narrative comment attached to the final report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisComment {
    pub category: CommentCategory,
    pub kind: CommentKind,
    pub message: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Headline finding attached to the performance metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: CommentKind,
    pub title: String,
    #[serde(default)]
    pub details: Vec<String>,
}

/// A single sample of a metric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: String,
    pub value: f64,
}

/// Performance metric series gathered by the performance step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetrics {
    pub lcp: Vec<MetricPoint>,
    pub fid: Vec<MetricPoint>,
    pub cls: Vec<MetricPoint>,
    pub ttfb: Vec<MetricPoint>,
    pub findings: Vec<Finding>,
}

impl AnalysisMetrics {
    /// Mean value of a series, `None` when empty.
    pub fn mean(series: &[MetricPoint]) -> Option<f64> {
        if series.is_empty() {
            return None;
        }
        Some(series.iter().map(|p| p.value).sum::<f64>() / series.len() as f64)
    }
}

/// Core Web Vitals used by the score calculator (milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoreWebVitals {
    pub fcp_ms: u32,
    pub lcp_ms: u32,
    pub tbt_ms: u32,
}

/// Status of one phase in the page-loading timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingStatus {
    Pending,
    Completed,
    Warning,
    Error,
}

/// One phase of the page-loading timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingStep {
    pub id: String,
    pub name: String,
    pub start_ms: u64,
    pub duration_ms: u64,
    pub status: LoadingStatus,
}

/// Categorized diagnostic notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticDetails {
    pub network: Vec<String>,
    pub performance: Vec<String>,
    pub security: Vec<String>,
    pub optimization: Vec<String>,
}

/// Output of the diagnostics analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub device: DeviceType,
    pub total_load_time_ms: u64,
    pub steps: Vec<LoadingStep>,
    pub recommendations: Vec<String>,
    pub critical_issues: Vec<String>,
    pub details: DiagnosticDetails,
}

/// Metadata about one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Normalized URL that was analyzed.
    pub url: String,
    /// Device the results are labelled for.
    pub device: DeviceType,
    /// Language of the narrative content.
    pub locale: Locale,
    /// Date and time the run started.
    pub analysis_date: DateTime<Utc>,
    /// Monotonic token of the run that produced the report.
    pub run_token: u64,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The aggregated result of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    /// Final status of every step, in order.
    pub steps: Vec<Step>,
    /// True only when every step completed.
    pub completed: bool,
    /// Id of the step that failed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    /// Failure message of the failed step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl: Option<SslAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<AnalysisMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vitals: Option<CoreWebVitals>,
    /// Lighthouse-style score derived from the vitals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance_score: Option<u32>,
    #[serde(default)]
    pub comments: Vec<AnalysisComment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<DiagnosticReport>,
}

impl Report {
    /// Creates an empty report with the given metadata.
    pub fn new(metadata: ReportMetadata) -> Self {
        Self {
            metadata,
            steps: Vec::new(),
            completed: false,
            failed_step: None,
            error: None,
            ssl: None,
            metrics: None,
            vitals: None,
            performance_score: None,
            comments: Vec::new(),
            diagnostics: None,
        }
    }

    /// Number of steps that reached `Completed`.
    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }

    /// Returns the failed step, if the run aborted.
    pub fn failed(&self) -> Option<&Step> {
        self.failed_step
            .as_deref()
            .and_then(|id| self.steps.iter().find(|s| s.id == id))
    }
}

/// One entry of the persisted search log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLogEntry {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub device: DeviceType,
}

/// Counter scoped to one calendar period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodCounter {
    /// Period key, e.g. `2024-03-05`, `2024-03` or `2024`.
    pub period: String,
    pub count: u64,
}

/// Persisted visitor counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorStats {
    pub daily: PeriodCounter,
    pub monthly: PeriodCounter,
    pub yearly: PeriodCounter,
}

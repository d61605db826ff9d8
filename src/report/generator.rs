//! Markdown and JSON report generation.
//!
//! Reports of aborted runs render too: sections whose step never
//! completed are left out and the failure is called out at the top.

use crate::analysis::score_label;
use crate::device;
use crate::models::{
    AnalysisComment, AnalysisMetrics, CoreWebVitals, DiagnosticReport, Report, ReportMetadata,
    SslAnalysis, Step,
};
use anyhow::Result;
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# SitePulse Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_status_section(report));
    output.push_str(&generate_steps_section(&report.steps));

    if let Some(ref ssl) = report.ssl {
        output.push_str(&generate_ssl_section(ssl));
    }
    if let Some(ref metrics) = report.metrics {
        output.push_str(&generate_metrics_section(metrics));
    }
    if let Some(ref vitals) = report.vitals {
        output.push_str(&generate_vitals_section(vitals, report.performance_score));
    }
    output.push_str(&generate_comments_section(&report.comments));
    if let Some(ref diagnostics) = report.diagnostics {
        output.push_str(&generate_diagnostics_section(diagnostics));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();
    let profile = device::profile(metadata.device);

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **URL:** {}\n", metadata.url));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Device:** {} ({}x{}, {})\n",
        metadata.device, profile.viewport.width, profile.viewport.height, profile.network_speed
    ));
    section.push_str(&format!("- **Language:** {}\n", metadata.locale));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn generate_status_section(report: &Report) -> String {
    if report.completed {
        return String::new();
    }

    let mut section = String::new();
    let step = report
        .failed()
        .map(|s| s.name.as_str())
        .unwrap_or("unknown step");

    section.push_str(&format!(
        "> ⚠️ **Analysis aborted at \"{}\".** Only the steps completed before the failure are reported.\n",
        step
    ));
    if let Some(ref error) = report.error {
        section.push_str(&format!(">\n> Error: {}\n", error));
    }
    section.push('\n');

    section
}

/// Generate the step status table.
fn generate_steps_section(steps: &[Step]) -> String {
    let mut section = String::new();

    section.push_str("## Analysis Steps\n\n");
    section.push_str("| # | Step | Status |\n");
    section.push_str("|:---:|:---|:---|\n");
    for (i, step) in steps.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} {} |\n",
            i + 1,
            step.name,
            step.status.marker(),
            step.status
        ));
    }
    section.push('\n');

    section
}

/// Generate the SSL section.
fn generate_ssl_section(ssl: &SslAnalysis) -> String {
    let mut section = String::new();
    let cert = &ssl.certificate;

    section.push_str("## SSL Certificate\n\n");
    section.push_str(&format!("**Security Score:** {}/100\n\n", ssl.security_score));

    section.push_str("| Field | Value |\n");
    section.push_str("|:---|:---|\n");
    section.push_str(&format!("| Issuer | {} |\n", cert.issuer));
    section.push_str(&format!(
        "| Valid | {} |\n",
        if cert.is_valid { "Yes" } else { "No" }
    ));
    section.push_str(&format!(
        "| Valid From | {} |\n",
        cert.valid_from.format("%Y-%m-%d")
    ));
    section.push_str(&format!("| Valid To | {} |\n", cert.valid_to.format("%Y-%m-%d")));
    section.push_str(&format!("| Days Until Expiry | {} |\n", cert.days_until_expiry));
    section.push_str(&format!("| Protocol | {} |\n", cert.protocol));
    section.push_str(&format!("| Key Exchange | {} |\n", cert.key_exchange));
    section.push_str(&format!("| Cipher | {} |\n\n", cert.cipher));

    section.push_str("### Security Headers\n\n");
    for (name, header) in &ssl.security_headers {
        let marker = if header.present { "✅" } else { "❌" };
        match header.value {
            Some(ref value) => section.push_str(&format!("- {} `{}`: {}\n", marker, name, value)),
            None => section.push_str(&format!("- {} `{}`\n", marker, name)),
        }
    }
    section.push('\n');

    push_list(&mut section, "### Warnings", &ssl.warnings);
    push_list(&mut section, "### Recommendations", &ssl.recommendations);

    section
}

fn push_list(section: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    section.push_str(heading);
    section.push_str("\n\n");
    for item in items {
        section.push_str(&format!("- {}\n", item));
    }
    section.push('\n');
}

/// Generate the performance metrics section.
fn generate_metrics_section(metrics: &AnalysisMetrics) -> String {
    let mut section = String::new();

    section.push_str("## Performance Metrics\n\n");
    section.push_str("| Metric | Samples | Average |\n");
    section.push_str("|:---|:---:|:---:|\n");
    for (name, series) in [
        ("LCP", &metrics.lcp),
        ("FID", &metrics.fid),
        ("CLS", &metrics.cls),
        ("TTFB", &metrics.ttfb),
    ] {
        let average = AnalysisMetrics::mean(series)
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "-".to_string());
        section.push_str(&format!("| {} | {} | {} |\n", name, series.len(), average));
    }
    section.push('\n');

    for finding in &metrics.findings {
        section.push_str(&format!("### {} {}\n\n", finding.kind.emoji(), finding.title));
        for detail in &finding.details {
            section.push_str(&format!("- {}\n", detail));
        }
        section.push('\n');
    }

    section
}

/// Generate the Core Web Vitals section.
fn generate_vitals_section(vitals: &CoreWebVitals, score: Option<u32>) -> String {
    let mut section = String::new();

    section.push_str("## Core Web Vitals\n\n");
    if let Some(score) = score {
        section.push_str(&format!(
            "**Performance Score:** {} ({})\n\n",
            score,
            score_label(score)
        ));
    }
    section.push_str("| FCP | LCP | TBT |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} ms | {} ms | {} ms |\n\n",
        vitals.fcp_ms, vitals.lcp_ms, vitals.tbt_ms
    ));

    section
}

/// Generate the narrative comments section.
fn generate_comments_section(comments: &[AnalysisComment]) -> String {
    if comments.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Analysis Comments\n\n");
    for comment in comments {
        section.push_str(&format!(
            "### {} {}\n\n{}\n\n",
            comment.kind.emoji(),
            comment.category,
            comment.message
        ));
        for rec in &comment.recommendations {
            section.push_str(&format!("> 💡 {}\n", rec));
        }
        if !comment.recommendations.is_empty() {
            section.push('\n');
        }
    }

    section
}

/// Generate the loading timeline and diagnostics section.
fn generate_diagnostics_section(diagnostics: &DiagnosticReport) -> String {
    let mut section = String::new();

    section.push_str("## Diagnostics\n\n");
    section.push_str(&format!(
        "**Total Load Time:** {} ms ({})\n\n",
        diagnostics.total_load_time_ms, diagnostics.device
    ));

    section.push_str("| Phase | Start | Duration |\n");
    section.push_str("|:---|:---:|:---:|\n");
    for step in &diagnostics.steps {
        section.push_str(&format!(
            "| {} | {} ms | {} ms |\n",
            step.name, step.start_ms, step.duration_ms
        ));
    }
    section.push('\n');

    push_list(&mut section, "### Critical Issues", &diagnostics.critical_issues);

    if !diagnostics.recommendations.is_empty() {
        section.push_str("### Recommendations\n\n");
        for (i, rec) in diagnostics.recommendations.iter().enumerate() {
            section.push_str(&format!("{}. {}\n", i + 1, rec));
        }
        section.push('\n');
    }

    let details = &diagnostics.details;
    push_list(&mut section, "### Network", &details.network);
    push_list(&mut section, "### Performance", &details.performance);
    push_list(&mut section, "### Security", &details.security);
    push_list(&mut section, "### Optimization", &details.optimization);

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by SitePulse*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CommentCategory, CommentKind, DeviceType, DiagnosticDetails, Locale, StepStatus,
    };
    use chrono::Utc;

    fn create_test_report() -> Report {
        let metadata = ReportMetadata {
            url: "https://example.com".to_string(),
            device: DeviceType::Mobile,
            locale: Locale::En,
            analysis_date: Utc::now(),
            run_token: 1,
            duration_seconds: 6.2,
        };

        let mut report = Report::new(metadata);
        report.steps = vec![
            Step::pending("1", "DNS Lookup", "").with_status(StepStatus::Completed),
            Step::pending("2", "SSL Certificate Check", "").with_status(StepStatus::Completed),
        ];
        report.completed = true;
        report.ssl = Some(crate::ssl::fallback_analysis(Utc::now()));
        report.vitals = Some(CoreWebVitals {
            fcp_ms: 1200,
            lcp_ms: 2000,
            tbt_ms: 150,
        });
        report.performance_score = Some(100);
        report.comments = vec![AnalysisComment {
            category: CommentCategory::Seo,
            kind: CommentKind::Warning,
            message: "Meta descriptions are missing".to_string(),
            recommendations: vec!["Add meta descriptions".to_string()],
        }];
        report.diagnostics = Some(DiagnosticReport {
            device: DeviceType::Mobile,
            total_load_time_ms: 1200,
            steps: Vec::new(),
            recommendations: vec!["Use a CDN".to_string()],
            critical_issues: Vec::new(),
            details: DiagnosticDetails::default(),
        });
        report
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# SitePulse Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("412x823"));
        assert!(markdown.contains("## SSL Certificate"));
        assert!(markdown.contains("Could not analyze SSL certificate"));
        assert!(markdown.contains("**Performance Score:** 100 (Good)"));
        assert!(markdown.contains("### 🟡 SEO"));
        assert!(markdown.contains("1. Use a CDN"));
        assert!(!markdown.contains("Analysis aborted"));
    }

    #[test]
    fn test_partial_report_renders() {
        let metadata = ReportMetadata {
            url: "https://example.com".to_string(),
            device: DeviceType::Desktop,
            locale: Locale::En,
            analysis_date: Utc::now(),
            run_token: 3,
            duration_seconds: 1.5,
        };
        let mut report = Report::new(metadata);
        report.steps = vec![
            Step::pending("1", "DNS Lookup", "").with_status(StepStatus::Completed),
            Step::pending("2", "SSL Certificate Check", "").with_status(StepStatus::Error),
            Step::pending("3", "Security Headers", ""),
        ];
        report.failed_step = Some("2".to_string());
        report.error = Some("probe unavailable".to_string());

        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("Analysis aborted at \"SSL Certificate Check\""));
        assert!(markdown.contains("Error: probe unavailable"));
        assert!(markdown.contains("| 3 | Security Headers | ⏳ Pending |"));
        assert!(!markdown.contains("## SSL Certificate"));
        assert!(!markdown.contains("## Diagnostics"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"run_token\": 1"));
        assert!(json.contains("\"performance_score\": 100"));
        assert!(json.contains("\"status\": \"completed\""));
        assert!(!json.contains("\"failed_step\""));
    }
}

//! Page-load diagnostics.
//!
//! Maps a loading timeline to critical issues, recommendations and
//! categorized notes. Rules are kept in tables keyed by phase name.

use crate::models::{
    DeviceType, DiagnosticDetails, DiagnosticReport, LoadingStatus, LoadingStep,
};

/// Phases slower than this are reported through the rule table.
pub const SLOW_PHASE_MS: u64 = 1000;

/// Rendering slower than this adds rendering notes.
pub const SLOW_RENDERING_MS: u64 = 800;

/// Mobile page loads slower than this get mobile-specific advice.
pub const MOBILE_BUDGET_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetailCategory {
    Network,
    Performance,
    Security,
    Optimization,
}

struct SlowPhaseRule {
    phase: &'static str,
    critical_issue: &'static str,
    recommendation: &'static str,
    category: DetailCategory,
    details: [&'static str; 3],
}

const SLOW_PHASE_RULES: [SlowPhaseRule; 4] = [
    SlowPhaseRule {
        phase: "DNS Lookup",
        critical_issue: "Slow DNS resolution detected",
        recommendation: "Consider using DNS prefetching for faster domain lookups",
        category: DetailCategory::Network,
        details: [
            "DNS resolution took longer than expected",
            "High latency in DNS lookup phase",
            "Consider using a faster DNS provider",
        ],
    },
    SlowPhaseRule {
        phase: "Initial Server Response",
        critical_issue: "Slow server response time detected",
        recommendation: "Optimize server configuration for better response times",
        category: DetailCategory::Performance,
        details: [
            "Server response time exceeds recommended threshold",
            "Consider implementing caching mechanisms",
            "Review server-side processing efficiency",
        ],
    },
    SlowPhaseRule {
        phase: "SSL Handshake",
        critical_issue: "SSL handshake taking too long",
        recommendation: "Optimize SSL/TLS configuration",
        category: DetailCategory::Security,
        details: [
            "SSL handshake duration is affecting page load",
            "Review SSL certificate configuration",
            "Consider enabling SSL session resumption",
        ],
    },
    SlowPhaseRule {
        phase: "Content Download",
        critical_issue: "Slow content download speed",
        recommendation: "Optimize content delivery and implement compression",
        category: DetailCategory::Optimization,
        details: [
            "Large content size affecting download speed",
            "Enable GZIP compression for text-based assets",
            "Consider using a CDN for faster content delivery",
        ],
    },
];

const RENDERING_DETAILS: [&str; 3] = [
    "Rendering performance needs improvement",
    "Consider implementing code splitting",
    "Review and optimize JavaScript execution",
];

const MOBILE_SLOW_RECOMMENDATIONS: [&str; 2] = [
    "Implement a lighter version for mobile users",
    "Use adaptive loading based on network conditions",
];

const MOBILE_SLOW_DETAILS: [&str; 3] = [
    "Mobile page load time exceeds recommended threshold",
    "Consider implementing AMP version",
    "Optimize images specifically for mobile devices",
];

const MOBILE_PERFORMANCE_DETAILS: [&str; 3] = [
    "Review touch event handlers for mobile optimization",
    "Check viewport configuration for mobile devices",
    "Ensure proper font scaling on mobile screens",
];

const NETWORK_WARNING_DETAILS: [&str; 3] = [
    "Network conditions may be affecting performance",
    "Consider implementing offline capabilities",
    "Review resource prioritization",
];

const SECURITY_DETAILS: [&str; 3] = [
    "Review Content Security Policy implementation",
    "Check for secure cookie attributes",
    "Ensure proper CORS configuration",
];

impl DiagnosticDetails {
    fn bucket(&mut self, category: DetailCategory) -> &mut Vec<String> {
        match category {
            DetailCategory::Network => &mut self.network,
            DetailCategory::Performance => &mut self.performance,
            DetailCategory::Security => &mut self.security,
            DetailCategory::Optimization => &mut self.optimization,
        }
    }

    fn extend(&mut self, category: DetailCategory, notes: &[&str]) {
        self.bucket(category)
            .extend(notes.iter().map(|s| s.to_string()));
    }
}

/// Analyze a loading timeline for a device.
pub fn analyze_diagnostics(steps: &[LoadingStep], device: DeviceType) -> DiagnosticReport {
    let total_load_time_ms: u64 = steps.iter().map(|s| s.duration_ms).sum();
    let mut recommendations = Vec::new();
    let mut critical_issues = Vec::new();
    let mut details = DiagnosticDetails::default();

    for step in steps {
        if step.duration_ms > SLOW_PHASE_MS {
            if let Some(rule) = SLOW_PHASE_RULES.iter().find(|r| r.phase == step.name) {
                critical_issues.push(rule.critical_issue.to_string());
                recommendations.push(rule.recommendation.to_string());
                details.extend(rule.category, &rule.details);
            }
        }

        if step.name == "Page Rendering" && step.duration_ms > SLOW_RENDERING_MS {
            details.extend(DetailCategory::Performance, &RENDERING_DETAILS);
        }
    }

    if device == DeviceType::Mobile {
        if total_load_time_ms > MOBILE_BUDGET_MS {
            recommendations.extend(MOBILE_SLOW_RECOMMENDATIONS.iter().map(|s| s.to_string()));
            details.extend(DetailCategory::Optimization, &MOBILE_SLOW_DETAILS);
        }
        details.extend(DetailCategory::Performance, &MOBILE_PERFORMANCE_DETAILS);
    }

    if steps.iter().any(|s| s.status == LoadingStatus::Warning) {
        details.extend(DetailCategory::Network, &NETWORK_WARNING_DETAILS);
    }

    details.extend(DetailCategory::Security, &SECURITY_DETAILS);

    DiagnosticReport {
        device,
        total_load_time_ms,
        steps: steps.to_vec(),
        recommendations,
        critical_issues,
        details,
    }
}

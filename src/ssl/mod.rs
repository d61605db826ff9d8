//! SSL certificate and security header checks.
//!
//! The probe asks the SSL Labs `analyze` API about the target host and
//! sends one `HEAD` request to the target to see which security headers
//! it returns. Any failure inside the probe yields the default
//! "could not analyze" result instead of an error.

use crate::config::SslConfig;
use crate::error::StepError;
use crate::models::{SecurityHeader, SslAnalysis, SslCertificate};
use crate::url::host_from_url;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Headers checked on the target, with the advice given when missing.
pub const SECURITY_HEADERS: [(&str, &str); 5] = [
    (
        "Strict-Transport-Security",
        "Add HSTS header to enforce HTTPS",
    ),
    (
        "Content-Security-Policy",
        "Implement CSP to prevent XSS attacks",
    ),
    (
        "X-Frame-Options",
        "Add X-Frame-Options header to prevent clickjacking",
    ),
    (
        "X-Content-Type-Options",
        "Add X-Content-Type-Options header to prevent MIME-type sniffing",
    ),
    (
        "Referrer-Policy",
        "Add Referrer-Policy header to control information leakage",
    ),
];

/// Score deducted for every missing security header.
const MISSING_HEADER_PENALTY: u32 = 5;

/// Certificates expiring within this many days trigger a warning.
const EXPIRY_WARNING_DAYS: i64 = 30;

/// Collaborator producing the SSL analysis for a URL.
#[async_trait]
pub trait SslProbe: Send + Sync {
    async fn analyze(&self, url: &str) -> Result<SslAnalysis, StepError>;
}

/// SSL Labs API response (only the fields we read).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabsResponse {
    status: String,
    #[serde(default)]
    endpoints: Vec<LabsEndpoint>,
}

#[derive(Debug, Deserialize)]
struct LabsEndpoint {
    #[serde(default)]
    grade: Option<String>,
    #[serde(default)]
    details: Option<LabsDetails>,
}

#[derive(Debug, Deserialize)]
struct LabsDetails {
    #[serde(default)]
    cert: Option<LabsCert>,
    #[serde(default)]
    protocols: Vec<LabsProtocol>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabsCert {
    /// Milliseconds since the epoch.
    not_before: i64,
    not_after: i64,
    #[serde(default)]
    issuer_subject: Option<String>,
    #[serde(default)]
    key_alg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabsProtocol {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    cipher: Option<String>,
}

/// Probe backed by the SSL Labs API.
pub struct SslLabsProbe {
    http: reqwest::Client,
    api_url: String,
}

impl SslLabsProbe {
    /// Create a probe with the configured endpoint and fixed timeout.
    pub fn new(config: &SslConfig) -> Result<Self, StepError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("sitepulse/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn try_analyze(&self, url: &str, now: DateTime<Utc>) -> Result<SslAnalysis, StepError> {
        let host = host_from_url(url);
        info!("Requesting SSL Labs analysis for {}", host);

        let response = self
            .http
            .get(format!("{}/analyze", self.api_url))
            .query(&[("host", host.as_str()), ("all", "done")])
            .send()
            .await?
            .error_for_status()?;

        let labs: LabsResponse = response.json().await?;
        debug!("SSL Labs status: {}", labs.status);

        let headers = match self.fetch_security_headers(url).await {
            Ok(found) => found,
            Err(e) => {
                debug!("Security header probe failed: {}", e);
                HashMap::new()
            }
        };

        Ok(build_analysis(&labs, &headers, now))
    }

    /// Collect the checked security headers returned by the target.
    async fn fetch_security_headers(&self, url: &str) -> Result<HashMap<String, String>, StepError> {
        let response = self.http.head(url).send().await?;
        let mut found = HashMap::new();

        for (name, _) in SECURITY_HEADERS {
            if let Some(value) = response.headers().get(name) {
                let value = value.to_str().unwrap_or_default().to_string();
                found.insert(name.to_string(), value);
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl SslProbe for SslLabsProbe {
    async fn analyze(&self, url: &str) -> Result<SslAnalysis, StepError> {
        let now = Utc::now();
        match self.try_analyze(url, now).await {
            Ok(analysis) => Ok(analysis),
            Err(e) => {
                warn!("SSL analysis failed for {}: {}", url, e);
                Ok(fallback_analysis(now))
            }
        }
    }
}

/// Map an SSL Labs grade to a score.
pub fn grade_score(grade: &str) -> u32 {
    match grade {
        "A+" => 100,
        "A" => 90,
        "A-" => 85,
        "B" => 75,
        "C" => 65,
        "D" => 55,
        "E" => 45,
        "F" => 35,
        _ => 0,
    }
}

/// Result returned when the probe could not analyze the target.
pub fn fallback_analysis(now: DateTime<Utc>) -> SslAnalysis {
    let security_headers = SECURITY_HEADERS
        .iter()
        .map(|(name, _)| {
            (
                name.to_string(),
                SecurityHeader {
                    present: false,
                    value: None,
                    recommendation: None,
                },
            )
        })
        .collect();

    SslAnalysis {
        certificate: SslCertificate::unknown(now),
        security_score: 0,
        warnings: vec!["Could not analyze SSL certificate".to_string()],
        recommendations: vec!["Check if the site has a valid SSL certificate".to_string()],
        security_headers,
    }
}

fn millis_to_datetime(ms: i64, fallback: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or(fallback)
}

fn build_analysis(
    labs: &LabsResponse,
    found_headers: &HashMap<String, String>,
    now: DateTime<Utc>,
) -> SslAnalysis {
    let mut certificate = SslCertificate::unknown(now);
    let mut score = 0;
    let mut warnings = Vec::new();
    let mut recommendations = Vec::new();

    let ready_endpoint = if labs.status == "READY" {
        labs.endpoints.first()
    } else {
        None
    };

    if let Some(endpoint) = ready_endpoint {
        if let Some((details, cert)) = endpoint
            .details
            .as_ref()
            .and_then(|d| d.cert.as_ref().map(|c| (d, c)))
        {
            let valid_from = millis_to_datetime(cert.not_before, now);
            let valid_to = millis_to_datetime(cert.not_after, now);
            let days_until_expiry = (valid_to - now).num_days();
            let first_protocol = details.protocols.first();

            certificate = SslCertificate {
                issuer: cert
                    .issuer_subject
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
                valid_from,
                valid_to,
                protocol: first_protocol
                    .and_then(|p| p.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                key_exchange: cert.key_alg.clone().unwrap_or_else(|| "Unknown".to_string()),
                cipher: first_protocol
                    .and_then(|p| p.cipher.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                is_valid: now >= valid_from && now <= valid_to,
                days_until_expiry,
            };

            if !certificate.is_valid {
                warnings.push("SSL certificate is not valid".to_string());
            }
            if days_until_expiry < 0 {
                warnings.push("SSL certificate has expired".to_string());
            } else if days_until_expiry < EXPIRY_WARNING_DAYS {
                warnings.push("SSL certificate will expire soon".to_string());
                recommendations.push("Renew SSL certificate before expiration".to_string());
            }

            if details
                .protocols
                .iter()
                .any(|p| p.version.as_deref() == Some("1.1"))
            {
                warnings.push("Using outdated TLS v1.1 protocol".to_string());
                recommendations.push("Upgrade to TLS v1.2 or higher".to_string());
            }

            score = endpoint.grade.as_deref().map(grade_score).unwrap_or(0);
        }
    }

    let (security_headers, missing) = evaluate_headers(found_headers);
    for (name, recommendation) in SECURITY_HEADERS {
        if missing.contains(&name) {
            score = score.saturating_sub(MISSING_HEADER_PENALTY);
            recommendations.push(recommendation.to_string());
        }
    }

    SslAnalysis {
        certificate,
        security_score: score,
        warnings,
        recommendations,
        security_headers,
    }
}

/// Build the header map and list the names that were not returned.
fn evaluate_headers(
    found: &HashMap<String, String>,
) -> (BTreeMap<String, SecurityHeader>, Vec<&'static str>) {
    let mut headers = BTreeMap::new();
    let mut missing = Vec::new();

    for (name, recommendation) in SECURITY_HEADERS {
        let value = found
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone());

        let header = match value {
            Some(value) => SecurityHeader {
                present: true,
                value: Some(value),
                recommendation: None,
            },
            None => {
                missing.push(name);
                SecurityHeader {
                    present: false,
                    value: None,
                    recommendation: Some(recommendation.to_string()),
                }
            }
        };
        headers.insert(name.to_string(), header);
    }

    (headers, missing)
}

//! Step producers of the default analysis.
//!
//! Only the SSL step talks to the network. The others either wait for a
//! fixed delay or return static and randomized figures.

use super::{AnalysisPlan, PlannedStep, StepContext, StepOutput, StepProducer};
use crate::analysis::{analyze_diagnostics, generate_timeline};
use crate::config::AnalysisConfig;
use crate::content::ContentCatalog;
use crate::error::StepError;
use crate::models::{AnalysisMetrics, CoreWebVitals, Locale};
use crate::ssl::SslProbe;
use async_trait::async_trait;
use rand::Rng;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

/// Placeholder step that only waits.
pub struct DelayStep {
    delay: Duration,
}

impl DelayStep {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl StepProducer for DelayStep {
    fn name(&self) -> &'static str {
        "delay"
    }

    async fn produce(&self, _ctx: &StepContext) -> Result<StepOutput, StepError> {
        tokio::time::sleep(self.delay).await;
        Ok(StepOutput::None)
    }
}

/// Delegates to the SSL probe collaborator.
pub struct SslStep {
    probe: Arc<dyn SslProbe>,
}

impl SslStep {
    pub fn new(probe: Arc<dyn SslProbe>) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl StepProducer for SslStep {
    fn name(&self) -> &'static str {
        "ssl"
    }

    async fn produce(&self, ctx: &StepContext) -> Result<StepOutput, StepError> {
        let analysis = self.probe.analyze(&ctx.url).await?;
        Ok(StepOutput::Ssl(analysis))
    }
}

/// Reference metric series plus localized findings.
pub struct PerformanceStep {
    catalog: Arc<ContentCatalog>,
    locale: Locale,
}

impl PerformanceStep {
    pub fn new(catalog: Arc<ContentCatalog>, locale: Locale) -> Self {
        Self { catalog, locale }
    }
}

#[async_trait]
impl StepProducer for PerformanceStep {
    fn name(&self) -> &'static str {
        "performance"
    }

    async fn produce(&self, _ctx: &StepContext) -> Result<StepOutput, StepError> {
        let series = self.catalog.series();
        Ok(StepOutput::Metrics(AnalysisMetrics {
            lcp: series.lcp.clone(),
            fid: series.fid.clone(),
            cls: series.cls.clone(),
            ttfb: series.ttfb.clone(),
            findings: self.catalog.findings(self.locale).to_vec(),
        }))
    }
}

/// Randomized Core Web Vitals.
pub struct VitalsStep;

const FCP_RANGE_MS: RangeInclusive<u32> = 1000..=3000;
const LCP_RANGE_MS: RangeInclusive<u32> = 1500..=4500;
const TBT_RANGE_MS: RangeInclusive<u32> = 100..=500;

/// Draw FCP, LCP and TBT, both bounds included.
pub fn random_vitals<R: Rng>(rng: &mut R) -> CoreWebVitals {
    CoreWebVitals {
        fcp_ms: rng.gen_range(FCP_RANGE_MS),
        lcp_ms: rng.gen_range(LCP_RANGE_MS),
        tbt_ms: rng.gen_range(TBT_RANGE_MS),
    }
}

#[async_trait]
impl StepProducer for VitalsStep {
    fn name(&self) -> &'static str {
        "vitals"
    }

    async fn produce(&self, _ctx: &StepContext) -> Result<StepOutput, StepError> {
        Ok(StepOutput::Vitals(random_vitals(&mut rand::thread_rng())))
    }
}

/// Localized comments, mock loading timeline and its diagnostics.
pub struct FinalReportStep {
    catalog: Arc<ContentCatalog>,
    locale: Locale,
    delay: Duration,
}

impl FinalReportStep {
    pub fn new(catalog: Arc<ContentCatalog>, locale: Locale, delay: Duration) -> Self {
        Self {
            catalog,
            locale,
            delay,
        }
    }
}

#[async_trait]
impl StepProducer for FinalReportStep {
    fn name(&self) -> &'static str {
        "final-report"
    }

    async fn produce(&self, ctx: &StepContext) -> Result<StepOutput, StepError> {
        let comments = self.catalog.comments(self.locale).to_vec();
        let timeline = generate_timeline(&mut rand::thread_rng(), ctx.device);
        let diagnostics = analyze_diagnostics(&timeline, ctx.device);

        tokio::time::sleep(self.delay).await;

        Ok(StepOutput::Final {
            comments,
            diagnostics,
        })
    }
}

/// The six-step guided analysis, titles and text in one locale.
pub fn default_plan(
    config: &AnalysisConfig,
    catalog: Arc<ContentCatalog>,
    probe: Arc<dyn SslProbe>,
    locale: Locale,
) -> Result<AnalysisPlan, StepError> {
    let producers: Vec<Arc<dyn StepProducer>> = vec![
        Arc::new(DelayStep::new(config.dns_delay())),
        Arc::new(SslStep::new(probe)),
        Arc::new(DelayStep::new(config.headers_delay())),
        Arc::new(PerformanceStep::new(catalog.clone(), locale)),
        Arc::new(VitalsStep),
        Arc::new(FinalReportStep::new(
            catalog.clone(),
            locale,
            config.report_delay(),
        )),
    ];

    let steps = catalog.initial_steps(locale);
    if steps.len() != producers.len() {
        return Err(StepError::Other(format!(
            "expected {} step titles for '{}', found {}",
            producers.len(),
            locale,
            steps.len()
        )));
    }

    Ok(AnalysisPlan {
        locale,
        steps: steps
            .into_iter()
            .zip(producers)
            .map(|(step, producer)| PlannedStep::new(step, producer))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeviceType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ctx(device: DeviceType) -> StepContext {
        StepContext {
            url: "https://example.com".to_string(),
            device,
        }
    }

    #[test]
    fn test_random_vitals_in_range() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let vitals = random_vitals(&mut rng);
            assert!(FCP_RANGE_MS.contains(&vitals.fcp_ms));
            assert!(LCP_RANGE_MS.contains(&vitals.lcp_ms));
            assert!(TBT_RANGE_MS.contains(&vitals.tbt_ms));
        }
    }

    #[test]
    fn test_random_vitals_reach_both_bounds() {
        let mut rng = StdRng::seed_from_u64(23);
        let draws: Vec<u32> = (0..5000).map(|_| random_vitals(&mut rng).tbt_ms).collect();

        assert!(draws.contains(&100));
        assert!(draws.contains(&500));
    }

    #[tokio::test]
    async fn test_performance_step_uses_locale_findings() {
        let catalog = Arc::new(ContentCatalog::builtin().unwrap());
        let step = PerformanceStep::new(catalog.clone(), Locale::Tr);

        let output = step.produce(&ctx(DeviceType::Desktop)).await.unwrap();

        match output {
            StepOutput::Metrics(metrics) => {
                assert_eq!(metrics.lcp.len(), 5);
                assert_eq!(metrics.findings, catalog.findings(Locale::Tr).to_vec());
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_report_waits_for_its_delay() {
        let catalog = Arc::new(ContentCatalog::builtin().unwrap());
        let step = FinalReportStep::new(catalog, Locale::En, Duration::from_millis(1000));
        let started = tokio::time::Instant::now();

        let output = step.produce(&ctx(DeviceType::Mobile)).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(1000));
        match output {
            StepOutput::Final {
                comments,
                diagnostics,
            } => {
                assert_eq!(comments.len(), 5);
                assert_eq!(diagnostics.device, DeviceType::Mobile);
                assert_eq!(diagnostics.steps.len(), 5);
                assert!(diagnostics.details.security.len() >= 3);
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[test]
    fn test_default_plan_has_six_steps() {
        let catalog = Arc::new(ContentCatalog::builtin().unwrap());
        let probe: Arc<dyn SslProbe> = Arc::new(
            crate::ssl::SslLabsProbe::new(&crate::config::SslConfig::default()).unwrap(),
        );
        let plan = default_plan(&AnalysisConfig::default(), catalog, probe, Locale::En).unwrap();

        assert_eq!(plan.locale, Locale::En);
        let names: Vec<_> = plan.steps.iter().map(|p| p.producer.name()).collect();
        assert_eq!(
            names,
            vec!["delay", "ssl", "delay", "performance", "vitals", "final-report"]
        );
        assert_eq!(plan.steps[1].step.name, "SSL Certificate Check");
    }
}

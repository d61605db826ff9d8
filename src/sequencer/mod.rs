//! Analysis sequencer.
//!
//! Drives an ordered list of steps through `Pending -> InProgress ->
//! Completed | Error`, calling one producer per step and folding its
//! output into the run's [`Report`]. The full step list is published after
//! every single transition. The first failing step aborts the run.
//!
//! Every run takes a token from a shared [`RunTracker`]. Once a newer run
//! has started, an older one stops publishing and gives up its report.

pub mod producers;

pub use producers::default_plan;

use crate::analysis::performance_score;
use crate::error::StepError;
use crate::models::{
    AnalysisComment, AnalysisMetrics, CoreWebVitals, DeviceType, DiagnosticReport, Locale, Report,
    ReportMetadata, SslAnalysis, Step, StepStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

/// Inputs shared by every producer of a run.
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Normalized URL, scheme included.
    pub url: String,
    pub device: DeviceType,
}

/// What a producer contributes to the report.
#[derive(Debug, Clone)]
pub enum StepOutput {
    /// Placeholder steps produce nothing.
    None,
    Ssl(SslAnalysis),
    Metrics(AnalysisMetrics),
    Vitals(CoreWebVitals),
    Final {
        comments: Vec<AnalysisComment>,
        diagnostics: DiagnosticReport,
    },
}

impl StepOutput {
    /// Store this output into the report.
    pub fn apply(self, report: &mut Report) {
        match self {
            StepOutput::None => {}
            StepOutput::Ssl(ssl) => report.ssl = Some(ssl),
            StepOutput::Metrics(metrics) => report.metrics = Some(metrics),
            StepOutput::Vitals(vitals) => {
                report.performance_score = Some(performance_score(&vitals));
                report.vitals = Some(vitals);
            }
            StepOutput::Final {
                comments,
                diagnostics,
            } => {
                report.comments = comments;
                report.diagnostics = Some(diagnostics);
            }
        }
    }
}

/// Produces the output of one step.
#[async_trait]
pub trait StepProducer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn produce(&self, ctx: &StepContext) -> Result<StepOutput, StepError>;
}

/// A step together with the producer that runs it.
#[derive(Clone)]
pub struct PlannedStep {
    pub step: Step,
    pub producer: Arc<dyn StepProducer>,
}

impl PlannedStep {
    pub fn new(step: Step, producer: Arc<dyn StepProducer>) -> Self {
        Self { step, producer }
    }
}

/// Ordered steps of one analysis, all written in a single locale.
///
/// Producers that emit localized text are built for the same locale as the
/// step titles, so a run can never mix languages.
#[derive(Clone)]
pub struct AnalysisPlan {
    pub locale: Locale,
    pub steps: Vec<PlannedStep>,
}

/// Hands out monotonic run tokens and knows which one is the latest.
#[derive(Debug, Default)]
pub struct RunTracker {
    latest: AtomicU64,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run, superseding any earlier one.
    pub fn begin(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == token
    }
}

/// Progress published while a run advances.
#[derive(Debug, Clone, PartialEq)]
pub enum SequencerEvent {
    /// Snapshot of the whole step list after a transition.
    StepsUpdated { token: u64, steps: Vec<Step> },
    /// A producer failed; the run stops after this.
    StepFailed {
        token: u64,
        step_id: String,
        message: String,
    },
    RunFinished { token: u64, completed: bool },
}

impl SequencerEvent {
    pub fn token(&self) -> u64 {
        match self {
            SequencerEvent::StepsUpdated { token, .. }
            | SequencerEvent::StepFailed { token, .. }
            | SequencerEvent::RunFinished { token, .. } => *token,
        }
    }
}

/// Result of [`Sequencer::run`].
#[derive(Debug)]
pub enum RunOutcome {
    /// The run reached its end, successfully or not.
    Finished(Report),
    /// A newer run started while this one was in flight.
    Superseded { token: u64 },
}

/// Runs a fixed plan of steps.
pub struct Sequencer {
    plan: AnalysisPlan,
    tracker: Arc<RunTracker>,
}

impl Sequencer {
    pub fn new(plan: AnalysisPlan, tracker: Arc<RunTracker>) -> Self {
        Self { plan, tracker }
    }

    /// Fresh step list with every status reset to `Pending`.
    pub fn initial_steps(&self) -> Vec<Step> {
        self.plan
            .steps
            .iter()
            .map(|p| p.step.with_status(StepStatus::Pending))
            .collect()
    }

    /// Run every step in order.
    pub async fn run(
        &self,
        ctx: &StepContext,
        events: &UnboundedSender<SequencerEvent>,
    ) -> RunOutcome {
        let token = self.tracker.begin();
        let started = Instant::now();
        info!(
            "Starting run {} for {} ({}, {})",
            token, ctx.url, ctx.device, self.plan.locale
        );

        let mut report = Report::new(ReportMetadata {
            url: ctx.url.clone(),
            device: ctx.device,
            locale: self.plan.locale,
            analysis_date: Utc::now(),
            run_token: token,
            duration_seconds: 0.0,
        });
        let mut steps = self.initial_steps();

        if !self.publish(token, &steps, events) {
            return RunOutcome::Superseded { token };
        }

        for (index, planned) in self.plan.steps.iter().enumerate() {
            steps[index].status = StepStatus::InProgress;
            if !self.publish(token, &steps, events) {
                return RunOutcome::Superseded { token };
            }

            debug!("Step {} ({}) started", steps[index].id, planned.producer.name());
            let result = planned.producer.produce(ctx).await;

            if !self.tracker.is_current(token) {
                debug!("Run {} superseded during step {}", token, steps[index].id);
                return RunOutcome::Superseded { token };
            }

            match result {
                Ok(output) => {
                    output.apply(&mut report);
                    steps[index].status = StepStatus::Completed;
                    self.publish(token, &steps, events);
                }
                Err(e) => {
                    let step = &mut steps[index];
                    step.status = StepStatus::Error;
                    error!("Step '{}' failed: {}", step.name, e);

                    report.failed_step = Some(step.id.clone());
                    report.error = Some(e.to_string());

                    let step_id = step.id.clone();
                    self.publish(token, &steps, events);
                    let _ = events.send(SequencerEvent::StepFailed {
                        token,
                        step_id,
                        message: e.to_string(),
                    });
                    break;
                }
            }
        }

        report.completed = report.failed_step.is_none();
        report.steps = steps;
        report.metadata.duration_seconds = started.elapsed().as_secs_f64();

        info!(
            "Run {} finished: {}/{} steps completed",
            token,
            report.completed_steps(),
            report.steps.len()
        );
        let _ = events.send(SequencerEvent::RunFinished {
            token,
            completed: report.completed,
        });

        RunOutcome::Finished(report)
    }

    /// Send a snapshot unless the run has been superseded.
    fn publish(
        &self,
        token: u64,
        steps: &[Step],
        events: &UnboundedSender<SequencerEvent>,
    ) -> bool {
        if !self.tracker.is_current(token) {
            return false;
        }
        // A closed receiver only means nobody is watching.
        let _ = events.send(SequencerEvent::StepsUpdated {
            token,
            steps: steps.to_vec(),
        });
        true
    }
}

/// Holds the report of the latest run only.
pub struct ReportSlot {
    tracker: Arc<RunTracker>,
    current: Mutex<Option<Report>>,
}

impl ReportSlot {
    pub fn new(tracker: Arc<RunTracker>) -> Self {
        Self {
            tracker,
            current: Mutex::new(None),
        }
    }

    /// Store a report if it belongs to the latest run.
    pub fn offer(&self, report: Report) -> bool {
        let token = report.metadata.run_token;
        if !self.tracker.is_current(token) {
            debug!("Discarding report of stale run {}", token);
            return false;
        }

        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if current
            .as_ref()
            .is_some_and(|existing| existing.metadata.run_token > token)
        {
            return false;
        }
        *current = Some(report);
        true
    }

    pub fn take(&self) -> Option<Report> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentCatalog;
    use crate::ssl::SslProbe;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    struct Succeed;

    #[async_trait]
    impl StepProducer for Succeed {
        fn name(&self) -> &'static str {
            "succeed"
        }

        async fn produce(&self, _ctx: &StepContext) -> Result<StepOutput, StepError> {
            Ok(StepOutput::None)
        }
    }

    struct Fail;

    #[async_trait]
    impl StepProducer for Fail {
        fn name(&self) -> &'static str {
            "fail"
        }

        async fn produce(&self, _ctx: &StepContext) -> Result<StepOutput, StepError> {
            Err(StepError::Other("boom".to_string()))
        }
    }

    /// Counts how often it was invoked.
    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl StepProducer for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn produce(&self, _ctx: &StepContext) -> Result<StepOutput, StepError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(StepOutput::None)
        }
    }

    /// Starts a newer run while producing.
    struct Resubmit(Arc<RunTracker>);

    #[async_trait]
    impl StepProducer for Resubmit {
        fn name(&self) -> &'static str {
            "resubmit"
        }

        async fn produce(&self, _ctx: &StepContext) -> Result<StepOutput, StepError> {
            self.0.begin();
            Ok(StepOutput::None)
        }
    }

    struct BrokenProbe;

    #[async_trait]
    impl SslProbe for BrokenProbe {
        async fn analyze(&self, _url: &str) -> Result<SslAnalysis, StepError> {
            Err(StepError::Other("probe unavailable".to_string()))
        }
    }

    struct FixedProbe;

    #[async_trait]
    impl SslProbe for FixedProbe {
        async fn analyze(&self, _url: &str) -> Result<SslAnalysis, StepError> {
            Ok(crate::ssl::fallback_analysis(Utc::now()))
        }
    }

    fn ctx() -> StepContext {
        StepContext {
            url: "https://example.com".to_string(),
            device: DeviceType::Desktop,
        }
    }

    fn shared<P: StepProducer + 'static>(producer: P) -> Arc<dyn StepProducer> {
        Arc::new(producer)
    }

    fn plan(producers: Vec<Arc<dyn StepProducer>>) -> AnalysisPlan {
        let steps = producers
            .into_iter()
            .enumerate()
            .map(|(i, producer)| {
                let id = (i + 1).to_string();
                PlannedStep::new(Step::pending(id.clone(), format!("Step {}", id), ""), producer)
            })
            .collect();
        AnalysisPlan {
            locale: Locale::En,
            steps,
        }
    }

    fn drain(rx: &mut UnboundedReceiver<SequencerEvent>) -> Vec<SequencerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn snapshots(events: &[SequencerEvent]) -> Vec<Vec<Step>> {
        events
            .iter()
            .filter_map(|e| match e {
                SequencerEvent::StepsUpdated { steps, .. } => Some(steps.clone()),
                _ => None,
            })
            .collect()
    }

    fn statuses(steps: &[Step]) -> Vec<StepStatus> {
        steps.iter().map(|s| s.status).collect()
    }

    fn finished(outcome: RunOutcome) -> Report {
        match outcome {
            RunOutcome::Finished(report) => report,
            RunOutcome::Superseded { token } => panic!("run {} was superseded", token),
        }
    }

    #[tokio::test]
    async fn test_successful_run_completes_every_step_in_order() {
        let sequencer = Sequencer::new(
            plan(vec![shared(Succeed), shared(Succeed), shared(Succeed)]),
            Arc::new(RunTracker::new()),
        );
        let (tx, mut rx) = unbounded_channel();

        let report = finished(sequencer.run(&ctx(), &tx).await);

        assert!(report.completed);
        assert!(report.failed_step.is_none());
        let ids: Vec<_> = report.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(report.steps.iter().all(|s| s.status == StepStatus::Completed));

        let events = drain(&mut rx);
        // initial snapshot + two transitions per step + finish
        assert_eq!(events.len(), 1 + 2 * 3 + 1);
        assert_eq!(
            events.last(),
            Some(&SequencerEvent::RunFinished {
                token: 1,
                completed: true
            })
        );
    }

    #[tokio::test]
    async fn test_at_most_one_step_in_progress() {
        let sequencer = Sequencer::new(
            plan(vec![shared(Succeed), shared(Succeed), shared(Fail), shared(Succeed)]),
            Arc::new(RunTracker::new()),
        );
        let (tx, mut rx) = unbounded_channel();
        sequencer.run(&ctx(), &tx).await;

        for snapshot in snapshots(&drain(&mut rx)) {
            let running = snapshot
                .iter()
                .position(|s| s.status == StepStatus::InProgress);
            assert!(snapshot.iter().filter(|s| s.status == StepStatus::InProgress).count() <= 1);
            if let Some(pos) = running {
                assert!(snapshot[..pos].iter().all(|s| s.status == StepStatus::Completed));
                assert!(snapshot[pos + 1..].iter().all(|s| s.status == StepStatus::Pending));
            }
        }
    }

    #[tokio::test]
    async fn test_failure_stops_the_sequence() {
        let later = Arc::new(Counting::default());
        let sequencer = Sequencer::new(
            plan(vec![
                shared(Succeed),
                shared(Succeed),
                shared(Fail),
                later.clone() as Arc<dyn StepProducer>,
                later.clone() as Arc<dyn StepProducer>,
            ]),
            Arc::new(RunTracker::new()),
        );
        let (tx, mut rx) = unbounded_channel();

        let report = finished(sequencer.run(&ctx(), &tx).await);

        assert!(!report.completed);
        assert_eq!(report.failed_step.as_deref(), Some("3"));
        assert_eq!(report.error.as_deref(), Some("boom"));
        assert_eq!(
            statuses(&report.steps),
            vec![
                StepStatus::Completed,
                StepStatus::Completed,
                StepStatus::Error,
                StepStatus::Pending,
                StepStatus::Pending,
            ]
        );
        assert_eq!(later.0.load(Ordering::SeqCst), 0);

        let events = drain(&mut rx);
        assert!(events.contains(&SequencerEvent::StepFailed {
            token: 1,
            step_id: "3".to_string(),
            message: "boom".to_string(),
        }));
        let last_snapshot = snapshots(&events).pop().unwrap();
        assert_eq!(last_snapshot[2].status, StepStatus::Error);
    }

    #[tokio::test]
    async fn test_rerun_resets_statuses_first() {
        let sequencer = Sequencer::new(
            plan(vec![shared(Succeed), shared(Fail)]),
            Arc::new(RunTracker::new()),
        );
        let (tx, mut rx) = unbounded_channel();

        sequencer.run(&ctx(), &tx).await;
        drain(&mut rx);
        let report = finished(sequencer.run(&ctx(), &tx).await);

        let events = drain(&mut rx);
        let first = snapshots(&events).remove(0);
        assert!(first.iter().all(|s| s.status == StepStatus::Pending));
        assert!(events.iter().all(|e| e.token() == 2));
        assert_eq!(report.metadata.run_token, 2);
    }

    #[tokio::test]
    async fn test_superseded_run_stops_publishing() {
        let tracker = Arc::new(RunTracker::new());
        let later = Arc::new(Counting::default());
        let sequencer = Sequencer::new(
            plan(vec![
                shared(Succeed),
                shared(Resubmit(tracker.clone())),
                later.clone() as Arc<dyn StepProducer>,
            ]),
            tracker.clone(),
        );
        let (tx, mut rx) = unbounded_channel();

        let outcome = sequencer.run(&ctx(), &tx).await;

        assert!(matches!(outcome, RunOutcome::Superseded { token: 1 }));
        assert_eq!(later.0.load(Ordering::SeqCst), 0);
        let events = drain(&mut rx);
        assert!(!events
            .iter()
            .any(|e| matches!(e, SequencerEvent::RunFinished { .. })));
        let last_snapshot = snapshots(&events).pop().unwrap();
        assert_eq!(last_snapshot[1].status, StepStatus::InProgress);
    }

    #[tokio::test]
    async fn test_report_slot_rejects_stale_tokens() {
        let tracker = Arc::new(RunTracker::new());
        let slot = ReportSlot::new(tracker.clone());
        let sequencer = Sequencer::new(plan(vec![shared(Succeed)]), tracker.clone());
        let (tx, _rx) = unbounded_channel();

        let first = finished(sequencer.run(&ctx(), &tx).await);
        let second = finished(sequencer.run(&ctx(), &tx).await);

        assert!(!slot.offer(first));
        assert!(slot.offer(second));
        assert_eq!(slot.take().map(|r| r.metadata.run_token), Some(2));
        assert!(slot.take().is_none());
    }

    #[tokio::test]
    async fn test_failing_ssl_probe_fails_ssl_step() {
        let catalog = Arc::new(ContentCatalog::builtin().unwrap());
        let config = crate::config::AnalysisConfig {
            dns_delay_ms: 0,
            headers_delay_ms: 0,
            report_delay_ms: 0,
        };
        let plan = default_plan(&config, catalog, Arc::new(BrokenProbe), Locale::En).unwrap();
        let sequencer = Sequencer::new(plan, Arc::new(RunTracker::new()));
        let (tx, _rx) = unbounded_channel();

        let report = finished(sequencer.run(&ctx(), &tx).await);

        assert_eq!(report.failed_step.as_deref(), Some("2"));
        assert_eq!(report.steps[0].status, StepStatus::Completed);
        assert_eq!(report.steps[1].status, StepStatus::Error);
        assert!(report.steps[2..]
            .iter()
            .all(|s| s.status == StepStatus::Pending));
        assert!(report.ssl.is_none());
        assert!(report.metrics.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_plan_fills_the_report() {
        let catalog = Arc::new(ContentCatalog::builtin().unwrap());
        let config = crate::config::AnalysisConfig::default();
        let plan = default_plan(&config, catalog.clone(), Arc::new(FixedProbe), Locale::Tr)
            .unwrap();
        let sequencer = Sequencer::new(plan, Arc::new(RunTracker::new()));
        let (tx, _rx) = unbounded_channel();

        let report = finished(sequencer.run(&ctx(), &tx).await);

        assert!(report.completed);
        assert_eq!(report.metadata.locale, Locale::Tr);
        assert_eq!(report.steps.len(), 6);
        assert_eq!(report.steps[0].name, "DNS Sorgusu");
        assert!(report.ssl.is_some());
        assert!(report.vitals.is_some());
        assert!(report.performance_score.is_some_and(|s| s <= 100));
        assert!(report.diagnostics.is_some());

        // Titles, findings and comments all come from the Turkish table.
        let metrics = report.metrics.as_ref().unwrap();
        assert_eq!(metrics.findings, catalog.findings(Locale::Tr).to_vec());
        assert_eq!(report.comments, catalog.comments(Locale::Tr).to_vec());
        assert_eq!(report.comments.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_english_plan_never_mixes_in_other_locales() {
        let catalog = Arc::new(ContentCatalog::builtin().unwrap());
        let config = crate::config::AnalysisConfig::default();
        let plan = default_plan(&config, catalog.clone(), Arc::new(FixedProbe), Locale::En)
            .unwrap();
        let sequencer = Sequencer::new(plan, Arc::new(RunTracker::new()));
        let (tx, _rx) = unbounded_channel();

        let report = finished(sequencer.run(&ctx(), &tx).await);

        assert_eq!(report.metadata.locale, Locale::En);
        assert_eq!(report.steps[0].name, catalog.initial_steps(Locale::En)[0].name);
        assert_eq!(report.comments, catalog.comments(Locale::En).to_vec());
    }
}

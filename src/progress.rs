//! Live step progress on the terminal.
//!
//! Consumes sequencer events and shows one spinner per running step.

use crate::models::{Step, StepStatus};
use crate::sequencer::SequencerEvent;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// A step whose status changed between two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub step: Step,
    pub from: StepStatus,
}

/// Diff two snapshots of the same run.
pub fn transitions(previous: &[Step], current: &[Step]) -> Vec<Transition> {
    current
        .iter()
        .filter_map(|step| {
            let from = previous
                .iter()
                .find(|p| p.id == step.id)
                .map(|p| p.status)
                .unwrap_or(StepStatus::Pending);
            (from != step.status).then(|| Transition {
                step: step.clone(),
                from,
            })
        })
        .collect()
}

fn spinner(step: &Step) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("{} - {}", step.name, step.description));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Spawn a task rendering progress until the run finishes or the
/// sender is dropped.
pub fn spawn_progress(mut events: UnboundedReceiver<SequencerEvent>, show: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut token = 0;
        let mut previous: Vec<Step> = Vec::new();
        let mut active: Option<ProgressBar> = None;

        while let Some(event) = events.recv().await {
            if event.token() < token {
                continue;
            }
            if event.token() > token {
                token = event.token();
                previous.clear();
                if let Some(pb) = active.take() {
                    pb.finish_and_clear();
                }
            }

            match event {
                SequencerEvent::StepsUpdated { steps, .. } => {
                    for change in transitions(&previous, &steps) {
                        match change.step.status {
                            StepStatus::InProgress if show => {
                                active = Some(spinner(&change.step));
                            }
                            StepStatus::Completed | StepStatus::Error => {
                                let message = format!(
                                    "{} {}",
                                    change.step.status.marker(),
                                    change.step.name
                                );
                                match active.take() {
                                    Some(pb) => pb.finish_with_message(message),
                                    None if show => println!("{}", message),
                                    None => {}
                                }
                            }
                            _ => {}
                        }
                    }
                    previous = steps;
                }
                SequencerEvent::StepFailed { message, .. } => {
                    if show {
                        eprintln!("   {}", message);
                    }
                }
                SequencerEvent::RunFinished { .. } => break,
            }
        }
    })
}

//! Mock page-loading timeline.
//!
//! Nothing is measured: every phase gets a random duration drawn from a
//! per-phase range, stretched on mobile to reflect the slower network.

use crate::models::{DeviceType, LoadingStatus, LoadingStep};
use rand::Rng;
use std::ops::Range;

/// Phases of a page load, in order, with their duration range on desktop.
const PHASES: [(&str, &str, Range<u64>); 5] = [
    ("dns", "DNS Lookup", 20..1200),
    ("server", "Initial Server Response", 100..1400),
    ("ssl", "SSL Handshake", 50..1100),
    ("download", "Content Download", 200..1600),
    ("render", "Page Rendering", 200..1000),
];

/// Phases above this duration are flagged as warnings.
const WARNING_MS: u64 = 1000;

fn device_factor(device: DeviceType) -> f64 {
    match device {
        DeviceType::Desktop => 1.0,
        DeviceType::Mobile => 1.5,
    }
}

/// Generate a sequential loading timeline for a device.
pub fn generate_timeline<R: Rng>(rng: &mut R, device: DeviceType) -> Vec<LoadingStep> {
    let factor = device_factor(device);
    let mut start_ms = 0;

    PHASES
        .iter()
        .map(|(id, name, range)| {
            let base = rng.gen_range(range.clone());
            let duration_ms = (base as f64 * factor).round() as u64;
            let status = if duration_ms > WARNING_MS {
                LoadingStatus::Warning
            } else {
                LoadingStatus::Completed
            };

            let step = LoadingStep {
                id: id.to_string(),
                name: name.to_string(),
                start_ms,
                duration_ms,
                status,
            };
            start_ms += duration_ms;
            step
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_timeline_is_sequential() {
        let mut rng = StdRng::seed_from_u64(7);
        let steps = generate_timeline(&mut rng, DeviceType::Desktop);

        assert_eq!(steps.len(), 5);
        assert_eq!(steps[0].start_ms, 0);
        for pair in steps.windows(2) {
            assert_eq!(pair[1].start_ms, pair[0].start_ms + pair[0].duration_ms);
        }
        assert_eq!(steps[4].name, "Page Rendering");
    }

    #[test]
    fn test_durations_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            for (step, (_, _, range)) in generate_timeline(&mut rng, DeviceType::Desktop)
                .iter()
                .zip(PHASES.iter())
            {
                assert!(range.contains(&step.duration_ms));
                assert_eq!(
                    step.status == LoadingStatus::Warning,
                    step.duration_ms > WARNING_MS
                );
            }
        }
    }

    #[test]
    fn test_phase_serializes_only_measured_fields() {
        let steps = generate_timeline(&mut StdRng::seed_from_u64(5), DeviceType::Desktop);
        let json = serde_json::to_value(&steps[0]).unwrap();

        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["duration_ms", "id", "name", "start_ms", "status"]);
    }

    #[test]
    fn test_mobile_is_slower() {
        let desktop = generate_timeline(&mut StdRng::seed_from_u64(3), DeviceType::Desktop);
        let mobile = generate_timeline(&mut StdRng::seed_from_u64(3), DeviceType::Mobile);
        let total = |steps: &[LoadingStep]| steps.iter().map(|s| s.duration_ms).sum::<u64>();
        assert!(total(&mobile) > total(&desktop));
    }
}

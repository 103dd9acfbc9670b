//! Parcel lifecycle state machine
//!
//! Produces one ordered status history per entity. Every history starts with
//! Picked Up at the window start; delivering entities end with exactly one
//! Delivered event. Each step lands at most one day after the previous one
//! and never at or after the window end.

use crate::error::{GenerateError, Result};
use chrono::Duration;
use parcelsim_core::{Status, StatusChange, Timestamp};
use rand::Rng;
use serde::{Deserialize, Serialize};

const SPREAD: &[Status] = &[Status::InTransit, Status::InDepot, Status::OutForDelivery];
const IN_TRANSIT_NEXT: &[Status] = &[Status::InTransit, Status::InDepot];

/// Tunable lifecycle probabilities and event-count bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleParams {
    /// Probability that an entity is eventually delivered
    pub p_deliver: f64,
    /// Probability of an attempted delivery after Out for Delivery
    pub p_attempted: f64,
    /// Inclusive bounds on the total number of events
    pub min_events: u32,
    pub max_events: u32,
}

impl Default for LifecycleParams {
    fn default() -> Self {
        Self {
            p_deliver: 0.95,
            p_attempted: 0.10,
            min_events: 2,
            max_events: 20,
        }
    }
}

impl LifecycleParams {
    pub fn validate(&self) -> Result<()> {
        for (name, p) in [("p_deliver", self.p_deliver), ("p_attempted", self.p_attempted)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(GenerateError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }
        if self.min_events < 2 || self.min_events > self.max_events {
            return Err(GenerateError::InvalidConfig(format!(
                "event bounds must satisfy 2 <= min <= max, got {}..={}",
                self.min_events, self.max_events
            )));
        }
        Ok(())
    }
}

/// Lifecycle transition table
pub struct Transition;

impl Transition {
    /// Whether `to` may directly follow `from` in a history
    pub fn is_legal(from: Status, to: Status) -> bool {
        use Status::*;
        match (from, to) {
            (Delivered, _) => false,
            (_, Delivered) => true,
            (PickedUp, InTransit) => true,
            (InTransit, InTransit | InDepot) => true,
            (InDepot, InTransit | InDepot | OutForDelivery) => true,
            (OutForDelivery, InTransit | InDepot | OutForDelivery | AttemptedDelivery) => true,
            (AttemptedDelivery, OutForDelivery) => true,
            _ => false,
        }
    }

    /// Draw the intermediate status that follows `current`
    fn next<R: Rng + ?Sized>(rng: &mut R, current: Status, p_attempted: f64) -> Status {
        match current {
            Status::PickedUp => Status::InTransit,
            Status::InTransit => pick(rng, IN_TRANSIT_NEXT),
            Status::OutForDelivery if rng.gen_bool(p_attempted) => Status::AttemptedDelivery,
            Status::AttemptedDelivery => Status::OutForDelivery,
            // Delivered is only ever appended last
            Status::InDepot | Status::OutForDelivery | Status::Delivered => pick(rng, SPREAD),
        }
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, items: &[Status]) -> Status {
    items[rng.gen_range(0..items.len())]
}

/// Uniform second-granular instant in `[from, to)`. Returns `from` when the
/// span is shorter than one second.
pub fn random_instant<R: Rng + ?Sized>(rng: &mut R, from: Timestamp, to: Timestamp) -> Timestamp {
    let span = (to - from).num_seconds();
    if span < 1 {
        return from;
    }
    from + Duration::seconds(rng.gen_range(0..span))
}

/// Lifecycle generator
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    params: LifecycleParams,
}

impl Lifecycle {
    /// Create a new lifecycle generator
    pub fn new(params: LifecycleParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &LifecycleParams {
        &self.params
    }

    /// Generate one entity's history within `[window_start, window_end)`
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        window_start: Timestamp,
        window_end: Timestamp,
    ) -> Vec<StatusChange> {
        let will_deliver = rng.gen_bool(self.params.p_deliver);
        let total = rng.gen_range(self.params.min_events..=self.params.max_events);
        let intermediates = total - 1 - u32::from(will_deliver);

        let mut history = Vec::with_capacity(total as usize);
        let mut status = Status::PickedUp;
        let mut at = window_start;
        history.push(StatusChange::new(status, at));

        for _ in 0..intermediates {
            status = Transition::next(rng, status, self.params.p_attempted);
            at = self.step(rng, at, window_end);
            history.push(StatusChange::new(status, at));
        }

        if will_deliver {
            at = self.step(rng, at, window_end);
            history.push(StatusChange::new(Status::Delivered, at));
        }

        history
    }

    fn step<R: Rng + ?Sized>(&self, rng: &mut R, current: Timestamp, window_end: Timestamp) -> Timestamp {
        let ceiling = (current + Duration::days(1)).min(window_end);
        random_instant(rng, current, ceiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rand::thread_rng;

    fn window() -> (Timestamp, Timestamp) {
        (
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 8, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_history_structure() {
        let mut rng = thread_rng();
        let (start, end) = window();
        let lifecycle = Lifecycle::default();

        for _ in 0..2_000 {
            let history = lifecycle.generate(&mut rng, start, end);
            assert!((2..=20).contains(&history.len()));
            assert_eq!(history[0].status, Status::PickedUp);
            assert_eq!(history[0].at, start);

            for pair in history.windows(2) {
                assert!(pair[0].at <= pair[1].at);
                assert!(
                    Transition::is_legal(pair[0].status, pair[1].status),
                    "{} -> {}",
                    pair[0].status,
                    pair[1].status
                );
            }

            let delivered = history.iter().filter(|c| c.status == Status::Delivered).count();
            assert!(delivered <= 1);
            if delivered == 1 {
                assert_eq!(history.last().map(|c| c.status), Some(Status::Delivered));
            }
            assert!(history.iter().all(|c| c.at >= start && c.at < end));
        }
    }

    #[test]
    fn test_delivery_rate_near_configured() {
        let mut rng = thread_rng();
        let (start, end) = window();
        let lifecycle = Lifecycle::default();

        let n = 10_000;
        let delivered = (0..n)
            .filter(|_| {
                lifecycle
                    .generate(&mut rng, start, end)
                    .last()
                    .map(|c| c.status == Status::Delivered)
                    .unwrap_or(false)
            })
            .count();
        let rate = delivered as f64 / n as f64;
        assert!(rate > 0.92 && rate < 0.98, "delivery rate {}", rate);
    }

    #[test]
    fn test_never_delivering() {
        let mut rng = thread_rng();
        let (start, end) = window();
        let lifecycle = Lifecycle::new(LifecycleParams {
            p_deliver: 0.0,
            ..Default::default()
        })
        .unwrap();

        for _ in 0..500 {
            let history = lifecycle.generate(&mut rng, start, end);
            assert!(history.iter().all(|c| c.status != Status::Delivered));
            assert_eq!(history[1].status, Status::InTransit);
        }
    }

    #[test]
    fn test_degenerate_window_pins_time() {
        let mut rng = thread_rng();
        let (start, _) = window();
        let history = Lifecycle::default().generate(&mut rng, start, start);
        assert!(history.iter().all(|c| c.at == start));
    }

    #[test]
    fn test_transition_table() {
        assert!(Transition::is_legal(Status::PickedUp, Status::InTransit));
        assert!(Transition::is_legal(Status::PickedUp, Status::Delivered));
        assert!(!Transition::is_legal(Status::PickedUp, Status::InDepot));
        assert!(!Transition::is_legal(Status::InTransit, Status::OutForDelivery));
        assert!(Transition::is_legal(Status::OutForDelivery, Status::AttemptedDelivery));
        assert!(!Transition::is_legal(Status::AttemptedDelivery, Status::InDepot));
        assert!(!Transition::is_legal(Status::Delivered, Status::Delivered));
        assert!(!Transition::is_legal(Status::Delivered, Status::InTransit));
    }

    #[test]
    fn test_params_validation() {
        assert!(LifecycleParams::default().validate().is_ok());
        let bad = LifecycleParams {
            min_events: 5,
            max_events: 3,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(GenerateError::InvalidConfig(_))));
        let bad = LifecycleParams {
            p_deliver: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_random_instant_bounds() {
        let mut rng = thread_rng();
        let (start, end) = window();
        for _ in 0..1_000 {
            let t = random_instant(&mut rng, start, end);
            assert!(t >= start && t < end);
            assert_eq!(t.timestamp_subsec_nanos(), 0);
        }
    }
}

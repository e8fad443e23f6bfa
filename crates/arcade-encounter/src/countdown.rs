//! Countdown driver for the active encounter.
//!
//! A driver is bound to the epoch that was active when it was spawned. It
//! ticks once per second, publishes the remaining whole seconds and, when the
//! clock runs out, fires exactly one `timeout_if_current`. Dropping a driver
//! cancels its task.

use std::sync::Arc;
use std::time::Duration;

use arcade_protocol::EncounterStatus;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use crate::handle::EncounterHandle;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

const CRITICAL_THRESHOLD_SECS: u64 = 120;
const WARNING_THRESHOLD_SECS: u64 = 300;

#[derive(Debug)]
pub struct CountdownDriver {
    epoch: u64,
    remaining: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl CountdownDriver {
    /// Returns `None` when there is no active encounter to count down.
    pub fn spawn(handle: EncounterHandle) -> Option<Self> {
        let (sender, _) = watch::channel(handle.remaining_secs());
        Self::spawn_publishing(handle, Arc::new(sender))
    }

    pub(crate) fn spawn_publishing(
        handle: EncounterHandle,
        remaining: Arc<watch::Sender<u64>>,
    ) -> Option<Self> {
        let snapshot = handle.snapshot();
        if !snapshot.status().is_active() {
            return None;
        }
        let epoch = snapshot.epoch();
        remaining.send_replace(snapshot.remaining_secs(handle.now()));
        let receiver = remaining.subscribe();
        let task = tokio::spawn(run_countdown(handle, epoch, remaining));
        debug!(epoch, "countdown driver installed");
        Some(Self {
            epoch,
            remaining: receiver,
            task,
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn remaining(&self) -> u64 {
        *self.remaining.borrow()
    }

    pub fn subscribe_remaining(&self) -> watch::Receiver<u64> {
        self.remaining.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for CountdownDriver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_countdown(handle: EncounterHandle, epoch: u64, remaining: Arc<watch::Sender<u64>>) {
    let mut ticker = interval(TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let snapshot = handle.snapshot();
        if !snapshot.status().is_active() || snapshot.epoch() != epoch {
            debug!(epoch, "countdown driver stopping: encounter moved on");
            break;
        }
        let left = snapshot.remaining_secs(handle.now());
        remaining.send_replace(left);
        if left == 0 {
            handle.timeout_if_current(epoch);
            break;
        }
    }
}

/// Keeps exactly one driver installed for the current active epoch.
///
/// Remaining seconds from whichever driver is current are republished on a
/// single channel, which drops back to zero once nothing is active.
#[derive(Debug)]
pub struct CountdownSupervisor {
    remaining: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl CountdownSupervisor {
    pub fn spawn(handle: EncounterHandle) -> Self {
        let (sender, receiver) = watch::channel(0);
        let sender = Arc::new(sender);
        let mut changes = handle.subscribe();
        let task = tokio::spawn(async move {
            let mut current = CountdownDriver::spawn_publishing(handle.clone(), sender.clone());
            while changes.changed().await.is_ok() {
                let (active, epoch) = {
                    let snapshot = changes.borrow_and_update();
                    (snapshot.status().is_active(), snapshot.epoch())
                };
                if !active {
                    current = None;
                    sender.send_replace(0);
                    continue;
                }
                let installed = current.as_ref().map(CountdownDriver::epoch);
                if installed != Some(epoch) {
                    current = CountdownDriver::spawn_publishing(handle.clone(), sender.clone());
                }
            }
        });
        Self {
            remaining: receiver,
            task,
        }
    }

    pub fn remaining(&self) -> u64 {
        *self.remaining.borrow()
    }

    pub fn subscribe_remaining(&self) -> watch::Receiver<u64> {
        self.remaining.clone()
    }
}

impl Drop for CountdownSupervisor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// `MM:SS`; minutes are not wrapped into hours.
pub fn format_mmss(remaining_secs: u64) -> String {
    format!("{:02}:{:02}", remaining_secs / 60, remaining_secs % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Calm,
    Warning,
    Critical,
}

impl Urgency {
    pub fn for_remaining(status: EncounterStatus, remaining_secs: u64) -> Self {
        if !status.is_active() {
            Self::Calm
        } else if remaining_secs <= CRITICAL_THRESHOLD_SECS {
            Self::Critical
        } else if remaining_secs <= WARNING_THRESHOLD_SECS {
            Self::Warning
        } else {
            Self::Calm
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;
    use arcade_protocol::{BossId, Difficulty, EncounterOutcome, EncounterSpec};
    use chrono::{DateTime, TimeDelta, Utc};
    use tokio::time::Instant;

    fn boss_fight(boss: &str, duration_secs: u64) -> EncounterSpec {
        EncounterSpec {
            boss_id: BossId::from_string(boss),
            name: boss.to_string(),
            difficulty: Difficulty::Normal,
            duration_secs,
            hp_penalty_on_fail: 10,
            base_xp_reward: 300,
        }
    }

    fn encounter() -> EncounterHandle {
        EncounterHandle::with_clock(Arc::new(MonotonicClock::anchored_at(
            DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(20_000),
        )))
    }

    fn passing(boss: &str) -> EncounterOutcome {
        EncounterOutcome {
            boss_id: BossId::from_string(boss),
            passed: true,
            score: 90.0,
            integrity_delta: 0,
            xp_awarded: 300,
            breakdown: Default::default(),
            fail_streak: None,
            hint_codex_id: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_refuses_inactive_encounter() {
        assert!(CountdownDriver::spawn(encounter()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn driver_times_out_once_the_clock_runs_out() {
        let encounter = encounter();
        encounter.start(&boss_fight("reactor_core", 3));
        let started = Instant::now();
        let driver = CountdownDriver::spawn(encounter.clone()).unwrap();
        assert_eq!(driver.remaining(), 3);

        let mut changes = encounter.subscribe();
        changes
            .wait_for(|session| session.status() == EncounterStatus::Failed)
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(driver.remaining(), 0);
        let snapshot = encounter.snapshot();
        assert_eq!(snapshot.integrity_current(), 90);
        let outcome = snapshot.last_outcome().unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.boss_id.as_str(), "reactor_core");
    }

    #[tokio::test(start_paused = true)]
    async fn driver_publishes_each_second() {
        let encounter = encounter();
        encounter.start(&boss_fight("reactor_core", 5));
        let driver = CountdownDriver::spawn(encounter).unwrap();
        let mut remaining = driver.subscribe_remaining();

        let mut seen = Vec::new();
        while remaining.changed().await.is_ok() {
            let value = *remaining.borrow_and_update();
            seen.push(value);
            if value == 0 {
                break;
            }
        }
        assert_eq!(seen, vec![4, 3, 2, 1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn driver_stops_after_outcome_without_timing_out() {
        let encounter = encounter();
        encounter.start(&boss_fight("reactor_core", 10));
        let driver = CountdownDriver::spawn(encounter.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        encounter.apply_outcome(passing("reactor_core"));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(driver.is_finished());
        let snapshot = encounter.snapshot();
        assert_eq!(snapshot.status(), EncounterStatus::Defeated);
        assert_eq!(snapshot.integrity_current(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_driver_cannot_fail_a_newer_encounter() {
        let encounter = encounter();
        encounter.start(&boss_fight("first", 2));
        let stale = CountdownDriver::spawn(encounter.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        encounter.start(&boss_fight("second", 60));
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(stale.is_finished());
        let snapshot = encounter.snapshot();
        assert_eq!(snapshot.status(), EncounterStatus::Active);
        assert_eq!(snapshot.id().map(BossId::as_str), Some("second"));
        assert_eq!(snapshot.integrity_current(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_driver_cancels_the_timeout() {
        let encounter = encounter();
        encounter.start(&boss_fight("reactor_core", 2));
        drop(CountdownDriver::spawn(encounter.clone()));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(encounter.snapshot().status(), EncounterStatus::Active);
        assert_eq!(encounter.remaining_secs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn supervisor_follows_each_new_encounter() {
        let encounter = encounter();
        let supervisor = CountdownSupervisor::spawn(encounter.clone());
        tokio::task::yield_now().await;
        assert_eq!(supervisor.remaining(), 0);

        encounter.start(&boss_fight("first", 2));
        let mut changes = encounter.subscribe();
        changes
            .wait_for(|session| session.status() == EncounterStatus::Failed)
            .await
            .unwrap();
        assert_eq!(encounter.snapshot().integrity_current(), 90);

        encounter.start(&boss_fight("second", 3));
        changes
            .wait_for(|session| session.status() == EncounterStatus::Failed)
            .await
            .unwrap();
        assert_eq!(encounter.snapshot().integrity_current(), 80);

        drop(supervisor);
        encounter.start(&boss_fight("third", 1));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(encounter.snapshot().status(), EncounterStatus::Active);
    }

    #[test]
    fn mmss_formatting() {
        assert_eq!(format_mmss(0), "00:00");
        assert_eq!(format_mmss(59), "00:59");
        assert_eq!(format_mmss(1_800), "30:00");
        assert_eq!(format_mmss(6_001), "100:01");
    }

    #[test]
    fn urgency_thresholds() {
        let active = EncounterStatus::Active;
        assert_eq!(Urgency::for_remaining(active, 301), Urgency::Calm);
        assert_eq!(Urgency::for_remaining(active, 300), Urgency::Warning);
        assert_eq!(Urgency::for_remaining(active, 121), Urgency::Warning);
        assert_eq!(Urgency::for_remaining(active, 120), Urgency::Critical);
        assert_eq!(Urgency::for_remaining(active, 0), Urgency::Critical);
        assert_eq!(
            Urgency::for_remaining(EncounterStatus::Failed, 10),
            Urgency::Calm
        );
    }
}

//! Pressure Sensor: samples resident memory and exposes a hysteresis
//! boolean, firing a one-shot broadcast on the false→true edge for the
//! Cleanup Orchestrator to react to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sysinfo::{Pid, System};
use tokio::sync::broadcast;
use tracing::{info, warn};

pub struct PressureSensor {
    pid: Pid,
    high_mark_mb: f64,
    low_mark_mb: f64,
    pub(crate) pressure: Arc<AtomicBool>,
    onset_tx: broadcast::Sender<()>,
}

impl PressureSensor {
    pub fn new(high_mark_mb: f64, low_mark_ratio: f64) -> Self {
        let (onset_tx, _rx) = broadcast::channel(8);
        Self {
            pid: Pid::from_u32(std::process::id()),
            high_mark_mb,
            low_mark_mb: high_mark_mb * low_mark_ratio,
            pressure: Arc::new(AtomicBool::new(false)),
            onset_tx,
        }
    }

    pub fn subscribe_onset(&self) -> broadcast::Receiver<()> {
        self.onset_tx.subscribe()
    }

    pub fn is_under_pressure(&self) -> bool {
        self.pressure.load(Ordering::SeqCst)
    }

    /// Sample resident memory once and update the hysteresis state.
    /// Returns the sampled resident set size in MB.
    pub fn sample_once(&self, sys: &mut System) -> f64 {
        sys.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[self.pid]), true);
        let sampled_mb = sys
            .process(self.pid)
            .map(|p| p.memory() as f64 / (1024.0 * 1024.0))
            .unwrap_or(0.0);

        let was_under_pressure = self.pressure.load(Ordering::SeqCst);
        if !was_under_pressure && sampled_mb > self.high_mark_mb {
            self.pressure.store(true, Ordering::SeqCst);
            warn!(
                sampled_mb,
                high_mark_mb = self.high_mark_mb,
                "Memory pressure onset"
            );
            let _ = self.onset_tx.send(());
        } else if was_under_pressure && sampled_mb < self.low_mark_mb {
            self.pressure.store(false, Ordering::SeqCst);
            info!(
                sampled_mb,
                low_mark_mb = self.low_mark_mb,
                "Memory pressure cleared"
            );
        }

        sampled_mb
    }

    /// Spawn the periodic sampling task. Returns the join handle so the
    /// caller can abort it on shutdown.
    pub fn spawn_sampler(
        self: Arc<Self>,
        interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sys = System::new();
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.sample_once(&mut sys);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hysteresis is exercised directly against the atomic, bypassing
    /// `sample_once`'s dependency on real process memory: at exactly
    /// `low_mark` pressure must remain true, only strictly below flips it.
    #[test]
    fn hysteresis_boundary_at_low_mark() {
        let sensor = PressureSensor::new(400.0, 0.8);
        assert_eq!(sensor.low_mark_mb, 320.0);

        sensor.pressure.store(true, Ordering::SeqCst);
        // Simulate the comparison sample_once performs, at the boundary.
        let sampled_mb = 320.0;
        let still_under = !(sampled_mb < sensor.low_mark_mb);
        assert!(still_under, "pressure must remain true at exactly low_mark");

        let sampled_mb = 319.999;
        let cleared = sampled_mb < sensor.low_mark_mb;
        assert!(cleared, "pressure must clear strictly below low_mark");
    }

    #[test]
    fn starts_without_pressure() {
        let sensor = PressureSensor::new(400.0, 0.8);
        assert!(!sensor.is_under_pressure());
        let _rx = sensor.subscribe_onset();
    }
}

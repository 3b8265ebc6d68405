use crate::models::Mode;
use crate::state::ModeState;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;
use tracing::info;

/// Instantané des compteurs du hub
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HubHealth {
    pub uptime_seconds: u64,
    pub current_mode: Mode,
    pub control_clients_accepted: u64,
    pub control_clients_dropped: u64,
    pub data_connections_accepted: u64,
    pub reports_persisted: u64,
    pub reports_rejected: u64,
    pub sink_failures: u64,
    pub mode_changes: u64,
    pub memory_usage_mb: f32,
}

#[derive(Default)]
struct Counters {
    control_clients_accepted: AtomicU64,
    control_clients_dropped: AtomicU64,
    data_connections_accepted: AtomicU64,
    reports_persisted: AtomicU64,
    reports_rejected: AtomicU64,
    sink_failures: AtomicU64,
    mode_changes: AtomicU64,
}

/// Compteurs partagés par tous les composants (observabilité uniquement,
/// aucun comportement côté bots n'en dépend)
#[derive(Clone)]
pub struct HubStats {
    start_time: Instant,
    counters: Arc<Counters>,
}

impl HubStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn control_client_accepted(&self) {
        self.counters.control_clients_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn control_clients_dropped(&self, count: usize) {
        self.counters
            .control_clients_dropped
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn data_connection_accepted(&self) {
        self.counters.data_connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report_persisted(&self) {
        self.counters.reports_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report_rejected(&self) {
        self.counters.reports_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sink_failed(&self) {
        self.counters.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mode_changed(&self) {
        self.counters.mode_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, current_mode: Mode) -> HubHealth {
        let c = &self.counters;
        HubHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            current_mode,
            control_clients_accepted: c.control_clients_accepted.load(Ordering::Relaxed),
            control_clients_dropped: c.control_clients_dropped.load(Ordering::Relaxed),
            data_connections_accepted: c.data_connections_accepted.load(Ordering::Relaxed),
            reports_persisted: c.reports_persisted.load(Ordering::Relaxed),
            reports_rejected: c.reports_rejected.load(Ordering::Relaxed),
            sink_failures: c.sink_failures.load(Ordering::Relaxed),
            mode_changes: c.mode_changes.load(Ordering::Relaxed),
            memory_usage_mb: get_memory_usage_mb(),
        }
    }

    /// Log périodique de l'état du hub
    pub fn spawn_health_reporter(&self, state: ModeState, every: Duration) {
        let stats = self.clone();

        task::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // le premier tick est immédiat
            interval.tick().await;

            loop {
                interval.tick().await;
                let health = stats.snapshot(state.get().await);
                info!(
                    uptime_s = health.uptime_seconds,
                    mode = %health.current_mode,
                    control_accepted = health.control_clients_accepted,
                    control_dropped = health.control_clients_dropped,
                    data_accepted = health.data_connections_accepted,
                    persisted = health.reports_persisted,
                    rejected = health.reports_rejected,
                    sink_failures = health.sink_failures,
                    mode_changes = health.mode_changes,
                    memory_mb = health.memory_usage_mb,
                    "[health] hub status"
                );
            }
        });
    }
}

impl Default for HubStats {
    fn default() -> Self {
        Self::new()
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok());
            if let Some(kb) = rss_kb {
                return kb as f32 / 1024.0;
            }
        }
    }

    0.0
}

/**
 * MODE SCHEDULER - Changement de mode aléatoire une fois le quorum atteint
 *
 * RÔLE : Tirer un mode au hasard (le mode courant peut être retiré), le publier
 * sous le verrou du mode, notifier tous les bots, puis dormir un délai aléatoire.
 *
 * ÉTATS : idle (avant le seuil) → running (boucle infinie, aucun état terminal).
 * Une seule instance tourne pour toute la vie du process.
 */

use crate::broadcast::{ControlBroadcaster, NotifyOutcome};
use crate::health::HubStats;
use crate::models::Mode;
use crate::state::ModeState;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Plage du délai entre deux changements de mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchInterval {
    min: Duration,
    max: Duration,
}

impl SwitchInterval {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Tirage uniforme dans [min, max]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }
}

impl Default for SwitchInterval {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(15))
    }
}

/// Tirage uniforme parmi tous les modes, sans exclure le mode courant
pub fn pick_mode<R: Rng + ?Sized>(rng: &mut R) -> Mode {
    Mode::ALL[rng.gen_range(0..Mode::ALL.len())]
}

pub struct ModeScheduler {
    state: ModeState,
    broadcaster: ControlBroadcaster,
    interval: SwitchInterval,
    started: AtomicBool,
    stats: HubStats,
}

impl ModeScheduler {
    pub fn new(
        state: ModeState,
        broadcaster: ControlBroadcaster,
        interval: SwitchInterval,
        stats: HubStats,
    ) -> Arc<Self> {
        Arc::new(Self {
            state,
            broadcaster,
            interval,
            started: AtomicBool::new(false),
            stats,
        })
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Démarre la boucle si personne ne l'a encore fait.
    /// Retourne `true` pour l'unique appelant qui a effectivement démarré.
    pub fn start_once(self: &Arc<Self>) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        info!(
            min_ms = self.interval.min.as_millis() as u64,
            max_ms = self.interval.max.as_millis() as u64,
            "[scheduler] quorum reached, starting mode switcher"
        );
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run().await });
        true
    }

    async fn run(&self) {
        let mut rng = StdRng::from_entropy();
        loop {
            let mode = pick_mode(&mut rng);
            self.switch_to(mode).await;
            tokio::time::sleep(self.interval.sample(&mut rng)).await;
        }
    }

    /// Mise à jour du mode + notification, en une seule section critique
    pub async fn switch_to(&self, mode: Mode) -> NotifyOutcome {
        let mut guard = self.state.lock().await;
        let previous = guard.replace(mode);
        let outcome = self.broadcaster.notify(&guard).await;
        drop(guard);

        self.stats.mode_changed();
        info!(
            from = %previous,
            to = %mode,
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            "[scheduler] mode switched"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::ControlClient;
    use rand::rngs::mock::StepRng;
    use tokio::io::{duplex, AsyncReadExt};

    fn scheduler(interval: SwitchInterval) -> (Arc<ModeScheduler>, ModeState, ControlBroadcaster) {
        let stats = HubStats::new();
        let state = ModeState::default();
        let broadcaster = ControlBroadcaster::new(stats.clone());
        let sched = ModeScheduler::new(state.clone(), broadcaster.clone(), interval, stats);
        (sched, state, broadcaster)
    }

    #[test]
    fn test_pick_mode_covers_all_modes() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(pick_mode(&mut rng));
        }
        assert_eq!(seen.len(), Mode::ALL.len());
    }

    #[test]
    fn test_interval_sample_in_range() {
        let interval = SwitchInterval::default();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let d = interval.sample(&mut rng);
            assert!(d >= Duration::from_secs(5) && d <= Duration::from_secs(15));
        }

        let fixed = SwitchInterval::new(Duration::from_millis(30), Duration::from_millis(30));
        assert_eq!(fixed.sample(&mut StepRng::new(0, 1)), Duration::from_millis(30));
    }

    #[test]
    fn test_interval_bounds_are_ordered() {
        let interval = SwitchInterval::new(Duration::from_secs(9), Duration::from_secs(3));
        assert_eq!(interval.min(), Duration::from_secs(3));
        assert_eq!(interval.max(), Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_switch_to_updates_state_and_notifies() {
        let (sched, state, broadcaster) = scheduler(SwitchInterval::default());
        let (server, mut bot) = duplex(64);
        broadcaster.register(ControlClient::new(broadcaster.next_client_id(), "bot", server));

        let outcome = sched.switch_to(Mode::HighTraffic).await;
        assert_eq!(outcome.delivered, 1);
        assert_eq!(state.get().await, Mode::HighTraffic);

        let mut buf = [0u8; 12];
        bot.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"high_traffic");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_start_once_under_contention() {
        let (sched, _state, _broadcaster) = scheduler(SwitchInterval::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        assert!(!sched.is_running());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let sched = sched.clone();
                tokio::spawn(async move { sched.start_once() })
            })
            .collect();

        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(sched.is_running());
        assert!(!sched.start_once());
    }

    #[tokio::test]
    async fn test_running_scheduler_pushes_modes() {
        let (sched, _state, broadcaster) = scheduler(SwitchInterval::new(
            Duration::from_millis(5),
            Duration::from_millis(10),
        ));
        let (server, mut bot) = duplex(4096);
        broadcaster.register(ControlClient::new(broadcaster.next_client_id(), "bot", server));

        assert!(sched.start_once());

        // au moins deux changements consécutifs
        let mut received = String::new();
        let mut buf = [0u8; 256];
        while received.len() < 2 * "udp_flood".len() {
            let n = tokio::time::timeout(Duration::from_secs(2), bot.read(&mut buf))
                .await
                .unwrap()
                .unwrap();
            received.push_str(std::str::from_utf8(&buf[..n]).unwrap());
        }
        assert!(Mode::ALL.iter().any(|m| received.starts_with(m.as_str())));
    }
}

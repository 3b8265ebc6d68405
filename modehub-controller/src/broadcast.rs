/**
 * CONTROL BROADCASTER - Registre des bots connectés au canal contrôle
 *
 * RÔLE : Pousser le nom du mode (octets UTF-8 bruts, sans framing) à chaque
 * client enregistré et retirer ceux dont l'écriture échoue, dans la même passe.
 *
 * ARCHITECTURE : le registre a son propre verrou (parking_lot), jamais tenu
 * pendant une écriture réseau. Les passes de notification sont sérialisées par
 * le verrou du mode (un `ModeGuard` est exigé).
 */

use crate::health::HubStats;
use crate::models::Mode;
use crate::state::{new_state, ModeGuard, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

pub type ControlWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Connexion sortante vers le canal contrôle d'un bot
pub struct ControlClient {
    id: u64,
    peer: String,
    writer: ControlWriter,
}

impl ControlClient {
    pub fn new<W>(id: u64, peer: impl Into<String>, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id,
            peer: peer.into(),
            writer: Box::new(writer),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub async fn send_mode(&mut self, mode: Mode) -> std::io::Result<()> {
        self.writer.write_all(mode.as_str().as_bytes()).await?;
        self.writer.flush().await
    }
}

/// Résultat d'une passe de notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyOutcome {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Clone)]
pub struct ControlBroadcaster {
    clients: Shared<Vec<ControlClient>>,
    next_id: Arc<AtomicU64>,
    stats: HubStats,
}

impl ControlBroadcaster {
    pub fn new(stats: HubStats) -> Self {
        Self {
            clients: new_state(Vec::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            stats,
        }
    }

    pub fn next_client_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn register(&self, client: ControlClient) {
        debug!(client = client.id, peer = %client.peer, "[control] client registered");
        self.clients.lock().push(client);
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    pub fn client_ids(&self) -> Vec<u64> {
        self.clients.lock().iter().map(|c| c.id).collect()
    }

    /// Envoie le mode tenu par `guard` à tous les clients enregistrés.
    ///
    /// Un client en échec est retiré sans interrompre la passe. Un client
    /// enregistré pendant la passe est conservé mais ne reçoit pas ce message.
    pub async fn notify(&self, guard: &ModeGuard<'_>) -> NotifyOutcome {
        let mode = guard.mode();
        let batch = std::mem::take(&mut *self.clients.lock());

        let mut outcome = NotifyOutcome::default();
        let mut survivors = Vec::with_capacity(batch.len());
        for mut client in batch {
            match client.send_mode(mode).await {
                Ok(()) => {
                    outcome.delivered += 1;
                    survivors.push(client);
                }
                Err(e) => {
                    debug!(
                        client = client.id,
                        peer = %client.peer,
                        error = %e,
                        "[control] dropping client"
                    );
                    outcome.dropped += 1;
                }
            }
        }

        {
            let mut clients = self.clients.lock();
            let late = std::mem::take(&mut *clients);
            *clients = survivors;
            clients.extend(late);
        }

        if outcome.dropped > 0 {
            self.stats.control_clients_dropped(outcome.dropped);
        }
        outcome
    }
}

/**
 * ACCEPTORS - Boucles d'acceptation des canaux contrôle et données
 *
 * RÔLE : Accepter sans jamais bloquer sur le traitement ; chaque connexion
 * part dans sa propre task tokio.
 *
 * CONTRÔLE : sync initiale du mode, enregistrement, comptage, démarrage unique
 * de l'ordonnanceur au seuil. DONNÉES : une boucle `TelemetryIngestor` par bot.
 *
 * Une erreur d'accept est fatale pour l'acceptor concerné uniquement.
 */

use crate::broadcast::{ControlBroadcaster, ControlClient};
use crate::health::HubStats;
use crate::ingest::TelemetryIngestor;
use crate::scheduler::ModeScheduler;
use crate::state::ModeState;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Résultat de l'admission d'un bot sur le canal contrôle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub client_id: u64,
    /// rang de la connexion (1 pour la première)
    pub position: usize,
    pub started_scheduler: bool,
}

#[derive(Clone)]
pub struct ControlAcceptor {
    state: ModeState,
    broadcaster: ControlBroadcaster,
    scheduler: Arc<ModeScheduler>,
    threshold: usize,
    accepted: Arc<AtomicUsize>,
    stats: HubStats,
}

impl ControlAcceptor {
    pub fn new(
        state: ModeState,
        broadcaster: ControlBroadcaster,
        scheduler: Arc<ModeScheduler>,
        threshold: usize,
        stats: HubStats,
    ) -> Self {
        Self {
            state,
            broadcaster,
            scheduler,
            threshold: threshold.max(1),
            accepted: Arc::new(AtomicUsize::new(0)),
            stats,
        }
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::Acquire)
    }

    pub async fn run(self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr().context("control listener address")?;
        info!(addr = %local, threshold = self.threshold, "[control] accepting bots");

        loop {
            let (stream, peer) = listener.accept().await.context("control accept failed")?;
            if let Err(e) = stream.set_nodelay(true) {
                debug!(%peer, error = %e, "[control] set_nodelay failed");
            }

            let acceptor = self.clone();
            tokio::spawn(async move {
                match acceptor.admit(stream, peer.to_string()).await {
                    Ok(admission) => info!(
                        %peer,
                        client = admission.client_id,
                        position = admission.position,
                        "[control] bot connected"
                    ),
                    Err(e) => warn!(
                        %peer,
                        error = %e,
                        "[control] initial sync failed, connection dropped"
                    ),
                }
            });
        }
    }

    /// Envoie le mode courant, enregistre le client puis compte la connexion.
    ///
    /// La sync et l'enregistrement se font sous le verrou du mode : le client
    /// reçoit soit l'ancien mode puis la notification, soit directement le nouveau.
    pub async fn admit<W>(&self, writer: W, peer: String) -> std::io::Result<Admission>
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut client = ControlClient::new(self.broadcaster.next_client_id(), peer, writer);
        let client_id = client.id();
        {
            let guard = self.state.lock().await;
            client.send_mode(guard.mode()).await?;
            self.broadcaster.register(client);
        }

        self.stats.control_client_accepted();
        let position = self.accepted.fetch_add(1, Ordering::AcqRel) + 1;
        let started_scheduler = position >= self.threshold && self.scheduler.start_once();

        Ok(Admission {
            client_id,
            position,
            started_scheduler,
        })
    }
}

#[derive(Clone)]
pub struct DataAcceptor {
    ingestor: TelemetryIngestor,
    stats: HubStats,
}

impl DataAcceptor {
    pub fn new(ingestor: TelemetryIngestor, stats: HubStats) -> Self {
        Self { ingestor, stats }
    }

    pub async fn run(self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr().context("data listener address")?;
        info!(addr = %local, "[data] accepting telemetry");

        loop {
            let (stream, peer) = listener.accept().await.context("data accept failed")?;
            self.stats.data_connection_accepted();

            let ingestor = self.ingestor.clone();
            tokio::spawn(async move {
                let peer = peer.to_string();
                debug!(peer = %peer, "[data] bot connected");
                match ingestor.serve(stream, &peer).await {
                    Ok(summary) => debug!(
                        peer = %peer,
                        persisted = summary.persisted,
                        rejected = summary.rejected,
                        sink_failures = summary.sink_failures,
                        "[data] connection closed"
                    ),
                    Err(e) => debug!(peer = %peer, error = %e, "[data] connection error"),
                }
            });
        }
    }
}

/**
 * HUB - Assemblage de tous les composants autour d'un état partagé unique
 *
 * RÔLE : Construire ModeState, registre contrôle, ordonnanceur et ingestor,
 * binder les deux listeners puis faire tourner les deux boucles d'acceptation
 * en parallèle. Un acceptor qui tombe n'arrête pas l'autre.
 */

use crate::acceptor::{ControlAcceptor, DataAcceptor};
use crate::broadcast::ControlBroadcaster;
use crate::config::{ConfigError, ControllerConfig};
use crate::health::HubStats;
use crate::ingest::TelemetryIngestor;
use crate::models::Mode;
use crate::scheduler::ModeScheduler;
use crate::schema::RecordSchema;
use crate::sink::RecordSink;
use crate::state::ModeState;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

pub struct Hub {
    config: ControllerConfig,
    state: ModeState,
    stats: HubStats,
    broadcaster: ControlBroadcaster,
    scheduler: Arc<ModeScheduler>,
    ingestor: TelemetryIngestor,
}

impl Hub {
    pub fn new(
        config: ControllerConfig,
        schema: RecordSchema,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let stats = HubStats::new();
        let state = ModeState::new(Mode::default());
        let broadcaster = ControlBroadcaster::new(stats.clone());
        let scheduler = ModeScheduler::new(
            state.clone(),
            broadcaster.clone(),
            config.switch_interval(),
            stats.clone(),
        );
        let ingestor = TelemetryIngestor::new(
            state.clone(),
            schema,
            sink,
            config.max_report_bytes,
            stats.clone(),
        );

        Ok(Self {
            config,
            state,
            stats,
            broadcaster,
            scheduler,
            ingestor,
        })
    }

    pub fn state(&self) -> ModeState {
        self.state.clone()
    }

    pub fn stats(&self) -> HubStats {
        self.stats.clone()
    }

    pub fn broadcaster(&self) -> ControlBroadcaster {
        self.broadcaster.clone()
    }

    pub fn scheduler(&self) -> Arc<ModeScheduler> {
        self.scheduler.clone()
    }

    pub async fn bind(self) -> Result<BoundHub> {
        let control_addr = self.config.control_addr();
        let data_addr = self.config.data_addr();
        let control = TcpListener::bind(&control_addr)
            .await
            .with_context(|| format!("failed to bind control channel on {control_addr}"))?;
        let data = TcpListener::bind(&data_addr)
            .await
            .with_context(|| format!("failed to bind data channel on {data_addr}"))?;

        Ok(BoundHub {
            hub: self,
            control,
            data,
        })
    }
}

pub struct BoundHub {
    hub: Hub,
    control: TcpListener,
    data: TcpListener,
}

impl BoundHub {
    pub fn control_addr(&self) -> Result<SocketAddr> {
        Ok(self.control.local_addr()?)
    }

    pub fn data_addr(&self) -> Result<SocketAddr> {
        Ok(self.data.local_addr()?)
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Tourne jusqu'à ce que les deux acceptors soient tombés
    pub async fn run(self) -> Result<()> {
        let BoundHub { hub, control, data } = self;

        if hub.config.stats_interval_secs > 0 {
            let period = Duration::from_secs(hub.config.stats_interval_secs);
            hub.stats.spawn_health_reporter(hub.state.clone(), period);
        }

        let control_acceptor = ControlAcceptor::new(
            hub.state.clone(),
            hub.broadcaster.clone(),
            hub.scheduler.clone(),
            hub.config.expected_connections,
            hub.stats.clone(),
        );
        let data_acceptor = DataAcceptor::new(hub.ingestor.clone(), hub.stats.clone());

        let control_task = tokio::spawn(control_acceptor.run(control));
        let data_task = tokio::spawn(data_acceptor.run(data));

        info!(mode = %Mode::default(), "[hub] running");
        let (control_res, data_res) = tokio::join!(
            watch_acceptor("control", control_task),
            watch_acceptor("data", data_task)
        );
        control_res.and(data_res)
    }
}

async fn watch_acceptor(
    name: &'static str,
    task: tokio::task::JoinHandle<Result<()>>,
) -> Result<()> {
    let outcome = match task.await {
        Ok(res) => res,
        Err(join) => Err(anyhow::anyhow!("{name} acceptor task panicked: {join}")),
    };
    if let Err(e) = &outcome {
        error!(acceptor = name, error = %format!("{e:#}"), "[hub] acceptor stopped");
    }
    outcome
}

/**
 * TELEMETRY INGESTOR - Boucle par connexion sur le canal données
 *
 * RÔLE : Lire le flux d'octets d'un bot, découper les objets JSON successifs,
 * normaliser chaque rapport avec le mode courant au moment de la réception
 * et l'ajouter au sink.
 *
 * Un payload invalide est écarté (`ReportError`), la connexion reste ouverte et
 * le bot ne reçoit rien. La boucle ne s'arrête qu'à la fermeture du flux.
 */

use crate::health::HubStats;
use crate::report::{ReportError, TelemetryReport};
use crate::schema::RecordSchema;
use crate::sink::{RecordSink, SinkError};
use crate::state::ModeState;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

const READ_CHUNK: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Bilan d'une connexion données une fois fermée
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub persisted: u64,
    pub rejected: u64,
    pub sink_failures: u64,
}

#[derive(Clone)]
pub struct TelemetryIngestor {
    state: ModeState,
    schema: RecordSchema,
    sink: Arc<dyn RecordSink>,
    max_report_bytes: usize,
    stats: HubStats,
}

impl TelemetryIngestor {
    pub fn new(
        state: ModeState,
        schema: RecordSchema,
        sink: Arc<dyn RecordSink>,
        max_report_bytes: usize,
        stats: HubStats,
    ) -> Self {
        Self {
            state,
            schema,
            sink,
            max_report_bytes: max_report_bytes.max(1),
            stats,
        }
    }

    /// Sert une connexion jusqu'à sa fermeture (EOF) ou une erreur de lecture
    pub async fn serve<R>(&self, mut reader: R, peer: &str) -> std::io::Result<ConnectionSummary>
    where
        R: AsyncRead + Unpin,
    {
        let mut summary = ConnectionSummary::default();
        let mut buffer: Vec<u8> = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                if !buffer.iter().all(u8::is_ascii_whitespace) {
                    debug!(peer, pending = buffer.len(), "[data] connection closed mid-report");
                }
                return Ok(summary);
            }
            let fresh = &chunk[..n];
            if supersedes_pending(&buffer, fresh) {
                let len = buffer.len();
                buffer.clear();
                let outcome = Err(ReportError::Truncated { len }.into());
                self.record_outcome(outcome, peer, &mut summary);
            }
            buffer.extend_from_slice(fresh);
            self.drain_buffer(&mut buffer, peer, &mut summary).await;
        }
    }

    /// Consomme tous les objets complets du buffer, garde un éventuel objet partiel
    async fn drain_buffer(
        &self,
        buffer: &mut Vec<u8>,
        peer: &str,
        summary: &mut ConnectionSummary,
    ) {
        loop {
            let (next, consumed) = {
                let mut stream =
                    serde_json::Deserializer::from_slice(&buffer[..]).into_iter::<Value>();
                let next = stream.next();
                (next, stream.byte_offset())
            };

            match next {
                None => {
                    buffer.clear();
                    return;
                }
                Some(Ok(value)) => {
                    buffer.drain(..consumed);
                    self.record_outcome(self.ingest_value(value).await, peer, summary);
                }
                Some(Err(e)) if e.is_eof() => {
                    if buffer.len() > self.max_report_bytes {
                        let limit = self.max_report_bytes;
                        buffer.clear();
                        let outcome = Err(ReportError::Oversized { limit }.into());
                        self.record_outcome(outcome, peer, summary);
                    }
                    return;
                }
                Some(Err(e)) => {
                    self.record_outcome(Err(ReportError::Decode(e).into()), peer, summary);
                    // resynchronisation sur le prochain début d'objet
                    match buffer.iter().skip(1).position(|b| *b == b'{') {
                        Some(pos) => {
                            buffer.drain(..=pos);
                        }
                        None => {
                            buffer.clear();
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Normalise et persiste un rapport déjà décodé
    pub async fn ingest_value(&self, value: Value) -> Result<(), IngestError> {
        let report = TelemetryReport::from_value(value, &self.schema)?;
        // snapshot du mode à la réception
        let mode = self.state.get().await;
        let record = report.into_record(&self.schema, mode, local_timestamp());
        self.sink.append(&record)?;
        Ok(())
    }

    fn record_outcome(
        &self,
        outcome: Result<(), IngestError>,
        peer: &str,
        summary: &mut ConnectionSummary,
    ) {
        match outcome {
            Ok(()) => {
                summary.persisted += 1;
                self.stats.report_persisted();
            }
            Err(IngestError::Report(e)) => {
                summary.rejected += 1;
                self.stats.report_rejected();
                debug!(peer, error = %e, "[data] report discarded");
            }
            Err(IngestError::Sink(e)) => {
                summary.sink_failures += 1;
                self.stats.sink_failed();
                warn!(peer, sink = %self.sink.describe(), error = %e, "[data] append failed");
            }
        }
    }
}

/// Une lecture qui porte à elle seule un objet complet remplace un reste tronqué,
/// sauf si ce reste et la lecture forment ensemble un objet (rapport découpé).
fn supersedes_pending(pending: &[u8], fresh: &[u8]) -> bool {
    if pending.iter().all(u8::is_ascii_whitespace) {
        return false;
    }
    let opens_object = fresh.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{');
    if !opens_object || !starts_with_object(fresh) {
        return false;
    }
    let mut joined = Vec::with_capacity(pending.len() + fresh.len());
    joined.extend_from_slice(pending);
    joined.extend_from_slice(fresh);
    !starts_with_object(&joined)
}

fn starts_with_object(bytes: &[u8]) -> bool {
    matches!(
        serde_json::Deserializer::from_slice(bytes).into_iter::<Value>().next(),
        Some(Ok(Value::Object(_)))
    )
}

/// Horodatage local `YYYY-MM-DD HH:MM:SS`
pub fn local_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

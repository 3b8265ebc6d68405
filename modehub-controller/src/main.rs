/**
 * MODEHUB CONTROLLER - Point d'entrée du contrôleur
 *
 * RÔLE : Charger la config, initialiser le CSV de sortie (en-tête), puis lancer
 * les canaux contrôle et données. Pas d'arrêt propre : seule la fin du process
 * arrête le hub.
 */

use anyhow::{Context, Result};
use modehub_controller::{load_config, CsvSink, Hub, RecordSchema};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("modehub_controller=info")),
        )
        .init();

    let config = load_config().await.context("failed to load configuration")?;

    let schema = RecordSchema::standard();
    let sink = CsvSink::initialize(&config.output_path, schema)
        .with_context(|| format!("failed to initialize {}", config.output_path.display()))?;
    info!(
        path = %sink.path().display(),
        columns = schema.len(),
        "[controller] output initialized"
    );

    let hub = Hub::new(config, schema, Arc::new(sink))?;
    let bound = hub.bind().await?;
    info!(
        control = %bound.control_addr()?,
        data = %bound.data_addr()?,
        "[controller] listening"
    );

    bound.run().await
}

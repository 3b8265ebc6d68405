/*!
# ModeHub DevKit - Bots factices et utilitaires de test

Bibliothèque facilitant les tests du contrôleur avec:
- Bots factices parlant le protocole des canaux contrôle et données
- Construction de rapports de télémétrie
- Harness de lecture du CSV de sortie
*/

pub mod bot_stub;
pub mod report_builder;
pub mod test_utils;

pub use bot_stub::{ControlBot, TelemetryBot, MODE_NAMES};
pub use report_builder::ReportBuilder;
pub use test_utils::TestHarness;

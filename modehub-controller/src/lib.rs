//! ModeHub Controller - hub central des bots de génération de trafic
//!
//! - Canal contrôle : pousse le mode courant à chaque bot, le change au hasard
//!   une fois `expected_connections` bots connectés
//! - Canal données : reçoit la télémétrie JSON, la normalise sur un schéma fixe
//!   et l'ajoute au CSV de sortie

pub mod acceptor;
pub mod broadcast;
pub mod config;
pub mod health;
pub mod hub;
pub mod ingest;
pub mod models;
pub mod report;
pub mod scheduler;
pub mod schema;
pub mod sink;
pub mod state;

pub use config::{load_config, ControllerConfig};
pub use hub::{BoundHub, Hub};
pub use models::{Mode, Record};
pub use schema::RecordSchema;
pub use sink::{CsvSink, MemorySink, RecordSink};
pub use state::ModeState;

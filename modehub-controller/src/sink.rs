/**
 * PERSISTENCE SINK - Stockage append-only des enregistrements normalisés
 *
 * RÔLE : Écrire l'en-tête du schéma une fois au démarrage, puis une ligne
 * complète par enregistrement. Jamais de relecture, jamais de réécriture.
 *
 * ARCHITECTURE : trait `RecordSink` (appelé en parallèle par chaque connexion
 * données) + `CsvSink` pour le fichier + `MemorySink` pour les tests.
 */

use crate::models::Record;
use crate::schema::RecordSchema;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("record has {got} fields, schema expects {expected}")]
    Shape { got: usize, expected: usize },
}

/// Destination des enregistrements.
/// Chaque `append` écrit une ligne entière ou rien : pas de lignes entrelacées.
pub trait RecordSink: Send + Sync {
    fn append(&self, record: &Record) -> Result<(), SinkError>;

    fn describe(&self) -> String;
}

pub struct CsvSink {
    path: PathBuf,
    schema: RecordSchema,
    writer: Mutex<BufWriter<File>>,
}

impl CsvSink {
    /// Crée (ou tronque) le fichier et écrit la ligne d'en-tête
    pub fn initialize<P: AsRef<Path>>(path: P, schema: RecordSchema) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| SinkError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = File::create(&path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        let header = encode_row(schema.header());
        writer.write_all(header.as_bytes()).map_err(io_err)?;
        writer.flush().map_err(io_err)?;

        Ok(Self {
            path,
            schema,
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for CsvSink {
    fn append(&self, record: &Record) -> Result<(), SinkError> {
        let cells = record.cells();
        if cells.len() != self.schema.len() {
            return Err(SinkError::Shape {
                got: cells.len(),
                expected: self.schema.len(),
            });
        }
        let line = encode_row(cells);

        // ligne construite hors verrou, écrite + flushée sous verrou.
        // Appel bloquant depuis la task de l'ingestor : une ligne par rapport,
        // les autres connexions tournent sur les autres workers du runtime.
        let mut writer = self.writer.lock();
        writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|source| SinkError::Io {
                path: self.path.clone(),
                source,
            })
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// Sink en mémoire, utile pour les tests et le debug
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl RecordSink for MemorySink {
    fn append(&self, record: &Record) -> Result<(), SinkError> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Une ligne CSV terminée par `\n`
pub fn encode_row<I, S>(cells: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = String::new();
    for (i, cell) in cells.into_iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        let cell = cell.as_ref();
        if cell.contains([',', '"', '\n', '\r']) {
            line.push('"');
            line.push_str(&cell.replace('"', "\"\""));
            line.push('"');
        } else {
            line.push_str(cell);
        }
    }
    line.push('\n');
    line
}

/*!
Harness de test autour du fichier CSV produit par le contrôleur

Facilite l'écriture de tests bout-en-bout avec:
- Lecture de l'en-tête et des lignes (champs entre guillemets gérés)
- Attente active d'un nombre de lignes avec timeout
- Assertions sur les champs d'une ligne
*/

use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Une ligne du CSV, indexée par nom de colonne
pub type Row = HashMap<String, String>;

pub struct TestHarness {
    output_path: PathBuf,
}

impl TestHarness {
    pub fn new<P: AsRef<Path>>(output_path: P) -> Self {
        env_logger::try_init().ok(); // Init logging pour tests

        Self {
            output_path: output_path.as_ref().to_path_buf(),
        }
    }

    /// En-tête (première ligne) du fichier
    pub fn header(&self) -> Result<Vec<String>> {
        let content = std::fs::read_to_string(&self.output_path)?;
        let mut records = parse_csv(&content).into_iter();
        records
            .next()
            .ok_or_else(|| anyhow::anyhow!("empty output file: {}", self.output_path.display()))
    }

    pub fn rows(&self) -> Result<Vec<Row>> {
        let content = std::fs::read_to_string(&self.output_path)?;
        let mut records = parse_csv(&content).into_iter();
        let header = match records.next() {
            Some(h) => h,
            None => return Ok(Vec::new()),
        };

        records
            .map(|cells| {
                if cells.len() != header.len() {
                    anyhow::bail!("row has {} cells, header has {}", cells.len(), header.len());
                }
                Ok(header.iter().cloned().zip(cells).collect())
            })
            .collect()
    }

    /// Attend qu'au moins `count` lignes soient présentes
    pub async fn wait_for_rows(&self, count: usize, timeout_ms: u64) -> Result<Vec<Row>> {
        let start = std::time::Instant::now();

        loop {
            let rows = self.rows()?;
            if rows.len() >= count {
                log::info!("✅ {} rows available in {}", rows.len(), self.output_path.display());
                return Ok(rows);
            }
            if start.elapsed() >= Duration::from_millis(timeout_ms) {
                log::warn!("⏰ Timeout waiting for {} rows (got {})", count, rows.len());
                anyhow::bail!("expected {} rows, got {} after {}ms", count, rows.len(), timeout_ms);
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Assert qu'un champ a une valeur spécifique
    pub fn assert_field_equals(&self, row: &Row, field: &str, expected: &str) -> Result<()> {
        match row.get(field) {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => anyhow::bail!(
                "Field '{}' mismatch: expected {:?}, got {:?}",
                field,
                expected,
                actual
            ),
            None => anyhow::bail!("Field '{}' not found in row", field),
        }
    }
}

/// Parse un CSV complet (RFC 4180 : guillemets doublés, retours ligne dans les champs)
pub fn parse_csv(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => record.push(std::mem::take(&mut field)),
            ('\r', false) => {}
            ('\n', false) => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            (c, _) => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_csv_quoting() {
        let records = parse_csv("a,b,c\n\"x,y\",\"say \"\"hi\"\"\",\"multi\nline\"\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], vec!["a", "b", "c"]);
        assert_eq!(records[1], vec!["x,y", "say \"hi\"", "multi\nline"]);
    }

    #[test]
    fn test_parse_csv_without_trailing_newline() {
        let records = parse_csv("a,b\n1,2");
        assert_eq!(records, vec![vec!["a", "b"], vec!["1", "2"]]);
    }

    #[tokio::test]
    async fn test_harness_reads_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let content = "timestamp,mode,hostname\n2024-01-01 00:00:00,udp_flood,h1\n";
        std::fs::write(&path, content).unwrap();

        let harness = TestHarness::new(&path);
        assert_eq!(harness.header().unwrap(), vec!["timestamp", "mode", "hostname"]);

        let rows = harness.wait_for_rows(1, 500).await.unwrap();
        harness.assert_field_equals(&rows[0], "hostname", "h1").unwrap();
        harness.assert_field_equals(&rows[0], "mode", "udp_flood").unwrap();
        assert!(harness.assert_field_equals(&rows[0], "mode", "tcp_flood").is_err());
        assert!(harness.assert_field_equals(&rows[0], "missing", "x").is_err());
    }

    #[tokio::test]
    async fn test_wait_for_rows_times_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "timestamp,mode,hostname\n").unwrap();

        let harness = TestHarness::new(&path);
        assert!(harness.wait_for_rows(1, 100).await.is_err());
    }
}

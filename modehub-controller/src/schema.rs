/**
 * RECORD SCHEMA - Forme fixe de chaque enregistrement persisté
 *
 * RÔLE : Catalogues statiques des métriques node_exporter et des syscalls suivis.
 * L'en-tête CSV et l'ordre des colonnes en dérivent, une fois pour toutes au démarrage.
 */

/// Métriques ressources connues, dans l'ordre des colonnes
pub const RESOURCE_METRICS: &[&str] = &[
    "node_cpu_seconds_total",
    "node_filesystem_avail_bytes",
    "node_filesystem_size_bytes",
    "node_disk_read_bytes_total",
    "node_disk_written_bytes_total",
    "node_network_receive_bytes_total",
    "node_network_receive_drop_total",
    "node_network_receive_errs_total",
    "node_network_transmit_packets_total",
    "node_vmstat_pgmajfault",
    "node_memory_MemAvailable_bytes",
    "node_memory_MemTotal_bytes",
    "node_forks_total",
    "node_intr_total",
    "node_load1",
    "node_load5",
    "node_load15",
    "node_sockstat_TCP_alloc",
    "node_sockstat_TCP_inuse",
    "node_sockstat_TCP_mem",
    "node_sockstat_TCP_mem_bytes",
    "node_sockstat_UDP_inuse",
    "node_sockstat_UDP_mem",
    "node_sockstat_sockets_used",
    "node_netstat_Tcp_CurrEstab",
    "node_filefd_allocated",
];

/// Compteurs de syscalls connus, dans l'ordre des colonnes
pub const SYSCALLS: &[&str] = &[
    "mmap", "munmap", "accept", "brk", "bind", "connect", "chdir", "clone", "close", "kill",
    "listen", "mkdir", "open", "poll", "read", "rename", "recvfrom", "select", "socket",
    "sendto", "write",
];

pub const BASE_FIELDS: [&str; 3] = ["timestamp", "mode", "hostname"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSchema {
    metrics: &'static [&'static str],
    syscalls: &'static [&'static str],
}

impl RecordSchema {
    pub const fn new(metrics: &'static [&'static str], syscalls: &'static [&'static str]) -> Self {
        Self { metrics, syscalls }
    }

    /// Schéma construit à partir des catalogues statiques
    pub const fn standard() -> Self {
        Self::new(RESOURCE_METRICS, SYSCALLS)
    }

    pub fn metrics(&self) -> &'static [&'static str] {
        self.metrics
    }

    pub fn syscalls(&self) -> &'static [&'static str] {
        self.syscalls
    }

    /// Nombre total de colonnes
    pub fn len(&self) -> usize {
        BASE_FIELDS.len() + self.metrics.len() + self.syscalls.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn header(&self) -> Vec<&'static str> {
        BASE_FIELDS
            .iter()
            .chain(self.metrics.iter())
            .chain(self.syscalls.iter())
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_order() {
        let schema = RecordSchema::standard();
        let header = schema.header();

        assert_eq!(header.len(), 3 + 26 + 21);
        assert_eq!(header.len(), schema.len());
        assert_eq!(&header[..4], &["timestamp", "mode", "hostname", "node_cpu_seconds_total"]);
        assert_eq!(header[3 + 25], "node_filefd_allocated");
        assert_eq!(header[3 + 26], "mmap");
        assert_eq!(*header.last().unwrap(), "write");
    }

    #[test]
    fn test_catalogs_have_no_duplicates() {
        let header = RecordSchema::standard().header();
        let mut sorted = header.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), header.len());
    }
}

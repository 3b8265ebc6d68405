/*!
Bots factices pour tester le contrôleur sans vrais agents

- `ControlBot` : se connecte au canal contrôle et lit les noms de mode poussés
- `TelemetryBot` : envoie des rapports JSON (ou des octets arbitraires) sur le canal données

Le canal contrôle n'a pas de framing : plusieurs noms peuvent arriver collés
dans une même lecture, `split_mode_stream` les redécoupe.
*/

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Noms de modes connus côté bot
pub const MODE_NAMES: [&str; 6] = [
    "normal_traffic",
    "high_traffic",
    "udp_flood",
    "tcp_flood",
    "http_flood",
    "icmp_flood",
];

/// Découpe un flux de noms concaténés (`"udp_floodtcp_flood"`).
/// Retourne les noms reconnus et le reste non reconnu (nom encore partiel).
pub fn split_mode_stream<'a>(mut text: &'a str, known: &[&str]) -> (Vec<String>, &'a str) {
    let mut modes = Vec::new();
    'outer: while !text.is_empty() {
        for name in known {
            if let Some(rest) = text.strip_prefix(name) {
                modes.push(name.to_string());
                text = rest;
                continue 'outer;
            }
        }
        break;
    }
    (modes, text)
}

pub struct ControlBot {
    stream: TcpStream,
    pending: String,
    queued: VecDeque<String>,
    received: Vec<String>,
}

impl ControlBot {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("control connect to {addr}"))?;
        log::info!("🤖 [BOT] control channel connected to {}", addr);
        Ok(Self {
            stream,
            pending: String::new(),
            queued: VecDeque::new(),
            received: Vec::new(),
        })
    }

    /// Attend le prochain nom de mode complet
    pub async fn next_mode(&mut self, timeout_ms: u64) -> Result<String> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        let mut buf = [0u8; 256];

        loop {
            if let Some(name) = self.queued.pop_front() {
                self.received.push(name.clone());
                return Ok(name);
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let n = timeout(remaining, self.stream.read(&mut buf))
                .await
                .context("timeout waiting for mode")??;
            if n == 0 {
                anyhow::bail!("control channel closed by server");
            }
            self.pending
                .push_str(std::str::from_utf8(&buf[..n]).context("mode is not UTF-8")?);

            let (modes, rest) = split_mode_stream(&self.pending, &MODE_NAMES);
            let rest = rest.to_string();
            self.queued.extend(modes);
            self.pending = rest;
        }
    }

    /// Tous les modes rendus jusqu'ici par `next_mode`
    pub fn received(&self) -> &[String] {
        &self.received
    }
}

pub struct TelemetryBot {
    stream: TcpStream,
    hostname: String,
}

impl TelemetryBot {
    pub async fn connect(addr: SocketAddr, hostname: impl Into<String>) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("data connect to {addr}"))?;
        let hostname = hostname.into();
        log::info!("📡 [BOT] {} data channel connected to {}", hostname, addr);
        Ok(Self { stream, hostname })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub async fn send_report(&mut self, report: &Value) -> Result<()> {
        let payload = serde_json::to_vec(report)?;
        self.send_raw(&payload).await
    }

    pub async fn send_raw(&mut self, payload: &[u8]) -> Result<()> {
        self.stream.write_all(payload).await?;
        self.stream.flush().await?;
        log::debug!("📤 [BOT] {} sent {} bytes", self.hostname, payload.len());
        Ok(())
    }

    /// Vérifie que le serveur n'a pas fermé la connexion (aucune donnée n'est attendue)
    pub async fn is_open(&mut self, wait_ms: u64) -> bool {
        let mut buf = [0u8; 1];
        match timeout(Duration::from_millis(wait_ms), self.stream.read(&mut buf)).await {
            Err(_) => true,
            Ok(Ok(0)) | Ok(Err(_)) => false,
            Ok(Ok(_)) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_split_mode_stream() {
        let (modes, rest) = split_mode_stream("udp_floodhttp_floodnormal_traf", &MODE_NAMES);
        assert_eq!(modes, vec!["udp_flood", "http_flood"]);
        assert_eq!(rest, "normal_traf");

        let (modes, rest) = split_mode_stream("", &MODE_NAMES);
        assert!(modes.is_empty());
        assert_eq!(rest, "");
    }

    #[tokio::test]
    async fn test_control_bot_reads_concatenated_modes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"normal_traffictcp_flood").await.unwrap();
            sock
        });

        let mut bot = ControlBot::connect(addr).await.unwrap();
        assert_eq!(bot.next_mode(2000).await.unwrap(), "normal_traffic");
        assert_eq!(bot.next_mode(2000).await.unwrap(), "tcp_flood");
        assert_eq!(bot.received(), ["normal_traffic", "tcp_flood"]);
        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_telemetry_bot_sends_json() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            sock.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let mut bot = TelemetryBot::connect(addr, "h1").await.unwrap();
        bot.send_report(&serde_json::json!({"Hostname": "h1"})).await.unwrap();
        drop(bot);

        let received = server.await.unwrap();
        let value: Value = serde_json::from_slice(&received).unwrap();
        assert_eq!(value["Hostname"], "h1");
    }
}

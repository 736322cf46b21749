//! Fake receiver and polling helpers shared by the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anthem_protocol::{LineDecoder, ModelFamily};
use anthem_sdk::{ClientConfig, ConnectionConfig, DeviceConfig, DeviceDescriptor};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

// ============================================================================
// Fake receiver
// ============================================================================

#[derive(Debug, Clone)]
struct ZoneSim {
    power: bool,
    volume: i32,
    muted: bool,
    input: u8,
    listening_mode: u8,
}

impl ZoneSim {
    /// Zone 1 starts off, zone 2 on, so power commands always change something
    fn initial(zone: u8) -> Self {
        Self {
            power: zone % 2 == 0,
            volume: -40,
            muted: false,
            input: 1,
            listening_mode: 0,
        }
    }
}

struct Inner {
    responsive_zones: u8,
    input_count: u8,
    zones: Mutex<BTreeMap<u8, ZoneSim>>,
    input_names: Mutex<BTreeMap<u8, String>>,
    received: Mutex<Vec<String>>,
    connections: AtomicUsize,
    kill: broadcast::Sender<()>,
    push: broadcast::Sender<Vec<u8>>,
}

impl Inner {
    fn input_name(&self, index: u8) -> String {
        self.input_names
            .lock()
            .unwrap()
            .get(&index)
            .cloned()
            .unwrap_or_else(|| format!("Source {}", index))
    }

    fn respond(&self, line: &str) -> Option<String> {
        if let Some(rest) = line.strip_prefix('Z') {
            let zone: u8 = rest.get(..1)?.parse().ok()?;
            if zone > self.responsive_zones {
                return None;
            }
            let code = rest.get(1..4)?;
            let value = rest.get(4..)?;

            let mut zones = self.zones.lock().unwrap();
            let sim = zones.entry(zone).or_insert_with(|| ZoneSim::initial(zone));

            match (code, value) {
                (_, "?") => {}
                ("POW", v) => sim.power = v == "1",
                ("VOL", v) => sim.volume = v.parse().ok()?,
                ("VUP", _) => sim.volume = (sim.volume + 1).min(0),
                ("VDN", _) => sim.volume = (sim.volume - 1).max(-90),
                ("MUT", v) => sim.muted = v == "1",
                ("INP", v) => sim.input = v.parse().ok()?,
                ("ALM", v) => sim.listening_mode = v.parse().ok()?,
                ("AUP", _) => sim.listening_mode = (sim.listening_mode + 1) % 16,
                ("ADN", _) => sim.listening_mode = (sim.listening_mode + 15) % 16,
                _ => return None,
            }

            return match code {
                "POW" => Some(format!("Z{}POW{}\r", zone, u8::from(sim.power))),
                "VOL" | "VUP" | "VDN" => Some(format!("Z{}VOL{}\r", zone, sim.volume)),
                "MUT" => Some(format!("Z{}MUT{}\r", zone, u8::from(sim.muted))),
                "INP" => Some(format!("Z{}INP{}\r", zone, sim.input)),
                "ALM" | "AUP" | "ADN" => Some(format!("Z{}ALM{}\r", zone, sim.listening_mode)),
                "SIP" => Some(format!("Z{}SIP\"{}\"\r", zone, self.input_name(sim.input))),
                _ => None,
            };
        }

        match line {
            "IDM?" => Some("IDMMRX 720\r".to_string()),
            "ICN?" => Some(format!("ICN{}\r", self.input_count)),
            _ if line.starts_with("ISN") && line.ends_with('?') => {
                let index: u8 = line.get(3..5)?.parse().ok()?;
                Some(format!("ISN{:02}{}\r", index, self.input_name(index)))
            }
            _ => None,
        }
    }
}

async fn serve_connection(stream: TcpStream, inner: Arc<Inner>) {
    let mut kill = inner.kill.subscribe();
    let mut push = inner.push.subscribe();
    let (mut reader, mut writer) = stream.into_split();
    let mut decoder = LineDecoder::new();
    let mut buffer = [0u8; 1024];

    loop {
        tokio::select! {
            _ = kill.recv() => return,
            bytes = push.recv() => {
                if let Ok(bytes) = bytes {
                    if writer.write_all(&bytes).await.is_err() {
                        return;
                    }
                }
            }
            read = reader.read(&mut buffer) => {
                let n = match read {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                for line in decoder.feed(&buffer[..n]) {
                    inner.received.lock().unwrap().push(line.clone());
                    if let Some(reply) = inner.respond(&line) {
                        if writer.write_all(reply.as_bytes()).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Receiver stand-in answering queries and commands like a real unit
pub struct FakeReceiver {
    address: SocketAddr,
    inner: Arc<Inner>,
    task: JoinHandle<()>,
}

impl FakeReceiver {
    /// Zones above `responsive_zones` never answer
    pub async fn start(responsive_zones: u8, input_count: u8) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let (kill, _) = broadcast::channel(4);
        let (push, _) = broadcast::channel(16);

        let inner = Arc::new(Inner {
            responsive_zones,
            input_count,
            zones: Mutex::new(BTreeMap::new()),
            input_names: Mutex::new(BTreeMap::new()),
            received: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
            kill,
            push,
        });

        let accept_inner = Arc::clone(&inner);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_inner.connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve_connection(stream, Arc::clone(&accept_inner)));
            }
        });

        Self {
            address,
            inner,
            task,
        }
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    pub fn descriptor(&self, zone_count: u8) -> DeviceDescriptor {
        DeviceDescriptor::new("Fake", "127.0.0.1", self.port(), ModelFamily::Mrx, zone_count)
            .unwrap()
    }

    pub fn device_config(&self, zone_count: u8) -> DeviceConfig {
        let mut config = DeviceConfig::new("127.0.0.1");
        config.port = self.port();
        config.zone_count = zone_count;
        config
    }

    pub fn received(&self) -> Vec<String> {
        self.inner.received.lock().unwrap().clone()
    }

    /// How many times `line` was received
    pub fn count(&self, line: &str) -> usize {
        self.received().iter().filter(|l| l.as_str() == line).count()
    }

    pub fn connections(&self) -> usize {
        self.inner.connections.load(Ordering::SeqCst)
    }

    /// Closes every open connection (the listener stays up)
    pub fn drop_connections(&self) {
        let _ = self.inner.kill.send(());
    }

    /// Renames an input and announces it like the receiver's setup menu does
    pub fn rename_input(&self, index: u8, name: &str) {
        self.inner
            .input_names
            .lock()
            .unwrap()
            .insert(index, name.to_string());
        self.push(format!("ISN{:02}{}\r", index, name).as_bytes());
    }

    /// Sends raw bytes to every open connection
    pub fn push(&self, bytes: &[u8]) {
        let _ = self.inner.push.send(bytes.to_vec());
    }
}

impl Drop for FakeReceiver {
    fn drop(&mut self) {
        self.task.abort();
        let _ = self.inner.kill.send(());
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn test_config() -> ClientConfig {
    ClientConfig::default()
        .with_connection(
            ConnectionConfig::default()
                .with_backoff(Duration::from_millis(20), Duration::from_millis(200))
                .with_connect_timeout(Duration::from_secs(2)),
        )
        .with_resync_timeout(Duration::from_millis(300))
}

/// Polls `condition` until it holds, panicking after three seconds
pub async fn eventually<F>(description: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", description);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

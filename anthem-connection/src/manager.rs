//! Persistent TCP session to one receiver
//!
//! The manager owns a background session task that connects, writes the
//! resync burst, runs the read loop and reconnects with backoff whenever the
//! socket fails. Host commands go through a single async mutex around the
//! write half, so lines from concurrent callers never interleave.
//!
//! ```text
//! start() ──► Connecting ──connect+burst──► Connected ──EOF/error──► Disconnected
//!                  ▲                                                     │
//!                  └──────────────── backoff sleep ◄─────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use anthem_protocol::{parse_response, Command, LineDecoder};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::backoff::Backoff;
use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, Result};
use crate::handler::ResponseHandler;
use crate::resync::ResyncPlan;
use crate::state::ConnectionState;

/// Written after `idle_timeout` of read silence
const PROBE_LINE: &str = "Z1POW?\r";

/// Write half of the live socket
struct SessionWriter {
    half: OwnedWriteHalf,
    /// Wakes the read loop when a write fails
    lost: Arc<Notify>,
}

/// State shared between the manager handle and its session task
struct Shared {
    address: String,
    config: ConnectionConfig,
    resync_lines: Vec<String>,
    handler: Arc<dyn ResponseHandler>,
    writer: tokio::sync::Mutex<Option<SessionWriter>>,
    state_tx: watch::Sender<ConnectionState>,
    alive: AtomicBool,
    last_contact: RwLock<Option<DateTime<Utc>>>,
    resync_count: AtomicU64,
    reconnect_attempts: AtomicU32,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Updates the watch value, returning true if it changed
    fn publish_state(&self, state: ConnectionState) -> bool {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        })
    }

    fn announce_state(&self, state: ConnectionState) {
        tracing::info!("{} is {}", self.address, state);
        self.handler.connection_state_changed(state);
    }

    fn set_state(&self, state: ConnectionState) {
        if self.publish_state(state) {
            self.announce_state(state);
        }
    }

    fn mark_contact(&self) {
        self.alive.store(true, Ordering::SeqCst);
        *self.last_contact.write() = Some(Utc::now());
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut slot = self.writer.lock().await;

        if !self.state().is_connected() {
            slot.take();
            return Err(ConnectionError::NotConnected);
        }
        let writer = slot.as_mut().ok_or(ConnectionError::NotConnected)?;

        let result = match timeout(self.config.write_timeout, writer.half.write_all(line.as_bytes()))
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Io(e)),
            Err(_) => Err(ConnectionError::Timeout("write")),
        };

        match result {
            Ok(()) => {
                tracing::debug!("{} -> {}", self.address, line.trim_end());
                // disconnect() may have run while this write was in flight
                if !self.state().is_connected() {
                    slot.take();
                }
                Ok(())
            }
            Err(error) => {
                tracing::warn!("Write to {} failed: {}", self.address, error);
                if let Some(writer) = slot.take() {
                    writer.lost.notify_one();
                }
                Err(error)
            }
        }
    }

    /// Connects, writes the resync burst and publishes the writer
    async fn open_session(&self) -> Result<(OwnedReadHalf, Arc<Notify>)> {
        let stream = match timeout(self.config.connect_timeout, TcpStream::connect(&self.address))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ConnectionError::ConnectFailed {
                    address: self.address.clone(),
                    reason: e.to_string(),
                })
            }
            Err(_) => return Err(ConnectionError::Timeout("connect")),
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Could not set TCP_NODELAY on {}: {}", self.address, e);
        }

        let (reader, mut writer) = stream.into_split();

        // The burst goes out before the writer is visible to host commands.
        let burst = self.resync_lines.concat();
        match timeout(self.config.write_timeout, writer.write_all(burst.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ConnectionError::Io(e)),
            Err(_) => return Err(ConnectionError::Timeout("resync")),
        }
        self.resync_count.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            "{} -> resync burst ({} lines)",
            self.address,
            self.resync_lines.len()
        );

        self.mark_contact();
        self.reconnect_attempts.store(0, Ordering::SeqCst);

        let lost = Arc::new(Notify::new());
        let changed = {
            let mut slot = self.writer.lock().await;
            *slot = Some(SessionWriter {
                half: writer,
                lost: Arc::clone(&lost),
            });
            self.publish_state(ConnectionState::Connected)
        };

        if changed {
            self.announce_state(ConnectionState::Connected);
        }

        Ok((reader, lost))
    }

    /// Reads until the session ends and returns why it ended
    async fn read_loop(
        &self,
        mut reader: OwnedReadHalf,
        decoder: &mut LineDecoder,
        lost: &Notify,
    ) -> ConnectionError {
        let mut buffer = vec![0u8; self.config.read_buffer_size];
        let mut probed = false;

        loop {
            let read = tokio::select! {
                read = timeout(self.config.idle_timeout, reader.read(&mut buffer)) => read,
                _ = lost.notified() => return ConnectionError::Closed("write failed"),
            };

            match read {
                Err(_) => {
                    if probed {
                        return ConnectionError::Closed("no response to liveness probe");
                    }
                    self.alive.store(false, Ordering::SeqCst);
                    tracing::debug!(
                        "No data from {} for {:?}, probing",
                        self.address,
                        self.config.idle_timeout
                    );
                    if let Err(error) = self.write_line(PROBE_LINE).await {
                        return error;
                    }
                    probed = true;
                }
                Ok(Ok(0)) => return ConnectionError::Closed("closed by receiver"),
                Ok(Ok(n)) => {
                    probed = false;
                    self.mark_contact();
                    for line in decoder.feed(&buffer[..n]) {
                        tracing::debug!("{} <- {}", self.address, line);
                        self.handler.handle_response(parse_response(&line));
                    }
                }
                Ok(Err(e)) => return ConnectionError::Io(e),
            }
        }
    }
}

/// Session task: connect, read, reconnect, forever
async fn run_session(shared: Arc<Shared>) {
    let mut backoff = Backoff::new(shared.config.backoff_base, shared.config.backoff_max);
    let mut decoder = LineDecoder::with_max_line_length(shared.config.max_line_length);

    loop {
        shared.set_state(ConnectionState::Connecting);

        match shared.open_session().await {
            Ok((reader, lost)) => {
                backoff.reset();
                decoder.reset();

                let reason = shared.read_loop(reader, &mut decoder, &lost).await;
                tracing::warn!("Connection to {} lost: {}", shared.address, reason);
                shared.writer.lock().await.take();
            }
            Err(error) => {
                tracing::warn!("Connection to {} failed: {}", shared.address, error);
            }
        }

        shared.alive.store(false, Ordering::SeqCst);
        shared.set_state(ConnectionState::Disconnected);

        let delay = backoff.next_delay();
        shared.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Reconnecting to {} in {:?}", shared.address, delay);
        tokio::time::sleep(delay).await;
    }
}

/// Owns the TCP session to one receiver
pub struct ConnectionManager {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Creates an idle manager for `address` (`host:port`)
    ///
    /// Nothing is opened until [`start`](Self::start) is called.
    pub fn new(
        address: impl Into<String>,
        zone_count: u8,
        config: ConnectionConfig,
        handler: Arc<dyn ResponseHandler>,
    ) -> Result<Self> {
        config.validate()?;
        let resync_lines = ResyncPlan::new(zone_count).lines()?;
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            shared: Arc::new(Shared {
                address: address.into(),
                config,
                resync_lines,
                handler,
                writer: tokio::sync::Mutex::new(None),
                state_tx,
                alive: AtomicBool::new(false),
                last_contact: RwLock::new(None),
                resync_count: AtomicU64::new(0),
                reconnect_attempts: AtomicU32::new(0),
            }),
            task: Mutex::new(None),
        })
    }

    /// Spawns the session task unless it is already running
    ///
    /// Returns true if this call started it. Must be called inside a Tokio
    /// runtime.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        tracing::debug!("Starting session for {}", self.shared.address);
        *task = Some(tokio::spawn(run_session(Arc::clone(&self.shared))));
        true
    }

    /// Stops the session and closes the socket; no reconnect follows
    ///
    /// Waits up to `write_timeout` for a write in flight to finish. A write
    /// that outlasts that wait drops the socket itself when it completes.
    pub async fn disconnect(&self) {
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }

        self.shared.alive.store(false, Ordering::SeqCst);
        self.shared.set_state(ConnectionState::Disconnected);

        match timeout(self.shared.config.write_timeout, self.shared.writer.lock()).await {
            Ok(mut slot) => {
                slot.take();
            }
            Err(_) => tracing::debug!(
                "Write to {} still in flight, socket closes when it ends",
                self.shared.address
            ),
        }
    }

    /// Writes one encoded line (terminator included)
    ///
    /// Fails fast with [`ConnectionError::NotConnected`] while no session is
    /// live; nothing is queued.
    pub async fn send_line(&self, line: &str) -> Result<()> {
        self.shared.write_line(line).await
    }

    /// Encodes and writes a command
    pub async fn send(&self, command: &Command) -> Result<()> {
        let line = command.to_line()?;
        self.send_line(&line).await
    }

    pub fn address(&self) -> &str {
        &self.shared.address
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Receiver for connection state transitions
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn is_started(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// False after `idle_timeout` without data, until the receiver speaks again
    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::SeqCst)
    }

    /// Time of the last successful connect or read
    pub fn last_contact(&self) -> Option<DateTime<Utc>> {
        *self.shared.last_contact.read()
    }

    /// Number of resync bursts written so far
    pub fn resync_count(&self) -> u64 {
        self.shared.resync_count.load(Ordering::SeqCst)
    }

    /// Failed attempts since the last successful connect
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.reconnect_attempts.load(Ordering::SeqCst)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anthem_protocol::{ResponseEvent, ZoneNumber};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    struct Recorder {
        tx: mpsc::UnboundedSender<ResponseEvent>,
    }

    impl ResponseHandler for Recorder {
        fn handle_response(&self, event: ResponseEvent) {
            let _ = self.tx.send(event);
        }
    }

    fn test_config() -> ConnectionConfig {
        ConnectionConfig::default()
            .with_backoff(Duration::from_millis(20), Duration::from_millis(100))
            .with_connect_timeout(Duration::from_secs(2))
    }

    async fn setup(
        config: ConnectionConfig,
    ) -> (
        TcpListener,
        ConnectionManager,
        mpsc::UnboundedReceiver<ResponseEvent>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = ConnectionManager::new(address, 1, config, Arc::new(Recorder { tx })).unwrap();
        (listener, manager, rx)
    }

    async fn accept(listener: &TcpListener) -> TcpStream {
        let (stream, _) = timeout(Duration::from_secs(2), listener.accept())
            .await
            .expect("no connection")
            .unwrap();
        stream
    }

    async fn read_lines(stream: &mut TcpStream, decoder: &mut LineDecoder, count: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut buffer = [0u8; 512];
        while lines.len() < count {
            let n = timeout(Duration::from_secs(2), stream.read(&mut buffer))
                .await
                .expect("read timed out")
                .unwrap();
            assert!(n > 0, "client closed the socket");
            lines.extend(decoder.feed(&buffer[..n]));
        }
        lines
    }

    fn burst() -> Vec<String> {
        ResyncPlan::new(1)
            .lines()
            .unwrap()
            .into_iter()
            .map(|line| line.trim_end().to_string())
            .collect()
    }

    async fn wait_connected(manager: &ConnectionManager) {
        let mut rx = manager.watch_state();
        timeout(Duration::from_secs(2), rx.wait_for(|state| state.is_connected()))
            .await
            .expect("never connected")
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_before_start_fails_fast() {
        let (_listener, manager, _rx) = setup(test_config()).await;
        let result = manager.send_line("Z1POW1\r").await;
        assert!(matches!(result, Err(ConnectionError::NotConnected)));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_resync_burst_precedes_commands() {
        let (listener, manager, _rx) = setup(test_config()).await;
        assert!(manager.start());

        let mut server = accept(&listener).await;
        let mut decoder = LineDecoder::new();
        assert_eq!(read_lines(&mut server, &mut decoder, 8).await, burst());

        wait_connected(&manager).await;
        manager
            .send(&Command::Power { zone: ZoneNumber::MAIN, on: true })
            .await
            .unwrap();
        assert_eq!(read_lines(&mut server, &mut decoder, 1).await, vec!["Z1POW1"]);
        assert_eq!(manager.resync_count(), 1);
        assert!(manager.last_contact().is_some());
    }

    #[tokio::test]
    async fn test_malformed_line_does_not_stop_read_loop() {
        let (listener, manager, mut rx) = setup(test_config()).await;
        manager.start();

        let mut server = accept(&listener).await;
        read_lines(&mut server, &mut LineDecoder::new(), 8).await;

        server.write_all(b"Z1POW1\rZ1VOLxx\rZ1VO").await.unwrap();
        server.write_all(b"L-40\r").await.unwrap();

        let mut events = Vec::new();
        while events.len() < 3 {
            let event = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                ResponseEvent::ZonePower(1, true),
                ResponseEvent::Unrecognized("Z1VOLxx".to_string()),
                ResponseEvent::ZoneVolume(1, -40),
            ]
        );
    }

    #[tokio::test]
    async fn test_reconnects_and_resyncs_after_drop() {
        let (listener, manager, _rx) = setup(test_config()).await;
        manager.start();

        let mut first = accept(&listener).await;
        read_lines(&mut first, &mut LineDecoder::new(), 8).await;
        drop(first);

        let mut second = accept(&listener).await;
        assert_eq!(read_lines(&mut second, &mut LineDecoder::new(), 8).await, burst());

        wait_connected(&manager).await;
        assert_eq!(manager.resync_count(), 2);
        assert_eq!(manager.reconnect_attempts(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_stops_reconnecting() {
        let (listener, manager, _rx) = setup(test_config()).await;
        manager.start();

        let mut server = accept(&listener).await;
        read_lines(&mut server, &mut LineDecoder::new(), 8).await;
        wait_connected(&manager).await;

        manager.disconnect().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.is_started());
        assert!(matches!(
            manager.send_line("Z1POW0\r").await,
            Err(ConnectionError::NotConnected)
        ));

        let mut buffer = [0u8; 16];
        let n = timeout(Duration::from_secs(2), server.read(&mut buffer))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
        assert!(timeout(Duration::from_millis(300), listener.accept())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_disconnect_during_write_closes_socket() {
        let (listener, manager, _rx) = setup(test_config()).await;
        let manager = Arc::new(manager);
        manager.start();

        let mut server = accept(&listener).await;
        read_lines(&mut server, &mut LineDecoder::new(), 8).await;
        wait_connected(&manager).await;

        // Large enough to fill the socket buffers while the server is not reading
        let payload = format!("{}\r", "X".repeat(32 * 1024 * 1024));
        let writer = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.send_line(&payload).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let disconnecting = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.disconnect().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut buffer = vec![0u8; 64 * 1024];
        let drained = timeout(Duration::from_secs(10), async {
            loop {
                match server.read(&mut buffer).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;
        assert!(drained.is_ok(), "socket left open after disconnect");

        disconnecting.await.unwrap();
        let _ = writer.await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (listener, manager, _rx) = setup(test_config()).await;
        assert!(manager.start());
        assert!(!manager.start());

        let _server = accept(&listener).await;
        assert!(timeout(Duration::from_millis(300), listener.accept())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unreachable_receiver_keeps_retrying() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let (tx, _rx) = mpsc::unbounded_channel();
        let manager =
            ConnectionManager::new(address, 1, test_config(), Arc::new(Recorder { tx })).unwrap();
        manager.start();

        timeout(Duration::from_secs(3), async {
            while manager.reconnect_attempts() < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(!manager.state().is_connected());
        assert!(manager.is_started());
    }

    #[tokio::test]
    async fn test_idle_probe_then_reconnect() {
        let config = test_config().with_idle_timeout(Duration::from_millis(150));
        let (listener, manager, _rx) = setup(config).await;
        manager.start();

        let mut server = accept(&listener).await;
        let mut decoder = LineDecoder::new();
        read_lines(&mut server, &mut decoder, 8).await;

        assert_eq!(read_lines(&mut server, &mut decoder, 1).await, vec!["Z1POW?"]);
        assert!(!manager.is_alive());

        // Unanswered probe ends the session; a new one is opened.
        let mut second = accept(&listener).await;
        read_lines(&mut second, &mut LineDecoder::new(), 8).await;
        wait_connected(&manager).await;
        assert!(manager.is_alive());
    }
}

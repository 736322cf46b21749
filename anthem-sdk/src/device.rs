//! Per-receiver facade
//!
//! A [`DeviceClient`] composes one [`ConnectionManager`] and one
//! [`ZoneStateStore`]. Commands are validated locally and written
//! immediately; their effect shows up later through the change stream, once
//! the receiver reports it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anthem_connection::{ConnectionManager, ConnectionState, ResponseHandler};
use anthem_protocol::{
    listening_mode_by_name, listening_mode_count, listening_mode_name, Command, CommandCode,
    ModelFamily, ZoneNumber, VOLUME_MAX_DB, VOLUME_MIN_DB,
};
use anthem_state::{DeviceDescriptor, DeviceId, DeviceInfo, ZoneState, ZoneStateStore};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::dispatch::{spawn_follow_up_worker, Dispatcher, FollowUp, FOLLOW_UP_CAPACITY};
use crate::entity::EntityId;
use crate::error::{Result, SdkError};
use crate::notify::{ZoneAvailability, ZoneChange};
use crate::volume::{db_to_percent, percent_to_db};

/// Client for one configured receiver
pub struct DeviceClient {
    descriptor: DeviceDescriptor,
    config: ClientConfig,
    store: Arc<ZoneStateStore>,
    dispatcher: Arc<Dispatcher>,
    connection: Arc<ConnectionManager>,
    changes: broadcast::Sender<ZoneChange>,
    initialized: AtomicBool,
    follow_up_rx: Mutex<Option<mpsc::Receiver<FollowUp>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceClient {
    /// Creates an idle client publishing into `changes`
    ///
    /// Nothing connects until [`ensure_initialized`](Self::ensure_initialized).
    pub fn new(
        descriptor: DeviceDescriptor,
        config: ClientConfig,
        changes: broadcast::Sender<ZoneChange>,
    ) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(ZoneStateStore::new(&descriptor));
        let (follow_up_tx, follow_up_rx) = mpsc::channel(FOLLOW_UP_CAPACITY);
        let dispatcher = Arc::new(Dispatcher::new(
            descriptor.id().clone(),
            descriptor.zone_count(),
            Arc::clone(&store),
            changes.clone(),
            follow_up_tx,
        ));

        let handler: Arc<dyn ResponseHandler> = dispatcher.clone();
        let connection = Arc::new(ConnectionManager::new(
            descriptor.address(),
            descriptor.zone_count(),
            config.connection.clone(),
            handler,
        )?);

        Ok(Self {
            descriptor,
            config,
            store,
            dispatcher,
            connection,
            changes,
            initialized: AtomicBool::new(false),
            follow_up_rx: Mutex::new(Some(follow_up_rx)),
            worker: Mutex::new(None),
        })
    }

    /// Creates a client with its own change channel
    pub fn standalone(descriptor: DeviceDescriptor, config: ClientConfig) -> Result<Self> {
        let (changes, _) = broadcast::channel(config.change_buffer.max(1));
        Self::new(descriptor, config, changes)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Starts the connection exactly once, however many triggers race here
    ///
    /// Returns true if this call performed the start. Must be called inside a
    /// Tokio runtime.
    pub fn ensure_initialized(&self) -> bool {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        if let Some(follow_ups) = self.follow_up_rx.lock().take() {
            *self.worker.lock() = Some(spawn_follow_up_worker(
                follow_ups,
                Arc::clone(&self.dispatcher),
                Arc::clone(&self.connection),
                self.config.resync_timeout,
            ));
        }

        tracing::info!(
            "Initializing {} ({}) at {}",
            self.descriptor.name(),
            self.descriptor.id(),
            self.descriptor.address()
        );
        self.connection.start();
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Reconnects after [`disconnect`](Self::disconnect)
    pub fn connect(&self) {
        if !self.ensure_initialized() {
            self.connection.start();
        }
    }

    /// Closes the socket; no reconnect until [`connect`](Self::connect)
    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    /// Disconnects and stops background work for good
    pub async fn shutdown(&self) {
        self.connection.disconnect().await;
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
        tracing::info!("Shut down {}", self.descriptor.id());
    }

    // ========================================================================
    // Power
    // ========================================================================

    pub async fn power_on(&self, zone: u8) -> Result<()> {
        let zone = self.zone(zone)?;
        self.send(Command::Power { zone, on: true }).await
    }

    pub async fn power_off(&self, zone: u8) -> Result<()> {
        let zone = self.zone(zone)?;
        self.send(Command::Power { zone, on: false }).await
    }

    /// Fails with [`SdkError::UnknownState`] until the power state is known
    pub async fn power_toggle(&self, zone: u8) -> Result<()> {
        let zone = self.zone(zone)?;
        let on = self.known(zone, "power", |state| state.power)?;
        self.send(Command::Power { zone, on: !on }).await
    }

    // ========================================================================
    // Volume
    // ========================================================================

    /// Sets the volume from a 0-100 percentage
    pub async fn set_volume(&self, zone: u8, percent: u8) -> Result<()> {
        let zone = self.zone(zone)?;
        if percent > 100 {
            return Err(SdkError::InvalidValue(format!(
                "volume {}% is outside 0-100",
                percent
            )));
        }
        self.send(Command::SetVolume {
            zone,
            db: percent_to_db(percent),
        })
        .await
    }

    pub async fn set_volume_db(&self, zone: u8, db: i32) -> Result<()> {
        let zone = self.zone(zone)?;
        if !(VOLUME_MIN_DB..=VOLUME_MAX_DB).contains(&db) {
            return Err(SdkError::InvalidValue(format!(
                "volume {}dB is outside {}-{}",
                db, VOLUME_MIN_DB, VOLUME_MAX_DB
            )));
        }
        self.send(Command::SetVolume { zone, db }).await
    }

    /// One receiver-defined step up; the new value arrives asynchronously
    pub async fn volume_up(&self, zone: u8) -> Result<()> {
        let zone = self.zone(zone)?;
        self.send(Command::VolumeUp { zone }).await
    }

    pub async fn volume_down(&self, zone: u8) -> Result<()> {
        let zone = self.zone(zone)?;
        self.send(Command::VolumeDown { zone }).await
    }

    /// Stored volume as a percentage, `None` while unknown
    pub fn volume_percent(&self, zone: u8) -> Result<Option<u8>> {
        Ok(self.zone_state(zone)?.volume_db.map(db_to_percent))
    }

    // ========================================================================
    // Mute
    // ========================================================================

    pub async fn mute(&self, zone: u8) -> Result<()> {
        let zone = self.zone(zone)?;
        self.send(Command::Mute { zone, on: true }).await
    }

    pub async fn unmute(&self, zone: u8) -> Result<()> {
        let zone = self.zone(zone)?;
        self.send(Command::Mute { zone, on: false }).await
    }

    /// Fails with [`SdkError::UnknownState`] until the mute state is known
    pub async fn mute_toggle(&self, zone: u8) -> Result<()> {
        let zone = self.zone(zone)?;
        let muted = self.known(zone, "mute", |state| state.muted)?;
        self.send(Command::Mute { zone, on: !muted }).await
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    /// Selects an input by 1-based index and asks for its name
    pub async fn select_input(&self, zone: u8, input: u8) -> Result<()> {
        let zone = self.zone(zone)?;
        let count = self.input_count();
        if input == 0 || usize::from(input) > count {
            return Err(SdkError::InvalidInput(format!(
                "input {} (device has {} inputs)",
                input, count
            )));
        }

        self.send(Command::SelectInput { zone, input }).await?;

        let query = Command::Query {
            zone,
            code: CommandCode::InputName,
        };
        if let Err(error) = self.send(query).await {
            tracing::debug!("Input name query for zone {} not sent: {}", zone, error);
        }
        Ok(())
    }

    pub async fn select_input_by_name(&self, zone: u8, name: &str) -> Result<()> {
        let input = self
            .input_id_by_name(name)
            .ok_or_else(|| SdkError::InvalidInput(name.to_string()))?;
        self.select_input(zone, input).await
    }

    /// `(index, label)` for every input, receiver-reported names first
    pub fn input_list(&self) -> Vec<(u8, String)> {
        let defaults = self.descriptor.model_family().default_inputs();
        let info = self.store.device_info();

        (1..=self.input_count())
            .filter_map(|index| u8::try_from(index).ok())
            .map(|index| {
                let label = info
                    .input_names
                    .get(&index)
                    .cloned()
                    .or_else(|| {
                        defaults
                            .get(usize::from(index) - 1)
                            .map(|label| label.to_string())
                    })
                    .unwrap_or_else(|| format!("Input {}", index));
                (index, label)
            })
            .collect()
    }

    /// Case-insensitive lookup in [`input_list`](Self::input_list)
    pub fn input_id_by_name(&self, name: &str) -> Option<u8> {
        let name = name.trim();
        self.input_list()
            .into_iter()
            .find(|(_, label)| label.eq_ignore_ascii_case(name))
            .map(|(index, _)| index)
    }

    /// Reported input count, else the size of the model table
    fn input_count(&self) -> usize {
        match self.store.device_info().input_count {
            Some(count) if count > 0 => usize::from(count),
            _ => self.descriptor.model_family().default_inputs().len(),
        }
    }

    // ========================================================================
    // Listening mode
    // ========================================================================

    pub async fn set_listening_mode(&self, zone: u8, mode: u8) -> Result<()> {
        let zone = self.zone(zone)?;
        if listening_mode_name(mode).is_none() {
            return Err(SdkError::InvalidValue(format!(
                "listening mode {} (valid 0-{})",
                mode,
                listening_mode_count() - 1
            )));
        }
        self.send(Command::SetListeningMode { zone, mode }).await
    }

    pub async fn set_listening_mode_by_name(&self, zone: u8, name: &str) -> Result<()> {
        let mode = listening_mode_by_name(name)
            .ok_or_else(|| SdkError::InvalidValue(format!("listening mode '{}'", name)))?;
        self.set_listening_mode(zone, mode).await
    }

    /// Next mode after the stored one, wrapping; `AUP` while unknown
    pub async fn listening_mode_next(&self, zone: u8) -> Result<()> {
        let zone = self.zone(zone)?;
        match self.listening_mode(zone) {
            Some(mode) => {
                let mode = (mode + 1) % listening_mode_count();
                self.send(Command::SetListeningMode { zone, mode }).await
            }
            None => self.send(Command::ListeningModeUp { zone }).await,
        }
    }

    /// Mode before the stored one, wrapping; `ADN` while unknown
    pub async fn listening_mode_previous(&self, zone: u8) -> Result<()> {
        let zone = self.zone(zone)?;
        match self.listening_mode(zone) {
            Some(mode) => {
                let count = listening_mode_count();
                let mode = (mode + count - 1) % count;
                self.send(Command::SetListeningMode { zone, mode }).await
            }
            None => self.send(Command::ListeningModeDown { zone }).await,
        }
    }

    /// Stored mode, if it is one the receiver accepts
    fn listening_mode(&self, zone: ZoneNumber) -> Option<u8> {
        self.store
            .zone(zone.get())
            .and_then(|state| state.listening_mode)
            .filter(|mode| listening_mode_name(*mode).is_some())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Re-issues the per-zone query set
    pub async fn query_zone(&self, zone: u8) -> Result<()> {
        let zone = self.zone(zone)?;
        for command in Command::zone_queries(zone) {
            self.send(command).await?;
        }
        Ok(())
    }

    /// Snapshot of a tracked zone; never touches the network
    pub fn zone_state(&self, zone: u8) -> Result<ZoneState> {
        let zone = self.zone(zone)?;
        self.store
            .zone(zone.get())
            .ok_or_else(|| self.invalid_zone(zone.get()))
    }

    pub fn zone_states(&self) -> Vec<ZoneState> {
        self.store.zones()
    }

    pub fn availability(&self, zone: u8) -> Result<ZoneAvailability> {
        let zone = self.zone(zone)?;
        Ok(self.dispatcher.availability(zone.get()))
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.store.device_info()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Number of resync bursts written since creation
    pub fn resync_count(&self) -> u64 {
        self.connection.resync_count()
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<ZoneChange> {
        self.changes.subscribe()
    }

    // ========================================================================
    // Identity
    // ========================================================================

    pub fn id(&self) -> &DeviceId {
        self.descriptor.id()
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn model_family(&self) -> ModelFamily {
        self.descriptor.model_family()
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.descriptor
            .zones()
            .into_iter()
            .map(|zone| EntityId::new(self.id().clone(), zone))
            .collect()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn invalid_zone(&self, zone: u8) -> SdkError {
        SdkError::InvalidZone {
            zone,
            zone_count: self.descriptor.zone_count(),
        }
    }

    fn zone(&self, zone: u8) -> Result<ZoneNumber> {
        if !self.descriptor.tracks_zone(zone) {
            return Err(self.invalid_zone(zone));
        }
        ZoneNumber::new(zone).map_err(|_| self.invalid_zone(zone))
    }

    fn known<T>(
        &self,
        zone: ZoneNumber,
        attribute: &'static str,
        read: impl FnOnce(&ZoneState) -> Option<T>,
    ) -> Result<T> {
        self.store
            .zone(zone.get())
            .as_ref()
            .and_then(read)
            .ok_or(SdkError::UnknownState {
                zone: zone.get(),
                attribute,
            })
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.connection.send(&command).await.map_err(SdkError::from)
    }
}

impl Drop for DeviceClient {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(family: ModelFamily, zone_count: u8) -> DeviceClient {
        let descriptor =
            DeviceDescriptor::new("Test", "127.0.0.1", 14999, family, zone_count).unwrap();
        DeviceClient::standalone(descriptor, ClientConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_mute_toggle_with_unknown_state() {
        let client = client(ModelFamily::Mrx, 1);
        let before = client.zone_state(1).unwrap();

        let result = client.mute_toggle(1).await;
        assert!(matches!(
            result,
            Err(SdkError::UnknownState { zone: 1, attribute: "mute" })
        ));
        assert_eq!(client.zone_state(1).unwrap(), before);
    }

    #[tokio::test]
    async fn test_invalid_zone() {
        let client = client(ModelFamily::Mrx, 2);
        assert!(matches!(
            client.power_on(3).await,
            Err(SdkError::InvalidZone { zone: 3, zone_count: 2 })
        ));
        assert!(matches!(
            client.zone_state(0),
            Err(SdkError::InvalidZone { zone: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_volume_and_input() {
        let client = client(ModelFamily::Str, 1);
        assert!(matches!(
            client.set_volume(1, 101).await,
            Err(SdkError::InvalidValue(_))
        ));
        assert!(matches!(
            client.set_volume_db(1, 3).await,
            Err(SdkError::InvalidValue(_))
        ));
        assert!(matches!(
            client.select_input(1, 11).await,
            Err(SdkError::InvalidInput(_))
        ));
        assert!(matches!(
            client.select_input(1, 0).await,
            Err(SdkError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_commands_fail_fast_when_not_connected() {
        let client = client(ModelFamily::Mrx, 1);
        assert!(matches!(client.power_on(1).await, Err(SdkError::NotConnected)));
        assert!(matches!(client.set_volume(1, 50).await, Err(SdkError::NotConnected)));
        assert!(matches!(
            client.listening_mode_next(1).await,
            Err(SdkError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_invalid_listening_mode() {
        let client = client(ModelFamily::Mrx, 2);
        assert!(matches!(
            client.set_listening_mode(1, 16).await,
            Err(SdkError::InvalidValue(_))
        ));
        assert!(matches!(
            client.set_listening_mode_by_name(1, "Mono").await,
            Err(SdkError::InvalidValue(_))
        ));
        assert!(matches!(
            client.set_listening_mode(3, 1).await,
            Err(SdkError::InvalidZone { zone: 3, .. })
        ));
    }

    #[test]
    fn test_input_list_uses_model_table() {
        let client = client(ModelFamily::Str, 1);
        let inputs = client.input_list();
        assert_eq!(inputs.len(), 10);
        assert_eq!(inputs[4], (5, "Phono".to_string()));
        assert_eq!(client.input_id_by_name("phono"), Some(5));
        assert_eq!(client.input_id_by_name("HDMI 1"), None);
    }

    #[test]
    fn test_entity_ids() {
        let client = client(ModelFamily::Mrx, 2);
        let ids: Vec<String> = client.entity_ids().iter().map(|id| id.to_string()).collect();
        assert_eq!(
            ids,
            vec!["anthem_127_0_0_1_14999_zone1", "anthem_127_0_0_1_14999_zone2"]
        );
        assert_eq!(client.availability(1).unwrap(), ZoneAvailability::Unavailable);
    }
}

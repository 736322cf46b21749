//! Process-wide set of device clients
//!
//! The registry is owned by the host integration: constructed at startup,
//! mutated only through add/remove/initialize. All clients publish into one
//! shared change channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anthem_state::{DeviceDescriptor, DeviceId};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use crate::config::{ClientConfig, DeviceConfig};
use crate::device::DeviceClient;
use crate::entity::EntityId;
use crate::error::{Result, SdkError};
use crate::notify::ZoneChange;

/// Owner of every [`DeviceClient`], keyed by device id
pub struct ClientRegistry {
    config: ClientConfig,
    clients: RwLock<HashMap<DeviceId, Arc<DeviceClient>>>,
    changes: broadcast::Sender<ZoneChange>,
    /// Last device list handed over by the host
    configuration: Mutex<Vec<DeviceConfig>>,
    initialized: AtomicBool,
    /// Serializes initialization and reconciliation
    init_lock: tokio::sync::Mutex<()>,
}

impl ClientRegistry {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let (changes, _) = broadcast::channel(config.change_buffer);

        Ok(Self {
            config,
            clients: RwLock::new(HashMap::new()),
            changes,
            configuration: Mutex::new(Vec::new()),
            initialized: AtomicBool::new(false),
            init_lock: tokio::sync::Mutex::new(()),
        })
    }

    // ========================================================================
    // Device management
    // ========================================================================

    /// Registers a receiver and starts connecting in the background
    pub fn add_device(&self, descriptor: DeviceDescriptor) -> Result<Arc<DeviceClient>> {
        let client = {
            let mut clients = self.clients.write();
            if clients.contains_key(descriptor.id()) {
                return Err(SdkError::DuplicateDevice(descriptor.id().clone()));
            }

            let client = Arc::new(DeviceClient::new(
                descriptor,
                self.config.clone(),
                self.changes.clone(),
            )?);
            clients.insert(client.id().clone(), Arc::clone(&client));
            client
        };

        tracing::info!("Added device {} ({})", client.id(), client.descriptor().name());
        client.ensure_initialized();
        Ok(client)
    }

    /// Disconnects and forgets a device; unknown ids are ignored
    ///
    /// Returns true if a device was removed.
    pub async fn remove_device(&self, id: &DeviceId) -> bool {
        let removed = self.clients.write().remove(id);

        match removed {
            Some(client) => {
                client.shutdown().await;
                tracing::info!("Removed device {}", id);
                true
            }
            None => false,
        }
    }

    /// Replaces the stored device list without connecting anything
    pub fn set_configuration(&self, configs: Vec<DeviceConfig>) {
        *self.configuration.lock() = configs;
    }

    /// Brings the registry in line with `configs` and marks it initialized
    ///
    /// Devices missing from `configs` are removed, changed ones are rebuilt,
    /// new ones are added. Invalid entries are logged and skipped. Returns the
    /// number of registered devices.
    pub async fn initialize_from_configuration(&self, configs: Vec<DeviceConfig>) -> Result<usize> {
        let _guard = self.init_lock.lock().await;
        self.set_configuration(configs);
        let count = self.reconcile().await?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(count)
    }

    /// Initializes from the stored device list unless already done
    ///
    /// Safe to call from every startup trigger; only the first call does any
    /// work. Returns true if this call initialized the registry.
    pub async fn initialize(&self) -> Result<bool> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(false);
        }

        let _guard = self.init_lock.lock().await;
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(false);
        }

        let count = self.reconcile().await?;
        self.initialized.store(true, Ordering::SeqCst);
        tracing::info!("Registry initialized with {} devices", count);
        Ok(true)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn reconcile(&self) -> Result<usize> {
        let configs = self.configuration.lock().clone();

        let mut wanted: Vec<DeviceDescriptor> = Vec::new();
        for config in &configs {
            match config.to_descriptor() {
                Ok(descriptor) if wanted.iter().any(|d| d.id() == descriptor.id()) => {
                    tracing::warn!("Ignoring duplicate device entry {}", descriptor.id());
                }
                Ok(descriptor) => wanted.push(descriptor),
                Err(error) => tracing::error!("Ignoring device {}: {}", config.ip, error),
            }
        }

        // Anything not wanted verbatim goes; changed devices are re-added below.
        let stale: Vec<DeviceId> = self
            .clients
            .read()
            .values()
            .filter(|client| !wanted.iter().any(|d| d == client.descriptor()))
            .map(|client| client.id().clone())
            .collect();

        for id in &stale {
            self.remove_device(id).await;
        }

        for descriptor in wanted {
            let existing = self.clients.read().get(descriptor.id()).cloned();
            match existing {
                Some(client) => {
                    client.ensure_initialized();
                }
                None => {
                    self.add_device(descriptor)?;
                }
            }
        }

        Ok(self.clients.read().len())
    }

    /// Host subscription trigger
    ///
    /// Runs (or joins) registry initialization first, so a subscription that
    /// arrives during startup cannot race ahead of it. Fails with
    /// [`SdkError::DeviceNotFound`] for ids of unknown devices after handling
    /// the known ones.
    pub async fn subscribe_entities(&self, entity_ids: &[EntityId]) -> Result<()> {
        self.initialize().await?;

        let mut missing = None;
        for entity_id in entity_ids {
            match self.client(entity_id.device_id()) {
                Some(client) => {
                    client.ensure_initialized();
                }
                None => {
                    tracing::warn!("Subscription for unknown entity {}", entity_id);
                    if missing.is_none() {
                        missing = Some(entity_id.device_id().clone());
                    }
                }
            }
        }

        match missing {
            Some(id) => Err(SdkError::DeviceNotFound(id)),
            None => Ok(()),
        }
    }

    /// Disconnects every device
    pub async fn shutdown(&self) {
        let clients: Vec<Arc<DeviceClient>> = self.clients.write().drain().map(|(_, c)| c).collect();
        for client in clients {
            client.shutdown().await;
        }
        self.initialized.store(false, Ordering::SeqCst);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn client(&self, id: &DeviceId) -> Option<Arc<DeviceClient>> {
        self.clients.read().get(id).cloned()
    }

    /// Client owning `entity_id`, checked against its configured zones
    pub fn client_for_entity(&self, entity_id: &EntityId) -> Result<Arc<DeviceClient>> {
        let client = self
            .client(entity_id.device_id())
            .ok_or_else(|| SdkError::DeviceNotFound(entity_id.device_id().clone()))?;

        let zone = entity_id.zone().get();
        if !client.descriptor().tracks_zone(zone) {
            return Err(SdkError::InvalidZone {
                zone,
                zone_count: client.descriptor().zone_count(),
            });
        }
        Ok(client)
    }

    /// Descriptors of all registered devices, ordered by id
    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        let mut devices: Vec<DeviceDescriptor> = self
            .clients
            .read()
            .values()
            .map(|client| client.descriptor().clone())
            .collect();
        devices.sort_by(|a, b| a.id().cmp(b.id()));
        devices
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .clients
            .read()
            .values()
            .flat_map(|client| client.entity_ids())
            .collect();
        ids.sort();
        ids
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<ZoneChange> {
        self.changes.subscribe()
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

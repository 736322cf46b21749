//! Response dispatcher and follow-up worker
//!
//! The dispatcher is the connection manager's [`ResponseHandler`]: it applies
//! each event to the store, tracks per-zone availability and publishes
//! [`ZoneChange`]s. Work that needs the socket (input name queries, the
//! responsiveness check) is handed to a follow-up worker task so the read
//! loop never waits on a write.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anthem_connection::{ConnectionManager, ConnectionState, ResponseHandler};
use anthem_protocol::{Command, CommandCode, ResponseEvent, ZoneNumber};
use anthem_state::{DeviceAttribute, DeviceId, StateChange, ZoneAttribute, ZoneStateStore};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::notify::{ZoneAttributeChange, ZoneAvailability, ZoneChange};

/// Highest input index `ISN` can address
const MAX_INPUT_INDEX: u8 = 99;

/// Follow-ups that may wait for the worker; a full input-name sweep fits
pub(crate) const FOLLOW_UP_CAPACITY: usize = 128;

/// Work the dispatcher cannot do from inside the read loop
#[derive(Debug)]
pub(crate) enum FollowUp {
    Send(Command),
    /// Check responsiveness once the resync timeout for this connect elapses
    CheckResponsiveness(u64),
}

pub(crate) struct Dispatcher {
    device_id: DeviceId,
    zone_count: u8,
    store: Arc<ZoneStateStore>,
    changes: broadcast::Sender<ZoneChange>,
    availability: RwLock<BTreeMap<u8, ZoneAvailability>>,
    connected: AtomicBool,
    /// Incremented on every connect; stale responsiveness checks are skipped
    generation: AtomicU64,
    follow_ups: mpsc::Sender<FollowUp>,
}

impl Dispatcher {
    pub(crate) fn new(
        device_id: DeviceId,
        zone_count: u8,
        store: Arc<ZoneStateStore>,
        changes: broadcast::Sender<ZoneChange>,
        follow_ups: mpsc::Sender<FollowUp>,
    ) -> Self {
        let availability = (1..=zone_count)
            .map(|zone| (zone, ZoneAvailability::Unavailable))
            .collect();

        Self {
            device_id,
            zone_count,
            store,
            changes,
            availability: RwLock::new(availability),
            connected: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            follow_ups,
        }
    }

    pub(crate) fn availability(&self, zone: u8) -> ZoneAvailability {
        self.availability
            .read()
            .get(&zone)
            .copied()
            .unwrap_or_default()
    }

    fn emit(&self, zone: u8, change: ZoneAttributeChange) {
        tracing::debug!("{}_zone{}: {}", self.device_id, zone, change);
        // No receivers is fine; the host may not have subscribed yet.
        let _ = self.changes.send(ZoneChange {
            device_id: self.device_id.clone(),
            zone,
            change,
        });
    }

    fn set_availability(&self, zone: u8, availability: ZoneAvailability) {
        let changed = {
            let mut zones = self.availability.write();
            match zones.get_mut(&zone) {
                Some(current) if *current != availability => {
                    *current = availability;
                    true
                }
                _ => false,
            }
        };

        if changed {
            self.emit(zone, ZoneAttributeChange::Availability(availability));
        }
    }

    fn set_all(&self, availability: ZoneAvailability) {
        for zone in 1..=self.zone_count {
            self.set_availability(zone, availability);
        }
    }

    /// Never blocks: the read loop calls this
    fn follow_up(&self, task: FollowUp) {
        match self.follow_ups.try_send(task) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(task)) => {
                tracing::warn!("{}: follow-up queue full, dropping {:?}", self.device_id, task);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("{}: follow-up worker stopped", self.device_id);
            }
        }
    }

    fn emit_inputs_changed(&self) {
        for zone in 1..=self.zone_count {
            self.emit(zone, ZoneAttributeChange::InputsChanged);
        }
    }

    /// Asks for the selected input's name when the store has none for it
    fn query_input_name(&self, zone: u8) {
        let unnamed = self
            .store
            .zone(zone)
            .is_some_and(|state| state.input_name.is_none());
        if !unnamed {
            return;
        }
        if let Ok(zone) = ZoneNumber::new(zone) {
            self.follow_up(FollowUp::Send(Command::Query {
                zone,
                code: CommandCode::InputName,
            }));
        }
    }

    /// Marks zones that stayed silent since connect `generation` as not responding
    pub(crate) fn check_responsiveness(&self, generation: u64) {
        if !self.connected.load(Ordering::SeqCst)
            || self.generation.load(Ordering::SeqCst) != generation
        {
            return;
        }

        for zone in self.store.unresponsive_zones() {
            tracing::warn!(
                "{}: zone {} did not respond after connect",
                self.device_id,
                zone
            );
            self.set_availability(zone, ZoneAvailability::NotResponding);
        }
    }
}

impl ResponseHandler for Dispatcher {
    fn handle_response(&self, event: ResponseEvent) {
        let changes = self.store.apply_event(&event);

        if let Some(zone) = event.zone() {
            if self.connected.load(Ordering::SeqCst) && self.store.tracks_zone(zone) {
                self.set_availability(zone, ZoneAvailability::Available);
            }
        }

        for change in changes {
            match change {
                StateChange::Zone {
                    zone,
                    tracked: true,
                    attribute,
                } => {
                    let input_changed = matches!(attribute, ZoneAttribute::Input(_));
                    self.emit(zone, ZoneAttributeChange::Attribute(attribute));
                    if input_changed {
                        self.query_input_name(zone);
                    }
                }
                StateChange::Zone { tracked: false, .. } => {}
                StateChange::Device(DeviceAttribute::InputCount(count)) => {
                    tracing::debug!("{}: {} inputs, querying names", self.device_id, count);
                    for input in 1..=count.min(MAX_INPUT_INDEX) {
                        self.follow_up(FollowUp::Send(Command::QueryInputName(input)));
                    }
                    self.emit_inputs_changed();
                }
                StateChange::Device(DeviceAttribute::InputName(..)) => {
                    self.emit_inputs_changed();
                }
                StateChange::Device(DeviceAttribute::StandbyIpControl(false)) => {
                    tracing::info!(
                        "{}: standby IP control was turned off, re-enabling",
                        self.device_id
                    );
                    self.follow_up(FollowUp::Send(Command::StandbyIpControl(true)));
                }
                StateChange::Device(DeviceAttribute::Model(model)) => {
                    tracing::info!("{}: receiver model {}", self.device_id, model);
                }
                StateChange::Device(attribute) => {
                    tracing::debug!("{}: {:?}", self.device_id, attribute);
                }
            }
        }
    }

    fn connection_state_changed(&self, state: ConnectionState) {
        match state {
            ConnectionState::Connected => {
                self.store.mark_connected();
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                self.connected.store(true, Ordering::SeqCst);
                self.follow_up(FollowUp::CheckResponsiveness(generation));
            }
            ConnectionState::Disconnected => {
                self.connected.store(false, Ordering::SeqCst);
                self.set_all(ZoneAvailability::Unavailable);
            }
            ConnectionState::Connecting => {}
        }
    }
}

/// Spawns the task that carries out [`FollowUp`]s
pub(crate) fn spawn_follow_up_worker(
    mut follow_ups: mpsc::Receiver<FollowUp>,
    dispatcher: Arc<Dispatcher>,
    connection: Arc<ConnectionManager>,
    resync_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(task) = follow_ups.recv().await {
            match task {
                FollowUp::Send(command) => {
                    if let Err(error) = connection.send(&command).await {
                        tracing::debug!("Follow-up {:?} not sent: {}", command, error);
                    }
                }
                FollowUp::CheckResponsiveness(generation) => {
                    let dispatcher = Arc::clone(&dispatcher);
                    tokio::spawn(async move {
                        tokio::time::sleep(resync_timeout).await;
                        dispatcher.check_responsiveness(generation);
                    });
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher(
        zone_count: u8,
    ) -> (
        Dispatcher,
        broadcast::Receiver<ZoneChange>,
        mpsc::Receiver<FollowUp>,
    ) {
        dispatcher_with_capacity(zone_count, FOLLOW_UP_CAPACITY)
    }

    fn dispatcher_with_capacity(
        zone_count: u8,
        capacity: usize,
    ) -> (
        Dispatcher,
        broadcast::Receiver<ZoneChange>,
        mpsc::Receiver<FollowUp>,
    ) {
        let (changes, changes_rx) = broadcast::channel(64);
        let (follow_tx, follow_rx) = mpsc::channel(capacity);
        let store = Arc::new(ZoneStateStore::with_zone_count(zone_count));
        let dispatcher = Dispatcher::new(
            DeviceId::new("anthem_test_1"),
            zone_count,
            store,
            changes,
            follow_tx,
        );
        (dispatcher, changes_rx, follow_rx)
    }

    #[test]
    fn test_zone_event_makes_zone_available() {
        let (dispatcher, mut changes, _follow) = dispatcher(1);
        dispatcher.connection_state_changed(ConnectionState::Connected);
        dispatcher.handle_response(ResponseEvent::ZonePower(1, true));

        assert_eq!(dispatcher.availability(1), ZoneAvailability::Available);
        assert_eq!(
            changes.try_recv().unwrap().change,
            ZoneAttributeChange::Availability(ZoneAvailability::Available)
        );
        assert_eq!(
            changes.try_recv().unwrap().change,
            ZoneAttributeChange::Attribute(ZoneAttribute::Power(true))
        );
    }

    #[test]
    fn test_untracked_zone_is_silent() {
        let (dispatcher, mut changes, _follow) = dispatcher(1);
        dispatcher.connection_state_changed(ConnectionState::Connected);
        dispatcher.handle_response(ResponseEvent::ZonePower(2, true));
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_input_count_queues_name_queries() {
        let (dispatcher, _changes, mut follow) = dispatcher(1);
        dispatcher.handle_response(ResponseEvent::InputCount(3));

        let mut queried = Vec::new();
        while let Ok(FollowUp::Send(Command::QueryInputName(input))) = follow.try_recv() {
            queried.push(input);
        }
        assert_eq!(queried, vec![1, 2, 3]);
    }

    #[test]
    fn test_disconnect_marks_zones_unavailable() {
        let (dispatcher, _changes, _follow) = dispatcher(2);
        dispatcher.connection_state_changed(ConnectionState::Connected);
        dispatcher.handle_response(ResponseEvent::ZoneMute(2, false));
        assert_eq!(dispatcher.availability(2), ZoneAvailability::Available);

        dispatcher.connection_state_changed(ConnectionState::Disconnected);
        assert_eq!(dispatcher.availability(1), ZoneAvailability::Unavailable);
        assert_eq!(dispatcher.availability(2), ZoneAvailability::Unavailable);
    }

    #[test]
    fn test_responsiveness_check() {
        let (dispatcher, _changes, mut follow) = dispatcher(2);
        dispatcher.connection_state_changed(ConnectionState::Connected);
        dispatcher.handle_response(ResponseEvent::ZonePower(1, false));

        let generation = match follow.try_recv() {
            Ok(FollowUp::CheckResponsiveness(generation)) => generation,
            other => panic!("unexpected follow-up: {:?}", other),
        };

        dispatcher.check_responsiveness(generation + 1);
        assert_eq!(dispatcher.availability(2), ZoneAvailability::Unavailable);

        dispatcher.check_responsiveness(generation);
        assert_eq!(dispatcher.availability(1), ZoneAvailability::Available);
        assert_eq!(dispatcher.availability(2), ZoneAvailability::NotResponding);

        dispatcher.handle_response(ResponseEvent::ZonePower(2, true));
        assert_eq!(dispatcher.availability(2), ZoneAvailability::Available);
    }

    #[test]
    fn test_standby_ip_control_is_re_enabled() {
        let (dispatcher, _changes, mut follow) = dispatcher(1);
        dispatcher.handle_response(ResponseEvent::StandbyIpControl(false));

        match follow.try_recv() {
            Ok(FollowUp::Send(Command::StandbyIpControl(true))) => {}
            other => panic!("expected SIP1 follow-up, got {:?}", other),
        }

        dispatcher.handle_response(ResponseEvent::StandbyIpControl(true));
        assert!(follow.try_recv().is_err());
    }

    #[test]
    fn test_input_changes_reach_every_zone() {
        let (dispatcher, mut changes, _follow) = dispatcher(2);
        dispatcher.handle_response(ResponseEvent::InputName(2, "Kaleidescape".to_string()));

        let zones: Vec<u8> = std::iter::from_fn(|| changes.try_recv().ok())
            .filter(|change| change.change == ZoneAttributeChange::InputsChanged)
            .map(|change| change.zone)
            .collect();
        assert_eq!(zones, vec![1, 2]);

        // Same name again is not a change
        dispatcher.handle_response(ResponseEvent::InputName(2, "Kaleidescape".to_string()));
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_input_count_announces_inputs_changed() {
        let (dispatcher, mut changes, _follow) = dispatcher(1);
        dispatcher.handle_response(ResponseEvent::InputCount(4));

        assert_eq!(
            changes.try_recv().unwrap().change,
            ZoneAttributeChange::InputsChanged
        );
    }

    #[test]
    fn test_unnamed_input_queries_zone_input_name() {
        let (dispatcher, _changes, mut follow) = dispatcher(2);
        dispatcher.handle_response(ResponseEvent::ZoneInput(2, 3));

        match follow.try_recv() {
            Ok(FollowUp::Send(Command::Query { zone, code })) => {
                assert_eq!(zone.get(), 2);
                assert_eq!(code, CommandCode::InputName);
            }
            other => panic!("expected Z2SIP? follow-up, got {:?}", other),
        }

        // A name reported through ISN needs no query
        dispatcher.handle_response(ResponseEvent::InputName(4, "Turntable".to_string()));
        dispatcher.handle_response(ResponseEvent::ZoneInput(2, 4));
        assert!(follow.try_recv().is_err());
    }

    #[test]
    fn test_full_follow_up_queue_does_not_block() {
        let (dispatcher, _changes, mut follow) = dispatcher_with_capacity(1, 2);
        dispatcher.handle_response(ResponseEvent::InputCount(5));

        let mut queued = 0;
        while follow.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, 2);
    }

    #[test]
    fn test_full_input_sweep_fits_follow_up_queue() {
        let (dispatcher, _changes, mut follow) = dispatcher(1);
        dispatcher.connection_state_changed(ConnectionState::Connected);
        dispatcher.handle_response(ResponseEvent::InputCount(99));

        let mut queued = 0;
        while follow.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, 100);
    }
}

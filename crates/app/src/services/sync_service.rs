//! Sync service: the single writer of the accessory state store.
//!
//! Gateway notifications, user commands and the completions of background
//! gateway calls all arrive as messages and are consumed by one task, so the
//! store is never mutated from two places at once. Readers get point-in-time
//! snapshots through a [`watch`] channel and change events through the
//! [`EventPublisher`].
//!
//! Reads and writes run in a [`JoinSet`]. Selecting another home aborts the
//! set and bumps the store generation; completions that still carry the old
//! generation are discarded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};

use homesync_domain::accessory::{Accessory, ServiceKind};
use homesync_domain::characteristic::{
    CharacteristicKind, CharacteristicReading, CharacteristicValue, Position, ReadingSource,
};
use homesync_domain::error::{GatewayError, HomesyncError, NotFoundError, ValidationError};
use homesync_domain::event::{StoreEvent, WriteOrigin};
use homesync_domain::home::Home;
use homesync_domain::id::{AccessoryId, HomeId};
use homesync_domain::time::now;

use crate::automation_engine::AutomationEngine;
use crate::ports::{AccessoryGateway, EventPublisher, GatewayEvent};
use crate::state_store::{AccessoryStateStore, ReadingUpdate, SelectionChange};

/// Tuning for the sync service.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Upper bound for inventory calls, subscriptions and one-shot reads.
    pub read_timeout: Duration,
    /// Upper bound for a write acknowledgement.
    pub write_timeout: Duration,
    pub automation_enabled: bool,
    /// Capacity of the command channel shared by all handles.
    pub command_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(8),
            automation_enabled: true,
            command_capacity: 64,
        }
    }
}

enum Command {
    SelectHome {
        home_id: HomeId,
        reply: oneshot::Sender<bool>,
    },
    SetTargetPosition {
        accessory_id: AccessoryId,
        position: Position,
        reply: oneshot::Sender<Result<(), HomesyncError>>,
    },
    Shutdown,
}

/// Result of a background gateway call, tagged with the store generation it
/// was issued under.
enum Completion {
    HomesListed(Result<Vec<Home>, GatewayError>),
    AccessoriesLoaded {
        generation: u64,
        home_id: HomeId,
        result: Result<Vec<Accessory>, GatewayError>,
    },
    Subscribed {
        generation: u64,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        result: Result<(), GatewayError>,
    },
    ReadFinished {
        generation: u64,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        result: Result<CharacteristicValue, GatewayError>,
    },
    WriteFinished {
        generation: u64,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
        result: Result<(), GatewayError>,
    },
}

impl Completion {
    fn generation(&self) -> Option<u64> {
        match self {
            Self::HomesListed(_) => None,
            Self::AccessoriesLoaded { generation, .. }
            | Self::Subscribed { generation, .. }
            | Self::ReadFinished { generation, .. }
            | Self::WriteFinished { generation, .. } => Some(*generation),
        }
    }
}

/// Owns the [`AccessoryStateStore`] and drives the gateway.
pub struct SyncService<G, P> {
    gateway: Arc<G>,
    publisher: P,
    config: SyncConfig,
    automation: AutomationEngine,
    store: AccessoryStateStore,
    gateway_events: mpsc::Receiver<GatewayEvent>,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<AccessoryStateStore>,
    tasks: JoinSet<Completion>,
}

impl<G, P> SyncService<G, P>
where
    G: AccessoryGateway + 'static,
    P: EventPublisher,
{
    /// Create the service and the handle used to talk to it.
    ///
    /// `gateway_events` is the receiving end of the channel the gateway
    /// adapter pushes its notifications into.
    pub fn new(
        gateway: G,
        gateway_events: mpsc::Receiver<GatewayEvent>,
        publisher: P,
        config: SyncConfig,
    ) -> (Self, SyncHandle) {
        let (command_tx, commands) = mpsc::channel(config.command_capacity.max(1));
        let (snapshots, snapshot_rx) = watch::channel(AccessoryStateStore::new());
        let service = Self {
            gateway: Arc::new(gateway),
            publisher,
            automation: AutomationEngine::new(config.automation_enabled),
            config,
            store: AccessoryStateStore::new(),
            gateway_events,
            commands,
            snapshots,
            tasks: JoinSet::new(),
        };
        let handle = SyncHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        (service, handle)
    }

    /// Consume messages until a shutdown command arrives or every
    /// [`SyncHandle`] is dropped.
    pub async fn run(mut self) {
        tracing::info!(
            automation = self.automation.is_enabled(),
            "sync service started"
        );
        self.spawn_list_homes();

        let mut gateway_open = true;
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(Command::SelectHome { home_id, reply }) => {
                        let selected = self.select_home(home_id).await;
                        let _ = reply.send(selected);
                    }
                    Some(Command::SetTargetPosition { accessory_id, position, reply }) => {
                        let result = self.set_target_position(accessory_id, position).await;
                        let _ = reply.send(result);
                    }
                },
                event = self.gateway_events.recv(), if gateway_open => match event {
                    Some(event) => self.handle_gateway_event(event).await,
                    None => {
                        tracing::warn!("gateway notification channel closed");
                        gateway_open = false;
                    }
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => match joined {
                    Ok(completion) => self.handle_completion(completion).await,
                    Err(err) if err.is_cancelled() => tracing::trace!("gateway call cancelled"),
                    Err(err) => tracing::error!(%err, "gateway call panicked"),
                },
            }
        }

        self.tasks.shutdown().await;
        tracing::info!("sync service stopped");
    }

    #[tracing::instrument(skip(self))]
    async fn select_home(&mut self, home_id: HomeId) -> bool {
        if !self.store.select_home(home_id) {
            tracing::debug!("ignoring selection of unknown home");
            return false;
        }
        self.on_home_selected(home_id).await;
        true
    }

    async fn on_home_selected(&mut self, home_id: HomeId) {
        self.tasks.abort_all();
        if let Some(home) = self.store.selected_home() {
            tracing::info!(home = %home.name, hub_state = %home.hub_state, "home selected");
        }
        self.publish_snapshot();
        self.emit(StoreEvent::HomeSelected { home_id }).await;
        self.spawn_accessory_fetch(home_id);
    }

    #[tracing::instrument(skip(self))]
    async fn set_target_position(
        &mut self,
        accessory_id: AccessoryId,
        position: Position,
    ) -> Result<(), HomesyncError> {
        let accessory = self.store.accessory(accessory_id).ok_or_else(|| NotFoundError {
            entity: "Accessory",
            id: accessory_id.to_string(),
        })?;
        if !accessory.is_window() {
            return Err(ValidationError::MissingService {
                accessory: accessory_id,
                service: ServiceKind::WindowCovering,
            }
            .into());
        }
        self.dispatch_write(
            accessory_id,
            CharacteristicKind::TargetPosition,
            position.into(),
            WriteOrigin::User,
        )
        .await;
        Ok(())
    }

    async fn handle_gateway_event(&mut self, event: GatewayEvent) {
        match event {
            GatewayEvent::HomesUpdated(homes) => self.apply_homes(homes).await,
            GatewayEvent::AccessoriesUpdated {
                home_id,
                accessories,
            } => self.apply_accessories(home_id, accessories).await,
            GatewayEvent::ValueChanged {
                accessory_id,
                kind,
                value,
                timestamp,
            } => {
                let reading = CharacteristicReading::new(
                    accessory_id,
                    kind,
                    value,
                    timestamp,
                    ReadingSource::Notification,
                );
                self.apply_reading(reading).await;
            }
        }
    }

    async fn handle_completion(&mut self, completion: Completion) {
        if let Some(generation) = completion.generation() {
            if generation != self.store.generation() {
                tracing::debug!(
                    generation,
                    current = self.store.generation(),
                    "discarding completion issued for a previous home"
                );
                return;
            }
        }

        match completion {
            Completion::HomesListed(Ok(homes)) => self.apply_homes(homes).await,
            Completion::HomesListed(Err(err)) => {
                tracing::warn!(%err, "failed to list homes, no home selected");
            }
            Completion::AccessoriesLoaded {
                home_id, result, ..
            } => match result {
                Ok(accessories) => self.apply_accessories(home_id, accessories).await,
                Err(err) => tracing::warn!(%err, %home_id, "failed to load accessories"),
            },
            Completion::Subscribed {
                accessory_id,
                kind,
                result,
                ..
            } => match result {
                Ok(()) => tracing::debug!(%accessory_id, %kind, "notifications enabled"),
                Err(err) => tracing::warn!(
                    %err,
                    %accessory_id,
                    %kind,
                    "notifications unavailable, value only refreshes on reads"
                ),
            },
            Completion::ReadFinished {
                accessory_id,
                kind,
                result,
                ..
            } => match result {
                Ok(value) => {
                    let reading = CharacteristicReading::new(
                        accessory_id,
                        kind,
                        value,
                        now(),
                        ReadingSource::InitialRead,
                    );
                    self.apply_reading(reading).await;
                }
                Err(err) => tracing::warn!(%err, %accessory_id, %kind, "read failed"),
            },
            Completion::WriteFinished {
                accessory_id,
                kind,
                value,
                result,
                ..
            } => self.apply_write_result(accessory_id, kind, value, result).await,
        }
    }

    async fn apply_homes(&mut self, homes: Vec<Home>) {
        tracing::info!(count = homes.len(), "home list updated");
        let change = self.store.set_homes(homes);
        self.publish_snapshot();
        self.emit(StoreEvent::HomesChanged {
            homes: self.store.homes().to_vec(),
        })
        .await;

        match change {
            SelectionChange::Selected(home_id) => self.on_home_selected(home_id).await,
            SelectionChange::Cleared => {
                self.tasks.abort_all();
                tracing::info!("selected home disappeared and no home is left");
            }
            SelectionChange::Unchanged => {}
        }
    }

    async fn apply_accessories(&mut self, home_id: HomeId, accessories: Vec<Accessory>) {
        if !self.store.set_accessories(home_id, accessories) {
            tracing::debug!(%home_id, "ignoring accessories of a home that is not selected");
            return;
        }

        let tracked: Vec<(AccessoryId, CharacteristicKind)> = self
            .store
            .accessories()
            .iter()
            .flat_map(|a| a.tracked_characteristics().map(move |kind| (a.id, kind)))
            .collect();
        tracing::info!(
            %home_id,
            accessories = self.store.accessories().len(),
            characteristics = tracked.len(),
            "accessories loaded"
        );
        if !self
            .store
            .accessories()
            .iter()
            .any(Accessory::is_temperature_sensor)
        {
            tracing::info!(%home_id, "no temperature sensor accessory found");
        }

        self.publish_snapshot();
        self.emit(StoreEvent::AccessoriesChanged {
            home_id,
            accessories: self.store.accessories().to_vec(),
        })
        .await;

        for (accessory_id, kind) in tracked {
            self.spawn_subscribe(accessory_id, kind);
            self.spawn_read(accessory_id, kind);
        }
    }

    async fn apply_reading(&mut self, reading: CharacteristicReading) {
        let CharacteristicReading {
            accessory_id,
            kind,
            value,
            source,
            ..
        } = reading;
        let in_selected_home = self.store.accessory(accessory_id).is_some();
        let drives_automation = kind == CharacteristicKind::CurrentTemperature
            && self.store.primary_temperature_sensor() == Some(accessory_id);
        if !in_selected_home {
            tracing::debug!(%accessory_id, %kind, "reading for accessory outside the selected home");
        }
        if kind == CharacteristicKind::CurrentTemperature {
            tracing::info!(%accessory_id, temperature = value.as_f64(), ?source, "temperature update");
        }

        let update = self.store.update_reading(reading.clone());
        self.publish_snapshot();
        if let ReadingUpdate::Changed { previous } = update {
            self.emit(StoreEvent::ReadingChanged { reading, previous })
                .await;
        }

        if drives_automation {
            self.run_automation(value.as_f64()).await;
        } else if kind == CharacteristicKind::CurrentTemperature && in_selected_home {
            tracing::debug!(%accessory_id, "secondary temperature sensor, automation not run");
        }
    }

    async fn run_automation(&mut self, temperature: f64) {
        let commands = self.automation.on_temperature(temperature, &self.store);
        if commands.is_empty() {
            return;
        }
        tracing::info!(temperature, windows = commands.len(), "window automation fired");
        self.emit(StoreEvent::AutomationFired {
            temperature,
            commands: commands.clone(),
        })
        .await;

        for command in commands {
            self.dispatch_write(
                command.accessory_id,
                CharacteristicKind::TargetPosition,
                command.target.into(),
                WriteOrigin::Automation,
            )
            .await;
        }
    }

    async fn dispatch_write(
        &mut self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
        origin: WriteOrigin,
    ) {
        tracing::debug!(%accessory_id, %kind, %value, ?origin, "dispatching write");
        self.store
            .begin_write(accessory_id, kind, value, origin, now());
        self.publish_snapshot();
        self.emit(StoreEvent::WriteRequested {
            accessory_id,
            kind,
            value,
            origin,
        })
        .await;
        self.spawn_write(accessory_id, kind, value);
    }

    async fn apply_write_result(
        &mut self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
        result: Result<(), GatewayError>,
    ) {
        match result {
            Ok(()) => {
                tracing::info!(%accessory_id, %kind, %value, "write acknowledged");
                let update = self.store.complete_write(accessory_id, kind, value, now());
                self.publish_snapshot();
                self.emit(StoreEvent::WriteSucceeded {
                    accessory_id,
                    kind,
                    value,
                })
                .await;
                if let ReadingUpdate::Changed { previous } = update {
                    if let Some(reading) = self.store.reading_entry(accessory_id, kind).cloned() {
                        self.emit(StoreEvent::ReadingChanged { reading, previous })
                            .await;
                    }
                }
            }
            Err(err) => {
                tracing::warn!(%err, %accessory_id, %kind, %value, "write failed");
                self.store.fail_write(accessory_id, kind, value);
                self.publish_snapshot();
                self.emit(StoreEvent::WriteFailed {
                    accessory_id,
                    kind,
                    value,
                    reason: err.to_string(),
                })
                .await;
            }
        }
    }

    fn spawn_list_homes(&mut self) {
        let gateway = Arc::clone(&self.gateway);
        let deadline = self.config.read_timeout;
        self.tasks.spawn(async move {
            let timed_out = GatewayError::InventoryTimedOut {
                operation: "list_homes",
            };
            let result = bounded(deadline, gateway.list_homes(), timed_out).await;
            Completion::HomesListed(result)
        });
    }

    fn spawn_accessory_fetch(&mut self, home_id: HomeId) {
        let gateway = Arc::clone(&self.gateway);
        let generation = self.store.generation();
        let deadline = self.config.read_timeout;
        self.tasks.spawn(async move {
            let timed_out = GatewayError::InventoryTimedOut {
                operation: "accessories_for",
            };
            let result = bounded(deadline, gateway.accessories_for(home_id), timed_out).await;
            Completion::AccessoriesLoaded {
                generation,
                home_id,
                result,
            }
        });
    }

    fn spawn_subscribe(&mut self, accessory_id: AccessoryId, kind: CharacteristicKind) {
        let gateway = Arc::clone(&self.gateway);
        let generation = self.store.generation();
        let deadline = self.config.read_timeout;
        self.tasks.spawn(async move {
            let timed_out = GatewayError::TimedOut {
                operation: "subscribe",
                accessory_id,
                kind,
            };
            let result = bounded(deadline, gateway.subscribe(accessory_id, kind), timed_out).await;
            Completion::Subscribed {
                generation,
                accessory_id,
                kind,
                result,
            }
        });
    }

    fn spawn_read(&mut self, accessory_id: AccessoryId, kind: CharacteristicKind) {
        let gateway = Arc::clone(&self.gateway);
        let generation = self.store.generation();
        let deadline = self.config.read_timeout;
        self.tasks.spawn(async move {
            let timed_out = GatewayError::TimedOut {
                operation: "read",
                accessory_id,
                kind,
            };
            let result = bounded(deadline, gateway.read_once(accessory_id, kind), timed_out).await;
            Completion::ReadFinished {
                generation,
                accessory_id,
                kind,
                result,
            }
        });
    }

    fn spawn_write(
        &mut self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
    ) {
        let gateway = Arc::clone(&self.gateway);
        let generation = self.store.generation();
        let deadline = self.config.write_timeout;
        self.tasks.spawn(async move {
            let timed_out = GatewayError::TimedOut {
                operation: "write",
                accessory_id,
                kind,
            };
            let result = bounded(deadline, gateway.write(accessory_id, kind, value), timed_out).await;
            Completion::WriteFinished {
                generation,
                accessory_id,
                kind,
                value,
                result,
            }
        });
    }

    fn publish_snapshot(&self) {
        self.snapshots.send_replace(self.store.clone());
    }

    async fn emit(&self, event: StoreEvent) {
        let kind = event.kind();
        if let Err(err) = self.publisher.publish(event).await {
            tracing::warn!(%err, kind, "failed to publish store event");
        }
    }
}

impl<G, P> SyncService<G, P>
where
    G: AccessoryGateway + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    /// Run the service on a new tokio task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// Await a gateway call, reporting `timed_out` once `deadline` expires.
async fn bounded<T>(
    deadline: Duration,
    call: impl Future<Output = Result<T, GatewayError>>,
    timed_out: GatewayError,
) -> Result<T, GatewayError> {
    tokio::time::timeout(deadline, call)
        .await
        .unwrap_or(Err(timed_out))
}

/// Cloneable handle to a running [`SyncService`].
///
/// This is what the presentation layer holds: it issues commands and reads
/// snapshots, but never touches the store directly.
#[derive(Clone)]
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<AccessoryStateStore>,
}

impl SyncHandle {
    /// Select a home. Returns `false` (and changes nothing) for unknown ids.
    ///
    /// # Errors
    ///
    /// Returns [`HomesyncError::ServiceStopped`] if the service is gone.
    pub async fn select_home(&self, home_id: HomeId) -> Result<bool, HomesyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SelectHome { home_id, reply }).await?;
        rx.await.map_err(|_| HomesyncError::ServiceStopped)
    }

    /// Command a window covering of the selected home to a position.
    ///
    /// Returns once the write is dispatched. Its outcome is published as
    /// [`StoreEvent::WriteSucceeded`] or [`StoreEvent::WriteFailed`]; the
    /// stored reading only changes after the acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`HomesyncError::NotFound`] if the accessory is not part of the
    /// selected home, [`HomesyncError::Validation`] if it is not a window
    /// covering, or [`HomesyncError::ServiceStopped`].
    pub async fn set_target_position(
        &self,
        accessory_id: AccessoryId,
        position: Position,
    ) -> Result<(), HomesyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetTargetPosition {
            accessory_id,
            position,
            reply,
        })
        .await?;
        rx.await.map_err(|_| HomesyncError::ServiceStopped)?
    }

    /// Point-in-time copy of the store.
    #[must_use]
    pub fn snapshot(&self) -> AccessoryStateStore {
        self.snapshots.borrow().clone()
    }

    /// Wait until a snapshot satisfies `predicate`, checking the current one
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`HomesyncError::ServiceStopped`] if the service stops first.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&AccessoryStateStore) -> bool,
    ) -> Result<AccessoryStateStore, HomesyncError> {
        let mut rx = self.snapshots.clone();
        let store = rx
            .wait_for(predicate)
            .await
            .map_err(|_| HomesyncError::ServiceStopped)?;
        Ok(store.clone())
    }

    /// Ask the service to stop. In-flight gateway calls are abandoned.
    ///
    /// # Errors
    ///
    /// Returns [`HomesyncError::ServiceStopped`] if it already stopped.
    pub async fn shutdown(&self) -> Result<(), HomesyncError> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> Result<(), HomesyncError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HomesyncError::ServiceStopped)
    }
}

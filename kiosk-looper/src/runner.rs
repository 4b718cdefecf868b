//! Startup assembly and the scheduling poll loop
//!
//! Two activities run concurrently:
//! - the poll loop: samples local inputs, snapshots the shared state and ticks
//!   the scheduler at a fixed interval
//! - the serial bridge task, blocked on transport reads
//!
//! Shutdown stops both independently.

use crate::content::ContentLibrary;
use crate::error::{Error, Result};
use crate::input::{InputSnapshot, LocalInput, NoLocalInput, PositionTracker, SharedInputs};
use crate::persist::StateStore;
use crate::player::Player;
use crate::scheduler::Scheduler;
use crate::serial::SerialBridge;
use kiosk_common::config::KioskConfig;
use kiosk_common::events::{EventBus, InputSource, KioskEvent};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Capacity of the event bus; events are informational only
const EVENT_BUS_CAPACITY: usize = 256;

/// Fully assembled looper, ready to run
pub struct Looper {
    inputs: SharedInputs,
    scheduler: Scheduler,
    player: Box<dyn Player>,
    local: Box<dyn LocalInput>,
    events: EventBus,
    poll_interval: Duration,
    serial_device: Option<PathBuf>,
    position_count: usize,
}

impl Looper {
    /// Validate the configuration, restore persisted state and load content.
    ///
    /// Configuration problems fail here, before the scheduler ever runs.
    pub fn from_config(config: &KioskConfig, player: Box<dyn Player>) -> Result<Self> {
        config.validate().map_err(|e| match e {
            kiosk_common::Error::Config(msg) => Error::Config(msg),
            other => Error::Common(other),
        })?;

        let library = Arc::new(ContentLibrary::load(config)?);

        let store = StateStore::new(&config.looper.state_path);
        let persisted = store.load();
        let tracker = PositionTracker::new(
            config.rotary.boundaries.clone(),
            persisted.position,
            persisted.accumulator,
        );

        let events = EventBus::new(EVENT_BUS_CAPACITY);
        Ok(Self::assemble(
            library,
            tracker,
            Some(store),
            player,
            events,
            Duration::from_millis(config.looper.poll_interval_ms),
            config.serial.device.clone(),
        ))
    }

    /// Wire the parts together; the scheduler starts from the inputs' first snapshot
    pub fn assemble(
        library: Arc<ContentLibrary>,
        tracker: PositionTracker,
        store: Option<StateStore>,
        player: Box<dyn Player>,
        events: EventBus,
        poll_interval: Duration,
        serial_device: Option<PathBuf>,
    ) -> Self {
        let position_count = tracker.position_count();
        let initial_position = tracker.current_position();
        let initial_accumulator = tracker.accumulator();
        let inputs = SharedInputs::new(tracker, None, store, events.clone());
        let initial = InputSnapshot {
            position: initial_position,
            mode: Default::default(),
            accumulator: initial_accumulator,
        };
        let scheduler = Scheduler::new(library, initial, events.clone());
        Self {
            inputs,
            scheduler,
            player,
            local: Box::new(NoLocalInput),
            events,
            poll_interval,
            serial_device,
            position_count,
        }
    }

    /// Replace the local input device (default: none)
    pub fn with_local_input(mut self, local: Box<dyn LocalInput>) -> Self {
        self.local = local;
        self
    }

    pub fn inputs(&self) -> &SharedInputs {
        &self.inputs
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Take the first local switch reading so the scheduler starts in the right mode
    async fn prime_mode(&mut self) {
        if let Some(raw) = self.local.read_switch() {
            self.inputs
                .observe_switch(raw, InputSource::Local)
                .await;
            let snapshot = self.inputs.snapshot().await;
            self.scheduler = Scheduler::new(self.scheduler.library(), snapshot, self.events.clone());
        }
    }

    /// One poll: sample local inputs, snapshot, tick
    pub async fn poll_once(&mut self) {
        self.inputs.sample_local(self.local.as_mut()).await;
        let snapshot = self.inputs.snapshot().await;
        self.scheduler.tick(snapshot, self.player.as_mut());
    }

    /// Run until `shutdown` resolves
    pub async fn run<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.prime_mode().await;

        let bridge = self.serial_device.clone().map(|device| {
            SerialBridge::new(self.inputs.clone(), self.events.clone(), self.position_count)
                .spawn(&device)
        });
        if bridge.is_none() {
            info!("No serial device configured, local inputs only");
        }

        let mut interval = time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Poll loop started ({:?} interval)", self.poll_interval);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => self.poll_once().await,
            }
        }

        if let Some(handle) = bridge {
            handle.abort();
        }
        self.scheduler.shutdown(self.player.as_mut());
        info!("Poll loop stopped");
        Ok(())
    }
}

/// Log every event on the bus until the bus is dropped
pub fn spawn_event_logger(events: &EventBus) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event logger lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Event logger stopped");
    })
}

fn log_event(event: &KioskEvent) {
    match serde_json::to_string(event) {
        Ok(json) => info!(target: "kiosk_looper::events", "{}", json),
        Err(_) => info!(target: "kiosk_looper::events", "{:?}", event),
    }
}

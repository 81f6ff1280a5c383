//! Device session: discovery, reconnect and connection events
//!
//! A session targets exactly one bridge by USB serial number. While it runs,
//! two threads are alive:
//! - discovery: polls the locator while no handle is open, opens and
//!   initialises the bridge once it shows up
//! - transmit: see [`super::transmitter`]
//!
//! A failed frame write drops the handle, which puts discovery back to work.
//! The handle lives in a single `Mutex<Option<..>>`, so at most one is ever
//! open.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use super::transmitter::transmit_loop;
use super::{DeviceLocator, DmxLink, LinkSettings, Purge};
use crate::dmx::Universe;
use crate::worker::{wait_tick, WorkerGroup};
use crate::{error::ControlError, Result};

/// Poll interval while searching for the bridge
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_millis(100);

/// Delay between two frames
pub const DEFAULT_TRANSMIT_INTERVAL: Duration = Duration::from_millis(1);

/// How long `disconnect` waits for the loops before detaching them
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Where the session currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Running, waiting for the bridge to appear
    Searching,
    /// Running with an open, initialised handle
    Connected,
    /// Not running
    Closed,
}

/// Fired on every connect and disconnect edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected(String),
    Disconnected(String),
}

/// Session timing and link parameters
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub discovery_interval: Duration,
    pub transmit_interval: Duration,
    pub shutdown_timeout: Duration,
    pub link: LinkSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            discovery_interval: DEFAULT_DISCOVERY_INTERVAL,
            transmit_interval: DEFAULT_TRANSMIT_INTERVAL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            link: LinkSettings::default(),
        }
    }
}

type Observer = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// State shared between the session handle and its threads
pub(crate) struct SessionShared {
    locator: Arc<dyn DeviceLocator>,
    settings: SessionSettings,
    universe: Universe,
    target: RwLock<Option<String>>,
    running: AtomicBool,
    open: AtomicBool,
    link: Mutex<Option<Box<dyn DmxLink>>>,
    observers: RwLock<Vec<Observer>>,
    subscribers: Mutex<Vec<Sender<ConnectionEvent>>>,
}

impl SessionShared {
    pub(crate) fn is_connected(&self) -> bool {
        self.running.load(Ordering::Acquire) && self.open.load(Ordering::Acquire)
    }

    fn state(&self) -> SessionState {
        if !self.running.load(Ordering::Acquire) {
            SessionState::Closed
        } else if self.open.load(Ordering::Acquire) {
            SessionState::Connected
        } else {
            SessionState::Searching
        }
    }

    pub(crate) fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub(crate) fn universe(&self) -> &Universe {
        &self.universe
    }

    pub(crate) fn link(&self) -> &Mutex<Option<Box<dyn DmxLink>>> {
        &self.link
    }

    fn target(&self) -> String {
        self.target.read().clone().unwrap_or_default()
    }

    /// Called by the transmitter after it dropped a failed handle
    pub(crate) fn link_lost(&self, err: &ControlError) {
        self.open.store(false, Ordering::Release);
        let target = self.target();
        warn!("Lost bridge {}: {}, searching again", target, err);
        self.notify(ConnectionEvent::Disconnected(target));
    }

    fn notify(&self, event: ConnectionEvent) {
        let observers = self.observers.read().clone();
        for observer in observers {
            observer(&event);
        }
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// One discovery attempt. `Ok(true)` once connected.
    fn try_connect(&self) -> Result<bool> {
        let Some(target) = self.target.read().clone() else {
            return Ok(false);
        };

        let devices = self.locator.enumerate()?;
        let Some(device) = devices.into_iter().find(|d| d.serial_number == target) else {
            trace!("Bridge {} not present", target);
            return Ok(false);
        };

        let mut link = self.locator.open(&device)?;
        initialize_link(link.as_mut(), &self.settings.link)?;

        {
            let mut guard = self.link.lock();
            if !self.running.load(Ordering::Acquire) {
                debug!("Session stopped while connecting, dropping handle");
                return Ok(false);
            }
            if guard.is_some() {
                debug!("Bridge {} already has an open handle, dropping new one", target);
                return Ok(false);
            }
            *guard = Some(link);
            self.open.store(true, Ordering::Release);
        }

        info!("Connected to DMX bridge {} on {}", target, device.port_name);
        self.notify(ConnectionEvent::Connected(target));
        Ok(true)
    }
}

/// Bring a freshly opened bridge into DMX transmit mode.
///
/// Order: reset, baud rate, 8N2 framing, flow control, purge TX, purge RX.
pub fn initialize_link(link: &mut dyn DmxLink, settings: &LinkSettings) -> Result<()> {
    fn step(name: &'static str, result: Result<()>) -> Result<()> {
        result.map_err(|e| ControlError::LinkInitError {
            step: name,
            reason: e.to_string(),
        })
    }

    step("reset", link.reset())?;
    step("baud rate", link.set_baud_rate(settings.baud_rate))?;
    step(
        "data characteristics",
        link.set_data_characteristics(settings.data_bits, settings.stop_bits, settings.parity),
    )?;
    step("flow control", link.set_flow_control(settings.flow_control))?;
    step("purge tx", link.purge(Purge::Transmit))?;
    step("purge rx", link.purge(Purge::Receive))
}

fn discovery_loop(shared: Arc<SessionShared>, shutdown: Receiver<()>) {
    info!("Discovery thread started");
    let interval = shared.settings.discovery_interval;
    let mut failing = false;

    loop {
        if !shared.open.load(Ordering::Acquire) {
            match shared.try_connect() {
                Ok(_) => failing = false,
                Err(e) if e.is_transient() => {
                    // Only the first failure of a streak is worth a warning
                    if failing {
                        debug!("Discovery attempt failed: {}", e);
                    } else {
                        warn!("Discovery attempt failed, retrying: {}", e);
                    }
                    failing = true;
                }
                Err(e) => {
                    error!("Discovery attempt failed: {}", e);
                    failing = true;
                }
            }
        }

        if !wait_tick(&shutdown, interval) {
            break;
        }
    }

    info!("Discovery thread stopped");
}

/// Cheap, cloneable view of a session's connection status
#[derive(Clone)]
pub struct SessionStatus {
    shared: Arc<SessionShared>,
}

impl SessionStatus {
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }
}

/// Connection to one USB DMX bridge, with automatic reconnect
pub struct DeviceSession {
    shared: Arc<SessionShared>,
    workers: Mutex<Option<WorkerGroup>>,
}

impl DeviceSession {
    pub fn new(locator: Arc<dyn DeviceLocator>, settings: SessionSettings) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                locator,
                settings,
                universe: Universe::new(),
                target: RwLock::new(None),
                running: AtomicBool::new(false),
                open: AtomicBool::new(false),
                link: Mutex::new(None),
                observers: RwLock::new(Vec::new()),
                subscribers: Mutex::new(Vec::new()),
            }),
            workers: Mutex::new(None),
        }
    }

    /// Serial numbers of the bridges currently attached.
    ///
    /// Unlike the discovery loop, a failure here is returned to the caller.
    pub fn list_available_identifiers(&self) -> Result<Vec<String>> {
        Ok(self
            .shared
            .locator
            .enumerate()?
            .into_iter()
            .map(|d| d.serial_number)
            .collect())
    }

    /// Start targeting `serial_number`, replacing any previous target.
    ///
    /// Returns once the loops are running; the bridge itself may show up
    /// later, watch [`DeviceSession::on_event`] for that.
    pub fn connect(&self, serial_number: &str) -> Result<()> {
        if serial_number.is_empty() {
            return Err(ControlError::InvalidArgument(
                "Serial number is required".to_string(),
            ));
        }

        let mut workers = self.workers.lock();
        if let Some(group) = workers.take() {
            if let Err(e) = self.shutdown(group) {
                warn!("Closing previous bridge failed: {}", e);
            }
        }

        *self.shared.target.write() = Some(serial_number.to_string());
        self.shared.running.store(true, Ordering::Release);

        let mut group = WorkerGroup::new();
        let discovery = self.shared.clone();
        let transmit = self.shared.clone();
        let spawned = group
            .spawn("dmx-discovery", move |shutdown| {
                discovery_loop(discovery, shutdown)
            })
            .and_then(|()| {
                group.spawn("dmx-transmit", move |shutdown| {
                    transmit_loop(transmit, shutdown)
                })
            });

        if let Err(e) = spawned {
            self.shared.running.store(false, Ordering::Release);
            group.stop(self.shared.settings.shutdown_timeout);
            return Err(e);
        }

        *workers = Some(group);
        info!("Searching for DMX bridge {}", serial_number);
        Ok(())
    }

    /// Stop both loops and close the handle.
    ///
    /// The session counts as closed afterwards even if the close itself
    /// failed; that failure is still returned.
    pub fn disconnect(&self) -> Result<()> {
        let mut workers = self.workers.lock();
        match workers.take() {
            Some(group) => self.shutdown(group),
            None => Ok(()),
        }
    }

    fn shutdown(&self, group: WorkerGroup) -> Result<()> {
        self.shared.running.store(false, Ordering::Release);
        group.stop(self.shared.settings.shutdown_timeout);

        let link = self.shared.link.lock().take();
        self.shared.open.store(false, Ordering::Release);

        let Some(mut link) = link else {
            return Ok(());
        };

        let result = link.close();
        drop(link);

        let target = self.shared.target();
        info!("Disconnected from DMX bridge {}", target);
        self.shared.notify(ConnectionEvent::Disconnected(target));

        result.map_err(|e| match e {
            ControlError::DeviceCloseError(_) => e,
            other => ControlError::DeviceCloseError(other.to_string()),
        })
    }

    /// True while the session should run and a handle is open
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// The bridge this session targets
    pub fn serial_number(&self) -> Option<String> {
        self.shared.target.read().clone()
    }

    /// Handle to the universe the transmitter sends
    pub fn universe(&self) -> Universe {
        self.shared.universe.clone()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            shared: self.shared.clone(),
        }
    }

    /// Register a callback for connection events.
    ///
    /// Callbacks run on the session's threads and must not block.
    pub fn on_event<F>(&self, callback: F)
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.shared.observers.write().push(Arc::new(callback));
    }

    /// Channel receiving every future connection event
    pub fn subscribe(&self) -> Receiver<ConnectionEvent> {
        let (tx, rx) = unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Some(group) = self.workers.get_mut().take() {
            if let Err(e) = self.shutdown(group) {
                warn!("Closing bridge on drop failed: {}", e);
            }
        }
    }
}

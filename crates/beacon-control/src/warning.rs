//! Production warning instance
//!
//! Owns the device session and the animation thread. The control surface
//! only sees it through [`WarningControl`].

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::animator::{animation_loop, AnimationContext, Animator, WarningState};
use crate::config::BeaconConfig;
use crate::device::{ConnectionEvent, DeviceLocator, DeviceSession, SessionState};
use crate::worker::WorkerGroup;
use crate::{error::ControlError, Result};

/// Inbound operations the control surface needs
pub trait WarningControl: Send + Sync {
    /// Start (or restart) the warning pulse
    fn activate_warning(&self);

    /// Let the beacon fade out
    fn deactivate_warning(&self);

    fn query_connection_status(&self) -> bool;

    fn is_warning_active(&self) -> bool;

    /// Current red intensity in [0.0, 1.0]
    fn intensity(&self) -> f32;
}

/// A running warning beacon
pub struct WarningInstance {
    session: DeviceSession,
    warning: Arc<Mutex<WarningState>>,
    animator: Arc<Mutex<Animator>>,
    animation: Mutex<Option<WorkerGroup>>,
    channel: usize,
    shutdown_timeout: Duration,
}

impl WarningInstance {
    /// Pick the bridge, connect and start animating.
    ///
    /// The bridge list is queried once up front and a failure there is
    /// fatal. Without a configured serial number the first bridge listed is
    /// used, and having none at all is an error.
    pub fn start(config: &BeaconConfig, locator: Arc<dyn DeviceLocator>) -> Result<Self> {
        config.validate()?;

        let session = DeviceSession::new(locator, config.device.session_settings());

        let available = session.list_available_identifiers()?;
        info!("Available DMX bridges: {:?}", available);

        let serial = match &config.device.serial_number {
            Some(serial) => {
                if !available.contains(serial) {
                    warn!("Configured bridge {} not attached yet, waiting for it", serial);
                }
                serial.clone()
            }
            None => available.into_iter().next().ok_or(ControlError::NoDevice)?,
        };

        let animator = Arc::new(Mutex::new(Animator::new(config.animation.pulse_shape())));
        let warning = Arc::new(Mutex::new(WarningState::Inactive));

        if config.animation.reset_on_connect {
            let animator = animator.clone();
            session.on_event(move |event| {
                if let ConnectionEvent::Connected(serial) = event {
                    debug!("Bridge {} connected, restarting fade", serial);
                    animator.lock().reset();
                }
            });
        }

        session.connect(&serial)?;

        let mut animation = WorkerGroup::new();
        let ctx = AnimationContext {
            animator: animator.clone(),
            warning: warning.clone(),
            status: session.status(),
            universe: session.universe(),
            channel: config.animation.channel,
            tick_interval: config.animation.tick_interval(),
        };
        if let Err(e) = animation.spawn("beacon-animation", move |shutdown| {
            animation_loop(ctx, shutdown)
        }) {
            if let Err(close) = session.disconnect() {
                warn!("Closing bridge after failed start: {}", close);
            }
            return Err(e);
        }

        Ok(Self {
            session,
            warning,
            animator,
            animation: Mutex::new(Some(animation)),
            channel: config.animation.channel,
            shutdown_timeout: config.device.shutdown_timeout(),
        })
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    pub fn connection_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn warning_state(&self) -> WarningState {
        *self.warning.lock()
    }

    /// Stop the animation thread, then the session.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) -> Result<()> {
        if let Some(animation) = self.animation.lock().take() {
            animation.stop(self.shutdown_timeout);
        }
        self.session.disconnect()
    }
}

impl WarningControl for WarningInstance {
    fn activate_warning(&self) {
        *self.warning.lock() = WarningState::Active(Instant::now());
        info!("Warning started");

        // Light up right away; the next tick takes over with the eased value
        if self.session.is_connected() {
            if let Err(e) = self.session.universe().set_color_u8(self.channel, 255, 0, 0) {
                warn!("Failed to write beacon color: {}", e);
            }
        }
    }

    fn deactivate_warning(&self) {
        *self.warning.lock() = WarningState::Inactive;
        info!("Warning stopped");
    }

    fn query_connection_status(&self) -> bool {
        self.session.is_connected()
    }

    fn is_warning_active(&self) -> bool {
        self.warning.lock().is_active()
    }

    fn intensity(&self) -> f32 {
        self.animator.lock().intensity()
    }
}

impl Drop for WarningInstance {
    fn drop(&mut self) {
        if let Some(animation) = self.animation.get_mut().take() {
            animation.stop(self.shutdown_timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockLocator;

    fn fast_config() -> BeaconConfig {
        let mut config = BeaconConfig::default();
        config.device.discovery_interval_ms = 5;
        config
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_start_without_devices_fails() {
        let result = WarningInstance::start(&fast_config(), Arc::new(MockLocator::new()));
        assert!(matches!(result, Err(ControlError::NoDevice)));
    }

    #[test]
    fn test_start_enumeration_failure_is_fatal() {
        let locator = MockLocator::with_devices(&["EN0001"]);
        locator.set_fail_enumeration(true);

        let result = WarningInstance::start(&fast_config(), Arc::new(locator));
        assert!(matches!(result, Err(ControlError::EnumerationError(_))));
    }

    #[test]
    fn test_start_picks_first_device() {
        let locator = MockLocator::with_devices(&["EN0001", "EN0002"]);
        let instance = WarningInstance::start(&fast_config(), Arc::new(locator)).unwrap();

        assert_eq!(instance.session().serial_number().as_deref(), Some("EN0001"));
        assert!(wait_for(|| instance.query_connection_status()));
        instance.shutdown().unwrap();
    }

    #[test]
    fn test_configured_device_may_appear_later() {
        let locator = MockLocator::new();
        let mut config = fast_config();
        config.device.serial_number = Some("EN0042".to_string());

        let instance = WarningInstance::start(&config, Arc::new(locator.clone())).unwrap();
        assert_eq!(instance.connection_state(), SessionState::Searching);

        locator.plug("EN0042");
        assert!(wait_for(|| instance.query_connection_status()));
        instance.shutdown().unwrap();
        assert_eq!(instance.connection_state(), SessionState::Closed);
    }

    #[test]
    fn test_activate_restarts_phase() {
        let locator = MockLocator::with_devices(&["EN0001"]);
        let instance = WarningInstance::start(&fast_config(), Arc::new(locator)).unwrap();

        instance.activate_warning();
        let WarningState::Active(first) = instance.warning_state() else {
            panic!("warning should be active");
        };

        std::thread::sleep(Duration::from_millis(10));
        instance.activate_warning();
        let WarningState::Active(second) = instance.warning_state() else {
            panic!("warning should be active");
        };

        assert!(second > first);
        assert!(instance.warning_state().elapsed().unwrap() < first.elapsed());

        instance.deactivate_warning();
        assert!(!instance.is_warning_active());
        instance.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_twice() {
        let locator = MockLocator::with_devices(&["EN0001"]);
        let instance = WarningInstance::start(&fast_config(), Arc::new(locator.clone())).unwrap();

        assert!(wait_for(|| instance.query_connection_status()));
        instance.shutdown().unwrap();
        instance.shutdown().unwrap();
        assert_eq!(locator.open_links(), 0);
    }
}

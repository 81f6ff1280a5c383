//! Beacon Control - DMX512 production warning beacon
//!
//! This crate drives a warning beacon over a USB DMX bridge:
//! - **Device session**: finds the bridge by serial number, initialises the
//!   link and reconnects after unplugs
//! - **Transmitter**: streams the universe to the bridge every millisecond
//! - **Universe**: validated, thread-safe access to the 512 DMX channels
//! - **Animator**: pulses the beacon's red channel while a warning is active
//! - **Web API**: start/stop/status over HTTP
//!
//! ## Feature Flags
//!
//! - `http-api`: Enable the HTTP control surface (requires `axum`, `tokio`),
//!   on by default
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use beacon_control::{BeaconConfig, SerialLocator, WarningControl, WarningInstance};
//! use std::sync::Arc;
//!
//! # fn main() -> beacon_control::Result<()> {
//! let config = BeaconConfig::default();
//! let beacon = WarningInstance::start(&config, Arc::new(SerialLocator::new()))?;
//!
//! beacon.activate_warning();
//! // ...
//! beacon.deactivate_warning();
//! beacon.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`device`] - Bridge discovery, session and frame transmitter
//! - [`dmx`] - Universe buffer and wire framing
//! - [`animator`] - Warning pulse animation
//! - [`warning`] - The assembled beacon
//! - [`config`] - TOML configuration
//! - `web` - HTTP control surface (requires `http-api` feature)
//! - [`error`] - Error types

#![allow(missing_docs)]

/// Error types
pub mod error;

/// Configuration
pub mod config;

/// DMX universe and wire framing
pub mod dmx;

/// USB bridge discovery and transmission
pub mod device;

/// Intensity animation
pub mod animator;

/// Warning instance
pub mod warning;

mod worker;

#[cfg(feature = "http-api")]
/// HTTP control surface
pub mod web;

// Re-exports
pub use error::{ControlError, Result};

pub use config::{AnimationConfig, BeaconConfig, DeviceConfig, LogConfig, WebServerConfig};

pub use device::{
    ConnectionEvent, DeviceInfo, DeviceLocator, DeviceSession, DmxLink, MockLocator,
    SerialLocator, SessionSettings, SessionState,
};

pub use dmx::Universe;

pub use animator::{Animator, PulseShape, WarningState};

pub use warning::{WarningControl, WarningInstance};

#[cfg(feature = "http-api")]
pub use web::{ApiResponse, WebServer};

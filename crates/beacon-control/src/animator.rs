//! Warning intensity animation
//!
//! While a warning is active the red channel follows
//! `(1 + sin(elapsed)) / 2 + floor`, approached one fixed step per tick.
//! With the default floor of 0.2 the target peaks at 1.2, so the beacon sits
//! at full brightness for the top of each ~6.28 s cycle. Once the warning is
//! cleared the intensity fades out by the same step.

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::device::SessionStatus;
use crate::dmx::Universe;
use crate::worker::wait_tick;

/// Default tick interval
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Default intensity change per tick
pub const DEFAULT_STEP: f32 = 0.01;

/// Default offset added to the sine target
pub const DEFAULT_FLOOR: f32 = 0.2;

/// Whether a warning is running, and since when
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarningState {
    #[default]
    Inactive,
    Active(Instant),
}

impl WarningState {
    /// Time since the warning (re)started
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            WarningState::Inactive => None,
            WarningState::Active(start) => Some(start.elapsed()),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, WarningState::Active(_))
    }
}

/// Shape of the pulse
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseShape {
    pub step: f32,
    pub floor: f32,
}

impl Default for PulseShape {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            floor: DEFAULT_FLOOR,
        }
    }
}

/// Target brightness `elapsed` into a warning cycle. May exceed 1.0.
pub fn pulse_target(elapsed: Duration, floor: f32) -> f32 {
    (1.0 + elapsed.as_secs_f64().sin() as f32) / 2.0 + floor
}

/// Red-channel intensity state
#[derive(Debug, Clone)]
pub struct Animator {
    intensity: f32,
    shape: PulseShape,
}

impl Animator {
    pub fn new(shape: PulseShape) -> Self {
        Self {
            intensity: 0.0,
            shape,
        }
    }

    /// Current intensity in [0.0, 1.0]
    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn reset(&mut self) {
        self.intensity = 0.0;
    }

    /// Advance one tick.
    ///
    /// `elapsed` is the time since the warning started, `None` when no
    /// warning is active. The intensity moves a fixed step towards the
    /// target (or towards 0), never proportionally, then gets clamped.
    pub fn tick(&mut self, elapsed: Option<Duration>) -> f32 {
        match elapsed {
            Some(elapsed) => {
                let target = pulse_target(elapsed, self.shape.floor);
                if self.intensity < target {
                    self.intensity += self.shape.step;
                } else {
                    self.intensity -= self.shape.step;
                }
            }
            None => self.intensity -= self.shape.step,
        }

        self.intensity = self.intensity.clamp(0.0, 1.0);
        self.intensity
    }
}

impl Default for Animator {
    fn default() -> Self {
        Self::new(PulseShape::default())
    }
}

/// Everything the animation thread touches
pub(crate) struct AnimationContext {
    pub(crate) animator: Arc<Mutex<Animator>>,
    pub(crate) warning: Arc<Mutex<WarningState>>,
    pub(crate) status: SessionStatus,
    pub(crate) universe: Universe,
    pub(crate) channel: usize,
    pub(crate) tick_interval: Duration,
}

/// Tick loop: step the animator, then write the beacon while connected.
///
/// Intensity keeps advancing while the bridge is away; only the universe
/// write is skipped, so a reconnect picks up the current value.
pub(crate) fn animation_loop(ctx: AnimationContext, shutdown: Receiver<()>) {
    info!("Animation thread started");
    let mut was_connected = false;

    loop {
        let elapsed = ctx.warning.lock().elapsed();
        let intensity = ctx.animator.lock().tick(elapsed);

        let connected = ctx.status.is_connected();
        if connected {
            if let Err(e) = ctx.universe.set_color(ctx.channel, intensity, 0.0, 0.0) {
                warn!("Failed to write beacon color: {}", e);
            }
        } else if was_connected {
            debug!("Bridge away, holding universe writes");
        }
        was_connected = connected;

        if !wait_tick(&shutdown, ctx.tick_interval) {
            break;
        }
    }

    info!("Animation thread stopped");
}

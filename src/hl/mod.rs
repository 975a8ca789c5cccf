//! High-level interface to the DRV8711 motor controller
//!
//! The entry point to this API is the [Motors] struct. Please refer to the
//! documentation there for more details.
//!
//! This module implements a high-level interface to a pair of brushed DC
//! motors driven by one DRV8711. This is the recommended way to use this
//! crate, unless you need the greater flexibility provided by the
//! [register-level interface].
//!
//! [register-level interface]: ../ll/index.html

use core::fmt;

use embedded_hal::pwm::SetDutyCycle;

use crate::configs::BrushedMotorProfile;
use crate::ll;

pub use error::*;
pub use ready::*;
#[allow(unused_imports)]
pub use uninitialized::*;

mod error;
mod ready;
mod uninitialized;

/// Entry point to the DRV8711 motor controller API
///
/// Owns the register-level driver and the two PWM channel pairs, one per
/// motor. Commands are translated into chip register writes and duty cycle
/// updates; no motor state is cached beyond the configured profile and the
/// last requested current limit, which are kept so that the chip can be
/// reconfigured from scratch after a communication loss.
///
/// The expected call pattern is single-threaded and synchronous: one logical
/// owner issues commands and polls [`check_faults`](Motors::check_faults)
/// from its own control loop.
pub struct Motors<SPI, LF, LR, RF, RR, State> {
    driver: ll::Drv8711<SPI>,
    left: MotorOutputs<LF, LR>,
    right: MotorOutputs<RF, RR>,
    profile: BrushedMotorProfile,
    current_limit: f32,
    state: State,
}

// Can't be derived without putting requirements on the channel types.
impl<SPI, LF, LR, RF, RR, State> fmt::Debug for Motors<SPI, LF, LR, RF, RR, State>
where
    State: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Motors {{ state: ")?;
        self.state.fmt(f)?;
        write!(f, ", .. }}")?;

        Ok(())
    }
}

/// Indicates that the chip has not been configured yet
#[derive(Debug)]
pub struct Uninitialized;

/// Indicates that the chip is configured and the motors can be commanded
#[derive(Debug)]
pub struct Ready;

/// The pair of PWM channels driving one motor's H-bridge inputs
///
/// The two channels are mutually exclusive: the driver never leaves both with
/// a nonzero duty cycle, since that would command both directions at once.
pub struct MotorOutputs<F, R> {
    forward: F,
    reverse: R,
}

/// A PWM channel rejected an update. The channel error itself is dropped
/// because the four channels may have four different error types.
pub(crate) struct PwmError;

impl<F, R> MotorOutputs<F, R>
where
    F: SetDutyCycle,
    R: SetDutyCycle,
{
    /// Pairs up the two channels wired to one H-bridge
    ///
    /// `forward` and `reverse` are the channels that make the motor turn in
    /// the respective direction when driven alone.
    pub fn new(forward: F, reverse: R) -> Self {
        MotorOutputs { forward, reverse }
    }

    /// Release the two channels
    pub fn free(self) -> (F, R) {
        (self.forward, self.reverse)
    }

    /// The opposing channel is forced low before the new duty applies, so
    /// both channels are never driven at once.
    pub(crate) fn drive_forward(&mut self, percent: u8) -> Result<(), PwmError> {
        self.reverse
            .set_duty_cycle_fully_off()
            .map_err(|_| PwmError)?;
        self.forward
            .set_duty_cycle_percent(percent)
            .map_err(|_| PwmError)
    }

    pub(crate) fn drive_reverse(&mut self, percent: u8) -> Result<(), PwmError> {
        self.forward
            .set_duty_cycle_fully_off()
            .map_err(|_| PwmError)?;
        self.reverse
            .set_duty_cycle_percent(percent)
            .map_err(|_| PwmError)
    }

    pub(crate) fn stop(&mut self) -> Result<(), PwmError> {
        self.forward
            .set_duty_cycle_fully_off()
            .map_err(|_| PwmError)?;
        self.reverse
            .set_duty_cycle_fully_off()
            .map_err(|_| PwmError)
    }
}

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;
use embedded_hal::spi::SpiDevice;

use super::{Error, MotorOutputs, Motors, Ready};
use crate::configs::{BrakeMode, DecayMode, Motor};
use crate::ll::{self, Register, Status, DISCONNECT_SENTINEL};

/// How long [`Motors::check_faults`] backs off after a recovery attempt, in
/// milliseconds
///
/// The pause keeps a dead or faulting chip from being hammered with
/// reconfiguration traffic on every poll.
pub const RECOVERY_BACKOFF_MS: u32 = 1000;

/// Outcome of one fault poll
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FaultReport {
    /// The chip is responsive and no fault is latched.
    None,
    /// At least one fault was latched. The flags have been reported and
    /// cleared; a persisting fault will simply reappear on the next poll.
    Latched(Status),
    /// The chip was unresponsive and has been reconfigured from scratch,
    /// with the last requested current limit reapplied.
    CommunicationLoss,
}

impl<SPI, LF, LR, RF, RR> Motors<SPI, LF, LR, RF, RR, Ready>
where
    SPI: SpiDevice<u16>,
    LF: SetDutyCycle,
    LR: SetDutyCycle,
    RF: SetDutyCycle,
    RR: SetDutyCycle,
{
    /// Sets one motor's speed as a signed duty cycle percentage
    ///
    /// The sign selects the direction; the magnitude is clamped to 100% with
    /// a warning rather than rejected. The channel for the opposite direction
    /// is forced low before the new duty cycle applies, so at most one
    /// channel of the pair is ever nonzero.
    pub fn set_motor_speed(&mut self, motor: Motor, speed: f32) -> Result<(), Error<SPI>> {
        let speed = clamp_speed(speed);

        match motor {
            Motor::Left => {
                if speed >= 0.0 {
                    self.left.drive_forward(speed as u8)
                } else {
                    self.left.drive_reverse(-speed as u8)
                }
            }
            Motor::Right => {
                if speed >= 0.0 {
                    self.right.drive_forward(speed as u8)
                } else {
                    self.right.drive_reverse(-speed as u8)
                }
            }
        }
        .map_err(|_| Error::Pwm)
    }

    /// Selects what the motors do when their duty cycle drops
    ///
    /// This is a direct mapping onto the chip's decay mode: braking forces
    /// fast decay, neutral forces slow decay.
    pub fn set_brake_mode(&mut self, mode: BrakeMode) -> Result<(), Error<SPI>> {
        let decay = match mode {
            BrakeMode::AutoBrake => DecayMode::ForceFast,
            BrakeMode::Neutral => DecayMode::ForceSlow,
        };
        self.driver.set_decay_mode(decay)?;
        Ok(())
    }

    /// Sets the winding current limit for both motors, in amps
    ///
    /// Out-of-range requests are clamped to [0, 20] A with a warning; a limit
    /// of 0 A effectively disables the motors. The requested (pre-clamp)
    /// value is remembered so that a recovery after a communication loss
    /// reapplies exactly what the caller last asked for.
    pub fn set_current_limit(&mut self, amps: f32) -> Result<(), Error<SPI>> {
        self.current_limit = amps;
        let amps = clamp_current(amps);
        self.driver.set_current_limit(amps)?;
        Ok(())
    }

    /// Polls the chip for faults and recovers where possible
    ///
    /// Intended to be called at a regular cadence from the owner's control
    /// loop. Two conditions are checked, in order:
    ///
    /// 1. The STALL register reading as all ones means the chip is absent or
    ///    unpowered (nothing drove the bus). The STATUS register is cleared,
    ///    the stored profile is replayed in full and the last requested
    ///    current limit is reapplied.
    /// 2. A nonzero STATUS register means a real fault is latched. The flags
    ///    are reported, then cleared.
    ///
    /// Both paths block for [`RECOVERY_BACKOFF_MS`] before returning, so a
    /// persistent problem is retried roughly once a second instead of in a
    /// tight loop. Neither is fatal: the poll can simply be called again.
    pub fn check_faults<D>(&mut self, delay: &mut D) -> Result<FaultReport, Error<SPI>>
    where
        D: DelayNs,
    {
        if self.driver.read_register(Register::Stall)? == DISCONNECT_SENTINEL {
            error!("lost communication with the motor driver, reconfiguring");
            self.driver.write_register(Register::Status, 0)?;
            self.driver.apply_profile(&self.profile)?;
            self.set_current_limit(self.current_limit)?;
            delay.delay_ms(RECOVERY_BACKOFF_MS);
            return Ok(FaultReport::CommunicationLoss);
        }

        let status = self.driver.read_status()?;
        if status.any() {
            error!("motor driver fault: {:?}", status);
            self.driver.write_register(Register::Status, 0)?;
            delay.delay_ms(RECOVERY_BACKOFF_MS);
            return Ok(FaultReport::Latched(status));
        }

        Ok(FaultReport::None)
    }

    /// Direct access to the register-level driver
    pub fn ll(&mut self) -> &mut ll::Drv8711<SPI> {
        &mut self.driver
    }

    /// Release the SPI device and the PWM channel pairs
    pub fn free(
        self,
    ) -> (
        ll::Drv8711<SPI>,
        MotorOutputs<LF, LR>,
        MotorOutputs<RF, RR>,
    ) {
        (self.driver, self.left, self.right)
    }
}

fn clamp_speed(speed: f32) -> f32 {
    if speed > 100.0 {
        warn!("motor speed {} is above 100%, clamping", speed);
        100.0
    } else if speed < -100.0 {
        warn!("motor speed {} is below -100%, clamping", speed);
        -100.0
    } else {
        speed
    }
}

fn clamp_current(amps: f32) -> f32 {
    if amps > 20.0 {
        warn!("current limit {} A is above 20 A, clamping", amps);
        20.0
    } else if amps < 0.0 {
        warn!("negative current limit {} A, clamping to 0 A", amps);
        0.0
    } else {
        amps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_clamping() {
        assert_eq!(clamp_speed(150.0), 100.0);
        assert_eq!(clamp_speed(-150.0), -100.0);
        assert_eq!(clamp_speed(42.5), 42.5);
        assert_eq!(clamp_speed(-0.0), -0.0);
    }

    #[test]
    fn current_clamping() {
        assert_eq!(clamp_current(25.0), 20.0);
        assert_eq!(clamp_current(-5.0), 0.0);
        assert_eq!(clamp_current(10.0), 10.0);
    }
}

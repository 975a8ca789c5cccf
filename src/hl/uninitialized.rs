use embedded_hal::pwm::SetDutyCycle;
use embedded_hal::spi::SpiDevice;

use super::{Error, MotorOutputs, Motors, Ready, Uninitialized};
use crate::configs::BrushedMotorProfile;
use crate::ll::{self, Register};

impl<SPI, LF, LR, RF, RR> Motors<SPI, LF, LR, RF, RR, Uninitialized>
where
    SPI: SpiDevice<u16>,
    LF: SetDutyCycle,
    LR: SetDutyCycle,
    RF: SetDutyCycle,
    RR: SetDutyCycle,
{
    /// Create a new instance of `Motors`
    ///
    /// Requires the SPI device connected to the DRV8711 and the two PWM
    /// channel pairs wired to its bridge inputs. Nothing is written to the
    /// chip until [`init`](Motors::init) is called.
    pub fn new(spi: SPI, left: MotorOutputs<LF, LR>, right: MotorOutputs<RF, RR>) -> Self {
        let profile = BrushedMotorProfile::default();
        Motors {
            driver: ll::Drv8711::new(spi),
            left,
            right,
            current_limit: profile.current_limit,
            profile,
            state: Uninitialized,
        }
    }

    /// Configure the chip and arm the outputs
    ///
    /// Clears any stale latched faults, writes the full profile to the chip
    /// (ending with the outputs enabled) and forces all four PWM channels
    /// low, so both motors start stopped.
    ///
    /// The profile is kept and replayed verbatim if
    /// [`check_faults`](Motors::check_faults) later finds the chip
    /// unresponsive.
    pub fn init(
        mut self,
        profile: BrushedMotorProfile,
    ) -> Result<Motors<SPI, LF, LR, RF, RR, Ready>, Error<SPI>> {
        // A fault latched before power-up would keep the outputs disabled.
        self.driver.write_register(Register::Status, 0)?;
        self.driver.apply_profile(&profile)?;

        self.left.stop().map_err(|_| Error::Pwm)?;
        self.right.stop().map_err(|_| Error::Pwm)?;

        Ok(Motors {
            driver: self.driver,
            left: self.left,
            right: self.right,
            current_limit: profile.current_limit,
            profile,
            state: Ready,
        })
    }
}

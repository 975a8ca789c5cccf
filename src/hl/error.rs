use core::fmt;
use core::fmt::{Display, Formatter};

use embedded_hal::spi;

use crate::ll;

/// An error that can occur when commanding the motors
pub enum Error<SPI>
where
    SPI: spi::ErrorType,
{
    /// Error occured while accessing the DRV8711's registers
    Driver(ll::Error<SPI>),

    /// A PWM channel rejected a duty cycle update
    Pwm,
}

impl<SPI> From<ll::Error<SPI>> for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn from(error: ll::Error<SPI>) -> Self {
        Error::Driver(error)
    }
}

impl<SPI> Display for Error<SPI>
where
    SPI: spi::ErrorType,
    SPI::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(feature = "std")]
impl<SPI> std::error::Error for Error<SPI>
where
    SPI: spi::ErrorType,
    SPI::Error: fmt::Debug,
{
}

// We can't derive this implementation, as `Debug` is only implemented
// conditionally for `ll::Error`.
impl<SPI> fmt::Debug for Error<SPI>
where
    SPI: spi::ErrorType,
    SPI::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Driver(error) => write!(f, "Driver({:?})", error),
            Error::Pwm => write!(f, "Pwm"),
        }
    }
}

#[cfg(feature = "defmt")]
impl<SPI> defmt::Format for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Driver(error) => defmt::write!(f, "Driver({})", error),
            Error::Pwm => defmt::write!(f, "Pwm"),
        }
    }
}

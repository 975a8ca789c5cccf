//! Driver crate for the TI DRV8711 dual H-bridge motor driver
//!
//! The DRV8711 is a gate driver with eight 12-bit configuration registers
//! behind a 16-bit SPI frame. This crate runs the chip in its brushed-motor
//! mode, where the external PWM inputs drive the two H-bridges directly, and
//! pairs it with two PWM channel pairs to control two brushed DC motors.
//!
//! The recommended way to use this driver is the [high-level interface]: pass
//! it the SPI device and the four PWM channels, initialize it with a
//! [`BrushedMotorProfile`], then command speeds, braking and current limits
//! and poll [`Motors::check_faults`] from your control loop. If you require a
//! higher degree of flexibility, you can use the [register-level interface]
//! instead.
//!
//! This driver is built on top of [`embedded-hal`], which means it is
//! portable and can be used on any platform that implements the
//! `embedded-hal` API: the SPI device handles the chip-select framing of each
//! 16-bit exchange, and the PWM channels take duty cycle percentages.
//!
//! [high-level interface]: hl/index.html
//! [register-level interface]: ll/index.html
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal
#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod fmt;

pub mod configs;
pub mod hl;
pub mod ll;

pub use crate::{
    configs::{BrakeMode, BrushedMotorProfile, Motor},
    hl::{Error, FaultReport, MotorOutputs, Motors, Ready, Uninitialized, RECOVERY_BACKOFF_MS},
    ll::Status,
};

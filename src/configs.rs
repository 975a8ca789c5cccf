//! Configuration types for the DRV8711
//!
//! This module houses the enumerated settings that map onto the chip's
//! register fields, plus [`BrushedMotorProfile`], the complete configuration
//! that is written to the chip during initialization and replayed after a
//! communication loss.
//!
//! Every enum is a closed set; its discriminant is the exact bit pattern the
//! chip expects, taken from the register tables in the DRV8711 datasheet.

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Sense amplifier gain (ISGAIN field of the CTRL register)
///
/// Together with the shunt resistor this scales the winding current seen by
/// the torque comparator.
pub enum Gain {
    /// Gain of 5
    X5 = 0b00,
    /// Gain of 10
    X10 = 0b01,
    /// Gain of 20
    X20 = 0b10,
    /// Gain of 40
    X40 = 0b11,
}

impl Default for Gain {
    fn default() -> Self {
        Gain::X5
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Dead time between turning off one side of an H-bridge and turning on the
/// other (DTIME field of the CTRL register)
///
/// A longer dead time gives more margin against shoot-through at the cost of
/// torque ripple.
pub enum DeadTime {
    /// 400 ns
    Ns400 = 0b00,
    /// 450 ns
    Ns450 = 0b01,
    /// 650 ns
    Ns650 = 0b10,
    /// 850 ns
    Ns850 = 0b11,
}

impl Default for DeadTime {
    fn default() -> Self {
        DeadTime::Ns850
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Input interpretation mode (PWMMODE field of the OFF register)
pub enum PwmMode {
    /// Internal indexer; the chip steps a stepper motor on its own.
    Stepper = 0,
    /// External PWM inputs drive the two H-bridges directly.
    Brushed = 1,
}

impl Default for PwmMode {
    fn default() -> Self {
        PwmMode::Brushed
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// How winding current is allowed to decrease between PWM pulses (DECMOD
/// field of the DECAY register)
pub enum DecayMode {
    /// Always slow decay; the motor coasts when the duty cycle drops.
    ForceSlow = 0b000,
    /// Slow decay for increasing current, mixed decay for decreasing current.
    SlowIncMixedDec = 0b001,
    /// Always fast decay; the motor actively brakes when the duty cycle drops.
    ForceFast = 0b010,
    /// Always mixed decay.
    ForceMixed = 0b011,
    /// Slow decay for increasing current, auto mixed decay for decreasing
    /// current.
    SlowIncAutoMixedDec = 0b100,
    /// Always auto mixed decay.
    ForceAutoMixed = 0b101,
}

impl Default for DecayMode {
    fn default() -> Self {
        DecayMode::ForceFast
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Overcurrent protection trip threshold (OCPTH field of the DRIVE register)
///
/// The threshold is a drain-source voltage drop; the tripping current follows
/// from the on-resistance of the external FETs.
pub enum OcpThreshold {
    /// 250 mV
    Mv250 = 0b00,
    /// 500 mV
    Mv500 = 0b01,
    /// 750 mV
    Mv750 = 0b10,
    /// 1000 mV
    Mv1000 = 0b11,
}

impl Default for OcpThreshold {
    fn default() -> Self {
        OcpThreshold::Mv250
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Overcurrent protection deglitch time (OCPDEG field of the DRIVE register)
///
/// The threshold must be exceeded for this long before a fault is latched.
pub enum OcpDeglitch {
    /// 1 µs
    Us1 = 0b00,
    /// 2 µs
    Us2 = 0b01,
    /// 4 µs
    Us4 = 0b10,
    /// 8 µs
    Us8 = 0b11,
}

impl Default for OcpDeglitch {
    fn default() -> Self {
        OcpDeglitch::Us8
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Gate drive time (TDRIVEN/TDRIVEP fields of the DRIVE register)
///
/// How long the peak gate current is applied on each switching edge. The same
/// code set is used for the low-side and high-side drivers.
pub enum GateDriveTime {
    /// 250 ns
    Ns250 = 0b00,
    /// 500 ns
    Ns500 = 0b01,
    /// 1000 ns
    Ns1000 = 0b10,
    /// 2000 ns
    Ns2000 = 0b11,
}

impl Default for GateDriveTime {
    fn default() -> Self {
        GateDriveTime::Ns1000
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Low-side gate drive peak current (IDRIVEN field of the DRIVE register)
pub enum LsGatePeakCurrent {
    /// 100 mA
    Ma100 = 0b00,
    /// 200 mA
    Ma200 = 0b01,
    /// 300 mA
    Ma300 = 0b10,
    /// 400 mA
    Ma400 = 0b11,
}

impl Default for LsGatePeakCurrent {
    fn default() -> Self {
        LsGatePeakCurrent::Ma400
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// High-side gate drive peak current (IDRIVEP field of the DRIVE register)
///
/// The high-side driver sources half the current of the low-side driver for
/// the same codes.
pub enum HsGatePeakCurrent {
    /// 50 mA
    Ma50 = 0b00,
    /// 100 mA
    Ma100 = 0b01,
    /// 150 mA
    Ma150 = 0b10,
    /// 200 mA
    Ma200 = 0b11,
}

impl Default for HsGatePeakCurrent {
    fn default() -> Self {
        HsGatePeakCurrent::Ma200
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Logical motor identifier
///
/// Each motor maps 1:1 to one H-bridge of the chip and one pair of PWM
/// output channels.
pub enum Motor {
    /// The left drive motor
    Left,
    /// The right drive motor
    Right,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Behavior of a motor when its commanded duty cycle drops
pub enum BrakeMode {
    /// Coast; winding current decays slowly and the motor spins down freely.
    Neutral,
    /// Actively brake; winding current decays fast through the bridge.
    AutoBrake,
}

impl Default for BrakeMode {
    fn default() -> Self {
        BrakeMode::Neutral
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Complete chip configuration for driving brushed DC motors
///
/// The default values are the validated profile for the reference hardware:
/// maximum dead time against shoot-through, fast decay, the longest blanking
/// window so switching transients cannot trip the overcurrent comparator,
/// and gate drive settings sized for ~30 nC FET gates.
///
/// The profile is written to the chip field by field during initialization
/// and replayed verbatim whenever the chip is found unresponsive.
pub struct BrushedMotorProfile {
    /// H-bridge dead time.
    pub dead_time: DeadTime,
    /// Winding current decay mode.
    pub decay_mode: DecayMode,
    /// Current-sense blanking time, in units of 20 ns on top of a fixed 1 µs.
    pub blanking_time: u8,
    /// Low-side gate drive peak current.
    pub ls_gate_peak_current: LsGatePeakCurrent,
    /// High-side gate drive peak current.
    pub hs_gate_peak_current: HsGatePeakCurrent,
    /// Low-side gate drive time.
    pub ls_gate_drive_time: GateDriveTime,
    /// High-side gate drive time.
    pub hs_gate_drive_time: GateDriveTime,
    /// Overcurrent trip threshold.
    pub ocp_threshold: OcpThreshold,
    /// Overcurrent deglitch time.
    pub ocp_deglitch: OcpDeglitch,
    /// PWM input mode. Brushed mode makes the chip follow the external PWM
    /// inputs directly.
    pub pwm_mode: PwmMode,
    /// Winding current limit in amps.
    pub current_limit: f32,
    /// Fixed off time for PWM current chopping, in units of 500 ns.
    pub toff: u8,
}

impl Default for BrushedMotorProfile {
    fn default() -> Self {
        BrushedMotorProfile {
            dead_time: Default::default(),
            decay_mode: Default::default(),
            // 255 * 20 ns + 1 µs blanking window
            blanking_time: 255,
            ls_gate_peak_current: Default::default(),
            hs_gate_peak_current: Default::default(),
            ls_gate_drive_time: Default::default(),
            hs_gate_drive_time: Default::default(),
            ocp_threshold: Default::default(),
            ocp_deglitch: Default::default(),
            pwm_mode: Default::default(),
            current_limit: 10.0,
            toff: 200,
        }
    }
}

//! Integration tests for the high-level motor controller
//!
//! The DRV8711 side is scripted with an SPI mock; the PWM side uses fake
//! channels that record the last duty cycle they were given. All register
//! reads in the scripts reply with zero unless a test needs preexisting bits.

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::{self, ErrorKind, SetDutyCycle};
use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

use drv8711::{
    BrakeMode, BrushedMotorProfile, FaultReport, Motor, MotorOutputs, Motors, RECOVERY_BACKOFF_MS,
};

#[derive(Debug)]
struct PwmFault;

impl pwm::Error for PwmFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// A PWM channel with a max duty of 100, so duty equals percent.
struct FakeChannel {
    duty: Rc<RefCell<u16>>,
}

impl pwm::ErrorType for FakeChannel {
    type Error = PwmFault;
}

impl SetDutyCycle for FakeChannel {
    fn max_duty_cycle(&self) -> u16 {
        100
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        *self.duty.borrow_mut() = duty;
        Ok(())
    }
}

fn channel() -> (FakeChannel, Rc<RefCell<u16>>) {
    let duty = Rc::new(RefCell::new(0));
    (FakeChannel { duty: duty.clone() }, duty)
}

#[derive(Default)]
struct RecordingDelay {
    total_ms: u32,
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += ms;
    }
}

fn xfer(tx: u16, rx: u16) -> Vec<SpiTransaction<u16>> {
    vec![
        SpiTransaction::transaction_start(),
        SpiTransaction::transfer_in_place(vec![tx], vec![rx]),
        SpiTransaction::transaction_end(),
    ]
}

fn write_reg(addr: u16, payload: u16) -> Vec<SpiTransaction<u16>> {
    xfer(addr << 12 | payload, 0)
}

fn read_reg(addr: u16, reply: u16) -> Vec<SpiTransaction<u16>> {
    xfer(0x8000 | addr << 12, reply)
}

fn rmw(addr: u16, reply: u16, written: u16) -> Vec<SpiTransaction<u16>> {
    let mut v = read_reg(addr, reply);
    v.extend(write_reg(addr, written));
    v
}

/// The register writes `apply_profile` issues for the default brushed
/// profile, with every read replying zero.
fn profile_writes() -> Vec<SpiTransaction<u16>> {
    let mut v = vec![];
    v.extend(rmw(0, 0, 0x0C00)); // dead time 850 ns
    v.extend(rmw(4, 0, 0x0200)); // forced fast decay
    v.extend(rmw(3, 0, 0x00FF)); // blanking time 255
    v.extend(rmw(6, 0, 0x0300)); // LS gate peak 400 mA
    v.extend(rmw(6, 0, 0x0C00)); // HS gate peak 200 mA
    v.extend(rmw(6, 0, 0x0020)); // LS gate drive 1000 ns
    v.extend(rmw(6, 0, 0x0080)); // HS gate drive 1000 ns
    v.extend(rmw(6, 0, 0x0000)); // OCP threshold 250 mV
    v.extend(rmw(6, 0, 0x000C)); // OCP deglitch 8 us
    v.extend(rmw(2, 0, 0x0100)); // brushed PWM mode
    v.extend(rmw(0, 0, 0x0000)); // sense gain 5
    v.extend(rmw(1, 0, 0x0041)); // torque code 65 for 10 A
    v.extend(rmw(2, 0, 0x00C8)); // TOFF 200
    v.extend(rmw(0, 0, 0x0001)); // motor enable
    v
}

fn init_expectations() -> Vec<SpiTransaction<u16>> {
    let mut v = write_reg(7, 0); // clear stale faults
    v.extend(profile_writes());
    v
}

struct Rig {
    left_forward: Rc<RefCell<u16>>,
    left_reverse: Rc<RefCell<u16>>,
    right_forward: Rc<RefCell<u16>>,
    right_reverse: Rc<RefCell<u16>>,
}

type ReadyMotors =
    Motors<SpiMock<u16>, FakeChannel, FakeChannel, FakeChannel, FakeChannel, drv8711::Ready>;

fn init_motors(expectations: &[SpiTransaction<u16>]) -> (ReadyMotors, Rig) {
    let _ = env_logger::builder().is_test(true).try_init();

    let (lf, left_forward) = channel();
    let (lr, left_reverse) = channel();
    let (rf, right_forward) = channel();
    let (rr, right_reverse) = channel();

    let motors = Motors::new(
        SpiMock::new(expectations),
        MotorOutputs::new(lf, lr),
        MotorOutputs::new(rf, rr),
    );
    let motors = motors.init(BrushedMotorProfile::default()).unwrap();

    (
        motors,
        Rig {
            left_forward,
            left_reverse,
            right_forward,
            right_reverse,
        },
    )
}

fn finish(motors: ReadyMotors) {
    let (driver, _, _) = motors.free();
    driver.free().done();
}

#[test]
fn init_configures_chip_and_zeroes_outputs() {
    let (motors, rig) = init_motors(&init_expectations());

    assert_eq!(*rig.left_forward.borrow(), 0);
    assert_eq!(*rig.left_reverse.borrow(), 0);
    assert_eq!(*rig.right_forward.borrow(), 0);
    assert_eq!(*rig.right_reverse.borrow(), 0);

    finish(motors);
}

#[test]
fn speed_is_clamped_to_full_duty() {
    let (mut motors, rig) = init_motors(&init_expectations());

    motors.set_motor_speed(Motor::Right, 150.0).unwrap();
    assert_eq!(*rig.right_forward.borrow(), 100);
    assert_eq!(*rig.right_reverse.borrow(), 0);

    motors.set_motor_speed(Motor::Left, -150.0).unwrap();
    assert_eq!(*rig.left_reverse.borrow(), 100);
    assert_eq!(*rig.left_forward.borrow(), 0);

    finish(motors);
}

#[test]
fn direction_channels_are_mutually_exclusive() {
    let (mut motors, rig) = init_motors(&init_expectations());

    motors.set_motor_speed(Motor::Right, 75.0).unwrap();
    assert_eq!(*rig.right_forward.borrow(), 75);
    assert_eq!(*rig.right_reverse.borrow(), 0);

    // Reversing must zero the forward channel in the same call.
    motors.set_motor_speed(Motor::Right, -40.0).unwrap();
    assert_eq!(*rig.right_forward.borrow(), 0);
    assert_eq!(*rig.right_reverse.borrow(), 40);

    motors.set_motor_speed(Motor::Right, 10.0).unwrap();
    assert_eq!(*rig.right_forward.borrow(), 10);
    assert_eq!(*rig.right_reverse.borrow(), 0);

    // The other motor's pair is untouched throughout.
    assert_eq!(*rig.left_forward.borrow(), 0);
    assert_eq!(*rig.left_reverse.borrow(), 0);

    finish(motors);
}

#[test]
fn brake_mode_maps_onto_decay_mode() {
    let mut expectations = init_expectations();
    // Decay time bits survive both mode changes.
    expectations.extend(rmw(4, 0x00FF, 0x02FF));
    expectations.extend(rmw(4, 0x02FF, 0x00FF));
    let (mut motors, _rig) = init_motors(&expectations);

    motors.set_brake_mode(BrakeMode::AutoBrake).unwrap();
    motors.set_brake_mode(BrakeMode::Neutral).unwrap();

    finish(motors);
}

#[test]
fn current_limit_is_clamped_into_range() {
    let mut expectations = init_expectations();
    // 25 A clamps to 20 A: torque code (20 + 4) * 12.8 / 2.75 = 111.
    expectations.extend(rmw(0, 0, 0x0000));
    expectations.extend(rmw(1, 0, 0x006F));
    // -3 A clamps to 0 A: torque code (0 + 4) * 12.8 / 2.75 = 18.
    expectations.extend(rmw(0, 0, 0x0000));
    expectations.extend(rmw(1, 0, 0x0012));
    let (mut motors, _rig) = init_motors(&expectations);

    motors.set_current_limit(25.0).unwrap();
    motors.set_current_limit(-3.0).unwrap();

    finish(motors);
}

#[test]
fn fault_poll_with_healthy_chip_reports_none() {
    let mut expectations = init_expectations();
    expectations.extend(read_reg(5, 0x0123)); // disconnect probe, chip alive
    expectations.extend(read_reg(7, 0x0000)); // no fault latched
    let (mut motors, _rig) = init_motors(&expectations);

    let mut delay = RecordingDelay::default();
    let report = motors.check_faults(&mut delay).unwrap();

    assert_eq!(report, FaultReport::None);
    assert_eq!(delay.total_ms, 0);

    finish(motors);
}

#[test]
fn latched_fault_is_reported_then_cleared() {
    let mut expectations = init_expectations();
    expectations.extend(read_reg(5, 0x0000));
    expectations.extend(read_reg(7, 0x0082)); // AOCP and STDLAT latched
    expectations.extend(write_reg(7, 0));
    let (mut motors, _rig) = init_motors(&expectations);

    let mut delay = RecordingDelay::default();
    let report = motors.check_faults(&mut delay).unwrap();

    match report {
        FaultReport::Latched(status) => {
            assert!(status.overcurrent_a());
            assert!(status.stall_latched());
            assert!(!status.undervoltage());
        }
        other => panic!("expected a latched fault, got {:?}", other),
    }
    assert_eq!(delay.total_ms, RECOVERY_BACKOFF_MS);

    finish(motors);
}

#[test]
fn disconnect_triggers_full_reconfiguration() {
    let mut expectations = init_expectations();
    // The probe register shifts back all ones: chip gone.
    expectations.extend(read_reg(5, 0x0FFF));
    // Recovery: clear STATUS, replay the whole profile, reapply the last
    // requested current limit (still the profile's 10 A, code 65).
    expectations.extend(write_reg(7, 0));
    expectations.extend(profile_writes());
    expectations.extend(rmw(0, 0, 0x0000));
    expectations.extend(rmw(1, 0, 0x0041));
    let (mut motors, _rig) = init_motors(&expectations);

    let mut delay = RecordingDelay::default();
    let report = motors.check_faults(&mut delay).unwrap();

    assert_eq!(report, FaultReport::CommunicationLoss);
    assert_eq!(delay.total_ms, RECOVERY_BACKOFF_MS);

    finish(motors);
}

#[test]
fn recovery_reapplies_the_requested_current_limit() {
    let mut expectations = init_expectations();
    // 7 A requested before the chip drops off the bus: code
    // (7 + 4) * 12.8 / 2.75 = 51.2 -> 51.
    expectations.extend(rmw(0, 0, 0x0000));
    expectations.extend(rmw(1, 0, 0x0033));
    expectations.extend(read_reg(5, 0x0FFF));
    expectations.extend(write_reg(7, 0));
    expectations.extend(profile_writes());
    expectations.extend(rmw(0, 0, 0x0000));
    expectations.extend(rmw(1, 0, 0x0033));
    let (mut motors, _rig) = init_motors(&expectations);

    motors.set_current_limit(7.0).unwrap();

    let mut delay = RecordingDelay::default();
    let report = motors.check_faults(&mut delay).unwrap();
    assert_eq!(report, FaultReport::CommunicationLoss);

    finish(motors);
}

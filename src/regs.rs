//! FIR accelerator register map.
//!
//! This module contains the register offsets and control/status bits of the
//! FIR IP core, as well as the traits used by the driver to access the
//! registers and the marker mailbox. The same driver code runs on top of the
//! UIO mapping of the real IP core and on top of the simulated IP core.

/// Control/status register.
pub const CONTROL: usize = 0x000;
/// Number of samples in a run.
pub const DATA_LENGTH: usize = 0x010;
/// Number of filter coefficients.
pub const NUM_TAPS: usize = 0x014;
/// Input sample register.
pub const X_IN: usize = 0x040;
/// Output sample register.
pub const Y_OUT: usize = 0x044;
/// Address of the first coefficient register.
pub const COEFFICIENTS: usize = 0x080;
/// Maximum number of coefficients supported by the IP core.
pub const MAX_TAPS: usize = 32;
/// Size of the register region in bytes.
pub const REGION_SIZE: usize = COEFFICIENTS + 4 * MAX_TAPS;

/// Marker posted to the mailbox when a run starts.
pub const START_MARK: u32 = 0x00a5_0000;
/// Marker posted to the mailbox when a run ends.
///
/// See [`end_mark`].
pub const END_MARK: u32 = 0x005a_0000;

/// Returns the offset of the register for coefficient `tap`.
pub const fn coefficient(tap: usize) -> usize {
    COEFFICIENTS + 4 * tap
}

/// Returns the mailbox word that marks the end of a run.
///
/// The low byte of the final output is placed in bits 24-31, next to the
/// end marker.
pub fn end_mark(final_output: i32) -> u32 {
    ((final_output as u32) << 24) | END_MARK
}

/// Control/status register bits.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StatusBit {
    /// Start a run. This is the only bit written by the driver.
    Start,
    /// The last output of the run has been read.
    Done,
    /// No run is in progress.
    Idle,
    /// The IP core accepts a new input sample.
    XReady,
    /// The IP core has an output sample available.
    YReady,
}

impl StatusBit {
    /// Bit position inside the control/status register.
    pub const fn position(self) -> u32 {
        match self {
            StatusBit::Start => 0,
            StatusBit::Done => 1,
            StatusBit::Idle => 2,
            StatusBit::XReady => 4,
            StatusBit::YReady => 5,
        }
    }

    /// Mask of the bit inside the control/status register.
    pub const fn mask(self) -> u32 {
        1 << self.position()
    }
}

impl std::fmt::Display for StatusBit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        let name = match self {
            StatusBit::Start => "START",
            StatusBit::Done => "DONE",
            StatusBit::Idle => "IDLE",
            StatusBit::XReady => "X_READY",
            StatusBit::YReady => "Y_READY",
        };
        write!(f, "{name}")
    }
}

/// Value of the control/status register.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Status(pub u32);

impl Status {
    /// Returns true if `bit` is set.
    pub fn is_set(self, bit: StatusBit) -> bool {
        self.0 & bit.mask() != 0
    }

    /// Returns a copy of the status with `bit` set to `value`.
    pub fn with(self, bit: StatusBit, value: bool) -> Status {
        if value {
            Status(self.0 | bit.mask())
        } else {
            Status(self.0 & !bit.mask())
        }
    }
}

/// Word access to the registers of the FIR IP core.
///
/// Offsets are in bytes from the base of the register region and are always
/// multiples of 4.
pub trait RegisterInterface {
    /// Reads the 32-bit register at `offset`.
    fn read(&mut self, offset: usize) -> u32;
    /// Writes `value` to the 32-bit register at `offset`.
    fn write(&mut self, offset: usize, value: u32);
}

/// Mailbox register used to signal start and end markers to an external
/// observer.
pub trait Mailbox {
    /// Writes `value` to the mailbox.
    fn post(&mut self, value: u32);
}

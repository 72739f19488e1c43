// Motor output collaborator: turns a pulse width into an actual signal

use std::fmt;

use tracing::{debug, info};

/// Which drive wheel a pulse is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left = 0,
    Right = 1,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Error types for bringing up a motor output
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout waiting for servo controller on {port}")]
    Timeout { port: String },

    #[error("Servo controller reported error flags: 0x{flags:04X}")]
    ControllerError { flags: u16 },

    #[error("Output used before initialize()")]
    NotInitialized,
}

/// Something that can hold a pulse width on each drive channel.
///
/// `set_pulse` has no failure return: per-tick delivery problems belong to
/// the implementation, which is expected to log them.
pub trait PulseOutput {
    /// Bring the hardware up. Failure here is fatal to the caller.
    fn initialize(&mut self) -> Result<(), OutputError>;

    /// Command `micros` microseconds on `side`
    fn set_pulse(&mut self, side: Side, micros: u16);

    /// Release the hardware
    fn shutdown(&mut self);
}

impl<T: PulseOutput + ?Sized> PulseOutput for Box<T> {
    fn initialize(&mut self) -> Result<(), OutputError> {
        (**self).initialize()
    }

    fn set_pulse(&mut self, side: Side, micros: u16) {
        (**self).set_pulse(side, micros)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}

/// Output with no hardware behind it
#[derive(Debug)]
pub struct SimulatedOutput {
    history: Vec<(Side, u16)>,
    recording: bool,
    last: [Option<u16>; 2],
    initialized: bool,
    shut_down: bool,
}

impl Default for SimulatedOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedOutput {
    /// Output that records every pulse it is given
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            recording: true,
            last: [None; 2],
            initialized: false,
            shut_down: false,
        }
    }

    /// Output that only keeps the latest pulse per side, for long sessions
    pub fn without_history() -> Self {
        Self {
            recording: false,
            ..Self::new()
        }
    }

    /// Every `(side, pulse)` emitted so far, in order
    pub fn history(&self) -> &[(Side, u16)] {
        &self.history
    }

    /// Most recent pulse emitted on `side`
    pub fn last(&self, side: Side) -> Option<u16> {
        self.last[side as usize]
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl PulseOutput for SimulatedOutput {
    fn initialize(&mut self) -> Result<(), OutputError> {
        info!("Simulated motor output ready (no hardware)");
        self.initialized = true;
        Ok(())
    }

    fn set_pulse(&mut self, side: Side, micros: u16) {
        if self.last[side as usize] != Some(micros) {
            debug!("sim {} wheel <- {}us", side, micros);
        }
        self.last[side as usize] = Some(micros);
        if self.recording {
            self.history.push((side, micros));
        }
    }

    fn shutdown(&mut self) {
        info!("Simulated motor output released");
        self.shut_down = true;
    }
}

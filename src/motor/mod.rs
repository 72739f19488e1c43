// Motor control module for the two-wheel differential base
//
// Provides:
// - Rate-limited ramping of per-wheel pulse targets
// - The pulse output trait and a simulated output
// - Pololu Maestro serial servo controller output

pub mod maestro;
pub mod output;
pub mod ramp;

pub use maestro::{MaestroBus, MaestroOutput};
pub use output::{OutputError, PulseOutput, Side, SimulatedOutput};
pub use ramp::{Channel, DriveState, PulseRange, Pulses, RampController};

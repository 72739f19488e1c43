// Rate-limited target tracking for the two drive channels
//
// Intent handlers only move targets. Each tick, `step` walks every channel's
// current pulse toward its target by at most `step` microseconds, clamping
// against the target so a ramp can never overshoot.

use serde::{Deserialize, Serialize};

use super::output::{PulseOutput, Side};
use crate::config::ConfigError;
use crate::intent::MotionIntent;

/// Pulse width bounds in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseRange {
    pub reverse: u16,
    pub neutral: u16,
    pub forward: u16,
}

impl PulseRange {
    pub const fn new(reverse: u16, neutral: u16, forward: u16) -> Self {
        Self {
            reverse,
            neutral,
            forward,
        }
    }

    /// True if `pulse` lies within `[reverse, forward]`
    pub fn contains(&self, pulse: u16) -> bool {
        (self.reverse..=self.forward).contains(&pulse)
    }

    /// Check `reverse < neutral < forward` with neutral centered
    pub fn validate(&self) -> Result<(), ConfigError> {
        let PulseRange {
            reverse,
            neutral,
            forward,
        } = *self;

        if !(reverse < neutral && neutral < forward) {
            return Err(ConfigError::UnorderedPulses {
                reverse,
                neutral,
                forward,
            });
        }
        let below = neutral - reverse;
        let above = forward - neutral;
        if below != above {
            return Err(ConfigError::AsymmetricPulses {
                neutral,
                below,
                above,
            });
        }
        Ok(())
    }
}

/// One motor's commanded pulse and the pulse the operator asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub current: u16,
    pub target: u16,
}

impl Channel {
    fn at(pulse: u16) -> Self {
        Self {
            current: pulse,
            target: pulse,
        }
    }

    /// Move `current` one bounded step toward `target`
    fn step(&mut self, step: u16) -> u16 {
        if self.current < self.target {
            self.current = self.current.saturating_add(step).min(self.target);
        } else if self.current > self.target {
            self.current = self.current.saturating_sub(step).max(self.target);
        }
        self.current
    }

    fn remaining_ticks(&self, step: u16) -> u32 {
        let distance = u32::from(self.current.abs_diff(self.target));
        distance.div_ceil(u32::from(step))
    }
}

/// Both drive channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveState {
    pub left: Channel,
    pub right: Channel,
}

/// Pulses emitted by one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pulses {
    pub left: u16,
    pub right: u16,
}

/// Owns the drive state and the ramp step
#[derive(Debug, Clone)]
pub struct RampController {
    state: DriveState,
    range: PulseRange,
    step: u16,
}

impl RampController {
    /// Create a controller resting at neutral on both channels.
    ///
    /// Fails for a disordered or lopsided range and for a zero step, which
    /// would never converge.
    pub fn new(range: PulseRange, step: u16) -> Result<Self, ConfigError> {
        range.validate()?;
        if step == 0 {
            return Err(ConfigError::Zero { field: "ramp_step" });
        }
        Ok(Self {
            state: DriveState {
                left: Channel::at(range.neutral),
                right: Channel::at(range.neutral),
            },
            range,
            step,
        })
    }

    fn set_targets(&mut self, left: u16, right: u16) {
        self.state.left.target = left;
        self.state.right.target = right;
    }

    pub fn stop(&mut self) {
        self.set_targets(self.range.neutral, self.range.neutral);
    }

    pub fn forward(&mut self) {
        self.set_targets(self.range.forward, self.range.forward);
    }

    pub fn backward(&mut self) {
        self.set_targets(self.range.reverse, self.range.reverse);
    }

    /// Spin in place: left wheel reverses, right wheel drives forward
    pub fn turn_left(&mut self) {
        self.set_targets(self.range.reverse, self.range.forward);
    }

    /// Spin in place: left wheel drives forward, right wheel reverses
    pub fn turn_right(&mut self) {
        self.set_targets(self.range.forward, self.range.reverse);
    }

    /// Update targets for an operator intent. Quit doubles as a stop.
    pub fn apply(&mut self, intent: MotionIntent) {
        match intent {
            MotionIntent::Forward => self.forward(),
            MotionIntent::Backward => self.backward(),
            MotionIntent::TurnLeft => self.turn_left(),
            MotionIntent::TurnRight => self.turn_right(),
            MotionIntent::Stop | MotionIntent::Quit => self.stop(),
            MotionIntent::NoOp => {}
        }
    }

    /// Ramp both channels one tick toward their targets, without any I/O
    pub fn step(&mut self) -> Pulses {
        Pulses {
            left: self.state.left.step(self.step),
            right: self.state.right.step(self.step),
        }
    }

    /// Ramp one tick and emit the resulting pulses, left then right
    pub fn advance<O: PulseOutput + ?Sized>(&mut self, output: &mut O) -> Pulses {
        let pulses = self.step();
        output.set_pulse(Side::Left, pulses.left);
        output.set_pulse(Side::Right, pulses.right);
        pulses
    }

    /// Both channels have reached their targets
    pub fn is_settled(&self) -> bool {
        self.state.left.current == self.state.left.target
            && self.state.right.current == self.state.right.target
    }

    /// Ticks until both channels reach their current targets
    pub fn ticks_to_settle(&self) -> u32 {
        self.state
            .left
            .remaining_ticks(self.step)
            .max(self.state.right.remaining_ticks(self.step))
    }

    pub fn state(&self) -> DriveState {
        self.state
    }

    pub fn range(&self) -> PulseRange {
        self.range
    }

    pub fn ramp_step(&self) -> u16 {
        self.step
    }

    #[cfg(test)]
    fn with_state(range: PulseRange, step: u16, state: DriveState) -> Self {
        Self { state, range, step }
    }
}

// Fixed-period teleop loop
//
// Each tick runs sample -> decide -> advance -> emit, then waits for the
// next period. Everything runs on one thread; the drive state is owned here
// and handed to nothing else.

use std::future::Future;
use std::io::{self, Write};
use std::time::Duration;

use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn, Level};

// local imports
use crate::config::{ConfigError, DriveConfig};
use crate::input::KeySource;
use crate::intent::{MotionIntent, BANNER};
use crate::motor::{OutputError, PulseOutput, RampController};

/// Error types for the teleop loop
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Motor output failed to initialize: {0}")]
    Output(#[from] OutputError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read operator input: {0}")]
    Input(#[source] io::Error),

    #[error("Failed to write transcript: {0}")]
    Transcript(#[source] io::Error),
}

pub struct Runtime<K, O, W> {
    keys: K,
    output: O,
    transcript: W,
    ramp: RampController,
    period: Duration,
}

impl<K: KeySource, O: PulseOutput, W: Write> Runtime<K, O, W> {
    /// Build the loop from a config, rejecting one that fails validation
    pub fn new(config: &DriveConfig, keys: K, output: O, transcript: W) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            keys,
            output,
            transcript,
            ramp: RampController::new(config.pulse, config.ramp_step)?,
            period: config.tick(),
        })
    }

    pub fn ramp(&self) -> &RampController {
        &self.ramp
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    fn say(&mut self, line: &str) -> Result<(), RuntimeError> {
        writeln!(self.transcript, "{}", line)
            .and_then(|_| self.transcript.flush())
            .map_err(RuntimeError::Transcript)
    }

    /// Run one control tick without waiting
    pub fn tick_once(&mut self) -> Result<MotionIntent, RuntimeError> {
        // 1. Sample at most one key
        let key = self.keys.poll_key().map_err(RuntimeError::Input)?;

        // 2. Decide
        let intent = MotionIntent::from(key);
        match (intent.label(), key) {
            (Some(label), _) => self.say(label)?,
            (None, Some(key)) => debug!("Ignoring unbound key {:?}", key),
            (None, None) => {}
        }
        self.ramp.apply(intent);

        // 3. Advance and emit
        self.ramp.advance(&mut self.output);
        if tracing::enabled!(Level::TRACE) {
            match serde_json::to_string(&self.ramp.state()) {
                Ok(json) => trace!("drive state: {}", json),
                Err(e) => warn!("Failed to serialize drive state: {}", e),
            }
        }

        Ok(intent)
    }

    /// Run until the operator quits or Ctrl+C arrives
    pub async fn run(&mut self) -> Result<(), RuntimeError> {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Ctrl+C handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        };
        self.run_until(ctrl_c).await
    }

    /// Run until the operator quits or `cancel` completes.
    ///
    /// Output initialization failure returns before the loop is entered.
    /// Every other exit path ramps both wheels back to neutral before the
    /// output is released.
    pub async fn run_until<F: Future<Output = ()>>(&mut self, cancel: F) -> Result<(), RuntimeError> {
        self.output.initialize()?;

        let mut tick = interval(self.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Teleop started: {}ms tick, {}us ramp step",
            self.period.as_millis(),
            self.ramp.ramp_step()
        );

        let result = self.drive(&mut tick, cancel).await;
        if let Err(e) = &result {
            warn!("Leaving control loop early: {}", e);
        }

        // Safety stop
        self.ramp.stop();
        self.settle(&mut tick).await;
        self.output.shutdown();
        info!("Teleop stopped");

        result
    }

    async fn drive<F: Future<Output = ()>>(
        &mut self,
        tick: &mut Interval,
        cancel: F,
    ) -> Result<(), RuntimeError> {
        self.say(BANNER)?;
        self.ramp.stop();

        tokio::pin!(cancel);
        loop {
            tokio::select! {
                biased;
                _ = &mut cancel => {
                    info!("Interrupted, stopping");
                    self.say(MotionIntent::Quit.label().unwrap_or("Quit"))?;
                    self.ramp.apply(MotionIntent::Quit);
                    return Ok(());
                }
                _ = tick.tick() => {}
            }

            if self.tick_once()? == MotionIntent::Quit {
                return Ok(());
            }
        }
    }

    /// Keep ticking, ignoring input, until both wheels reach their targets
    async fn settle(&mut self, tick: &mut Interval) {
        let remaining = self.ramp.ticks_to_settle();
        if remaining == 0 {
            return;
        }
        info!("Ramping to neutral over {} ticks", remaining);
        while !self.ramp.is_settled() {
            tick.tick().await;
            self.ramp.advance(&mut self.output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ScriptedKeys;
    use crate::motor::{PulseRange, Side, SimulatedOutput};

    fn fast_config() -> DriveConfig {
        DriveConfig {
            tick_ms: 1,
            ..DriveConfig::default()
        }
    }

    fn runtime(
        keys: impl IntoIterator<Item = Option<char>>,
    ) -> Runtime<ScriptedKeys, SimulatedOutput, Vec<u8>> {
        Runtime::new(
            &fast_config(),
            ScriptedKeys::new(keys),
            SimulatedOutput::new(),
            Vec::new(),
        )
        .unwrap()
    }

    fn transcript_lines<K, O>(rt: &Runtime<K, O, Vec<u8>>) -> Vec<String> {
        String::from_utf8(rt.transcript.clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn left_pulses(output: &SimulatedOutput) -> Vec<u16> {
        output
            .history()
            .iter()
            .filter(|(side, _)| *side == Side::Left)
            .map(|&(_, pulse)| pulse)
            .collect()
    }

    struct FailingOutput;

    impl PulseOutput for FailingOutput {
        fn initialize(&mut self) -> Result<(), OutputError> {
            Err(OutputError::NotInitialized)
        }

        fn set_pulse(&mut self, _side: Side, _micros: u16) {
            panic!("pulse emitted after failed initialization");
        }

        fn shutdown(&mut self) {
            panic!("shutdown after failed initialization");
        }
    }

    struct BrokenKeys;

    impl KeySource for BrokenKeys {
        fn poll_key(&mut self) -> io::Result<Option<char>> {
            Err(io::Error::other("tty gone"))
        }
    }

    #[test]
    fn test_forward_tick_by_tick() {
        let mut keys = vec![Some('w')];
        keys.extend(std::iter::repeat_n(None, 25));
        let mut rt = runtime(keys);

        assert_eq!(rt.tick_once().unwrap(), MotionIntent::Forward);
        assert_eq!(rt.output().last(Side::Left), Some(1510));
        assert_eq!(rt.output().last(Side::Right), Some(1510));

        for _ in 1..25 {
            rt.tick_once().unwrap();
        }
        assert_eq!(rt.output().last(Side::Left), Some(1750));
        assert_eq!(rt.output().last(Side::Right), Some(1750));

        assert_eq!(rt.tick_once().unwrap(), MotionIntent::NoOp);
        assert_eq!(rt.output().last(Side::Left), Some(1750));
        assert_eq!(transcript_lines(&rt), vec!["Forward"]);
    }

    #[test]
    fn test_unbound_keys_print_nothing_and_hold_state() {
        let mut rt = runtime([Some('x'), None, Some('z'), Some('\n')]);
        for _ in 0..4 {
            assert_eq!(rt.tick_once().unwrap(), MotionIntent::NoOp);
        }
        assert!(rt.transcript.is_empty());
        assert!(rt.ramp().is_settled());
        assert_eq!(rt.output().last(Side::Left), Some(1500));
    }

    #[tokio::test]
    async fn test_quit_ramps_to_neutral_before_shutdown() {
        let mut keys = vec![Some('d')];
        keys.extend(std::iter::repeat_n(None, 30));
        keys.push(Some('q'));
        let mut rt = runtime(keys);

        rt.run_until(std::future::pending()).await.unwrap();

        let output = rt.output();
        assert!(output.is_initialized());
        assert!(output.is_shut_down());
        assert_eq!(output.last(Side::Left), Some(1500));
        assert_eq!(output.last(Side::Right), Some(1500));

        // Left reached 1750, then ramped down one step per tick
        let left = left_pulses(output);
        let peak = left.iter().position(|&p| p == 1750).unwrap();
        let tail = &left[peak..];
        assert!(tail.windows(2).all(|w| w[0] >= w[1] && w[0] - w[1] <= 10));
        assert_eq!(tail.iter().filter(|&&p| p < 1750).count(), 25);

        let lines = transcript_lines(&rt);
        assert_eq!(lines[0], "=== Sabertooth WASD Control (Smooth Ramp) ===");
        assert_eq!(&lines[lines.len() - 2..], ["Turn Right", "Quit"]);
    }

    #[tokio::test]
    async fn test_quit_at_neutral_emits_one_final_tick() {
        let mut rt = runtime([None, Some('Q')]);
        rt.run_until(std::future::pending()).await.unwrap();

        assert_eq!(rt.output().history().len(), 4);
        assert!(rt.output().history().iter().all(|&(_, p)| p == 1500));
        assert!(rt.output().is_shut_down());
    }

    #[tokio::test]
    async fn test_cancel_acts_as_quit() {
        let mut rt = runtime([Some('w'), Some('w'), Some('w')]);
        for _ in 0..3 {
            rt.tick_once().unwrap();
        }
        assert_eq!(rt.output().last(Side::Left), Some(1530));

        rt.run_until(async {}).await.unwrap();
        assert_eq!(rt.output().last(Side::Left), Some(1500));
        assert!(rt.output().is_shut_down());
        assert_eq!(transcript_lines(&rt).last().map(String::as_str), Some("Quit"));
    }

    #[tokio::test]
    async fn test_failed_initialization_never_enters_loop() {
        let mut rt = Runtime::new(
            &fast_config(),
            ScriptedKeys::new([Some('w')]),
            FailingOutput,
            Vec::new(),
        )
        .unwrap();
        let err = rt.run_until(std::future::pending()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Output(_)));
        assert!(rt.transcript.is_empty());
    }

    #[tokio::test]
    async fn test_input_failure_is_reported_and_motors_parked() {
        let mut rt =
            Runtime::new(&fast_config(), BrokenKeys, SimulatedOutput::new(), Vec::new()).unwrap();
        let err = rt.run_until(std::future::pending()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Input(_)));
        assert!(rt.output().is_shut_down());
        assert!(rt.ramp().is_settled());
        assert_eq!(rt.ramp().state().left.target, 1500);
    }

    #[test]
    fn test_rejects_zero_ramp_step() {
        let config = DriveConfig {
            ramp_step: 0,
            ..fast_config()
        };
        let result = Runtime::new(
            &config,
            ScriptedKeys::new([Some('w'), Some('q')]),
            SimulatedOutput::new(),
            Vec::new(),
        );
        assert!(matches!(result, Err(ConfigError::Zero { field: "ramp_step" })));
    }

    #[test]
    fn test_rejects_unordered_range_and_zero_tick() {
        let config = DriveConfig {
            pulse: PulseRange::new(1750, 1500, 1250),
            ..fast_config()
        };
        let result = Runtime::new(&config, ScriptedKeys::default(), SimulatedOutput::new(), Vec::new());
        assert!(matches!(result, Err(ConfigError::UnorderedPulses { .. })));

        let config = DriveConfig {
            tick_ms: 0,
            ..fast_config()
        };
        let result = Runtime::new(&config, ScriptedKeys::default(), SimulatedOutput::new(), Vec::new());
        assert!(matches!(result, Err(ConfigError::Zero { field: "tick_ms" })));
    }
}

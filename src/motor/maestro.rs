// Pololu Maestro serial servo controller, compact protocol
//
// Packet formats:
//   Set Target: [0x84, channel, target & 0x7F, (target >> 7) & 0x7F]
//   Get Errors: [0xA1] -> 2 bytes, little-endian error flags
// Targets are in quarter-microseconds; a target of 0 stops the pulse train.

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::output::{OutputError, PulseOutput, Side};

/// Default serial configuration for the Maestro command port
pub const DEFAULT_BAUDRATE: u32 = 9600;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Widest pulse a 14-bit quarter-microsecond target can carry
pub const MAX_PULSE_US: u16 = 0x3FFF / 4;

/// Command bytes
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Command {
    SetTarget = 0x84,
    GetErrors = 0xA1,
}

pub type Result<T> = std::result::Result<T, OutputError>;

/// Convert microseconds to the controller's quarter-microsecond units
fn quarter_micros(micros: u16) -> u16 {
    micros.saturating_mul(4)
}

/// Build a Set Target packet for `channel`
fn set_target_packet(channel: u8, quarter_us: u16) -> [u8; 4] {
    [
        Command::SetTarget as u8,
        channel,
        (quarter_us & 0x7F) as u8,
        ((quarter_us >> 7) & 0x7F) as u8,
    ]
}

/// Decode the two-byte Get Errors reply
fn decode_errors(reply: [u8; 2]) -> u16 {
    u16::from_le_bytes(reply)
}

/// Maestro command port - handles serial communication with the controller
pub struct MaestroBus {
    port: Box<dyn SerialPort>,
    port_name: String,
}

impl MaestroBus {
    /// Open a connection to the controller's command port
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self {
            port,
            port_name: port_name.to_string(),
        })
    }

    fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    /// Command a pulse width in microseconds on `channel`
    pub fn set_target(&mut self, channel: u8, micros: u16) -> Result<()> {
        let packet = set_target_packet(channel, quarter_micros(micros));
        self.send_packet(&packet)
    }

    /// Stop sending pulses on `channel`
    pub fn release(&mut self, channel: u8) -> Result<()> {
        let packet = set_target_packet(channel, 0);
        self.send_packet(&packet)
    }

    /// Read and clear the controller's error flags
    pub fn get_errors(&mut self) -> Result<u16> {
        self.send_packet(&[Command::GetErrors as u8])?;

        let mut reply = [0u8; 2];
        self.port.read_exact(&mut reply).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                OutputError::Timeout {
                    port: self.port_name.clone(),
                }
            } else {
                OutputError::Io(e)
            }
        })?;

        Ok(decode_errors(reply))
    }
}

/// Drive output backed by a Maestro, one servo channel per wheel
pub struct MaestroOutput {
    port_name: String,
    baud_rate: u32,
    left_channel: u8,
    right_channel: u8,
    neutral: u16,
    bus: Option<MaestroBus>,
}

impl MaestroOutput {
    /// Describe the output. Nothing is opened until `initialize`.
    pub fn new(
        port_name: &str,
        baud_rate: u32,
        left_channel: u8,
        right_channel: u8,
        neutral: u16,
    ) -> Self {
        Self {
            port_name: port_name.to_string(),
            baud_rate,
            left_channel,
            right_channel,
            neutral,
            bus: None,
        }
    }

    fn channel(&self, side: Side) -> u8 {
        match side {
            Side::Left => self.left_channel,
            Side::Right => self.right_channel,
        }
    }

    /// Send neutral to both wheels, then stop the pulse trains
    fn park(&mut self) -> Result<()> {
        let channels = [self.left_channel, self.right_channel];
        let neutral = self.neutral;
        let bus = self.bus.as_mut().ok_or(OutputError::NotInitialized)?;
        for channel in channels {
            bus.set_target(channel, neutral)?;
        }
        for channel in channels {
            bus.release(channel)?;
        }
        Ok(())
    }
}

impl PulseOutput for MaestroOutput {
    fn initialize(&mut self) -> Result<()> {
        info!(
            "Opening servo controller on {} at {} baud",
            self.port_name, self.baud_rate
        );
        let mut bus = MaestroBus::open_with_baudrate(&self.port_name, self.baud_rate)?;

        let flags = bus.get_errors()?;
        if flags != 0 {
            return Err(OutputError::ControllerError { flags });
        }
        debug!("Servo controller reports no errors");

        self.bus = Some(bus);
        info!(
            "Servo controller ready: left=ch{}, right=ch{}",
            self.left_channel, self.right_channel
        );
        Ok(())
    }

    fn set_pulse(&mut self, side: Side, micros: u16) {
        let channel = self.channel(side);
        let Some(bus) = self.bus.as_mut() else {
            warn!("Dropping {}us for {} wheel: output not initialized", micros, side);
            return;
        };
        if let Err(e) = bus.set_target(channel, micros) {
            warn!("Failed to set {} wheel (ch{}) to {}us: {}", side, channel, micros, e);
        }
    }

    fn shutdown(&mut self) {
        if self.bus.is_none() {
            return;
        }
        info!("Parking motors at neutral and releasing servo controller");
        if let Err(e) = self.park() {
            warn!("Failed to park motors: {}", e);
        }
        self.bus = None;
    }
}

impl Drop for MaestroOutput {
    fn drop(&mut self) {
        // Never leave the wheels driven if shutdown was skipped
        if self.bus.is_some() {
            self.shutdown();
        }
    }
}

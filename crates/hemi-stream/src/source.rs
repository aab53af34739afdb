//! Frame acquisition from the serial transport.
//!
//! The microcontroller emits one ASCII CSV record per line
//! (`t_us,left,right\n`). [`SerialFrameSource`] reads the port
//! non-blockingly, validates each line, and owns the reconnect policy:
//! exponential backoff, capped delay, bounded attempts, then a terminal
//! disconnected state the scheduler turns into a fatal outcome.

use std::io::Read;
use std::time::Duration;

use serialport::{SerialPort, SerialPortType};
use tracing::{debug, error, info, warn};

use hemi_core::config::SerialConfig;
use hemi_core::{HemiError, HemiResult, Sample};

/// USB vendor IDs of the supported acquisition boards.
const KNOWN_VIDS: [u16; 3] = [0x2341, 0x1A86, 0x0403]; // Arduino, CH340, FTDI

/// Descriptor substrings accepted during endpoint discovery.
const KNOWN_DESCRIPTIONS: [&str; 4] = ["arduino", "ch340", "ftdi", "usb serial"];

/// Backoff exponent ceiling; delays stop growing after this attempt.
const BACKOFF_EXPONENT_CAP: u32 = 5;

/// Hard ceiling on a single reconnect delay, seconds.
const BACKOFF_MAX_S: f64 = 30.0;

/// Result of one non-blocking read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A validated sample.
    Sample(Sample),
    /// No complete line available right now.
    Empty,
    /// A line arrived but failed validation; counted, not propagated.
    Corrupt,
    /// The transport is down; the caller may drive a reconnect.
    Disconnected,
}

/// Connection lifecycle of a frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected; terminal once reconnects are exhausted.
    Disconnected,
    /// Connection attempt in progress.
    Connecting,
    /// Streaming.
    Connected,
    /// Lost the transport, reconnect budget remaining.
    Reconnecting,
}

/// Observable acquisition counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Validated samples delivered.
    pub packets_received: u64,
    /// Lines dropped by parsing or range validation.
    pub packets_corrupted: u64,
    /// Raw bytes consumed from the transport.
    pub bytes_read: u64,
    /// Reconnect attempts performed.
    pub reconnect_attempts: u32,
}

/// A producer of decoded acquisition frames.
pub trait FrameSource {
    /// Establishes the transport. Fatal errors mean no endpoint exists.
    fn connect(&mut self) -> HemiResult<()>;

    /// Non-blocking read of at most one sample.
    fn read_sample(&mut self) -> ReadOutcome;

    /// Releases the transport.
    fn disconnect(&mut self);

    /// Current lifecycle state.
    fn state(&self) -> ConnectionState;

    /// Acquisition counters.
    fn stats(&self) -> SourceStats;

    /// Attempts one reconnect cycle (sleep + reopen). Returns true on
    /// success; false while retrying or once the budget is exhausted,
    /// after which [`FrameSource::state`] is terminally disconnected.
    fn reconnect(&mut self) -> bool {
        false
    }
}

/// Serial-port frame source speaking the `t_us,left,right` line format.
pub struct SerialFrameSource {
    config: SerialConfig,
    adc_max: u16,
    port: Option<Box<dyn SerialPort>>,
    state: ConnectionState,
    line_buf: Vec<u8>,
    stats: SourceStats,
    attempts: u32,
}

impl SerialFrameSource {
    /// Creates a source for the configured endpoint; `"auto"` defers
    /// endpoint selection to discovery at connect time.
    pub fn new(config: SerialConfig, adc_max: u16) -> Self {
        SerialFrameSource {
            config,
            adc_max,
            port: None,
            state: ConnectionState::Disconnected,
            line_buf: Vec::with_capacity(256),
            stats: SourceStats::default(),
            attempts: 0,
        }
    }

    /// Enumerates serial endpoints and picks the first one matching a
    /// known acquisition board.
    fn detect_endpoint() -> HemiResult<String> {
        let ports = serialport::available_ports().map_err(|e| HemiError::EndpointUnavailable {
            reason: format!("port enumeration failed: {e}"),
        })?;

        for port in &ports {
            let matched = match &port.port_type {
                SerialPortType::UsbPort(usb) => {
                    let descriptor = format!(
                        "{} {}",
                        usb.product.as_deref().unwrap_or(""),
                        usb.manufacturer.as_deref().unwrap_or("")
                    )
                    .to_lowercase();
                    KNOWN_VIDS.contains(&usb.vid)
                        || KNOWN_DESCRIPTIONS.iter().any(|k| descriptor.contains(k))
                }
                _ => false,
            };
            if matched {
                info!(port = %port.port_name, "acquisition board detected");
                return Ok(port.port_name.clone());
            }
        }

        Err(HemiError::EndpointUnavailable {
            reason: format!("no known board among {} serial ports", ports.len()),
        })
    }

    fn open(&mut self) -> HemiResult<()> {
        self.state = ConnectionState::Connecting;

        let endpoint = if self.config.port.eq_ignore_ascii_case("auto") {
            Self::detect_endpoint()?
        } else {
            self.config.port.clone()
        };

        info!(%endpoint, baudrate = self.config.baudrate, "opening serial endpoint");
        let port = serialport::new(&endpoint, self.config.baudrate)
            .timeout(Duration::from_secs_f64(self.config.timeout_s))
            .open()
            .map_err(|e| HemiError::EndpointUnavailable {
                reason: format!("cannot open {endpoint}: {e}"),
            })?;

        self.port = Some(port);
        self.line_buf.clear();
        self.state = ConnectionState::Connected;
        Ok(())
    }

    /// Pops one complete line from the byte buffer, if present.
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let newline = self.line_buf.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.line_buf.drain(..=newline).collect();
        Some(line)
    }

    fn handle_read_failure(&mut self, err: &std::io::Error) {
        warn!(%err, "serial read failed, entering reconnect");
        self.port = None;
        self.state = ConnectionState::Reconnecting;
    }
}

/// Delay before reconnect attempt `attempt` (zero-based):
/// `base · 2^min(attempt, 5)`, capped at 30 s.
pub fn backoff_delay(attempt: u32, base_s: f64) -> Duration {
    let exponent = attempt.min(BACKOFF_EXPONENT_CAP);
    let delay = (base_s * f64::from(1u32 << exponent)).min(BACKOFF_MAX_S);
    Duration::from_secs_f64(delay.max(0.0))
}

/// Parses one wire line into a sample.
///
/// Accepts any line with at least three comma-separated numeric fields;
/// extra fields are ignored. Returns `None` for anything malformed or
/// out of ADC range.
pub fn parse_line(line: &[u8], adc_max: u16) -> Option<Sample> {
    let text = std::str::from_utf8(line).ok()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut fields = trimmed.split(',');
    let t_us = fields.next()?.trim().parse::<f64>().ok()?;
    let left = fields.next()?.trim().parse::<f64>().ok()?;
    let right = fields.next()?.trim().parse::<f64>().ok()?;

    if !t_us.is_finite() || t_us < 0.0 {
        return None;
    }
    let max = f64::from(adc_max);
    if !(0.0..=max).contains(&left) || !(0.0..=max).contains(&right) {
        return None;
    }

    Some(Sample {
        t_us: t_us as u64,
        left: left.round() as u16,
        right: right.round() as u16,
    })
}

impl FrameSource for SerialFrameSource {
    fn connect(&mut self) -> HemiResult<()> {
        match self.open() {
            Ok(()) => {
                self.attempts = 0;
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    fn read_sample(&mut self) -> ReadOutcome {
        if self.state != ConnectionState::Connected {
            return ReadOutcome::Disconnected;
        }

        // Serve buffered lines before touching the transport.
        if let Some(line) = self.take_line() {
            return match parse_line(&line, self.adc_max) {
                Some(sample) => {
                    self.stats.packets_received += 1;
                    ReadOutcome::Sample(sample)
                }
                None => {
                    self.stats.packets_corrupted += 1;
                    debug!(len = line.len(), "dropping malformed line");
                    ReadOutcome::Corrupt
                }
            };
        }

        let mut chunk = [0u8; 512];
        let Some(port) = self.port.as_mut() else {
            self.state = ConnectionState::Reconnecting;
            return ReadOutcome::Disconnected;
        };
        match port.read(&mut chunk) {
            Ok(0) => ReadOutcome::Empty,
            Ok(n) => {
                self.stats.bytes_read += n as u64;
                self.line_buf.extend_from_slice(&chunk[..n]);
                match self.take_line() {
                    Some(line) => match parse_line(&line, self.adc_max) {
                        Some(sample) => {
                            self.stats.packets_received += 1;
                            ReadOutcome::Sample(sample)
                        }
                        None => {
                            self.stats.packets_corrupted += 1;
                            ReadOutcome::Corrupt
                        }
                    },
                    None => ReadOutcome::Empty,
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => ReadOutcome::Empty,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => ReadOutcome::Empty,
            Err(e) => {
                self.handle_read_failure(&e);
                ReadOutcome::Disconnected
            }
        }
    }

    fn disconnect(&mut self) {
        if self.port.take().is_some() {
            info!("serial endpoint released");
        }
        self.state = ConnectionState::Disconnected;
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn stats(&self) -> SourceStats {
        self.stats
    }

    fn reconnect(&mut self) -> bool {
        if self.state == ConnectionState::Disconnected {
            return false;
        }
        if self.attempts >= self.config.max_reconnect_attempts {
            error!(
                attempts = self.attempts,
                "reconnect budget exhausted, source is terminal"
            );
            self.state = ConnectionState::Disconnected;
            return false;
        }

        let delay = backoff_delay(self.attempts, self.config.reconnect_delay_s);
        self.attempts += 1;
        self.stats.reconnect_attempts += 1;
        info!(
            attempt = self.attempts,
            max = self.config.max_reconnect_attempts,
            delay_s = delay.as_secs_f64(),
            "reconnecting"
        );
        std::thread::sleep(delay);

        match self.open() {
            Ok(()) => {
                self.attempts = 0;
                info!("reconnected");
                true
            }
            Err(e) => {
                warn!(%e, "reconnect attempt failed");
                self.state = ConnectionState::Reconnecting;
                false
            }
        }
    }
}

impl Drop for SerialFrameSource {
    fn drop(&mut self) {
        self.disconnect();
    }
}

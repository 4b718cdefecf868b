//! Serial event bridge
//!
//! Reads newline-terminated ASCII records from a microcontroller and writes
//! the decoded position/mode into [`SharedInputs`], the same state the local
//! inputs use.
//!
//! Record format: `S<pos>` or `S<pos>C<mode>`
//! - `pos`: position digit, 1-based, clamped into `[1, P]`
//! - `mode`: `0` = Standard, any other digit = Alternative
//!
//! Malformed records are dropped; they never reach the scheduler as errors.

use crate::error::{Error, Result};
use crate::input::SharedInputs;
use kiosk_common::events::{EventBus, InputSource, KioskEvent};
use kiosk_common::{Mode, Position};
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Longest record accepted, terminator included; longer input is line noise
const MAX_RECORD_LEN: u64 = 16;

/// Decoded serial record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialUpdate {
    pub position: Position,
    pub mode: Option<Mode>,
}

/// Why a record was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("empty line")]
    Empty,

    #[error("unexpected first character {0:?}")]
    BadPrefix(char),

    #[error("unexpected length {0}")]
    BadLength(usize),

    #[error("non-numeric payload {0:?}")]
    NotADigit(char),

    #[error("unexpected role character {0:?}")]
    BadRole(char),
}

fn digit(byte: u8) -> std::result::Result<u32, LineError> {
    (byte as char)
        .to_digit(10)
        .ok_or(LineError::NotADigit(byte as char))
}

/// Decode one record; `position_count` is `P`
pub fn parse_line(line: &str, position_count: usize) -> std::result::Result<SerialUpdate, LineError> {
    let bytes = line.trim().as_bytes();
    let first = *bytes.first().ok_or(LineError::Empty)?;
    if first != b'S' {
        return Err(LineError::BadPrefix(first as char));
    }
    if bytes.len() != 2 && bytes.len() != 4 {
        return Err(LineError::BadLength(bytes.len()));
    }

    let number = digit(bytes[1])? as i64;
    let upper = position_count.max(1) as i64;
    let position = Position::clamped(number.clamp(1, upper) - 1, position_count);

    let mode = if bytes.len() == 4 {
        if bytes[2] != b'C' {
            return Err(LineError::BadRole(bytes[2] as char));
        }
        Some(if digit(bytes[3])? == 0 {
            Mode::Standard
        } else {
            Mode::Alternative
        })
    } else {
        None
    };

    Ok(SerialUpdate { position, mode })
}

/// Concurrent reader translating serial records into input updates
#[derive(Clone)]
pub struct SerialBridge {
    inputs: SharedInputs,
    events: EventBus,
    position_count: usize,
}

impl SerialBridge {
    pub fn new(inputs: SharedInputs, events: EventBus, position_count: usize) -> Self {
        Self {
            inputs,
            events,
            position_count,
        }
    }

    /// Decode and apply one record; returns the update when it was accepted
    pub async fn handle_line(&self, line: &str) -> Option<SerialUpdate> {
        if line.trim().is_empty() {
            return None;
        }
        match parse_line(line, self.position_count) {
            Ok(update) => {
                debug!("Serial record {:?} -> {:?}", line.trim(), update);
                self.inputs
                    .apply_remote(update.position, update.mode, InputSource::Serial)
                    .await;
                Some(update)
            }
            Err(e) => {
                debug!("Dropping serial record {:?}: {}", line.trim(), e);
                self.events.emit_lossy(KioskEvent::SerialLineRejected {
                    line: line.trim().to_string(),
                    timestamp: chrono::Utc::now(),
                });
                None
            }
        }
    }

    /// Read records until the transport reports end of stream
    ///
    /// Bytes are decoded lossily so line noise cannot end the loop. Records
    /// longer than `MAX_RECORD_LEN` are skipped up to the next newline.
    pub async fn run<R>(&self, mut reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::with_capacity(MAX_RECORD_LEN as usize);
        loop {
            let read = read_record(&mut reader, &mut buf).await?;
            if read == 0 {
                info!("Serial transport closed");
                return Ok(());
            }
            if is_overlong(&buf) {
                let head = String::from_utf8_lossy(&buf).trim().to_string();
                let skipped = skip_record(&mut reader, &mut buf).await?;
                debug!("Dropping overlong serial record ({} bytes)", read + skipped);
                self.events.emit_lossy(KioskEvent::SerialLineRejected {
                    line: head,
                    timestamp: chrono::Utc::now(),
                });
                continue;
            }
            let line = String::from_utf8_lossy(&buf);
            self.handle_line(&line).await;
        }
    }

    /// Open `device` and run the bridge on a background task
    ///
    /// A device that cannot be opened only disables this input source.
    /// Aborting the returned handle closes the device; no read is left
    /// blocking a runtime thread.
    pub fn spawn(self, device: &Path) -> JoinHandle<()> {
        let device = device.to_path_buf();
        tokio::spawn(async move {
            let file = match open_device(&device) {
                Ok(file) => file,
                Err(e) => {
                    warn!(
                        "Serial device {} unavailable, continuing with local inputs: {}",
                        device.display(),
                        e
                    );
                    return;
                }
            };
            info!("Serial bridge reading from {}", device.display());
            if let Err(e) = self.run(BufReader::new(file)).await {
                warn!("Serial bridge stopped: {}", e);
            }
        })
    }
}

/// Read one record of at most `MAX_RECORD_LEN` bytes into `buf`
async fn read_record<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    reader
        .take(MAX_RECORD_LEN)
        .read_until(b'\n', buf)
        .await
        .map_err(|e| Error::Serial(format!("read failed: {}", e)))
}

fn is_overlong(buf: &[u8]) -> bool {
    buf.len() as u64 >= MAX_RECORD_LEN && buf.last() != Some(&b'\n')
}

/// Discard the rest of an overlong record; returns the bytes skipped
async fn skip_record<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut skipped = 0;
    loop {
        let read = read_record(reader, buf).await?;
        skipped += read;
        if read == 0 || buf.last() == Some(&b'\n') {
            return Ok(skipped);
        }
    }
}

/// Open the device for non-blocking reads driven by the reactor
///
/// `unchecked` admits character devices (ttys) as well as FIFOs.
#[cfg(unix)]
fn open_device(device: &Path) -> std::io::Result<tokio::net::unix::pipe::Receiver> {
    tokio::net::unix::pipe::OpenOptions::new()
        .unchecked(true)
        .open_receiver(device)
}

#[cfg(not(unix))]
fn open_device(device: &Path) -> std::io::Result<tokio::fs::File> {
    std::fs::File::open(device).map(tokio::fs::File::from_std)
}

//! SMBus byte transactions tunnelled through the controller's command registers.
//!
//! A transaction is started by writing `[register, data, command]` to the
//! SMBus command register block. The controller echoes the command byte in
//! the system command register while it works on the request and replaces it
//! with `0x00` on success or `0xFF` on failure. The result of a read is then
//! available in the SMBus data register.

use core::fmt;

use embassy_time::Duration;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use embedded_hal_async::delay::DelayNs;

use crate::reg;
use crate::transport::Transport;

const STATUS_SUCCESS: u8 = 0x00;
const STATUS_FAILURE: u8 = 0xFF;

/// Direction of a tunnelled transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// SMBus read-byte.
    Read,
    /// SMBus write-byte.
    Write,
}

impl Direction {
    /// Command byte that starts a transaction in this direction.
    pub const fn command(self) -> u8 {
        match self {
            Self::Read => reg::SYS_COMMAND_SMBUS_READ,
            Self::Write => reg::SYS_COMMAND_SMBUS_WRITE,
        }
    }
}

/// One tunnelled transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelRequest {
    /// Read or write.
    pub direction: Direction,
    /// Register on the secondary device.
    pub register: u8,
    /// Byte to write; ignored by reads.
    pub data: u8,
}

impl TunnelRequest {
    /// Reads `register` of the secondary device.
    pub const fn read(register: u8) -> Self {
        Self {
            direction: Direction::Read,
            register,
            data: 0,
        }
    }

    /// Writes `data` to `register` of the secondary device.
    pub const fn write(register: u8, data: u8) -> Self {
        Self {
            direction: Direction::Write,
            register,
            data,
        }
    }

    /// Command byte echoed while the request is outstanding.
    pub const fn command(&self) -> u8 {
        self.direction.command()
    }

    /// Bytes written to the SMBus command register block.
    pub const fn encode(&self) -> [u8; 3] {
        [self.register, self.data, self.command()]
    }
}

/// Decoded value of the system command register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelStatus {
    /// The command byte is still echoed back.
    Pending(u8),
    /// The controller completed the request.
    Success,
    /// The controller rejected the request.
    Failure,
    /// Anything else.
    Unexpected(u8),
}

impl TunnelStatus {
    /// Interprets `status` for a request started with `command`.
    pub const fn decode(command: u8, status: u8) -> Self {
        if status == command {
            Self::Pending(status)
        } else {
            match status {
                STATUS_SUCCESS => Self::Success,
                STATUS_FAILURE => Self::Failure,
                other => Self::Unexpected(other),
            }
        }
    }
}

/// Timing of the completion poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelConfig {
    /// Sleep before each status read.
    pub poll_interval: Duration,
    /// Status reads before giving up.
    pub max_polls: u16,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_micros(400),
            max_polls: 250,
        }
    }
}

/// A failed tunnelled transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelError<E> {
    /// The controller could not be reached.
    Transport(E),
    /// The controller reported failure.
    Rejected,
    /// The status register held neither the command byte nor a result.
    UnexpectedStatus(u8),
    /// The request was still pending after the configured number of polls.
    Timeout,
    /// The operation cannot be expressed as a tunnelled byte transaction.
    Unsupported,
}

impl<E> TunnelError<E> {
    /// Whether this is an I/O failure, as opposed to a rejection or timeout.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::UnexpectedStatus(_))
    }
}

impl<E: fmt::Debug> fmt::Display for TunnelError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "transport error: {err:?}"),
            Self::Rejected => f.write_str("request rejected by the controller"),
            Self::UnexpectedStatus(status) => write!(f, "unexpected status {status:#04x}"),
            Self::Timeout => f.write_str("request timed out"),
            Self::Unsupported => f.write_str("unsupported transaction"),
        }
    }
}

impl<E: embedded_hal::i2c::Error> embedded_hal::i2c::Error for TunnelError<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(err) => err.kind(),
            Self::Rejected => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            Self::UnexpectedStatus(_) | Self::Timeout | Self::Unsupported => ErrorKind::Other,
        }
    }
}

/// Runs one tunnelled transaction to completion.
///
/// Returns the byte read for [`Direction::Read`] and `None` for writes.
/// Nothing is retried; the caller decides what to do with a failure.
pub async fn tunnel<T: Transport, D: DelayNs>(
    transport: &mut T,
    delay: &mut D,
    config: &TunnelConfig,
    request: TunnelRequest,
) -> Result<Option<u8>, TunnelError<T::Error>> {
    log::trace!("Tunnel request {request:?}");

    transport
        .write_block(reg::SYS_SMBUS_COMMAND, &request.encode())
        .await
        .map_err(|err| {
            log::warn!("Error writing tunnel request: {err:?}");
            TunnelError::Transport(err)
        })?;

    let poll_us = u32::try_from(config.poll_interval.as_micros()).unwrap_or(u32::MAX);
    let mut polls = 0;
    loop {
        if polls >= config.max_polls {
            log::warn!("Tunnel request {request:?} still pending after {polls} polls");
            return Err(TunnelError::Timeout);
        }
        delay.delay_us(poll_us).await;
        polls += 1;

        let status = transport
            .read_byte(reg::SYS_COMMAND)
            .await
            .map_err(|err| {
                log::warn!("Error reading tunnel status: {err:?}");
                TunnelError::Transport(err)
            })?;

        match TunnelStatus::decode(request.command(), status) {
            TunnelStatus::Pending(_) => {}
            TunnelStatus::Success => break,
            TunnelStatus::Failure => {
                log::debug!("Tunnel request {request:?} rejected");
                return Err(TunnelError::Rejected);
            }
            TunnelStatus::Unexpected(status) => {
                log::warn!("Unexpected tunnel status {status:#04x}");
                return Err(TunnelError::UnexpectedStatus(status));
            }
        }
    }
    log::trace!("Tunnel request completed after {polls} polls");

    match request.direction {
        Direction::Write => Ok(None),
        Direction::Read => transport
            .read_byte(reg::SYS_SMBUS_DATA)
            .await
            .map(Some)
            .map_err(|err| {
                log::warn!("Error reading tunnel data: {err:?}");
                TunnelError::Transport(err)
            }),
    }
}

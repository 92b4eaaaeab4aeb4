//! The command tunnel exposed as an I2C bus.
//!
//! Devices wired to the keyboard controller's secondary bus can then be driven
//! by ordinary `embedded-hal-async` drivers. Only SMBus write-byte
//! (`write(addr, &[reg, value])`) and read-byte (`write_read(addr, &[reg],
//! &mut [value])`) transactions can be expressed; the tunnel carries no
//! address, so `addr` is ignored.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::i2c::{ErrorType, Operation};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::keyboard::Keyboard;
use crate::scan::EventSink;
use crate::transport::Transport;
use crate::tunnel::{Direction, TunnelError};

/// I2C bus backed by a [`Keyboard`]'s command tunnel.
///
/// Any number of adapters can share one keyboard; each transaction takes the
/// keyboard's bus lock for its whole duration.
pub struct SmbusAdapter<'a, M: RawMutex, T, D, S> {
    keyboard: &'a Keyboard<M, T, D, S>,
}

impl<'a, M: RawMutex, T, D, S> SmbusAdapter<'a, M, T, D, S> {
    /// Creates an adapter for `keyboard`.
    pub fn new(keyboard: &'a Keyboard<M, T, D, S>) -> Self {
        Self { keyboard }
    }
}

impl<M, T, D, S> ErrorType for SmbusAdapter<'_, M, T, D, S>
where
    M: RawMutex,
    T: Transport,
    T::Error: embedded_hal::i2c::Error,
{
    type Error = TunnelError<T::Error>;
}

impl<M, T, D, S> I2c<SevenBitAddress> for SmbusAdapter<'_, M, T, D, S>
where
    M: RawMutex,
    T: Transport,
    T::Error: embedded_hal::i2c::Error,
    D: DelayNs,
    S: EventSink,
{
    async fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        match operations {
            [Operation::Write(bytes)] if bytes.len() == 2 => {
                self.keyboard
                    .tunnel(Direction::Write, bytes[0], bytes[1])
                    .await?;
                Ok(())
            }
            [Operation::Write(register), Operation::Read(buf)]
                if register.len() == 1 && buf.len() == 1 =>
            {
                let value = self
                    .keyboard
                    .tunnel(Direction::Read, register[0], 0)
                    .await?;
                buf[0] = value.unwrap_or_default();
                Ok(())
            }
            _ => {
                log::warn!("Unsupported transaction for {address:#04x} on the tunnel");
                Err(TunnelError::Unsupported)
            }
        }
    }
}

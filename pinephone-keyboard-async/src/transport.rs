//! Register-level access to the keyboard controller.

use core::fmt::Debug;
use embedded_hal::i2c::Operation;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::reg;

/// Byte-addressed request/response channel to a fixed peripheral.
///
/// Every call is one complete bus exchange. Callers are responsible for
/// serialising multi-step sequences (see [`crate::keyboard::Keyboard`]).
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Error reported by the underlying bus.
    type Error: Debug;

    /// Reads consecutive registers starting at `start` into `buf`.
    ///
    /// Returns the number of bytes the peripheral actually delivered, which
    /// may be less than `buf.len()`.
    async fn read_block(&mut self, start: u8, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Writes `data` to consecutive registers starting at `start`.
    async fn write_block(&mut self, start: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Reads a single register.
    async fn read_byte(&mut self, register: u8) -> Result<u8, Self::Error>;

    /// Writes a single register.
    async fn write_byte(&mut self, register: u8, value: u8) -> Result<(), Self::Error>;
}

/// [`Transport`] over an `embedded-hal-async` I2C bus.
pub struct I2cTransport<I2cType> {
    i2c: I2cType,
    address: SevenBitAddress,
}

impl<I2cType: I2c<SevenBitAddress>> I2cTransport<I2cType> {
    /// Creates a transport talking to the controller at its default address.
    pub fn new(i2c: I2cType) -> Self {
        Self::with_address(i2c, reg::I2C_ADDRESS)
    }

    /// Creates a transport talking to the controller at `address`.
    pub fn with_address(i2c: I2cType, address: SevenBitAddress) -> Self {
        Self { i2c, address }
    }

    /// Returns the 7-bit address this transport talks to.
    pub fn address(&self) -> SevenBitAddress {
        self.address
    }

    /// Gives back the underlying bus.
    pub fn into_inner(self) -> I2cType {
        self.i2c
    }
}

impl<I2cType: I2c<SevenBitAddress>> Transport for I2cTransport<I2cType> {
    type Error = I2cType::Error;

    async fn read_block(&mut self, start: u8, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.i2c.write_read(self.address, &[start], buf).await?;
        Ok(buf.len())
    }

    async fn write_block(&mut self, start: u8, data: &[u8]) -> Result<(), Self::Error> {
        // Adjacent writes go out back to back, without a repeated start.
        self.i2c
            .transaction(
                self.address,
                &mut [Operation::Write(&[start]), Operation::Write(data)],
            )
            .await
    }

    async fn read_byte(&mut self, register: u8) -> Result<u8, Self::Error> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .await?;
        Ok(buf[0])
    }

    async fn write_byte(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        self.i2c.write(self.address, &[register, value]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embedded_hal::i2c::{ErrorKind, ErrorType};

    /// Records every operation and answers reads with a running counter.
    #[derive(Default)]
    struct RecordingBus {
        writes: Vec<(u8, Vec<u8>)>,
        next_read: u8,
    }

    impl ErrorType for RecordingBus {
        type Error = ErrorKind;
    }

    impl I2c<SevenBitAddress> for RecordingBus {
        async fn transaction(
            &mut self,
            address: SevenBitAddress,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            let mut written = Vec::new();
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => written.extend_from_slice(bytes),
                    Operation::Read(buf) => {
                        for byte in buf.iter_mut() {
                            *byte = self.next_read;
                            self.next_read = self.next_read.wrapping_add(1);
                        }
                    }
                }
            }
            self.writes.push((address, written));
            Ok(())
        }
    }

    #[test]
    fn test_block_write_is_one_message() {
        let mut transport = I2cTransport::new(RecordingBus::default());
        block_on(transport.write_block(0x21, &[0x10, 0x20, 0xA1])).unwrap();
        let bus = transport.into_inner();
        assert_eq!(bus.writes, [(0x15, vec![0x21, 0x10, 0x20, 0xA1])]);
    }

    #[test]
    fn test_block_read_reports_full_length() {
        let mut transport = I2cTransport::with_address(RecordingBus::default(), 0x42);
        let mut buf = [0u8; 4];
        let len = block_on(transport.read_block(0x07, &mut buf)).unwrap();
        assert_eq!(len, 4);
        assert_eq!(buf, [0, 1, 2, 3]);
        assert_eq!(transport.address(), 0x42);
        assert_eq!(transport.into_inner().writes, [(0x42, vec![0x07])]);
    }

    #[test]
    fn test_byte_access() {
        let mut transport = I2cTransport::new(RecordingBus::default());
        block_on(transport.write_byte(0x20, 0x01)).unwrap();
        assert_eq!(block_on(transport.read_byte(0x23)).unwrap(), 0);
        let bus = transport.into_inner();
        assert_eq!(bus.writes[0].1, [0x20, 0x01]);
        assert_eq!(bus.writes[1].1, [0x23]);
    }
}

//! Register map of the keyboard controller firmware.

/// Default 7-bit I2C address of the keyboard controller.
pub const I2C_ADDRESS: u8 = 0x15;

/// High byte of the device id.
pub const DEVICE_ID_HI: u8 = 0x00;
/// Expected value of [`DEVICE_ID_HI`].
pub const DEVICE_ID_HI_VALUE: u8 = 0x4B;
/// Low byte of the device id.
pub const DEVICE_ID_LO: u8 = 0x01;
/// Expected value of [`DEVICE_ID_LO`].
pub const DEVICE_ID_LO_VALUE: u8 = 0x42;
/// Firmware revision, major in the high nibble and minor in the low nibble.
pub const FW_REVISION: u8 = 0x02;
/// Firmware feature bits.
pub const FW_FEATURES: u8 = 0x03;
/// Physical matrix size, columns in the high nibble and rows in the low nibble.
pub const MATRIX_SIZE: u8 = 0x06;
/// CRC-8 of the scan data that follows it.
pub const SCAN_CRC: u8 = 0x07;
/// First byte of the scan data, one byte per column.
pub const SCAN_DATA: u8 = 0x08;

/// System configuration.
pub const SYS_CONFIG: u8 = 0x20;
/// Set in [`SYS_CONFIG`] to stop matrix scanning.
pub const SYS_CONFIG_DISABLE_SCAN: u8 = 1 << 0;

/// Register address of a tunnelled SMBus transaction.
pub const SYS_SMBUS_COMMAND: u8 = 0x21;
/// Data byte of a tunnelled SMBus transaction.
pub const SYS_SMBUS_DATA: u8 = 0x22;
/// System command and status.
pub const SYS_COMMAND: u8 = 0x23;
/// Command byte starting a tunnelled SMBus read.
pub const SYS_COMMAND_SMBUS_READ: u8 = 0x91;
/// Command byte starting a tunnelled SMBus write.
pub const SYS_COMMAND_SMBUS_WRITE: u8 = 0xA1;

/// Number of identification registers read at attach time.
pub const INFO_LEN: usize = MATRIX_SIZE as usize + 1;

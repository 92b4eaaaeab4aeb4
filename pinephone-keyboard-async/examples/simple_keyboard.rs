//! Runs the driver against a simulated keyboard controller on the host.
//!
//! On a board, replace `SimulatedBus`, `SimulatedIrq` and `HostDelay` with the
//! HAL's I2C peripheral, interrupt input and delay. Run with
//! `RUST_LOG=pinephone_keyboard_async=debug cargo run --example simple_keyboard`
//! to see the driver's own log output.

use core::convert::Infallible;

use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::digital::{ErrorKind as PinErrorKind, ErrorType as PinErrorType};
use embedded_hal::i2c::{ErrorType, Operation, SevenBitAddress};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::i2c::I2c;
use log::{error, info};
use pinephone_keyboard_async::crc::crc8;
use pinephone_keyboard_async::{reg, Config, I2cTransport, InputEvent, Keyboard};

static EVENTS: Channel<CriticalSectionRawMutex, InputEvent, 32> = Channel::new();

/// Column bytes the simulated controller reports, one frame per interrupt.
const SCRIPT: &[[u8; 12]] = &[
    [0; 12],
    // H
    [0, 0, 0, 0, 0, 0, 0b0000_0100, 0, 0, 0, 0, 0],
    [0; 12],
    // Fn + Backspace
    [0, 0, 0b0010_0000, 0, 0, 0, 0, 0, 0, 0, 0, 0b0000_0001],
    [0; 12],
];

/// Register file of a keyboard controller with firmware 1.2.
struct SimulatedBus {
    regs: [u8; 0x30],
    frame: usize,
}

impl SimulatedBus {
    fn new() -> Self {
        let mut regs = [0u8; 0x30];
        regs[..reg::INFO_LEN].copy_from_slice(&[0x4B, 0x42, 0x12, 0x01, 0x00, 0x00, 0xC6]);
        regs[reg::SYS_CONFIG as usize] = reg::SYS_CONFIG_DISABLE_SCAN;
        Self { regs, frame: 0 }
    }

    fn load_frame(&mut self) {
        let data = SCRIPT[self.frame.min(SCRIPT.len() - 1)];
        self.frame += 1;
        let start = reg::SCAN_DATA as usize;
        self.regs[start..start + data.len()].copy_from_slice(&data);
        self.regs[reg::SCAN_CRC as usize] = crc8(&data);
    }

    /// Completes a tunnelled request right away.
    fn run_command(&mut self) {
        let command = &mut self.regs[reg::SYS_COMMAND as usize];
        match *command {
            reg::SYS_COMMAND_SMBUS_READ => {
                *command = 0x00;
                self.regs[reg::SYS_SMBUS_DATA as usize] = 0x5A;
            }
            reg::SYS_COMMAND_SMBUS_WRITE => *command = 0x00,
            _ => {}
        }
    }
}

impl ErrorType for SimulatedBus {
    type Error = embedded_hal::i2c::ErrorKind;
}

impl I2c<SevenBitAddress> for SimulatedBus {
    async fn transaction(
        &mut self,
        _address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut pointer = None;
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    for &byte in bytes.iter() {
                        match pointer {
                            None => pointer = Some(byte as usize),
                            Some(addr) => {
                                self.regs[addr] = byte;
                                pointer = Some(addr + 1);
                            }
                        }
                    }
                }
                Operation::Read(buf) => {
                    let start = pointer.unwrap_or(0);
                    if start == reg::SCAN_CRC as usize {
                        self.load_frame();
                    }
                    buf.copy_from_slice(&self.regs[start..start + buf.len()]);
                    pointer = Some(start + buf.len());
                }
            }
        }
        self.run_command();
        Ok(())
    }
}

/// Interrupt line that fires once per scripted frame, then reports an error.
struct SimulatedIrq {
    edges: usize,
}

impl PinErrorType for SimulatedIrq {
    type Error = PinErrorKind;
}

impl Wait for SimulatedIrq {
    async fn wait_for_high(&mut self) -> Result<(), PinErrorKind> {
        Ok(())
    }

    async fn wait_for_low(&mut self) -> Result<(), PinErrorKind> {
        Ok(())
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), PinErrorKind> {
        Ok(())
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), PinErrorKind> {
        if self.edges == 0 {
            return Err(PinErrorKind::Other);
        }
        self.edges -= 1;
        Ok(())
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), PinErrorKind> {
        self.wait_for_falling_edge().await
    }
}

struct HostDelay;

impl DelayNs for HostDelay {
    async fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(ns.into()));
    }
}

async fn keyboard_task() {
    let keyboard: Keyboard<CriticalSectionRawMutex, _, _, _> = match Keyboard::attach(
        I2cTransport::new(SimulatedBus::new()),
        HostDelay,
        EVENTS.sender(),
        &Config::default(),
    )
    .await
    {
        Ok(keyboard) => keyboard,
        Err(err) => {
            error!("Keyboard not usable: {err}");
            return;
        }
    };
    info!("Keyboard info: {:?}", keyboard.info());

    match keyboard.smbus_read(0x00).await {
        Ok(value) => info!("Tunnelled read returned {value:#04x}"),
        Err(err) => error!("Tunnelled read failed: {err}"),
    }

    if let Err(err) = keyboard.open().await {
        error!("Failed to open keyboard: {err}");
        return;
    }

    let mut irq = SimulatedIrq {
        edges: SCRIPT.len() - 1,
    };
    let result: Result<Infallible, PinErrorKind> = keyboard.run(&mut irq).await;
    if let Err(err) = result {
        info!("Interrupt line gone ({err:?}), stopping");
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("simple_keyboard=info".parse().unwrap()),
        )
        .init();

    block_on(keyboard_task());

    while let Ok(event) = EVENTS.try_receive() {
        if let InputEvent::Key(key) = event {
            info!(
                "{:?} {}",
                key.key,
                if key.pressed { "pressed" } else { "released" }
            );
        }
    }
}

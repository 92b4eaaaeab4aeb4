//! An asynchronous, `no_std` driver for the PinePhone keyboard case.
//!
//! The keyboard case carries a small controller that scans the key matrix and
//! exposes it over I2C. This crate provides a [`Keyboard`] that probes the
//! controller, reads checksummed scan frames when the interrupt line fires and
//! turns them into key press/release events, including the Fn overlay layer.
//! The controller's secondary bus is reachable through the same registers; the
//! [`Keyboard::tunnel`] method and the [`SmbusAdapter`] give access to it.
//!
//! # Usage
//!
//! The driver needs an `embedded-hal-async` I2C bus, a delay provider and the
//! interrupt pin. Events are delivered to any [`EventSink`], for example the
//! sending half of an `embassy-sync` channel.
//!
//! ```no_run
//! use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
//! use embassy_sync::channel::Channel;
//! use embedded_hal_async::delay::DelayNs;
//! use embedded_hal_async::digital::Wait;
//! use embedded_hal_async::i2c::I2c;
//! use pinephone_keyboard_async::{Config, I2cTransport, InputEvent, Keyboard};
//!
//! static EVENTS: Channel<CriticalSectionRawMutex, InputEvent, 32> = Channel::new();
//!
//! async fn keyboard_task(i2c: impl I2c, delay: impl DelayNs, mut irq: impl Wait) {
//!     let keyboard: Keyboard<CriticalSectionRawMutex, _, _, _> = match Keyboard::attach(
//!         I2cTransport::new(i2c),
//!         delay,
//!         EVENTS.sender(),
//!         &Config::default(),
//!     )
//!     .await
//!     {
//!         Ok(keyboard) => keyboard,
//!         Err(err) => {
//!             log::error!("Keyboard not usable: {err}");
//!             return;
//!         }
//!     };
//!
//!     if keyboard.open().await.is_ok() {
//!         let _ = keyboard.run(&mut irq).await;
//!     }
//! }
//!
//! async fn print_keys() {
//!     loop {
//!         if let InputEvent::Key(key) = EVENTS.receive().await {
//!             log::info!("Key event {key:?}");
//!         }
//!     }
//! }
//! ```

#![cfg_attr(not(test), no_std)]

pub mod crc;
pub mod error;
pub mod keyboard;
pub mod keycode;
pub mod keymap;
pub mod reg;
pub mod scan;
pub mod smbus;
pub mod transport;
pub mod tunnel;

pub use error::Error;
pub use keyboard::{Config, DeviceInfo, Keyboard};
pub use keycode::KeyCode;
pub use keymap::{key, KeyEntry, KeymapConfig};
pub use scan::{EventSink, InputEvent, KeyEvent, NullSink, ScanError};
pub use smbus::SmbusAdapter;
pub use transport::{I2cTransport, Transport};
pub use tunnel::{Direction, TunnelConfig, TunnelError};

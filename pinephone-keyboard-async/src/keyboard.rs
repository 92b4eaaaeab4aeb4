//! Keyboard session: attach, open/close and the interrupt-driven scan.

use core::convert::Infallible;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;

use crate::error::Error;
use crate::keymap::{KeymapConfig, Layers};
use crate::reg;
use crate::scan::{EventSink, NullSink, ScanError, ScanState};
use crate::smbus::SmbusAdapter;
use crate::transport::Transport;
use crate::tunnel::{self, Direction, TunnelConfig, TunnelError, TunnelRequest};

/// Identification read from the controller at attach time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Firmware major version.
    pub fw_major: u8,
    /// Firmware minor version.
    pub fw_minor: u8,
    /// Firmware feature bits.
    pub features: u8,
    /// Physical matrix rows.
    pub rows: u8,
    /// Physical matrix columns.
    pub cols: u8,
}

impl DeviceInfo {
    /// Decodes registers `0x00..=0x06`.
    pub fn parse(raw: &[u8; reg::INFO_LEN]) -> Self {
        let revision = raw[reg::FW_REVISION as usize];
        let size = raw[reg::MATRIX_SIZE as usize];
        Self {
            fw_major: revision >> 4,
            fw_minor: revision & 0x0F,
            features: raw[reg::FW_FEATURES as usize],
            rows: size & 0x0F,
            cols: size >> 4,
        }
    }
}

/// Driver configuration.
#[derive(Debug, Clone, Copy)]
pub struct Config<'a> {
    /// Keymap tables; their dimensions must match the controller.
    pub keymap: KeymapConfig<'a>,
    /// Tunnel poll timing.
    pub tunnel: TunnelConfig,
}

impl Default for Config<'static> {
    fn default() -> Self {
        Self {
            keymap: KeymapConfig::default(),
            tunnel: TunnelConfig::default(),
        }
    }
}

struct Inner<T, D, S> {
    transport: T,
    delay: D,
    sink: S,
    scan: ScanState,
    users: usize,
}

/// An attached keyboard controller.
///
/// All bus traffic goes through one mutex, so a tunnelled transaction and a
/// scan read never interleave on the transport. The methods take `&self` and
/// can be called from independent tasks.
pub struct Keyboard<M: RawMutex, T, D, S> {
    inner: Mutex<M, Inner<T, D, S>>,
    info: DeviceInfo,
    tunnel_config: TunnelConfig,
}

impl<M, T, D, S> Keyboard<M, T, D, S>
where
    M: RawMutex,
    T: Transport,
    D: DelayNs,
    S: EventSink,
{
    /// Probes the controller and sets up the scan state.
    ///
    /// Fails if the controller does not identify itself, or if the keymap
    /// does not match the reported matrix size. Scanning is left disabled
    /// until the first [`open`](Self::open).
    pub async fn attach(
        mut transport: T,
        delay: D,
        sink: S,
        config: &Config<'_>,
    ) -> Result<Self, Error<T::Error>> {
        let mut raw = [0u8; reg::INFO_LEN];
        let count = transport.read_block(0, &mut raw).await.map_err(|err| {
            log::error!("Failed to read device ID: {err:?}");
            Error::Transport(err)
        })?;
        if count != raw.len() {
            log::error!("Failed to read device ID: got {count} of {} bytes", raw.len());
            return Err(Error::ShortRead {
                expected: raw.len(),
                actual: count,
            });
        }

        let (hi, lo) = (
            raw[reg::DEVICE_ID_HI as usize],
            raw[reg::DEVICE_ID_LO as usize],
        );
        if hi != reg::DEVICE_ID_HI_VALUE || lo != reg::DEVICE_ID_LO_VALUE {
            log::error!("Unexpected device ID {hi:02x}{lo:02x}");
            return Err(Error::UnexpectedDeviceId { hi, lo });
        }

        let info = DeviceInfo::parse(&raw);
        log::info!(
            "Found keyboard firmware version {}.{} features {:#x}",
            info.fw_major,
            info.fw_minor,
            info.features
        );

        // Keep scanning off until somebody listens.
        set_scan(&mut transport, false).await?;

        let keymap = &config.keymap;
        if keymap.rows != info.rows || keymap.cols != info.cols {
            log::error!(
                "Keyboard size is {}x{}, but keymap is {}x{}",
                info.rows,
                info.cols,
                keymap.rows,
                keymap.cols
            );
            return Err(Error::MatrixSizeMismatch {
                device_rows: info.rows,
                device_cols: info.cols,
                keymap_rows: keymap.rows,
                keymap_cols: keymap.cols,
            });
        }

        let layers = Layers::new(keymap).map_err(|err| {
            log::error!("Failed to build keymap: {err}");
            Error::Keymap(err)
        })?;

        Ok(Self {
            inner: Mutex::new(Inner {
                transport,
                delay,
                sink,
                scan: ScanState::new(layers),
                users: 0,
            }),
            info,
            tunnel_config: config.tunnel,
        })
    }

    /// Identification read at attach time.
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Registers a user.
    ///
    /// The first user enables scanning and triggers an immediate scan, so
    /// keys already held are reported right away.
    pub async fn open(&self) -> Result<(), Error<T::Error>> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        if inner.users == 0 {
            set_scan(&mut inner.transport, true).await?;
            inner.users = 1;
            // A dropped baseline scan is retried by the next interrupt.
            let _ = inner.scan.scan(&mut inner.transport, &mut inner.sink).await;
        } else {
            inner.users += 1;
        }
        Ok(())
    }

    /// Unregisters a user. The last one disables scanning.
    ///
    /// Frame buffers are kept, and a scan already in flight is not cancelled.
    pub async fn close(&self) -> Result<(), Error<T::Error>> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        match inner.users {
            0 => {
                log::warn!("Keyboard closed more often than opened");
                Ok(())
            }
            1 => {
                inner.users = 0;
                set_scan(&mut inner.transport, false).await
            }
            _ => {
                inner.users -= 1;
                Ok(())
            }
        }
    }

    /// Whether anybody has the keyboard open.
    pub async fn is_open(&self) -> bool {
        self.inner.lock().await.users > 0
    }

    /// Whether the overlay layer is currently active.
    pub async fn layer_active(&self) -> bool {
        self.inner.lock().await.scan.layer_active()
    }

    /// Reads and reports one scan; call when the interrupt line signals new data.
    ///
    /// A scan that completes while nobody has the keyboard open still updates
    /// the matrix state, but its events are discarded.
    pub async fn handle_interrupt(&self) -> Result<usize, ScanError<T::Error>> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        if inner.users == 0 {
            log::debug!("Scanning while closed, events discarded");
            inner.scan.scan(&mut inner.transport, &mut NullSink).await
        } else {
            inner.scan.scan(&mut inner.transport, &mut inner.sink).await
        }
    }

    /// Scans on every falling edge of `irq`. Only returns if the pin fails.
    pub async fn run<P: Wait>(&self, irq: &mut P) -> Result<Infallible, P::Error> {
        loop {
            irq.wait_for_falling_edge().await?;
            // Dropped scans are logged by the scan itself.
            let _ = self.handle_interrupt().await;
        }
    }

    /// Runs one tunnelled SMBus transaction.
    ///
    /// Returns the byte read for [`Direction::Read`] and `None` for writes.
    pub async fn tunnel(
        &self,
        direction: Direction,
        register: u8,
        value: u8,
    ) -> Result<Option<u8>, TunnelError<T::Error>> {
        let request = TunnelRequest {
            direction,
            register,
            data: value,
        };
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        tunnel::tunnel(
            &mut inner.transport,
            &mut inner.delay,
            &self.tunnel_config,
            request,
        )
        .await
    }

    /// Reads a register of the device behind the tunnel.
    pub async fn smbus_read(&self, register: u8) -> Result<u8, TunnelError<T::Error>> {
        self.tunnel(Direction::Read, register, 0)
            .await
            .map(Option::unwrap_or_default)
    }

    /// Writes a register of the device behind the tunnel.
    pub async fn smbus_write(&self, register: u8, value: u8) -> Result<(), TunnelError<T::Error>> {
        self.tunnel(Direction::Write, register, value).await.map(|_| ())
    }

    /// The tunnel as an `embedded-hal-async` I2C bus.
    pub fn smbus(&self) -> SmbusAdapter<'_, M, T, D, S> {
        SmbusAdapter::new(self)
    }

    /// Gives back the transport, delay and sink.
    pub fn release(self) -> (T, D, S) {
        let inner = self.inner.into_inner();
        (inner.transport, inner.delay, inner.sink)
    }
}

/// Sets or clears the scan-disable bit.
async fn set_scan<T: Transport>(transport: &mut T, enable: bool) -> Result<(), Error<T::Error>> {
    let config = transport
        .read_byte(reg::SYS_CONFIG)
        .await
        .map_err(|err| {
            log::error!("Failed to read config: {err:?}");
            Error::Transport(err)
        })?;

    let value = if enable {
        config & !reg::SYS_CONFIG_DISABLE_SCAN
    } else {
        config | reg::SYS_CONFIG_DISABLE_SCAN
    };

    transport
        .write_byte(reg::SYS_CONFIG, value)
        .await
        .map_err(|err| {
            log::error!("Failed to write config: {err:?}");
            Error::Transport(err)
        })
}

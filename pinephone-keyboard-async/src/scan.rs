//! Double-buffered scan matrix state machine.
//!
//! Each scan reads a checksummed frame (one CRC byte followed by one byte per
//! column) into whichever of the two frame slots does not hold the current
//! frame. Only a frame that arrived complete and passed the CRC check becomes
//! current; it is then diffed against the previous one and every changed cell
//! is reported, column by column and row by row within a column.

use core::convert::Infallible;
use core::fmt;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Sender, TrySendError};

use crate::crc::crc8;
use crate::keycode::KeyCode;
use crate::keymap::{scan_code, Layers, MAX_COLS};
use crate::reg;
use crate::transport::Transport;

/// Largest frame: the CRC byte plus one byte per column.
pub const MAX_FRAME_LEN: usize = MAX_COLS as usize + 1;

/// A change of one matrix cell, after keymap lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Packed `(row << row_shift) | col` position.
    pub scan_code: u16,
    /// Key the cell maps to in the active layer.
    pub key: KeyCode,
    /// `true` on press, `false` on release.
    pub pressed: bool,
}

/// Events delivered to an [`EventSink`].
///
/// Every changed cell produces a `Scan` marker followed by its `Key` event.
/// A `Sync` closes the group of changes belonging to one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Raw scan code of the cell about to be reported.
    Scan(u16),
    /// Logical key change.
    Key(KeyEvent),
    /// End of one scan's changes.
    Sync,
}

/// Consumer of input events.
pub trait EventSink {
    /// Delivers one event.
    fn emit(&mut self, event: InputEvent);
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: InputEvent) {
        (**self).emit(event);
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: InputEvent) {}
}

impl<const N: usize> EventSink for heapless::Vec<InputEvent, N> {
    fn emit(&mut self, event: InputEvent) {
        if let Err(event) = self.push(event) {
            log::warn!("Event buffer full, dropping {event:?}");
        }
    }
}

impl<'ch, M: RawMutex, const N: usize> EventSink for Sender<'ch, M, InputEvent, N> {
    fn emit(&mut self, event: InputEvent) {
        if let Err(TrySendError::Full(event)) = self.try_send(event) {
            log::warn!("Event channel full, dropping {event:?}");
        }
    }
}

/// Why a scan was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError<E> {
    /// The frame could not be read.
    Transport(E),
    /// The peripheral delivered fewer bytes than a full frame.
    ShortRead { expected: usize, actual: usize },
    /// A frame handed to [`ScanState::process`] was longer than one frame.
    Oversized { expected: usize, actual: usize },
    /// The frame did not match its checksum.
    Checksum { received: u8, computed: u8 },
}

impl<E: fmt::Debug> fmt::Display for ScanError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "failed to read scan data: {err:?}"),
            Self::ShortRead { expected, actual } => {
                write!(f, "short scan read ({actual} of {expected} bytes)")
            }
            Self::Oversized { expected, actual } => {
                write!(f, "scan frame too long ({actual} bytes, expected {expected})")
            }
            Self::Checksum { received, computed } => {
                write!(f, "bad scan data ({computed:02x} != {received:02x})")
            }
        }
    }
}

/// Matrix state owned by the scanning path.
pub struct ScanState {
    frames: [[u8; MAX_FRAME_LEN]; 2],
    /// Index of the slot holding the current frame.
    swap: bool,
    layer_active: bool,
    layers: Layers,
}

impl ScanState {
    /// Creates the state with both frames cleared (no key held).
    pub fn new(layers: Layers) -> Self {
        Self {
            frames: [[0; MAX_FRAME_LEN]; 2],
            swap: false,
            layer_active: false,
            layers,
        }
    }

    /// Bytes in one frame, including the checksum.
    pub fn frame_len(&self) -> usize {
        self.layers.cols() as usize + 1
    }

    /// The keymaps in use.
    pub fn layers(&self) -> &Layers {
        &self.layers
    }

    /// Whether the overlay layer is active.
    pub fn layer_active(&self) -> bool {
        self.layer_active
    }

    /// Column data of the most recent valid frame.
    pub fn current(&self) -> &[u8] {
        &self.frames[self.swap as usize][1..self.frame_len()]
    }

    /// Reads one frame from `transport` and reports the changes to `sink`.
    ///
    /// Returns the number of key events emitted. On error nothing is
    /// emitted and the current frame is kept.
    pub async fn scan<T: Transport, S: EventSink>(
        &mut self,
        transport: &mut T,
        sink: &mut S,
    ) -> Result<usize, ScanError<T::Error>> {
        let len = self.frame_len();
        let slot = &mut self.frames[!self.swap as usize][..len];
        let count = transport
            .read_block(reg::SCAN_CRC, slot)
            .await
            .map_err(|err| {
                log::warn!("Failed to read scan data: {err:?}");
                ScanError::Transport(err)
            })?;
        self.commit(count, sink)
    }

    /// Processes a frame that was obtained elsewhere.
    ///
    /// `raw` holds the checksum byte followed by the column data and must be
    /// exactly one frame long.
    pub fn process<S: EventSink>(
        &mut self,
        raw: &[u8],
        sink: &mut S,
    ) -> Result<usize, ScanError<Infallible>> {
        let len = self.frame_len();
        if raw.len() > len {
            log::warn!("Scan frame too long: got {} bytes, expected {len}", raw.len());
            return Err(ScanError::Oversized {
                expected: len,
                actual: raw.len(),
            });
        }
        let count = raw.len();
        self.frames[!self.swap as usize][..count].copy_from_slice(raw);
        self.commit(count, sink)
    }

    /// Validates the frame in the inactive slot and makes it current.
    fn commit<E, S: EventSink>(
        &mut self,
        count: usize,
        sink: &mut S,
    ) -> Result<usize, ScanError<E>> {
        let len = self.frame_len();
        if count != len {
            log::warn!("Failed to read scan data: got {count} of {len} bytes");
            return Err(ScanError::ShortRead {
                expected: len,
                actual: count,
            });
        }

        let slot = &self.frames[!self.swap as usize][..len];
        let computed = crc8(&slot[1..]);
        if computed != slot[0] {
            log::warn!("Bad scan data ({computed:02x} != {:02x})", slot[0]);
            return Err(ScanError::Checksum {
                received: slot[0],
                computed,
            });
        }

        self.swap = !self.swap;
        Ok(self.report(sink))
    }

    /// Diffs the current frame against the previous one.
    fn report<S: EventSink>(&mut self, sink: &mut S) -> usize {
        let previous = &self.frames[!self.swap as usize];
        let current = &self.frames[self.swap as usize];
        let row_shift = self.layers.row_shift();
        let layer_key = self.layers.layer_key();
        let mut reported = 0;

        for col in 0..self.layers.cols() {
            let old = previous[col as usize + 1];
            let new = current[col as usize + 1];
            let changed = old ^ new;

            for row in 0..self.layers.rows() {
                let mask = 1u8 << row;
                if changed & mask == 0 {
                    continue;
                }

                let code = scan_code(row, col, row_shift);
                let pressed = new & mask != 0;
                log::debug!(
                    "row {row} col {col} {}",
                    if pressed { "pressed" } else { "released" }
                );

                let key = self.layers.active(self.layer_active).get(code);
                if key == layer_key {
                    log::debug!(
                        "Layer key is now {}",
                        if pressed { "pressed" } else { "released" }
                    );
                    self.layer_active = pressed;
                    continue;
                }

                sink.emit(InputEvent::Scan(code));
                if key != KeyCode::RESERVED {
                    sink.emit(InputEvent::Key(KeyEvent {
                        scan_code: code,
                        key,
                        pressed,
                    }));
                    reported += 1;
                }
            }
        }

        sink.emit(InputEvent::Sync);
        reported
    }
}

//! Error type of the keyboard session.

use core::fmt::{self, Debug};

use crate::keymap::KeymapError;

/// Errors reported while attaching, opening or closing the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// The controller could not be reached.
    Transport(E),
    /// The identification block came back incomplete.
    ShortRead { expected: usize, actual: usize },
    /// Something answered, but it is not the keyboard controller.
    UnexpectedDeviceId { hi: u8, lo: u8 },
    /// The keymap was written for a different matrix than the one reported.
    MatrixSizeMismatch {
        device_rows: u8,
        device_cols: u8,
        keymap_rows: u8,
        keymap_cols: u8,
    },
    /// The keymap tables are invalid.
    Keymap(KeymapError),
}

impl<E: Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "transport error: {err:?}"),
            Self::ShortRead { expected, actual } => {
                write!(f, "short read ({actual} of {expected} bytes)")
            }
            Self::UnexpectedDeviceId { hi, lo } => {
                write!(f, "unexpected device ID {hi:02x}{lo:02x}")
            }
            Self::MatrixSizeMismatch {
                device_rows,
                device_cols,
                keymap_rows,
                keymap_cols,
            } => write!(
                f,
                "keyboard size is {device_rows}x{device_cols}, \
                 but keymap is {keymap_rows}x{keymap_cols}"
            ),
            Self::Keymap(err) => write!(f, "invalid keymap: {err}"),
        }
    }
}

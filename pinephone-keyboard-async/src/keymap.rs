//! Matrix keymaps and the base/overlay layer pair.

use core::fmt;

use crate::keycode::KeyCode;

/// Rows are bits of a scan data byte.
pub const MAX_ROWS: u8 = 8;
/// Columns are a 4-bit field of the matrix size register.
pub const MAX_COLS: u8 = 16;
/// Capacity of a keymap indexed by packed scan code.
pub const MAX_KEYS: usize = (MAX_ROWS as usize) << row_shift(MAX_COLS);

/// Rows of the stock keyboard case.
pub const DEFAULT_ROWS: u8 = 6;
/// Columns of the stock keyboard case.
pub const DEFAULT_COLS: u8 = 12;

/// Number of bits needed to encode a column index.
pub const fn row_shift(cols: u8) -> u8 {
    if cols <= 1 {
        0
    } else {
        (u8::BITS - (cols - 1).leading_zeros()) as u8
    }
}

/// Packs a matrix position into a scan code.
pub const fn scan_code(row: u8, col: u8, row_shift: u8) -> u16 {
    ((row as u16) << row_shift) | col as u16
}

/// One (row, col) → key assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEntry {
    /// Matrix row.
    pub row: u8,
    /// Matrix column.
    pub col: u8,
    /// Key reported for the cell.
    pub key: KeyCode,
}

/// Shorthand for building keymap tables.
pub const fn key(row: u8, col: u8, key: KeyCode) -> KeyEntry {
    KeyEntry { row, col, key }
}

impl KeyEntry {
    /// Decodes the packed `row << 24 | col << 16 | code` form used by
    /// Linux matrix keymap properties.
    pub const fn from_packed(value: u32) -> Self {
        Self {
            row: (value >> 24) as u8,
            col: (value >> 16) as u8,
            key: KeyCode(value as u16),
        }
    }

    /// Encodes the entry in the packed form.
    pub const fn to_packed(self) -> u32 {
        (self.row as u32) << 24 | (self.col as u32) << 16 | self.key.0 as u32
    }
}

/// Reasons a keymap cannot be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeymapError {
    /// The matrix dimensions are zero or above the supported maximum.
    InvalidDimensions { rows: u8, cols: u8 },
    /// An entry lies outside the declared matrix.
    EntryOutOfRange { row: u8, col: u8, rows: u8, cols: u8 },
    /// The base layer maps a cell to the layer key but the overlay does not,
    /// so releasing it would never leave the overlay.
    MissingLayerKey { row: u8, col: u8 },
}

impl fmt::Display for KeymapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimensions { rows, cols } => {
                write!(f, "unsupported matrix size {rows}x{cols}")
            }
            Self::EntryOutOfRange {
                row,
                col,
                rows,
                cols,
            } => write!(f, "key at ({row}, {col}) is outside the {rows}x{cols} matrix"),
            Self::MissingLayerKey { row, col } => {
                write!(f, "overlay has no layer key at ({row}, {col})")
            }
        }
    }
}

/// A keymap indexed by packed scan code.
#[derive(Clone)]
pub struct Keymap {
    rows: u8,
    cols: u8,
    row_shift: u8,
    codes: [KeyCode; MAX_KEYS],
}

impl Keymap {
    /// Builds a `rows` x `cols` keymap. Later entries override earlier ones
    /// for the same cell; unlisted cells map to [`KeyCode::RESERVED`].
    pub fn new(rows: u8, cols: u8, entries: &[KeyEntry]) -> Result<Self, KeymapError> {
        if rows == 0 || cols == 0 || rows > MAX_ROWS || cols > MAX_COLS {
            return Err(KeymapError::InvalidDimensions { rows, cols });
        }

        let row_shift = row_shift(cols);
        let mut codes = [KeyCode::RESERVED; MAX_KEYS];
        for entry in entries {
            if entry.row >= rows || entry.col >= cols {
                return Err(KeymapError::EntryOutOfRange {
                    row: entry.row,
                    col: entry.col,
                    rows,
                    cols,
                });
            }
            codes[scan_code(entry.row, entry.col, row_shift) as usize] = entry.key;
        }

        Ok(Self {
            rows,
            cols,
            row_shift,
            codes,
        })
    }

    /// Number of rows.
    pub fn rows(&self) -> u8 {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> u8 {
        self.cols
    }

    /// Shift used to pack rows into scan codes.
    pub fn row_shift(&self) -> u8 {
        self.row_shift
    }

    /// Key for a packed scan code.
    pub fn get(&self, code: u16) -> KeyCode {
        self.codes
            .get(code as usize)
            .copied()
            .unwrap_or(KeyCode::RESERVED)
    }

    /// Key for a matrix position.
    pub fn lookup(&self, row: u8, col: u8) -> KeyCode {
        if row >= self.rows || col >= self.cols {
            return KeyCode::RESERVED;
        }
        self.get(scan_code(row, col, self.row_shift))
    }
}

impl fmt::Debug for Keymap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keymap")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("row_shift", &self.row_shift)
            .finish_non_exhaustive()
    }
}

/// Keymap tables supplied at attach time.
#[derive(Debug, Clone, Copy)]
pub struct KeymapConfig<'a> {
    /// Matrix rows the tables are written for.
    pub rows: u8,
    /// Matrix columns the tables are written for.
    pub cols: u8,
    /// Layer active while the layer key is up.
    pub base: &'a [KeyEntry],
    /// Layer active while the layer key is held.
    pub overlay: &'a [KeyEntry],
    /// Key that switches to the overlay instead of being reported.
    pub layer_key: KeyCode,
}

impl Default for KeymapConfig<'static> {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            base: DEFAULT_KEYMAP,
            overlay: DEFAULT_FN_KEYMAP,
            layer_key: KeyCode::FN,
        }
    }
}

/// The base and overlay keymaps of one matrix.
#[derive(Debug, Clone)]
pub struct Layers {
    base: Keymap,
    overlay: Keymap,
    layer_key: KeyCode,
}

impl Layers {
    /// Builds both layers from `config`.
    pub fn new(config: &KeymapConfig<'_>) -> Result<Self, KeymapError> {
        let base = Keymap::new(config.rows, config.cols, config.base)?;
        let overlay = Keymap::new(config.rows, config.cols, config.overlay)?;

        for row in 0..config.rows {
            for col in 0..config.cols {
                if base.lookup(row, col) == config.layer_key
                    && overlay.lookup(row, col) != config.layer_key
                {
                    return Err(KeymapError::MissingLayerKey { row, col });
                }
            }
        }

        Ok(Self {
            base,
            overlay,
            layer_key: config.layer_key,
        })
    }

    /// Matrix rows.
    pub fn rows(&self) -> u8 {
        self.base.rows()
    }

    /// Matrix columns.
    pub fn cols(&self) -> u8 {
        self.base.cols()
    }

    /// Shift used to pack rows into scan codes.
    pub fn row_shift(&self) -> u8 {
        self.base.row_shift()
    }

    /// Key that switches layers.
    pub fn layer_key(&self) -> KeyCode {
        self.layer_key
    }

    /// The keymap in effect for the given layer state.
    pub fn active(&self, overlay: bool) -> &Keymap {
        if overlay {
            &self.overlay
        } else {
            &self.base
        }
    }
}

/// Base layout of the stock keyboard case.
pub const DEFAULT_KEYMAP: &[KeyEntry] = &[
    key(0, 0, KeyCode::ESC),
    key(0, 1, KeyCode::KEY_1),
    key(0, 2, KeyCode::KEY_2),
    key(0, 3, KeyCode::KEY_3),
    key(0, 4, KeyCode::KEY_4),
    key(0, 5, KeyCode::KEY_5),
    key(0, 6, KeyCode::KEY_6),
    key(0, 7, KeyCode::KEY_7),
    key(0, 8, KeyCode::KEY_8),
    key(0, 9, KeyCode::KEY_9),
    key(0, 10, KeyCode::KEY_0),
    key(0, 11, KeyCode::BACKSPACE),
    key(1, 0, KeyCode::TAB),
    key(1, 1, KeyCode::Q),
    key(1, 2, KeyCode::W),
    key(1, 3, KeyCode::E),
    key(1, 4, KeyCode::R),
    key(1, 5, KeyCode::T),
    key(1, 6, KeyCode::Y),
    key(1, 7, KeyCode::U),
    key(1, 8, KeyCode::I),
    key(1, 9, KeyCode::O),
    key(1, 10, KeyCode::P),
    key(1, 11, KeyCode::ENTER),
    key(2, 0, KeyCode::LEFTMETA),
    key(2, 1, KeyCode::A),
    key(2, 2, KeyCode::S),
    key(2, 3, KeyCode::D),
    key(2, 4, KeyCode::F),
    key(2, 5, KeyCode::G),
    key(2, 6, KeyCode::H),
    key(2, 7, KeyCode::J),
    key(2, 8, KeyCode::K),
    key(2, 9, KeyCode::L),
    key(2, 10, KeyCode::SEMICOLON),
    key(3, 0, KeyCode::LEFTSHIFT),
    key(3, 1, KeyCode::Z),
    key(3, 2, KeyCode::X),
    key(3, 3, KeyCode::C),
    key(3, 4, KeyCode::V),
    key(3, 5, KeyCode::B),
    key(3, 6, KeyCode::N),
    key(3, 7, KeyCode::M),
    key(3, 8, KeyCode::COMMA),
    key(3, 9, KeyCode::DOT),
    key(3, 10, KeyCode::SLASH),
    key(4, 1, KeyCode::LEFTCTRL),
    key(4, 4, KeyCode::SPACE),
    key(4, 6, KeyCode::APOSTROPHE),
    key(4, 8, KeyCode::RIGHTBRACE),
    key(4, 9, KeyCode::LEFTBRACE),
    key(5, 2, KeyCode::FN),
    key(5, 3, KeyCode::LEFTALT),
    key(5, 5, KeyCode::RIGHTALT),
];

/// Fn layout of the stock keyboard case.
pub const DEFAULT_FN_KEYMAP: &[KeyEntry] = &[
    key(0, 0, KeyCode::FN_ESC),
    key(0, 1, KeyCode::F1),
    key(0, 2, KeyCode::F2),
    key(0, 3, KeyCode::F3),
    key(0, 4, KeyCode::F4),
    key(0, 5, KeyCode::F5),
    key(0, 6, KeyCode::F6),
    key(0, 7, KeyCode::F7),
    key(0, 8, KeyCode::F8),
    key(0, 9, KeyCode::F9),
    key(0, 10, KeyCode::F10),
    key(0, 11, KeyCode::DELETE),
    key(2, 0, KeyCode::SYSRQ),
    key(2, 10, KeyCode::INSERT),
    key(3, 0, KeyCode::LEFTSHIFT),
    key(3, 8, KeyCode::HOME),
    key(3, 9, KeyCode::UP),
    key(3, 10, KeyCode::END),
    key(4, 1, KeyCode::LEFTCTRL),
    key(4, 6, KeyCode::LEFT),
    key(4, 8, KeyCode::RIGHT),
    key(4, 9, KeyCode::DOWN),
    key(5, 2, KeyCode::FN),
    key(5, 3, KeyCode::LEFTALT),
    key(5, 5, KeyCode::RIGHTALT),
];

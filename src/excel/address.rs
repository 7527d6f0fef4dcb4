//! A1-style cell addressing
//!
//! Rows and columns are 1-based. Column letters use the spreadsheet
//! base-26 convention with no zero digit (1 → A, 26 → Z, 27 → AA).

use crate::error::{SheetfillError, SheetfillResult};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Largest row index a worksheet can hold
pub const MAX_ROW: u32 = 1_048_576;

/// Largest column index a worksheet can hold (XFD)
pub const MAX_COLUMN: u32 = 16_384;

fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([A-Za-z]+)([0-9]+)$").expect("static regex"))
}

/// A validated (row, column) position inside the sheet limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub row: u32,
    pub col: u32,
}

impl CellAddress {
    /// Create an address, rejecting coordinates outside `1..=MAX_ROW` / `1..=MAX_COLUMN`
    pub fn new(row: u32, col: u32) -> SheetfillResult<Self> {
        if row < 1 || col < 1 || row > MAX_ROW || col > MAX_COLUMN {
            return Err(SheetfillError::InvalidCoordinate {
                row: row as u64,
                col: col as u64,
            });
        }
        Ok(Self { row, col })
    }

    /// Parse and validate an address string such as "C7"
    pub fn parse(address: &str) -> SheetfillResult<Self> {
        let (row, col) = parse_address(address)?;
        Self::new(row, col)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_to_letters(self.col), self.row)
    }
}

impl FromStr for CellAddress {
    type Err = SheetfillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Render a 1-based (row, column) pair as an address string
pub fn to_address(row: u32, col: u32) -> SheetfillResult<String> {
    Ok(CellAddress::new(row, col)?.to_string())
}

/// Split an address string into its 1-based (row, column) pair.
///
/// This is purely syntactic: letters followed by digits, row > 0, and both
/// parts small enough for `u32`. Sheet limits are checked by
/// [`CellAddress::new`], so "ZZZZ1" parses here and fails there.
pub fn parse_address(address: &str) -> SheetfillResult<(u32, u32)> {
    let invalid = || SheetfillError::InvalidAddress(address.to_string());

    let caps = address_pattern().captures(address.trim()).ok_or_else(invalid)?;
    let letters = &caps[1];
    let digits = &caps[2];

    let col = letters_to_column(letters).ok_or_else(invalid)?;
    let row: u32 = digits.parse().map_err(|_| invalid())?;
    if row == 0 {
        return Err(invalid());
    }

    Ok((row, col))
}

/// Convert a 1-based column index to letters (1 → A, 27 → AA)
fn column_to_letters(col: u32) -> String {
    let mut letters = Vec::new();
    let mut n = col;

    while n > 0 {
        let remainder = (n - 1) % 26;
        letters.push((b'A' + remainder as u8) as char);
        n = (n - 1) / 26;
    }

    letters.iter().rev().collect()
}

/// Convert column letters to a 1-based index; `None` on overflow
fn letters_to_column(letters: &str) -> Option<u32> {
    letters.bytes().try_fold(0u32, |acc, b| {
        let digit = (b.to_ascii_uppercase() - b'A') as u32 + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}

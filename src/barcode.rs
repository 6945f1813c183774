use std::fmt;

use crate::error::ScrapeError;

pub const BARCODE_LEN: usize = 15;
pub const INVALID_BARCODE_ERROR: &str = "Geçersiz barkod formatı";
pub const INVALID_BARCODE_MESSAGE: &str = "Barkod 15 haneli sayısal değer olmalıdır";

/// A device barcode: exactly 15 ASCII digits. Validated once at the HTTP
/// boundary, before any browser resource is allocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Barcode(String);

impl Barcode {
    pub fn parse(raw: &str) -> Result<Self, ScrapeError> {
        if raw.len() == BARCODE_LEN && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ScrapeError::Validation(INVALID_BARCODE_MESSAGE.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Barcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::CoreError;

const MAX_SEAT_ID_LEN: usize = 8;

/// A seat label within a room, e.g. `A1` or `AA12`.
///
/// Stored upper-case. The derived `Ord` is plain lexicographic and is what lock
/// ordering uses; [`SeatId::natural_key`] gives the human ordering (`A2` < `A10`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeatId(String);

impl SeatId {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let label = raw.trim().to_ascii_uppercase();
        if label.is_empty() || label.len() > MAX_SEAT_ID_LEN {
            return Err(CoreError::ValidationError(format!("invalid seat id '{}'", raw)));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::ValidationError(format!("invalid seat id '{}'", raw)));
        }
        Ok(Self(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Row letters, then seat number, then any trailing suffix.
    pub fn natural_key(&self) -> (String, u32, String) {
        let row: String = self.0.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
        let rest = &self.0[row.len()..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        let suffix = rest[digits.len()..].to_string();
        (row, digits.parse().unwrap_or(0), suffix)
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SeatId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SeatId> for String {
    fn from(value: SeatId) -> Self {
        value.0
    }
}

/// Parses a caller-supplied seat list: non-empty, every label valid, no repeats.
pub fn parse_seat_list<S: AsRef<str>>(raw: &[S]) -> Result<Vec<SeatId>, CoreError> {
    if raw.is_empty() {
        return Err(CoreError::ValidationError("at least one seat is required".to_string()));
    }

    let mut seats = Vec::with_capacity(raw.len());
    for label in raw {
        let seat = SeatId::parse(label.as_ref())?;
        if seats.contains(&seat) {
            return Err(CoreError::ValidationError(format!("seat {} listed twice", seat)));
        }
        seats.push(seat);
    }
    Ok(seats)
}

pub fn sort_natural(seats: &mut [SeatId]) {
    seats.sort_by_key(|s| s.natural_key());
}

pub fn to_strings(seats: &[SeatId]) -> Vec<String> {
    seats.iter().map(|s| s.as_str().to_string()).collect()
}

//! Quote → digit extraction.
//!
//! The digit is the last *printed* decimal digit of the quote, not
//! `quote mod 10`. With a pip size the quote is printed with exactly that
//! many fractional digits, which keeps trailing zeros (`100.10` → `0`).
//! Without one the shortest round-trip form of the `f64` is used
//! (`100.1` → `1`).

use corelib::{Digit, Tick};

use crate::error::EngineError;

pub fn extract_digit(quote: f64, pip_size: Option<u32>) -> Result<Digit, EngineError> {
    if !quote.is_finite() {
        return Err(EngineError::NonFiniteQuote(quote));
    }

    let printed = match pip_size {
        Some(p) => format!("{:.*}", p as usize, quote),
        None => format!("{quote}"),
    };

    last_printed_digit(&printed)
}

pub fn extract_from_tick(tick: &Tick) -> Result<Digit, EngineError> {
    extract_digit(tick.quote, tick.pip_size)
}

/// Last character of an already formatted quote, if it is a decimal digit.
pub fn last_printed_digit(printed: &str) -> Result<Digit, EngineError> {
    printed
        .trim()
        .chars()
        .last()
        .and_then(Digit::from_char)
        .ok_or_else(|| EngineError::NoDigit(printed.to_string()))
}

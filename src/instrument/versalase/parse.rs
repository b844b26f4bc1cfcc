//! Typed conversions for raw parameter payloads.

use crate::error::{AppResult, DaqError};
use std::str::FromStr;

/// Booleans are exactly `0` or `1` on the wire; anything else breaks the protocol.
pub fn parse_bool(parameter: &str, raw: &[u8]) -> AppResult<bool> {
    match raw {
        b"1" => Ok(true),
        b"0" => Ok(false),
        other => Err(DaqError::InvariantViolation(format!(
            "{parameter} returned {:?}, expected \"0\" or \"1\"",
            String::from_utf8_lossy(other)
        ))),
    }
}

/// Parse an integer or float payload.
pub fn parse_number<T: FromStr>(parameter: &str, raw: &[u8]) -> AppResult<T> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.trim().parse::<T>().ok())
        .ok_or_else(|| {
            DaqError::Protocol(format!(
                "{parameter} returned non-numeric value {:?}",
                String::from_utf8_lossy(raw)
            ))
        })
}

/// Wire form of a boolean.
pub fn format_bool(state: bool) -> &'static str {
    if state {
        "1"
    } else {
        "0"
    }
}

/// Power values carry one decimal digit.
pub fn format_power(power: f64) -> String {
    format!("{power:.1}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_accepts_only_zero_and_one() {
        assert!(parse_bool("LE", b"1").unwrap());
        assert!(!parse_bool("LE", b"0").unwrap());
        for raw in [&b"2"[..], b"", b"true", b" 1", b"01"] {
            let err = parse_bool("LE", raw).unwrap_err();
            assert!(matches!(err, DaqError::InvariantViolation(_)), "{:?}", raw);
        }
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number::<i64>("LW", b"488").unwrap(), 488);
        assert_eq!(parse_number::<f64>("LP", b"12.3").unwrap(), 12.3);
        assert!(matches!(
            parse_number::<i64>("LW", b"12.3"),
            Err(DaqError::Protocol(_))
        ));
        assert!(matches!(
            parse_number::<f64>("LP", b"?LP"),
            Err(DaqError::Protocol(_))
        ));
    }

    #[test]
    fn test_format_power_one_decimal() {
        assert_eq!(format_power(12.34), "12.3");
        assert_eq!(format_power(50.0), "50.0");
        assert_eq!(format_bool(true), "1");
    }
}

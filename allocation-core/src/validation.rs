//! Boundary validation for caller input
//!
//! Front ends run these before calling the engine. Each returns
//! `Error::InvalidRequest` with a message suitable for showing to the user;
//! the engine itself never loops waiting for corrected input.

use crate::{
    types::{ClassCounts, ResourceClass},
    Error, Result,
};

/// Separator reserved by the store's key layout
const RESERVED_SEPARATOR: char = '|';

/// Parse a ticket count typed by a user
pub fn parse_count(input: &str) -> Result<u32> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidRequest("Please enter a number".into()));
    }

    let value: i64 = trimmed
        .parse()
        .map_err(|_| Error::InvalidRequest(format!("Not a number: {:?}", trimmed)))?;

    if value < 0 {
        return Err(Error::InvalidRequest(
            "Number of tickets must be at least 0".into(),
        ));
    }

    u32::try_from(value)
        .map_err(|_| Error::InvalidRequest(format!("Number too large: {}", value)))
}

/// Check a holder identity is usable as a key
pub fn validate_identity(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::InvalidRequest("Identity must not be empty".into()));
    }
    if id.chars().any(|c| c.is_control() || c == RESERVED_SEPARATOR) {
        return Err(Error::InvalidRequest(format!(
            "Identity contains a reserved character: {:?}",
            id
        )));
    }
    Ok(())
}

/// Check a request batch against current availability and the cap
pub fn validate_request(
    requested: &ClassCounts,
    availability: &ClassCounts,
    cap: u32,
) -> Result<()> {
    for (class, count) in requested.iter() {
        if count > availability[class] {
            return Err(Error::InvalidRequest(format!(
                "Not enough {} tickets available. Only {} left",
                class, availability[class]
            )));
        }
    }

    if requested.total() > cap {
        return Err(Error::InvalidRequest(format!(
            "Number of tickets cannot exceed {}",
            cap
        )));
    }

    Ok(())
}

/// Check a cancellation batch against what the holder actually holds
pub fn validate_cancellation(requested: &ClassCounts, holdings: &ClassCounts) -> Result<()> {
    for class in ResourceClass::ALL {
        if requested[class] > holdings[class] {
            return Err(Error::InvalidRequest(format!(
                "You currently only have {} {} tickets",
                holdings[class], class
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(" 3 ").unwrap(), 3);
        assert_eq!(parse_count("0").unwrap(), 0);
        assert!(parse_count("-1").is_err());
        assert!(parse_count("three").is_err());
        assert!(parse_count("").is_err());
        assert!(parse_count("99999999999").is_err());
    }

    #[test]
    fn test_validate_request() {
        let availability = ClassCounts::new(2, 200);
        assert!(validate_request(&ClassCounts::new(2, 8), &availability, 10).is_ok());

        let err = validate_request(&ClassCounts::new(3, 0), &availability, 10).unwrap_err();
        assert!(err.to_string().contains("Only 2 left"));

        let err = validate_request(&ClassCounts::new(1, 10), &availability, 10).unwrap_err();
        assert!(err.to_string().contains("cannot exceed 10"));
    }

    #[test]
    fn test_validate_cancellation() {
        let holdings = ClassCounts::new(2, 0);
        assert!(validate_cancellation(&ClassCounts::new(2, 0), &holdings).is_ok());
        let err = validate_cancellation(&ClassCounts::new(1, 1), &holdings).unwrap_err();
        assert!(err.to_string().contains("only have 0 Regular"));
    }

    #[test]
    fn test_validate_identity() {
        assert!(validate_identity("alice").is_ok());
        assert!(validate_identity("").is_err());
        assert!(validate_identity("bad\nname").is_err());
    }
}

//! Device identity derivation
//!
//! The agent identifies itself to the server with an opaque string fixed
//! for the process lifetime: either an explicit id supplied by the
//! operator, or the hardware address of a named network interface.

use std::path::Path;

use crate::error::IdentityError;

/// Maximum length of an explicit device id, per the wire protocol
pub const MAX_DEVICE_ID_LEN: usize = 63;

/// Resolve the device identity from an explicit id and/or interface name.
///
/// An explicit id always wins over the interface-derived one.
pub fn resolve_device_id(
    explicit: Option<&str>,
    interface: Option<&str>,
) -> Result<String, IdentityError> {
    if let Some(id) = explicit {
        validate_device_id(id)?;
        return Ok(id.to_string());
    }

    match interface {
        Some(name) => interface_device_id(name),
        None => Err(IdentityError::Unspecified),
    }
}

/// Validate an explicit device id
pub fn validate_device_id(id: &str) -> Result<(), IdentityError> {
    if id.is_empty() {
        return Err(IdentityError::Empty);
    }
    if id.len() > MAX_DEVICE_ID_LEN {
        return Err(IdentityError::TooLong {
            len: id.len(),
            max: MAX_DEVICE_ID_LEN,
        });
    }
    Ok(())
}

/// Derive a device id from a network interface's MAC address.
///
/// The address is read from sysfs and normalized to 12 lowercase hex
/// characters with the colons stripped.
pub fn interface_device_id(name: &str) -> Result<String, IdentityError> {
    let path = Path::new("/sys/class/net").join(name).join("address");
    let raw = std::fs::read_to_string(&path).map_err(|source| IdentityError::Interface {
        name: name.to_string(),
        source,
    })?;

    parse_hardware_address(name, raw.trim())
}

fn parse_hardware_address(name: &str, address: &str) -> Result<String, IdentityError> {
    let id: String = address
        .chars()
        .filter(|c| *c != ':')
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if id.len() != 12 || !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(IdentityError::BadAddress {
            name: name.to_string(),
            address: address.to_string(),
        });
    }

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_id_wins_over_interface() {
        let id = resolve_device_id(Some("door-sensor-7"), Some("eth0")).unwrap();
        assert_eq!(id, "door-sensor-7");
    }

    #[test]
    fn test_explicit_id_length_limit() {
        let long = "x".repeat(MAX_DEVICE_ID_LEN + 1);
        assert!(matches!(
            resolve_device_id(Some(&long), None),
            Err(IdentityError::TooLong { len: 64, max: 63 })
        ));

        let max = "x".repeat(MAX_DEVICE_ID_LEN);
        assert_eq!(resolve_device_id(Some(&max), None).unwrap(), max);
    }

    #[test]
    fn test_empty_explicit_id_rejected() {
        assert!(matches!(
            resolve_device_id(Some(""), None),
            Err(IdentityError::Empty)
        ));
    }

    #[test]
    fn test_neither_source_is_an_error() {
        assert!(matches!(
            resolve_device_id(None, None),
            Err(IdentityError::Unspecified)
        ));
    }

    #[test]
    fn test_parse_hardware_address() {
        assert_eq!(
            parse_hardware_address("eth0", "8C:F1:A3:B2:5E:10").unwrap(),
            "8cf1a3b25e10"
        );
    }

    #[test]
    fn test_parse_hardware_address_rejects_garbage() {
        assert!(parse_hardware_address("lo", "").is_err());
        assert!(parse_hardware_address("tun0", "none").is_err());
    }
}

//! Wire message codes
//!
//! Requests and events carry distinguished request codes; responses carry a
//! success code or an error code. Service implementations may return codes
//! outside the known set, which travel as `Custom` without interpretation.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Message code carried in the `code` field of every wire message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageCode {
    /// Request expecting a response
    Request,
    /// Event notification, no response channel
    Event,
    /// Successful response
    Success,
    /// Malformed request or target not invokable
    BadRequest,
    /// Address did not resolve
    NotFound,
    /// Value rejected by the target's format
    DataInvalid,
    /// Unclassified failure inside a delegate
    InternalError,
    /// Service-specific code, passed through uninterpreted
    Custom(u16),
}

impl MessageCode {
    /// Parse from the wire value; known codes normalize to their variant
    pub fn from_u16(value: u16) -> Self {
        match value {
            10 => MessageCode::Request,
            20 => MessageCode::Event,
            200 => MessageCode::Success,
            400 => MessageCode::BadRequest,
            404 => MessageCode::NotFound,
            422 => MessageCode::DataInvalid,
            500 => MessageCode::InternalError,
            other => MessageCode::Custom(other),
        }
    }

    /// Convert to the wire value
    pub fn to_u16(self) -> u16 {
        match self {
            MessageCode::Request => 10,
            MessageCode::Event => 20,
            MessageCode::Success => 200,
            MessageCode::BadRequest => 400,
            MessageCode::NotFound => 404,
            MessageCode::DataInvalid => 422,
            MessageCode::InternalError => 500,
            MessageCode::Custom(value) => value,
        }
    }

    /// Is this one of the request codes?
    pub fn is_request(self) -> bool {
        matches!(self, MessageCode::Request | MessageCode::Event)
    }

    /// Is this a response code in the error range?
    pub fn is_error(self) -> bool {
        self.to_u16() >= 400
    }

    pub fn is_success(self) -> bool {
        self == MessageCode::Success
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_u16())
    }
}

// Codes travel as bare integers on the wire.
impl Serialize for MessageCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.to_u16())
    }
}

impl<'de> Deserialize<'de> for MessageCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(MessageCode::from_u16(u16::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_code_roundtrip() {
        for code in [
            MessageCode::Request,
            MessageCode::Event,
            MessageCode::Success,
            MessageCode::BadRequest,
            MessageCode::NotFound,
            MessageCode::DataInvalid,
            MessageCode::InternalError,
        ] {
            assert_eq!(MessageCode::from_u16(code.to_u16()), code);
        }
    }

    #[test]
    fn test_custom_code_normalizes_known_values() {
        // A Custom wrapping a known value compares equal after one roundtrip.
        let raw = MessageCode::Custom(404).to_u16();
        assert_eq!(MessageCode::from_u16(raw), MessageCode::NotFound);
        assert_eq!(MessageCode::from_u16(799), MessageCode::Custom(799));
    }

    #[test]
    fn test_error_range() {
        assert!(MessageCode::NotFound.is_error());
        assert!(MessageCode::Custom(455).is_error());
        assert!(!MessageCode::Success.is_error());
        assert!(!MessageCode::Request.is_error());
        assert!(MessageCode::Request.is_request());
        assert!(MessageCode::Event.is_request());
    }

    #[test]
    fn test_serde_as_bare_integer() {
        let json = serde_json::to_string(&MessageCode::NotFound).unwrap();
        assert_eq!(json, "404");
        let back: MessageCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, MessageCode::NotFound);
    }
}

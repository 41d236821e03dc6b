//! Peer Wire Messages
//!
//! Protobuf messages exchanged between peers. The request travels in the URL
//! path; the response body is an encoded [`Response`].

use prost::Message;

use crate::error::Result;

/// Lookup request for one key of one group
#[derive(Clone, PartialEq, Message)]
pub struct Request {
    #[prost(string, tag = "1")]
    pub group: String,
    #[prost(string, tag = "2")]
    pub key: String,
}

/// Lookup response carrying the value bytes
#[derive(Clone, PartialEq, Message)]
pub struct Response {
    #[prost(bytes = "vec", tag = "1")]
    pub value: Vec<u8>,
}

impl Response {
    /// Encode for an HTTP body
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decode an HTTP body
    pub fn from_bytes(body: &[u8]) -> Result<Self> {
        Ok(Self::decode(body)?)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_response_wire_format() {
        let response = Response {
            value: b"630".to_vec(),
        };
        // field 1, wire type 2, length 3
        assert_eq!(response.to_bytes(), vec![0x0a, 0x03, b'6', b'3', b'0']);
        assert_eq!(Response::from_bytes(&response.to_bytes()).unwrap(), response);
    }

    #[test]
    fn test_empty_value_encodes_to_empty_body() {
        let response = Response { value: Vec::new() };
        assert!(response.to_bytes().is_empty());
        assert_eq!(Response::from_bytes(&[]).unwrap(), response);
    }

    #[test]
    fn test_truncated_body_is_decode_error() {
        let err = Response::from_bytes(&[0x0a, 0x05, b'a']).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}

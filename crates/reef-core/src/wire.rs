//! Wire request/response messages exchanged between ingress and runtime
//! workers.
//!
//! Both messages are protobuf-tagged structures (prost derive). On the
//! dispatch transport they travel length-delimited; the *un-prefixed*
//! encoding of [`WireRequest`] is the exact byte sequence the guest pulls
//! into linear memory via `env.write_request`.

use bytes::Bytes;
use prost::Message;
use std::collections::HashMap;

/// Multi-valued HTTP header field.
#[derive(Clone, PartialEq, Message)]
pub struct HeaderValues {
    #[prost(string, repeated, tag = "1")]
    pub values: Vec<String>,
}

/// Serialized HTTP request, host → guest.
#[derive(Clone, PartialEq, Message)]
pub struct WireRequest {
    /// Correlation id minted by the ingress worker. Carried unchanged
    /// into the matching [`WireResponse`].
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub endpoint_id: String,
    #[prost(string, tag = "3")]
    pub method: String,
    /// Guest-visible path; the `/live/{endpoint_id}` prefix is already
    /// stripped by the ingress worker.
    #[prost(string, tag = "4")]
    pub url: String,
    #[prost(map = "string, message", tag = "5")]
    pub headers: HashMap<String, HeaderValues>,
    #[prost(bytes = "vec", tag = "6")]
    pub body: Vec<u8>,
}

/// Response produced by a runtime worker, guest → host.
#[derive(Clone, PartialEq, Message)]
pub struct WireResponse {
    #[prost(string, tag = "1")]
    pub request_id: String,
    #[prost(uint32, tag = "2")]
    pub status_code: u32,
    /// Opaque bytes the guest handed to `env.write_response`.
    #[prost(bytes = "vec", tag = "3")]
    pub body: Vec<u8>,
}

impl WireRequest {
    /// Encode into the guest-facing byte form (no length prefix).
    pub fn to_guest_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Encode into a length-delimited frame for the dispatch transport.
    pub fn to_frame(&self) -> Bytes {
        Bytes::from(self.encode_length_delimited_to_vec())
    }

    /// Decode a length-delimited frame.
    pub fn from_frame(frame: Bytes) -> Result<Self, prost::DecodeError> {
        Self::decode_length_delimited(frame)
    }
}

impl WireResponse {
    /// Encode into a length-delimited frame for the dispatch transport.
    pub fn to_frame(&self) -> Bytes {
        Bytes::from(self.encode_length_delimited_to_vec())
    }

    /// Decode a length-delimited frame.
    pub fn from_frame(frame: Bytes) -> Result<Self, prost::DecodeError> {
        Self::decode_length_delimited(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> WireRequest {
        WireRequest {
            id: "req-1".to_string(),
            endpoint_id: "ep-1".to_string(),
            method: "POST".to_string(),
            url: "/anything".to_string(),
            headers: HashMap::from([(
                "accept".to_string(),
                HeaderValues {
                    values: vec!["text/plain".to_string(), "application/json".to_string()],
                },
            )]),
            body: b"hello".to_vec(),
        }
    }

    #[test]
    fn request_frame_round_trip() {
        let req = sample_request();
        let back = WireRequest::from_frame(req.to_frame()).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn response_frame_round_trip() {
        let resp = WireResponse {
            request_id: "req-1".to_string(),
            status_code: 200,
            body: b"OK".to_vec(),
        };
        let back = WireResponse::from_frame(resp.to_frame()).unwrap();
        assert_eq!(back, resp);
    }

    #[test]
    fn guest_bytes_decode_without_prefix() {
        let req = sample_request();
        let bytes = req.to_guest_bytes();
        let back = WireRequest::decode(bytes.as_slice()).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn frame_carries_length_prefix() {
        let req = sample_request();
        let framed = req.to_frame();
        let bare = req.to_guest_bytes();
        assert!(framed.len() > bare.len());
        assert_eq!(&framed[framed.len() - bare.len()..], bare.as_slice());
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let frame = sample_request().to_frame();
        let truncated = frame.slice(..frame.len() - 3);
        assert!(WireRequest::from_frame(truncated).is_err());
    }

    #[test]
    fn empty_message_decodes_to_defaults() {
        let req = WireRequest::decode(&[][..]).unwrap();
        assert!(req.id.is_empty());
        assert!(req.headers.is_empty());
        assert!(req.body.is_empty());
    }
}

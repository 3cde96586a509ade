//! Beacon payload codec
//!
//! A session beacon is a single BLE advertisement carrying
//! `[marker, session_id(16)]`. The marker byte separates our payloads from
//! unrelated manufacturer data picked up by the scanner. Decoding runs on
//! untrusted radio input and is total: every byte sequence maps to either a
//! session id or a `BeaconError`.

use crate::types::SessionId;
use thiserror::Error;

/// Application marker prefixed to every session beacon ('R').
pub const BEACON_MARKER: u8 = 0x52;

/// BLE service UUID the instructor device advertises under.
pub const ROLLCALL_SERVICE_UUID: u16 = 0xFE52;

/// Legacy advertisement hard limit.
pub const MAX_ADVERTISEMENT_SIZE: usize = 31;

/// Bytes of a session id on the wire.
pub const SESSION_ID_LEN: usize = 16;

/// Marker + session id.
pub const BEACON_PAYLOAD_LEN: usize = 1 + SESSION_ID_LEN;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BeaconError {
    #[error("Malformed beacon payload: {0}")]
    MalformedPayload(String),
    #[error("Beacon payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Encoder/decoder for session beacons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconCodec {
    marker: u8,
    max_size: usize,
}

impl Default for BeaconCodec {
    fn default() -> Self {
        Self {
            marker: BEACON_MARKER,
            max_size: MAX_ADVERTISEMENT_SIZE,
        }
    }
}

impl BeaconCodec {
    /// Create a codec using a non-default marker byte
    pub fn with_marker(marker: u8) -> Self {
        Self {
            marker,
            ..Self::default()
        }
    }

    pub fn marker(&self) -> u8 {
        self.marker
    }

    /// Pack a session id into an advertisement payload.
    pub fn encode(&self, session_id: &SessionId) -> Result<Vec<u8>, BeaconError> {
        let mut payload = Vec::with_capacity(BEACON_PAYLOAD_LEN);
        payload.push(self.marker);
        payload.extend_from_slice(session_id.as_bytes());

        if payload.len() > self.max_size {
            return Err(BeaconError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_size,
            });
        }
        Ok(payload)
    }

    /// Unpack a session id from raw advertisement bytes.
    ///
    /// Trailing bytes after the session id are tolerated so that later
    /// payload revisions can append fields without breaking older scanners.
    pub fn decode(&self, bytes: &[u8]) -> Result<SessionId, BeaconError> {
        if bytes.len() > self.max_size {
            return Err(BeaconError::MalformedPayload(format!(
                "{} bytes exceeds advertisement limit",
                bytes.len()
            )));
        }

        let (marker, rest) = bytes
            .split_first()
            .ok_or_else(|| BeaconError::MalformedPayload("empty payload".to_string()))?;

        if *marker != self.marker {
            return Err(BeaconError::MalformedPayload(format!(
                "unexpected marker 0x{:02x}",
                marker
            )));
        }

        let id_bytes: [u8; SESSION_ID_LEN] = rest
            .get(..SESSION_ID_LEN)
            .and_then(|slice| slice.try_into().ok())
            .ok_or_else(|| {
                BeaconError::MalformedPayload(format!(
                    "need {} session id bytes, got {}",
                    SESSION_ID_LEN,
                    rest.len()
                ))
            })?;

        Ok(SessionId::from_bytes(id_bytes))
    }
}

/// Encode with the default codec
pub fn encode(session_id: &SessionId) -> Result<Vec<u8>, BeaconError> {
    BeaconCodec::default().encode(session_id)
}

/// Decode with the default codec
pub fn decode(bytes: &[u8]) -> Result<SessionId, BeaconError> {
    BeaconCodec::default().decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_layout() {
        let id = SessionId::new_v4();
        let payload = encode(&id).expect("encode");

        assert_eq!(payload.len(), BEACON_PAYLOAD_LEN);
        assert_eq!(payload[0], BEACON_MARKER);
        assert_eq!(&payload[1..], id.as_bytes());
    }

    #[test]
    fn test_payload_fits_legacy_advertisement() {
        assert!(BEACON_PAYLOAD_LEN <= MAX_ADVERTISEMENT_SIZE);
    }

    #[test]
    fn test_decode_rejects_empty() {
        assert!(matches!(decode(&[]), Err(BeaconError::MalformedPayload(_))));
    }

    #[test]
    fn test_decode_rejects_wrong_marker() {
        let mut payload = encode(&SessionId::new_v4()).unwrap();
        payload[0] = 0x00;
        assert!(matches!(
            decode(&payload),
            Err(BeaconError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_id() {
        let payload = encode(&SessionId::new_v4()).unwrap();
        let result = decode(&payload[..BEACON_PAYLOAD_LEN - 1]);
        assert!(matches!(result, Err(BeaconError::MalformedPayload(_))));
    }

    #[test]
    fn test_decode_bare_id_without_marker_fails() {
        // 16 raw id bytes are not a beacon unless the first one happens to be the marker
        let id = SessionId::from_bytes([0x11; 16]);
        assert!(decode(id.as_bytes()).is_err());
    }

    #[test]
    fn test_decode_tolerates_trailing_fields() {
        let id = SessionId::new_v4();
        let mut payload = encode(&id).unwrap();
        payload.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        assert_eq!(decode(&payload).unwrap(), id);
    }

    #[test]
    fn test_decode_rejects_oversized_input() {
        let mut payload = encode(&SessionId::new_v4()).unwrap();
        payload.resize(MAX_ADVERTISEMENT_SIZE + 1, 0);
        assert!(decode(&payload).is_err());
    }

    #[test]
    fn test_custom_marker_is_not_accepted_by_default_codec() {
        let custom = BeaconCodec::with_marker(0x7F);
        let id = SessionId::new_v4();
        let payload = custom.encode(&id).unwrap();

        assert_eq!(custom.decode(&payload).unwrap(), id);
        assert!(decode(&payload).is_err());
    }

    proptest! {
        #[test]
        fn prop_round_trip(bytes in any::<[u8; 16]>()) {
            let id = SessionId::from_bytes(bytes);
            let payload = encode(&id).unwrap();
            prop_assert_eq!(decode(&payload).unwrap(), id);
        }

        #[test]
        fn prop_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = decode(&bytes);
        }

        #[test]
        fn prop_short_input_always_fails(bytes in proptest::collection::vec(any::<u8>(), 0..BEACON_PAYLOAD_LEN)) {
            prop_assert!(decode(&bytes).is_err());
        }
    }
}

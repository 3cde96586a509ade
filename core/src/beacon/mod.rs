/// Session beacon over BLE
///
/// - **codec**: packs a session id into a 17-byte advertisement and back
/// - **radio**: the host radio contract plus the instructor-side broadcaster
///
/// Platform code (Swift/Kotlin/btleplug) handles the hardware; everything
/// here is testable without a radio.

pub mod codec;
pub mod radio;

pub use codec::{
    decode, encode, BeaconCodec, BeaconError, BEACON_MARKER, BEACON_PAYLOAD_LEN,
    MAX_ADVERTISEMENT_SIZE, ROLLCALL_SERVICE_UUID,
};

pub use radio::{BeaconBroadcaster, BeaconObservation, BroadcastState, RadioAdapter, RadioError};

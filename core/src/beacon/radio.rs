//! Radio adapter contract and the instructor-side broadcaster
//!
//! The platform layer (CoreBluetooth, Android BLE, btleplug, ...) owns the
//! actual radio. The core only sees it through [`RadioAdapter`]: outbound
//! start/stop calls, and scan results pushed into a bounded channel that a
//! single consumer drains in arrival order.

use super::codec::{BeaconCodec, BeaconError};
use crate::types::SessionId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    #[error("Radio unavailable")]
    Unavailable,
    #[error("Payload rejected: {0}")]
    Payload(#[from] BeaconError),
    #[error("Platform radio error: {0}")]
    Platform(String),
}

/// One advertisement as reported by the scan callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconObservation {
    /// Raw advertisement bytes (service data)
    pub payload: Vec<u8>,
    /// RSSI in dBm, when the platform reports it
    pub rssi: Option<i8>,
    /// Platform-specific device handle, informational only
    pub device: Option<String>,
}

impl BeaconObservation {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            rssi: None,
            device: None,
        }
    }

    pub fn with_rssi(mut self, rssi: i8) -> Self {
        self.rssi = Some(rssi);
        self
    }
}

/// Host radio primitives.
#[async_trait]
pub trait RadioAdapter: Send + Sync {
    /// Begin broadcasting `payload`, replacing any current advertisement
    async fn start_advertising(&self, payload: Vec<u8>) -> Result<(), RadioError>;

    async fn stop_advertising(&self) -> Result<(), RadioError>;

    /// Begin scanning; every advertisement seen is pushed into `sink`
    async fn start_scanning(&self, sink: mpsc::Sender<BeaconObservation>)
        -> Result<(), RadioError>;

    async fn stop_scanning(&self) -> Result<(), RadioError>;
}

/// Broadcaster state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BroadcastState {
    /// Not advertising
    Idle,
    /// Advertising the given session
    Advertising(SessionId),
}

/// Instructor-side wrapper: keeps exactly one session beacon on air.
pub struct BeaconBroadcaster {
    radio: Arc<dyn RadioAdapter>,
    codec: BeaconCodec,
    state: BroadcastState,
}

impl BeaconBroadcaster {
    pub fn new(radio: Arc<dyn RadioAdapter>) -> Self {
        Self::with_codec(radio, BeaconCodec::default())
    }

    pub fn with_codec(radio: Arc<dyn RadioAdapter>, codec: BeaconCodec) -> Self {
        Self {
            radio,
            codec,
            state: BroadcastState::Idle,
        }
    }

    pub fn state(&self) -> BroadcastState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != BroadcastState::Idle
    }

    /// Advertise `session_id`. Switching sessions restarts the advertisement
    /// with the new payload; re-announcing the current session is a no-op.
    pub async fn start(&mut self, session_id: SessionId) -> Result<(), RadioError> {
        let payload = self.codec.encode(&session_id)?;

        match self.state {
            BroadcastState::Advertising(current) if current == session_id => {
                debug!("Already advertising session {}", session_id);
                return Ok(());
            }
            BroadcastState::Advertising(current) => {
                info!("Switching beacon from session {} to {}", current, session_id);
                self.radio.stop_advertising().await?;
                self.state = BroadcastState::Idle;
            }
            BroadcastState::Idle => {}
        }

        self.radio.start_advertising(payload).await?;
        self.state = BroadcastState::Advertising(session_id);
        info!("Advertising session {}", session_id);
        Ok(())
    }

    /// Stop advertising. Stopping an idle broadcaster is fine.
    pub async fn stop(&mut self) -> Result<(), RadioError> {
        if let BroadcastState::Advertising(session_id) = self.state {
            self.radio.stop_advertising().await?;
            info!("Stopped advertising session {}", session_id);
        }
        self.state = BroadcastState::Idle;
        Ok(())
    }
}

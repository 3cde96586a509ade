// Line-oriented radio adapter
//
// Stands in for a BLE stack on machines without one. Advertising prints the
// hex payload to stdout once per interval; scanning reads one advertisement
// per stdin line (`<hex> [rssi]`), so two terminals can be piped together:
//
//     rollcall advertise <session> | rollcall watch

use async_trait::async_trait;
use rollcall_core::{BeaconObservation, RadioAdapter, RadioError};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct LineRadio {
    interval: Duration,
    advertiser: Mutex<Option<JoinHandle<()>>>,
    scanner: Mutex<Option<JoinHandle<()>>>,
}

impl LineRadio {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            advertiser: Mutex::new(None),
            scanner: Mutex::new(None),
        }
    }

    pub async fn is_advertising(&self) -> bool {
        self.advertiser.lock().await.is_some()
    }
}

/// Parse `<hex> [rssi]`. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Option<Result<BeaconObservation, String>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut parts = line.split_whitespace();
    let hex_part = parts.next()?;
    let payload = match hex::decode(hex_part) {
        Ok(bytes) => bytes,
        Err(e) => return Some(Err(format!("bad hex '{}': {}", hex_part, e))),
    };

    let mut observation = BeaconObservation::new(payload);
    if let Some(rssi) = parts.next() {
        match rssi.parse::<i8>() {
            Ok(rssi) => observation = observation.with_rssi(rssi),
            Err(_) => return Some(Err(format!("bad rssi '{}'", rssi))),
        }
    }
    Some(Ok(observation))
}

/// Forward parsed lines into `sink` until input ends or the receiver is gone.
pub async fn forward_lines<R>(reader: R, sink: mpsc::Sender<BeaconObservation>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Scan input error: {}", e);
                break;
            }
        };

        match parse_line(&line) {
            None => continue,
            Some(Err(e)) => debug!("Skipping scan line: {}", e),
            Some(Ok(observation)) => {
                if sink.send(observation).await.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Scan input closed");
}

#[async_trait]
impl RadioAdapter for LineRadio {
    async fn start_advertising(&self, payload: Vec<u8>) -> Result<(), RadioError> {
        let line = hex::encode(&payload);
        let period = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                println!("{}", line);
            }
        });

        if let Some(previous) = self.advertiser.lock().await.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn stop_advertising(&self) -> Result<(), RadioError> {
        if let Some(task) = self.advertiser.lock().await.take() {
            task.abort();
        }
        Ok(())
    }

    async fn start_scanning(
        &self,
        sink: mpsc::Sender<BeaconObservation>,
    ) -> Result<(), RadioError> {
        let mut scanner = self.scanner.lock().await;
        if scanner.is_some() {
            return Err(RadioError::Platform("already scanning".to_string()));
        }
        *scanner = Some(tokio::spawn(forward_lines(
            BufReader::new(tokio::io::stdin()),
            sink,
        )));
        Ok(())
    }

    async fn stop_scanning(&self) -> Result<(), RadioError> {
        if let Some(task) = self.scanner.lock().await.take() {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{BeaconCodec, SessionId};

    #[test]
    fn test_parse_line() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   # comment").is_none());

        let obs = parse_line("52ff -60").unwrap().unwrap();
        assert_eq!(obs.payload, vec![0x52, 0xff]);
        assert_eq!(obs.rssi, Some(-60));

        assert!(parse_line("zz").unwrap().is_err());
        assert!(parse_line("52 loud").unwrap().is_err());
    }

    #[tokio::test]
    async fn test_forward_lines_skips_garbage() {
        let session = SessionId::new_v4();
        let payload = hex::encode(BeaconCodec::default().encode(&session).unwrap());
        let input = format!("not-hex\n\n{}\n{} -70\n", payload, payload);

        let (tx, mut rx) = mpsc::channel(8);
        forward_lines(BufReader::new(input.as_bytes()), tx).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(BeaconCodec::default().decode(&first.payload).unwrap(), session);
        assert_eq!(second.rssi, Some(-70));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_advertising_start_stop() {
        let radio = LineRadio::new(Duration::from_secs(3600));
        radio.start_advertising(vec![0x52]).await.unwrap();
        assert!(radio.is_advertising().await);
        radio.start_advertising(vec![0x52, 0x01]).await.unwrap();
        assert!(radio.is_advertising().await);
        radio.stop_advertising().await.unwrap();
        assert!(!radio.is_advertising().await);
    }
}

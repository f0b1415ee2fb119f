//! Periodic UDP room advertisement for the hosting device.
//!
//! The host calls [`RoomBeacon::start`] right after binding its TCP listener
//! so that any client on the same subnet can resolve the room code to an
//! endpoint without manual IP entry. Stop (or drop) the handle when hosting
//! ends; no datagram is sent afterwards.

use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{format_beacon, DiscoveryError, DISCOVERY_PORT};

/// How often the advertisement datagram is re-sent.
pub const BEACON_INTERVAL: Duration = Duration::from_secs(1);

/// Active room advertisement. Drop or call [`stop`](RoomBeacon::stop) to end.
pub struct RoomBeacon {
    task: JoinHandle<()>,
    code: String,
}

impl RoomBeacon {
    /// Start broadcasting `MINDVAULT|CODE=<code>|PORT=<port>` every second to
    /// the subnet broadcast address on UDP 41500.
    ///
    /// `port` is the host's TCP session port (ephemeral, chosen by the OS).
    pub async fn start(code: &str, port: u16) -> Result<Self, DiscoveryError> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .await
            .map_err(|e| DiscoveryError::Socket { reason: e.to_string() })?;
        socket
            .set_broadcast(true)
            .map_err(|e| DiscoveryError::Socket { reason: e.to_string() })?;

        let message = format_beacon(code, port);
        let code_owned = code.to_owned();

        let task = tokio::spawn(async move {
            let target = (Ipv4Addr::BROADCAST, DISCOVERY_PORT);
            let mut ticker = tokio::time::interval(BEACON_INTERVAL);
            loop {
                ticker.tick().await;
                // Transient send failures (e.g. interface flaps) are not fatal;
                // the next tick retries.
                if let Err(e) = socket.send_to(message.as_bytes(), target).await {
                    debug!("[Beacon] Broadcast send failed: {}", e);
                }
            }
        });

        info!("[Beacon] Advertising room '{}' on TCP port {}", code, port);
        Ok(Self { task, code: code_owned })
    }

    /// Stop advertising immediately.
    pub fn stop(self) {
        self.task.abort();
        info!("[Beacon] Advertisement for room '{}' stopped.", self.code);
    }
}

impl Drop for RoomBeacon {
    fn drop(&mut self) {
        // Abort is idempotent, so stop() followed by drop is fine.
        self.task.abort();
    }
}

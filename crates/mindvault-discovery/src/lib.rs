//! mindvault-discovery — room discovery without a directory service.
//!
//! A hosting device advertises its room by broadcasting one UDP datagram per
//! second to the subnet broadcast address on a well-known port:
//!
//! ```text
//! MINDVAULT|CODE=<code>|PORT=<port>
//! ```
//!
//! Joining devices listen on the same port, filter datagrams by room code
//! (case-insensitive), and resolve the host's TCP endpoint from the sender's
//! source address plus the advertised port. Room codes are 5 characters from
//! `[A-Z0-9]` and are not a security credential — they only disambiguate
//! rooms sharing a subnet.

use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng;
use tokio::net::UdpSocket;
use tracing::{debug, info};

pub use mindvault_core::DiscoveryError;

mod beacon;
mod netpath;

pub use beacon::RoomBeacon;
pub use netpath::{detect_local_ip, has_local_network_path, local_network_status};

/// Well-known UDP port beacons are broadcast on.
pub const DISCOVERY_PORT: u16 = 41500;

/// Magic first field of every beacon datagram.
pub const BEACON_MAGIC: &str = "MINDVAULT";

/// Default time to wait for a matching beacon before giving up.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(6);

// ── Room codes ────────────────────────────────────────────────────────────────

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 5;

/// Generate a fresh 5-character room code from `[A-Z0-9]`.
pub fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

// ── Beacon datagram format ────────────────────────────────────────────────────

/// Render the beacon datagram for a room.
pub fn format_beacon(code: &str, port: u16) -> String {
    format!("{BEACON_MAGIC}|CODE={code}|PORT={port}")
}

/// Parse a beacon datagram into `(code, port)`. Non-beacon or malformed
/// datagrams yield `None` and are skipped by the listener.
pub fn parse_beacon(msg: &str) -> Option<(String, u16)> {
    let mut parts = msg.split('|');
    if parts.next() != Some(BEACON_MAGIC) {
        return None;
    }
    let mut code = None;
    let mut port = None;
    for part in parts {
        if let Some(c) = part.strip_prefix("CODE=") {
            code = Some(c.to_owned());
        } else if let Some(p) = part.strip_prefix("PORT=") {
            port = p.parse::<u16>().ok();
        }
    }
    Some((code?, port?))
}

// ── Client-side discovery ─────────────────────────────────────────────────────

/// Listen for the beacon of the room identified by `code` and resolve the
/// host's TCP endpoint.
///
/// Binds the well-known discovery port and reads datagrams until one carries
/// the expected code (compared case-insensitively). The host's endpoint is
/// the datagram's source IP combined with the advertised TCP port. Returns
/// [`DiscoveryError::Timeout`] when `timeout` (default ~6 s) elapses first.
pub async fn discover_host(
    code: &str,
    timeout: Option<Duration>,
) -> Result<SocketAddr, DiscoveryError> {
    let timeout = timeout.unwrap_or(DEFAULT_DISCOVERY_TIMEOUT);
    let socket = UdpSocket::bind(("0.0.0.0", DISCOVERY_PORT))
        .await
        .map_err(|e| DiscoveryError::Socket { reason: e.to_string() })?;

    info!("[Discovery] Listening for room '{}' on UDP {}", code, DISCOVERY_PORT);

    let listen = async {
        let mut buf = [0u8; 512];
        loop {
            let (len, src) = socket.recv_from(&mut buf).await?;
            let Ok(msg) = std::str::from_utf8(&buf[..len]) else {
                continue;
            };
            let Some((found_code, port)) = parse_beacon(msg) else {
                debug!("[Discovery] Ignoring non-beacon datagram from {}", src);
                continue;
            };
            if !found_code.eq_ignore_ascii_case(code) {
                debug!("[Discovery] Beacon for other room '{}' — skipping", found_code);
                continue;
            }
            let endpoint = SocketAddr::new(src.ip(), port);
            info!("[Discovery] Room '{}' found at {}", code, endpoint);
            return Ok::<SocketAddr, DiscoveryError>(endpoint);
        }
    };

    match tokio::time::timeout(timeout, listen).await {
        Ok(result) => result,
        Err(_) => Err(DiscoveryError::Timeout { ms: timeout.as_millis() as u64 }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_codes_are_five_chars_from_the_alphabet() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert_eq!(code.len(), 5);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn beacon_format_round_trips() {
        let msg = format_beacon("AB12C", 54321);
        assert_eq!(msg, "MINDVAULT|CODE=AB12C|PORT=54321");
        assert_eq!(parse_beacon(&msg), Some(("AB12C".to_owned(), 54321)));
    }

    #[test]
    fn parse_beacon_rejects_foreign_datagrams() {
        assert_eq!(parse_beacon("SSDP|whatever"), None);
        assert_eq!(parse_beacon("MINDVAULT|CODE=AB12C"), None);
        assert_eq!(parse_beacon("MINDVAULT|CODE=AB12C|PORT=notaport"), None);
    }

    #[tokio::test]
    async fn discover_times_out_when_no_beacon_arrives() {
        let err = discover_host("ZZZZZ", Some(Duration::from_millis(100)))
            .await
            .expect_err("no beacon on the wire");
        assert!(matches!(err, DiscoveryError::Timeout { .. }));
    }
}

//! Local-network-path detection.
//!
//! Hosting and joining both require a LAN-capable interface; the UI asks
//! before starting either flow so it can show a "connect to Wi-Fi" hint
//! instead of a silent discovery timeout.

use std::net::IpAddr;
use std::path::Path;

use mindvault_core::LocalNetworkStatus;

/// Detect the primary LAN IPv4 address by probing an external socket.
///
/// No packets are actually sent — this just queries the OS routing table.
pub fn detect_local_ip() -> Option<IpAddr> {
    std::net::UdpSocket::bind("0.0.0.0:0")
        .and_then(|s| {
            s.connect("8.8.8.8:80")?;
            s.local_addr()
        })
        .map(|a| a.ip())
        .ok()
}

/// Best-effort classification of the default network path.
///
/// On Linux, scans `/sys/class/net` for the first interface that is up and
/// not loopback; a `wireless` subdirectory marks Wi-Fi. On other platforms
/// (or when the scan fails) the routing probe alone decides between a
/// generic Ethernet path and `Unknown`.
pub fn local_network_status() -> LocalNetworkStatus {
    let Some(ip) = detect_local_ip() else {
        return LocalNetworkStatus::Unknown;
    };
    if ip.is_loopback() {
        return LocalNetworkStatus::Unknown;
    }

    let net_dir = Path::new("/sys/class/net");
    if let Ok(entries) = std::fs::read_dir(net_dir) {
        for entry in entries.flatten() {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name == "lo" || name.starts_with("docker") {
                continue;
            }
            let operstate = std::fs::read_to_string(net_dir.join(&name).join("operstate"))
                .unwrap_or_default();
            if operstate.trim() != "up" {
                continue;
            }
            if net_dir.join(&name).join("wireless").exists() {
                return LocalNetworkStatus::Wifi;
            }
            if name.starts_with("ww") {
                return LocalNetworkStatus::Cellular;
            }
            return LocalNetworkStatus::Ethernet;
        }
    }

    // Routable address but no readable interface table: assume a wired path.
    LocalNetworkStatus::Ethernet
}

/// Whether a LAN path (Wi-Fi or Ethernet) exists for hosting/joining.
pub fn has_local_network_path() -> bool {
    matches!(
        local_network_status(),
        LocalNetworkStatus::Wifi | LocalNetworkStatus::Ethernet
    )
}

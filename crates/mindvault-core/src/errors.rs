use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Not hosting: {reason}")]
    NotHosting { reason: String },

    #[error("Not all participants are ready")]
    NotAllReady,

    #[error("Host endpoint not set")]
    NoHostEndpoint,

    #[error("Not connected to a host")]
    NotConnected,

    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Send failed: {reason}")]
    SendFailed { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("No local network path (Wi-Fi or Ethernet) available")]
    NoLocalNetwork,

    #[error("Timed out searching for host after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Beacon socket error: {reason}")]
    Socket { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

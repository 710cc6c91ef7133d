use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    InvalidPort(u16),
    MissingStoragePath,
    BadAddress(String),
    InvalidCooldown(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::InvalidPort(p) => write!(f, "Port out of range: {}", p),
            ConfigError::MissingStoragePath => {
                write!(f, "File storage backend requires a storage path")
            }
            ConfigError::BadAddress(e) => write!(f, "Bind address error: {}", e),
            ConfigError::InvalidCooldown(e) => {
                write!(f, "Cooldown must be a finite, non-negative number: {}", e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum StorageError {
    ConnectionFailed,
    WriteFailed,
    ReadFailed,
    Serialization(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed => write!(f, "Storage connection failed"),
            StorageError::WriteFailed => write!(f, "Storage write failed"),
            StorageError::ReadFailed => write!(f, "Storage read failed"),
            StorageError::Serialization(e) => write!(f, "Storage serialization error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Failure of an SDP or ICE operation on one peer connection.
///
/// The negotiator never retries: the affected link is closed and a fresh
/// join/renegotiation cycle is the recovery path.
#[derive(Debug, Clone, PartialEq)]
pub enum NegotiationError {
    PeerConnection(String),
    CreateOffer(String),
    CreateAnswer(String),
    LocalDescription(String),
    RemoteDescription(String),
    IceCandidate(String),
    Track(String),
    MalformedSignal(String),
}

impl fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationError::PeerConnection(e) => {
                write!(f, "Peer connection creation failed: {}", e)
            }
            NegotiationError::CreateOffer(e) => write!(f, "Offer creation failed: {}", e),
            NegotiationError::CreateAnswer(e) => write!(f, "Answer creation failed: {}", e),
            NegotiationError::LocalDescription(e) => {
                write!(f, "Setting local description failed: {}", e)
            }
            NegotiationError::RemoteDescription(e) => {
                write!(f, "Setting remote description failed: {}", e)
            }
            NegotiationError::IceCandidate(e) => write!(f, "Adding ICE candidate failed: {}", e),
            NegotiationError::Track(e) => write!(f, "Attaching track failed: {}", e),
            NegotiationError::MalformedSignal(e) => write!(f, "Malformed signal payload: {}", e),
        }
    }
}

impl std::error::Error for NegotiationError {}

#[derive(Debug)]
pub enum ReportError {
    MissingSessionId,
    StorageError(StorageError),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::MissingSessionId => write!(f, "sessionId required"),
            ReportError::StorageError(e) => write!(f, "Report storage error: {}", e),
        }
    }
}

impl std::error::Error for ReportError {}

impl From<StorageError> for ReportError {
    fn from(err: StorageError) -> Self {
        ReportError::StorageError(err)
    }
}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web server bind failed: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    StorageError(StorageError),
    WebError(WebError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
            ControllerError::WebError(e) => write!(f, "Web error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        ControllerError::StorageError(err)
    }
}

impl From<WebError> for ControllerError {
    fn from(err: WebError) -> Self {
        ControllerError::WebError(err)
    }
}

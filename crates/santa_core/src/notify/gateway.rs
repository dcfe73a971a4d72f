//! Messaging gateway contract.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Per-message gateway failure. `Display` is the recorded failure reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Gateway credentials are missing.
    NotConfigured,
    /// Address cannot be turned into a deliverable destination.
    InvalidAddress(String),
    /// Request never produced a response (DNS, connect, timeout).
    Transport(String),
    /// Gateway answered with a non-success status.
    Rejected { status: u16, message: String },
    /// Gateway answered with a body that could not be read.
    Decode(String),
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "gateway is not configured"),
            Self::InvalidAddress(address) => write!(f, "invalid address `{address}`"),
            Self::Transport(message) => write!(f, "transport error: {message}"),
            Self::Rejected { message, .. } => write!(f, "{message}"),
            Self::Decode(message) => write!(f, "invalid gateway response: {message}"),
        }
    }
}

impl Error for GatewayError {}

/// Outbound messaging gateway.
///
/// Implementations block until the gateway answers.
pub trait MessageGateway {
    /// Pre-flight availability check.
    fn probe_availability(&self) -> bool;
    /// Sends one text message to one address.
    fn send_one(&self, address: &str, text: &str) -> Result<(), GatewayError>;
}

impl<G: MessageGateway + ?Sized> MessageGateway for &G {
    fn probe_availability(&self) -> bool {
        (**self).probe_availability()
    }

    fn send_one(&self, address: &str, text: &str) -> Result<(), GatewayError> {
        (**self).send_one(address, text)
    }
}

impl<G: MessageGateway + ?Sized> MessageGateway for Box<G> {
    fn probe_availability(&self) -> bool {
        (**self).probe_availability()
    }

    fn send_one(&self, address: &str, text: &str) -> Result<(), GatewayError> {
        (**self).send_one(address, text)
    }
}

//! Control client core.
//!
//! The operator station owns exactly one TCP socket to the pad and is a
//! single-threaded event loop: read one switch edge, send one request, block
//! for its acknowledgement. Everything here is synchronous by design.

use thiserror::Error;

mod input;
mod pad;
mod switch;

pub use input::{debounce, print_key_help, InputSource, KeyboardInput, SwitchEvent, DEBOUNCE_SETTLE};
pub use pad::{is_connection_lost, is_retryable_connect, Pad};
pub use switch::{default_panel, describe_ack, Switch, SwitchKind};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("i/o error talking to pad: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] packets::PacketError),

    #[error("pad replied with {got:?} to a {sent:?}")]
    MismatchedAck {
        sent: packets::ControlSubtype,
        got: packets::ControlSubtype,
    },
}

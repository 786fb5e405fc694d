//! Client side of the text formatter collaborator.
//!
//! The formatter is an external program started fresh for every request.
//! It reads one `|`-delimited line on stdin, writes one `OK|...` answer
//! (or anything else on failure) to stdout and exits. Callers never see a
//! formatter failure: [`Formatter`] falls back to the untransformed text.

pub mod error;
pub mod formatter;
pub mod process;
pub mod protocol;

pub use error::GatewayError;
pub use formatter::Formatter;
pub use process::{DisabledGateway, FormatGateway, ProcessGateway};
pub use protocol::FormatRequest;

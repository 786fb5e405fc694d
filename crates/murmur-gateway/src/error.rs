use std::io;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("formatter not configured")]
    Disabled,

    #[error("failed to start formatter: {0}")]
    Spawn(#[source] io::Error),

    #[error("formatter pipe failed: {0}")]
    Io(#[from] io::Error),

    #[error("formatter timed out after {0:?}")]
    Timeout(Duration),

    #[error("formatter rejected request: {0:?}")]
    Rejected(String),
}

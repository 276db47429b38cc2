use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("not connected")]
    NotConnected,
    #[error("serial transport failure: {0}")]
    TransportFailure(#[from] std::io::Error),
    #[error("protocol desync: {0}")]
    ProtocolDesync(String),
    #[error("link dead: no input for {}ms", .idle.as_millis())]
    LinkDead { idle: Duration },
    #[error("open serial device {dev}: {source}")]
    Open {
        dev: String,
        #[source]
        source: tokio_serial::Error,
    },
    #[error("no serial device configured")]
    NoSerialDevice,
}

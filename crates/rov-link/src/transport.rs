use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, StopBits};
use tracing::info;

use crate::LinkError;

pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;
pub type BoxWriter = Box<dyn AsyncWrite + Unpin + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    pub dev: String,
    pub baud: u32,
}

/// Opens the byte channel to the board and hands back its two halves.
///
/// The link owns both halves exclusively: the reader goes to the per-epoch
/// reader task, the writer sits behind the send lock.
pub trait Connector: Send + Sync + 'static {
    fn open(&self, port: &PortConfig) -> Result<(BoxReader, BoxWriter), LinkError>;
}

/// 8N1 serial port via tokio-serial.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn open(&self, port: &PortConfig) -> Result<(BoxReader, BoxWriter), LinkError> {
        let stream = tokio_serial::new(&port.dev, port.baud)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .open_native_async()
            .map_err(|source| LinkError::Open { dev: port.dev.clone(), source })?;
        info!("serial open {} @ {}", port.dev, port.baud);
        let (r, w) = tokio::io::split(stream);
        Ok((Box::new(r), Box::new(w)))
    }
}

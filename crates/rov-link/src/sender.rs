use rov_proto::Command;
use tokio::io::AsyncWriteExt;
use tracing::{trace, warn};

use crate::{Link, LinkError};

impl Link {
    /// Writes one command and its terminator as a single unit.
    ///
    /// Fails with `NotConnected` without touching the port unless the link is
    /// up. A write error schedules a background reset and is returned as
    /// `TransportFailure`; the write itself is not retried.
    pub async fn send(&self, cmd: Command) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        let bytes = cmd.encode();
        let res = {
            let mut guard = self.inner.writer.lock().await;
            let w = guard.as_mut().ok_or(LinkError::NotConnected)?;
            match w.write_all(&bytes).await {
                Ok(()) => w.flush().await,
                Err(e) => Err(e),
            }
        };
        match res {
            Ok(()) => {
                self.inner.clock.mark_sent();
                trace!("out: {:?}", cmd);
                Ok(())
            }
            Err(e) => {
                warn!("write {:?} failed: {}", cmd, e);
                self.reset();
                Err(LinkError::TransportFailure(e))
            }
        }
    }
}

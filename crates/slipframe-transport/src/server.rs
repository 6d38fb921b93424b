use std::net::Shutdown;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::listener::SlipListener;
use crate::socket::SlipSocket;

/// Services one connected peer.
///
/// A SLIP connection carries a sequence of messages, so a handler normally
/// loops on `recv_msg` until it returns `Ok(None)`.
pub trait SlipRequestHandler {
    fn handle(&mut self, socket: &mut SlipSocket, peer: &str) -> Result<()>;
}

impl<F> SlipRequestHandler for F
where
    F: FnMut(&mut SlipSocket, &str) -> Result<()>,
{
    fn handle(&mut self, socket: &mut SlipSocket, peer: &str) -> Result<()> {
        (*self)(socket, peer)
    }
}

/// Accepts connections one at a time and hands each to a handler.
pub struct SlipServer<H> {
    listener: SlipListener,
    handler: H,
}

impl<H: SlipRequestHandler> SlipServer<H> {
    pub fn new(listener: SlipListener, handler: H) -> Self {
        Self { listener, handler }
    }

    pub fn listener(&self) -> &SlipListener {
        &self.listener
    }

    /// Accept one connection and run the handler on it to completion.
    ///
    /// The socket is shut down afterwards; the handler's result is returned.
    pub fn handle_next(&mut self) -> Result<()> {
        let (mut socket, peer) = self.listener.accept()?;
        info!(%peer, "peer connected");

        let result = self.handler.handle(&mut socket, &peer);
        if let Err(err) = socket.shutdown(Shutdown::Both) {
            debug!(%peer, error = %err, "shutdown after handler failed");
        }
        info!(%peer, ok = result.is_ok(), "peer finished");
        result
    }

    /// Serve connections until `running` is cleared.
    ///
    /// Handler errors are logged and the next connection is accepted; accept
    /// failures end the loop. The flag is checked between connections.
    pub fn serve(&mut self, running: &AtomicBool) -> Result<()> {
        while running.load(Ordering::SeqCst) {
            match self.handle_next() {
                Ok(()) => {}
                Err(err @ TransportError::Accept(_)) => return Err(err),
                Err(err) => warn!(error = %err, "handler failed"),
            }
        }
        Ok(())
    }

    pub fn into_parts(self) -> (SlipListener, H) {
        (self.listener, self.handler)
    }
}

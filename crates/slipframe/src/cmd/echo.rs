use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use slipframe::transport::{Result as TransportResult, SlipListener, SlipServer};
use slipframe::{SlipSocket, SlipWrapper};
use tracing::info;

use crate::cmd::{
    classify_recv, driver_config, install_ctrlc_handler, parse_endpoint, EchoArgs, Received,
};
use crate::exit::{transport_error, CliResult, SUCCESS};

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let listener = SlipListener::bind(&endpoint)
        .map_err(|err| transport_error("bind failed", err))?
        .with_driver_config(driver_config(args.leading_end, args.relaxed));

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut server = SlipServer::new(listener, echo_messages);
    server
        .serve(&running)
        .map_err(|err| transport_error("accept failed", err))?;

    Ok(SUCCESS)
}

fn echo_messages(socket: &mut SlipSocket, peer: &str) -> TransportResult<()> {
    loop {
        match classify_recv(socket.recv_msg(), peer) {
            Received::Message(msg) => {
                info!(%peer, size = msg.len(), "echoing message");
                socket.send_msg(&msg)?;
            }
            Received::Skipped => {}
            Received::Disconnected => return Ok(()),
            Received::Fatal(err) => return Err(err),
        }
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use slipframe::transport::SlipListener;
use slipframe::SlipWrapper;
use tracing::info;

use crate::cmd::{
    classify_recv, driver_config, install_ctrlc_handler, parse_endpoint, ListenArgs, Received,
};
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let listener = SlipListener::bind(&endpoint)
        .map_err(|err| transport_error("bind failed", err))?
        .with_driver_config(driver_config(false, args.relaxed));

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let (mut socket, peer) = listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        info!(%peer, "peer connected");

        while running.load(Ordering::SeqCst) {
            let msg = match classify_recv(socket.recv_msg(), &peer) {
                Received::Message(msg) => msg,
                Received::Skipped => continue,
                Received::Disconnected => break,
                Received::Fatal(err) => return Err(transport_error("receive failed", err)),
            };

            printed = printed.saturating_add(1);
            print_message(&msg, &peer, printed, format);

            if let Some(count) = args.count {
                if printed >= count {
                    return Ok(SUCCESS);
                }
            }
        }
        info!(%peer, "peer disconnected");
    }

    Ok(SUCCESS)
}

//! vpcd-bridge daemon
//!
//! Listens for virtual-reader connections and bridges them to a card:
//! a downstream card-emulation service when `VPCD_BRIDGE_BACKEND` is set,
//! the embedded emulated card otherwise.
//!
//! All configuration comes from `VPCD_BRIDGE_*` environment variables; see
//! the `config` module for the full list. Logging follows `RUST_LOG`.

use std::process;
use std::sync::Arc;

use log::{error, info};

use vpcd_bridge::backend::{ApduTransport, BackendClient, EmulatedCard};
use vpcd_bridge::bridge::server::BridgeServer;
use vpcd_bridge::config::Config;

fn main() {
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("vpcd-bridge: {e}");
            process::exit(1);
        }
    };

    let transport: Arc<dyn ApduTransport> = match &config.backend {
        Some(addr) => {
            info!("card backend: {addr}");
            Arc::new(BackendClient::new(addr.clone(), config.backend_timeout))
        }
        None => {
            info!("card backend: embedded emulated card");
            Arc::new(EmulatedCard::new())
        }
    };

    let server = match BridgeServer::bind(
        &config.listen,
        config.protocol.reader_protocol(),
        transport,
        config.reader_timeout,
    ) {
        Ok(server) => server,
        Err(e) => {
            error!("cannot listen on {}: {e}", config.listen);
            process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        error!("server stopped: {e}");
        process::exit(1);
    }
}

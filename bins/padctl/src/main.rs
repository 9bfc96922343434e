//! padctl — operator control client.
//!
//! One key per switch: a keypress toggles the switch, sends the matching
//! request to the pad and blocks for the acknowledgement. The session
//! reconnects on link loss; the pad's own reconnect window decides how long
//! that is tolerated.

use std::net::{Ipv4Addr, SocketAddr};

use anyhow::Result;
use clap::Parser;
use client::{
    default_panel, describe_ack, is_connection_lost, print_key_help, ClientError, InputSource,
    KeyboardInput, Pad,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "padctl", about = "Pad control client")]
struct Args {
    /// Pad server address
    #[arg(short = 'a', long, default_value_t = Ipv4Addr::LOCALHOST)]
    addr: Ipv4Addr,

    /// Pad control port
    #[arg(short = 'p', long, default_value_t = 50001)]
    port: u16,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let addr = SocketAddr::from((args.addr, args.port));

    let mut panel = default_panel();
    let mut input = KeyboardInput::stdin();
    // Desktop station: there is no physical arming key, so treat it as
    // present and rely on the pad's gates.
    let key_present = true;

    println!("Key bindings (press key, then enter):");
    print_key_help(&panel);

    'reconnect: loop {
        let mut pad = Pad::connect_forever(addr)?;

        loop {
            let Some(event) = input.next_event()? else {
                // Operator closed the input; clean shutdown.
                return Ok(());
            };
            let Some(request) = panel[event.index].edge(event.level, key_present) else {
                continue;
            };
            match pad.request(request) {
                Ok(ack) => println!("{}", describe_ack(&ack)),
                Err(ClientError::Io(err)) if is_connection_lost(&err) => {
                    warn!(%err, "connection to pad lost");
                    continue 'reconnect;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

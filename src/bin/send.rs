//! Packet Engine Unproto Sender
//!
//! Sends one unproto (UI) frame through a server.

use clap::Parser;
use packet_engine::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// Packet Engine Unproto Sender
#[derive(Parser, Debug)]
#[command(name = "pe-send")]
#[command(about = "Send an unproto frame through a packet engine server")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8000")]
    server: String,

    /// Radio port index (0 based)
    #[arg(short, long, default_value = "0")]
    radio_port: u8,

    /// Source callsign
    #[arg(short, long)]
    from: String,

    /// Destination callsign
    #[arg(short, long, default_value = "ID")]
    to: String,

    /// Digipeater path, up to 8
    #[arg(short, long)]
    via: Vec<String>,

    /// Message text
    message: String,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,packet_engine=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        tracing::error!("Send failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> packet_engine::Result<()> {
    let (host, port) = match args.server.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| packet_engine::EngineError::Config(format!("bad port in {}", args.server)))?;
            (host.to_string(), port)
        }
        None => (args.server.clone(), Config::default().port),
    };

    let config = Config::builder().host(host).port(port).build();
    let ready_timeout = config.ready_timeout();
    let engine = Engine::new(config)?;

    engine.connect_to_server()?;
    engine.wait_ready(ready_timeout)?;

    let via: Vec<&str> = args.via.iter().map(String::as_str).collect();
    engine.send_unproto(args.radio_port, &args.from, &args.to, args.message.as_bytes(), &via)?;
    tracing::info!("Sent {} bytes {}>{}", args.message.len(), args.from, args.to);

    engine.disconnect_from_server();
    Ok(())
}

//! Packet Engine Monitor
//!
//! Connects to a server, prints its version and ports, and optionally
//! prints monitored traffic or the heard list of a port.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use packet_engine::handler::{HandlerResult, Monitor};
use packet_engine::protocol::HeardCall;
use packet_engine::{Application, Config, ReceiveHandler};
use tracing_subscriber::{fmt, EnvFilter};

/// Packet Engine Monitor
#[derive(Parser, Debug)]
#[command(name = "pe-monitor")]
#[command(about = "Inspect a packet engine server and watch its traffic")]
#[command(version)]
struct Args {
    /// TOML config file; command-line values override it
    #[arg(short, long)]
    config: Option<String>,

    /// Server host
    #[arg(long)]
    host: Option<String>,

    /// Server TCP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Print monitored traffic for this many seconds
    #[arg(short, long, default_value = "0")]
    monitor_secs: u64,

    /// Also receive raw frames while monitoring
    #[arg(long)]
    raw: bool,

    /// Ask for the heard list of this radio port
    #[arg(long)]
    heard: Option<u8>,
}

/// Prints monitored frames to stdout
struct PrintMonitor;

impl Monitor for PrintMonitor {
    fn monitored_connected(&self, port: u8, call_from: &str, call_to: &str, text: Option<&str>, data: &[u8]) {
        print_frame("I", port, call_from, call_to, text, data);
    }

    fn monitored_supervisory(&self, port: u8, call_from: &str, call_to: &str, text: Option<&str>) {
        print_frame("S", port, call_from, call_to, text, &[]);
    }

    fn monitored_unproto(&self, port: u8, call_from: &str, call_to: &str, text: Option<&str>, data: &[u8]) {
        print_frame("U", port, call_from, call_to, text, data);
    }

    fn monitored_own(&self, port: u8, call_from: &str, call_to: &str, text: Option<&str>, data: &[u8]) {
        print_frame("T", port, call_from, call_to, text, data);
    }

    fn monitored_raw(&self, port: u8, data: &[u8]) {
        println!("[{}] K {} bytes", u16::from(port) + 1, data.len());
    }
}

fn print_frame(kind: &str, port: u8, call_from: &str, call_to: &str, text: Option<&str>, data: &[u8]) {
    println!("[{}] {} {}>{} {}", u16::from(port) + 1, kind, call_from, call_to, text.unwrap_or("").trim_end());
    if !data.is_empty() {
        println!("    {}", String::from_utf8_lossy(data).trim_end());
    }
}

/// Prints heard list entries
struct HeardPrinter;

impl ReceiveHandler for HeardPrinter {
    fn callsign_heard_on_port(&self, port: u8, heard: Option<&HeardCall>) -> HandlerResult {
        if let Some(heard) = heard {
            println!(
                "[{}] {:<10} first {} last {}",
                u16::from(port) + 1,
                heard.callsign,
                heard.first_heard,
                heard.last_heard
            );
        }
        Ok(())
    }
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,packet_engine=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("Packet Engine Monitor v{}", packet_engine::VERSION);

    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("Server: {}", config.server_addr());

    let app = match Application::with_handler(config, Some(Arc::new(HeardPrinter))) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("Failed to create engine: {}", e);
            std::process::exit(1);
        }
    };
    app.logging().set_enabled(false);

    if let Err(e) = app.start() {
        tracing::error!("Failed to connect: {}", e);
        std::process::exit(1);
    }

    if let Ok(info) = app.engine().server_info() {
        println!("Server version {}", info.version);
        for (index, port) in info.ports.iter().enumerate() {
            println!("Port {}: {}", index + 1, port);
        }
    }

    if let Some(port) = args.heard {
        if let Err(e) = app.engine().ask_heard(port) {
            tracing::error!("Heard query failed: {}", e);
        }
        // Heard entries arrive as separate frames
        std::thread::sleep(Duration::from_secs(1));
    }

    if args.monitor_secs > 0 {
        app.set_monitor(Some(Arc::new(PrintMonitor)));
        let toggled = app
            .engine()
            .set_monitoring(true)
            .and_then(|_| if args.raw { app.engine().set_raw(true) } else { Ok(()) });
        if let Err(e) = toggled {
            tracing::error!("Failed to enable monitoring: {}", e);
        } else {
            std::thread::sleep(Duration::from_secs(args.monitor_secs));
        }
    }

    app.stop();
    tracing::info!("Monitor stopped");
}

fn load_config(args: &Args) -> packet_engine::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate()?;
    Ok(config)
}

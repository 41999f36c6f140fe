//! Demo binary wiring a transport into a [`vserial_mux::Multiplexer`] and
//! printing routed channel traffic plus periodic statistics snapshots.
//!
//! Usage:
//!   vserial demo                      run entirely in-process over a loopback transport
//!   vserial open <path> <baud>        open a real serial port and mirror channel 0 to stdout
//!
//! An optional `--config <file.json>` overrides [`vserial_core::MultiplexerConfig`] defaults.

use std::fs;
use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::info;
use tracing_subscriber::EnvFilter;
use vserial_core::{LoopbackTransport, MultiplexerConfig, SerialTransport};
use vserial_mux::Multiplexer;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config = extract_config(&mut args)?;

    match args.first().map(String::as_str) {
        Some("demo") => run_demo(config),
        Some("open") => {
            let path = args.get(1).context("usage: vserial open <path> <baud>")?;
            let baud: u32 = args
                .get(2)
                .context("usage: vserial open <path> <baud>")?
                .parse()
                .context("baud rate must be a number")?;
            run_serial(path, baud, config)
        }
        _ => bail!("usage: vserial <demo|open <path> <baud>> [--config <file.json>]"),
    }
}

/// Pull a `--config <path>` pair out of `args`, loading it as JSON if present.
fn extract_config(args: &mut Vec<String>) -> Result<MultiplexerConfig> {
    let Some(idx) = args.iter().position(|a| a == "--config") else {
        return Ok(MultiplexerConfig::default());
    };
    let path = args
        .get(idx + 1)
        .context("--config requires a file path")?
        .clone();
    args.drain(idx..=idx + 1);

    let mut contents = String::new();
    fs::File::open(&path)
        .with_context(|| format!("opening config file {path}"))?
        .read_to_string(&mut contents)?;
    let config: MultiplexerConfig =
        serde_json::from_str(&contents).with_context(|| format!("parsing config file {path}"))?;
    Ok(config)
}

/// Run two in-process multiplexers over a loopback transport, exchanging
/// traffic on two channels with no hardware required.
fn run_demo(config: MultiplexerConfig) -> Result<()> {
    info!("starting loopback demo");
    let (side_a, side_b) = LoopbackTransport::pair(Duration::from_millis(200));
    let mux_a = Multiplexer::new(side_a, config);
    let mux_b = Multiplexer::new(side_b, config);

    let chan0 = mux_a.open(0, None)?;
    mux_b.add_channel(0, None)?;
    let chan1 = mux_a.open(1, None)?;
    mux_b.add_channel(1, None)?;

    chan0.write(b"hello from channel 0")?;
    chan1.write(b"hello from channel 1")?;

    let got0 = mux_b.channel_read(0, 21, Some(Duration::from_millis(500)))?;
    let got1 = mux_b.channel_read(1, 21, Some(Duration::from_millis(500)))?;
    println!("channel 0: {}", String::from_utf8_lossy(&got0));
    println!("channel 1: {}", String::from_utf8_lossy(&got1));

    let stats = mux_b.statistics();
    println!("statistics: {}", serde_json::to_string(&stats)?);

    mux_a.shutdown();
    mux_b.shutdown();
    Ok(())
}

/// Open a real serial port, register channel 0, and mirror whatever arrives
/// on it to stdout until interrupted.
fn run_serial(path: &str, baud: u32, config: MultiplexerConfig) -> Result<()> {
    info!(path, baud, "opening serial port");
    let port = serialport::new(path, baud)
        .timeout(Duration::from_millis(200))
        .open()
        .with_context(|| format!("opening serial port {path}"))?;
    let transport = SerialTransport::new(port);

    let mux = Multiplexer::new(transport, config);
    let chan0 = mux.open(0, None)?;

    loop {
        let chunk = chan0.read(256, None)?;
        if !chunk.is_empty() {
            print!("{}", String::from_utf8_lossy(&chunk));
        }
        let stats = mux.statistics();
        if stats.bad_channel > 0 || stats.frame.fcs > 0 {
            tracing::warn!(?stats, "frame errors observed");
        }
    }
}

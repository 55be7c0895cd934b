//! hdhr-config - Tuner configuration tool
//!
//! Discovers devices, reads and writes device variables, scans channel maps
//! and saves a tuner's stream to a file.

use anyhow::Context;
use clap::{Parser, Subcommand};
use hdhr_cli::config::Config;
use hdhr_cli::stats::{format_scan_result, format_tuner_status, format_video_progress};
use hdhr::io::Timer;
use hdhr::protocol::types::{DEVICE_ID_WILDCARD, DEVICE_TYPE_TUNER};
use hdhr::{find_devices, ChannelScan, Device, Logger, Outcome};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hdhr-config")]
#[command(about = "Network tuner configuration tool", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device string; overrides the configuration file
    #[arg(short, long)]
    device: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List devices on the local network
    Discover {
        /// Ask this address only
        #[arg(long)]
        ip: Option<Ipv4Addr>,
    },
    /// Read a variable, e.g. /tuner0/status
    Get { item: String },
    /// Write a variable
    Set { item: String, value: String },
    /// Scan a channel map and list what was found
    Scan {
        /// Channel map; defaults to the tuner's current one
        #[arg(long)]
        channelmap: Option<String>,
        /// Write results to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Save the tuner's stream to a file ('-' for stdout, 'null' to discard)
    Save {
        output: String,
        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Write an example configuration file
    Init { path: PathBuf },
}

fn outcome<T>(result: Outcome<T>, what: &str) -> anyhow::Result<T> {
    match result {
        Outcome::Ok(value) => Ok(value),
        Outcome::Rejected(msg) => anyhow::bail!("{}: {}", what, msg),
        Outcome::Failure(e) => Err(e).context(format!("{}: communication error", what)),
    }
}

fn open_device(args: &Args, config: &Config) -> anyhow::Result<Device> {
    let text = match (&args.device, &config.device) {
        (Some(text), _) => text.clone(),
        (None, Some(device)) => device.device.clone(),
        (None, None) => anyhow::bail!("no device specified; use --device or a config file"),
    };

    let mut device = Device::parse(&text, Logger::default())
        .with_context(|| format!("invalid device '{}'", text))?;
    device.set_video_config(config.video.video_config());
    if let Some(lockkey) = config.device.as_ref().and_then(|d| d.lockkey) {
        device.lockkey_use_value(lockkey);
    }
    Ok(device)
}

fn discover(ip: Option<Ipv4Addr>) -> anyhow::Result<()> {
    let target = ip.unwrap_or(Ipv4Addr::UNSPECIFIED);
    let devices = find_devices(target, DEVICE_TYPE_TUNER, DEVICE_ID_WILDCARD, 64)?;

    if devices.is_empty() {
        println!("no devices found");
        return Ok(());
    }
    for device in devices {
        println!(
            "hdhomerun device {:08X} found at {} ({} tuners)",
            device.device_id, device.ip_addr, device.tuner_count
        );
    }
    Ok(())
}

fn scan(
    device: &mut Device,
    channelmap: Option<String>,
    output: Option<String>,
) -> anyhow::Result<()> {
    let channelmap = match channelmap {
        Some(map) => map,
        None => outcome(device.get_tuner_channelmap(), "failed to read channel map")?,
    };

    let mut writer: Box<dyn Write> = match output.as_deref() {
        None | Some("-") => Box::new(io::stdout()),
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create '{}'", path))?,
        )),
    };

    outcome(device.lockkey_request(), "failed to lock tuner")?;
    let result = run_scan(device, &channelmap, &mut writer);
    let _ = device.lockkey_release();
    result
}

fn run_scan(device: &mut Device, channelmap: &str, writer: &mut dyn Write) -> anyhow::Result<()> {
    outcome(device.set_tuner_channelmap(channelmap), "failed to set channel map")?;
    let mut channel_scan = ChannelScan::new(channelmap, device.logger().clone())?;

    while let Some(mut result) = channel_scan.advance() {
        outcome(
            channel_scan.detect(device, &mut result),
            "channel scan failed",
        )?;
        write!(writer, "{}", format_scan_result(&result))?;
        writer.flush()?;
        tracing::debug!("scan {}% complete", channel_scan.progress());
    }
    Ok(())
}

fn save(
    device: &mut Device,
    output: &str,
    duration: Option<u64>,
    stats_interval: Duration,
) -> anyhow::Result<()> {
    let mut writer: Box<dyn Write> = match output {
        "null" => Box::new(io::sink()),
        "-" => Box::new(io::stdout()),
        path => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create '{}'", path))?,
        )),
    };

    let (_, status) = outcome(device.get_tuner_status(), "failed to read tuner status")?;
    tracing::info!("{}", format_tuner_status(&status));

    outcome(device.stream_start(), "failed to start stream")?;
    tracing::info!("streaming from {}", device.name());

    let start = Instant::now();
    let limit = duration.map(Duration::from_secs);
    let mut stats_timer = Timer::new(stats_interval);
    let mut total_bytes = 0u64;

    loop {
        if limit.map_or(false, |limit| start.elapsed() >= limit) {
            break;
        }

        let data = device.stream_recv(8 * 1024 * 1024);
        if data.is_empty() {
            thread::sleep(Duration::from_millis(64));
        } else {
            total_bytes += data.len() as u64;
            writer.write_all(&data)?;
        }

        if stats_timer.check_and_reset() {
            let stats = device.video_stats();
            tracing::info!("{}", format_video_progress(total_bytes, start.elapsed(), &stats));
        }
    }

    writer.flush()?;
    device.stream_stop();
    device.log_video_stats();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load '{}'", path.display()))?,
        None => Config::default(),
    };

    match &args.command {
        Command::Discover { ip } => discover(*ip),
        Command::Init { path } => {
            Config::example().to_file(path)?;
            tracing::info!("wrote {}", path.display());
            Ok(())
        }
        Command::Get { item } => {
            let mut device = open_device(&args, &config)?;
            let value = outcome(device.get_var(item), "get failed")?;
            println!("{}", value);
            Ok(())
        }
        Command::Set { item, value } => {
            let mut device = open_device(&args, &config)?;
            outcome(device.set_var(item, value), "set failed")?;
            Ok(())
        }
        Command::Scan { channelmap, output } => {
            let mut device = open_device(&args, &config)?;
            let channelmap = channelmap.clone().or_else(|| config.scan.channelmap.clone());
            let output = output.clone().or_else(|| config.scan.output.clone());
            scan(&mut device, channelmap, output)
        }
        Command::Save { output, duration } => {
            let mut device = open_device(&args, &config)?;
            save(
                &mut device,
                output,
                *duration,
                config.video.stats_interval(),
            )
        }
    }
}

use clap::{Arg, ArgAction, Command};
use colored::*;
use hostsweep::{
    config::ScanConfig,
    discovery::{event_channel, DeviceRecord, EventReceiver, HostProbe, ScanEvent},
    network::{AddressRange, InterfaceLookup, SubnetLookup, SystemBackend},
    scanner::ScanEngine,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn build_cli() -> Command {
    Command::new("hostsweep")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Parallel IPv4 host discovery: ping, reverse DNS, MAC and common TCP ports")
        .arg(
            Arg::new("start")
                .value_name("START")
                .help("First address of the range (defaults to the primary subnet)")
                .index(1),
        )
        .arg(
            Arg::new("end")
                .value_name("END")
                .help("Last address of the range (defaults to START)")
                .index(2),
        )
        .arg(
            Arg::new("ports")
                .short('p')
                .long("ports")
                .value_name("PORTS")
                .help("Comma separated TCP ports to probe on reachable hosts")
                .value_delimiter(',')
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("MS")
                .help("Connect timeout per port in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("ping-timeout")
                .long("ping-timeout")
                .value_name("MS")
                .help("Echo reply wait in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("rate")
                .long("rate")
                .value_name("HOSTS")
                .help("Host probes started per second (0 = unlimited)")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("N")
                .help("Worker tasks (default: twice the core count, at most 64)")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file (default: ~/.hostsweep.toml)"),
        )
        .arg(
            Arg::new("no-dns")
                .long("no-dns")
                .help("Skip reverse DNS lookups")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-mac")
                .long("no-mac")
                .help("Skip hardware address lookups")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("sequential")
                .long("sequential")
                .help("Probe one address at a time on a single task")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("all")
                .short('a')
                .long("all")
                .help("List unreachable addresses too")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print results as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Verbose output")
                .action(ArgAction::SetTrue),
        )
}

fn load_config(matches: &clap::ArgMatches) -> anyhow::Result<ScanConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ScanConfig::from_toml_file(path)?,
        None => ScanConfig::load_default_config(),
    };

    if let Some(ports) = matches.get_many::<u16>("ports") {
        config.ports = ports.copied().collect();
    }
    if let Some(&ms) = matches.get_one::<u64>("timeout") {
        config.port_timeout_ms = ms;
    }
    if let Some(&ms) = matches.get_one::<u64>("ping-timeout") {
        config.ping_timeout_ms = ms;
    }
    if let Some(&rate) = matches.get_one::<u32>("rate") {
        config.rate_limit = rate;
    }
    if let Some(&workers) = matches.get_one::<usize>("workers") {
        config.workers = Some(workers);
    }
    if matches.get_flag("no-dns") {
        config.resolve_hostnames = false;
    }
    if matches.get_flag("no-mac") {
        config.resolve_mac = false;
    }

    config.validate()?;
    Ok(config)
}

fn resolve_range(matches: &clap::ArgMatches) -> anyhow::Result<AddressRange> {
    if let Some(start) = matches.get_one::<String>("start") {
        let end = matches.get_one::<String>("end").unwrap_or(start);
        return Ok(AddressRange::parse(start, end)?);
    }

    let subnet = InterfaceLookup
        .primary_subnet()
        .ok_or_else(|| anyhow::anyhow!("no active IPv4 interface found, pass START and END"))?;
    log::info!("Using primary subnet {}", subnet);

    Ok(subnet.usable_range().unwrap_or_else(|| subnet.full_range()))
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.blue} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Forward engine events to the log and the progress bar message.
fn drain_events(mut rx: EventReceiver, pb: ProgressBar) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match &event {
                ScanEvent::Done { .. } | ScanEvent::Completed { .. } => {
                    pb.set_message(event.to_string())
                }
                ScanEvent::NetworkInitFailed(_) | ScanEvent::StopTimedOut { .. } => {
                    log::warn!("{}", event)
                }
                _ => log::debug!("{}", event),
            }
        }
    })
}

async fn run_parallel(
    range: AddressRange,
    config: ScanConfig,
    pb: &ProgressBar,
) -> anyhow::Result<Vec<DeviceRecord>> {
    let (tx, rx) = event_channel();
    let drain = drain_events(rx, pb.clone());

    let engine = ScanEngine::new(Arc::new(SystemBackend::default()));
    engine.start(range, config, Some(tx)).await?;

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            _ = engine.wait() => break,
            _ = tokio::signal::ctrl_c() => {
                pb.set_message("stopping...");
                engine.stop().await;
                break;
            }
            _ = ticker.tick() => pb.set_position(engine.progress().completed),
        }
    }

    engine.stop().await;
    pb.set_position(engine.progress().completed);
    let records = engine.snapshot();

    drop(engine);
    drain.abort();
    Ok(records)
}

async fn run_sequential(
    range: AddressRange,
    config: ScanConfig,
    pb: &ProgressBar,
) -> anyhow::Result<Vec<DeviceRecord>> {
    let (tx, rx) = event_channel();
    let pb_events = pb.clone();
    let drain = tokio::spawn(async move {
        let mut rx = rx;
        while let Some(event) = rx.recv().await {
            if matches!(event, ScanEvent::Scanning(_)) {
                pb_events.inc(1);
            }
            log::debug!("{}", event);
        }
    });

    let probe = HostProbe::new(Arc::new(SystemBackend::default()), config);
    let records = probe.scan_sequential(range, Some(&tx)).await?;

    drop(tx);
    let _ = drain.await;
    Ok(records)
}

fn print_table(records: &[DeviceRecord], show_all: bool) {
    println!(
        "{:<16} {:<6} {:<32} {:<18} {}",
        "ADDRESS".bold(),
        "UP".bold(),
        "HOSTNAME".bold(),
        "MAC".bold(),
        "OPEN PORTS".bold()
    );

    for record in records.iter().filter(|r| show_all || r.reachable) {
        let up = if record.reachable {
            "yes".bright_green()
        } else {
            "no".bright_red()
        };
        let ports = record
            .open_ports
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");

        println!(
            "{:<16} {:<6} {:<32} {:<18} {}",
            record.address.bright_cyan(),
            up,
            if record.has_hostname() { record.hostname.as_str() } else { "-" },
            if record.has_mac() { record.mac.as_str() } else { "-" },
            ports.bright_yellow()
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();

    let level = if matches.get_flag("verbose") { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = load_config(&matches)?;
    let range = resolve_range(&matches)?;

    let started = Instant::now();
    let pb = progress_bar(range.len());

    let mut records = if matches.get_flag("sequential") {
        run_sequential(range, config, &pb).await?
    } else {
        run_parallel(range, config, &pb).await?
    };
    pb.finish_and_clear();

    records.sort_by_key(|r| r.ordinal());
    let alive = records.iter().filter(|r| r.reachable).count();

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    print_table(&records, matches.get_flag("all"));
    println!();
    println!(
        "{} {} of {} addresses up, scanned in {:.2?}",
        "[✓]".bright_green(),
        alive.to_string().bright_cyan().bold(),
        records.len(),
        started.elapsed()
    );

    Ok(())
}

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use wavecrest::{
    run_concurrent, run_latency, CredentialPool, LatencyConfig, RampConfig, RedisPublisher,
    Thresholds, DEFAULT_DRAIN, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_HOLD, DEFAULT_MARGINAL_RATIO,
    DEFAULT_MESSAGES, DEFAULT_MESSAGE_INTERVAL, DEFAULT_P99_THRESHOLD, DEFAULT_PASS_ALIVE,
    DEFAULT_RAMP_RATE, DEFAULT_REDIS_URL, DEFAULT_REPORT_INTERVAL, DEFAULT_SETTLE,
    DEFAULT_TARGET_CONNECTIONS, DEFAULT_TOKENS_FILE, DEFAULT_TOPIC, DEFAULT_WS_URL,
};

#[derive(Parser, Debug)]
#[command(version, about = "WebSocket connection-capacity and fan-out latency harness")]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,

    /// Serve Prometheus metrics on this address while the run is in progress.
    #[cfg(feature = "metrics")]
    #[arg(long, global = true)]
    metrics_addr: Option<std::net::SocketAddr>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Ramp up concurrent connections and check how many survive the hold.
    Concurrent(ConcurrentArgs),
    /// Measure publish-to-client latency through the fan-out path.
    Latency(LatencyArgs),
}

#[derive(Args, Debug)]
struct ConcurrentArgs {
    #[arg(long, default_value = DEFAULT_WS_URL)]
    ws_url: String,

    #[arg(long, default_value = DEFAULT_TOKENS_FILE)]
    tokens_file: PathBuf,

    #[arg(long, default_value_t = DEFAULT_TARGET_CONNECTIONS)]
    connections: usize,

    /// Connection attempts per batch; batches are one second apart.
    #[arg(long, default_value_t = DEFAULT_RAMP_RATE)]
    ramp_up: NonZeroU32,

    #[arg(long, default_value_t = DEFAULT_HOLD.as_secs())]
    hold_seconds: u64,

    /// Seconds between heartbeats on each connection; 0 disables them.
    #[arg(long, default_value_t = DEFAULT_HEARTBEAT_INTERVAL.as_secs())]
    heartbeat_interval: u64,

    #[arg(long, default_value_t = DEFAULT_REPORT_INTERVAL.as_secs())]
    report_interval: u64,

    #[arg(long, default_value_t = DEFAULT_PASS_ALIVE)]
    pass_alive: u64,

    #[arg(long, default_value_t = DEFAULT_MARGINAL_RATIO)]
    marginal_ratio: f64,
}

#[derive(Args, Debug)]
struct LatencyArgs {
    #[arg(long, default_value = DEFAULT_WS_URL)]
    ws_url: String,

    #[arg(long, default_value = DEFAULT_REDIS_URL)]
    redis_url: String,

    #[arg(long, default_value = DEFAULT_TOPIC)]
    topic: String,

    #[arg(long, default_value = DEFAULT_TOKENS_FILE)]
    tokens_file: PathBuf,

    #[arg(long, default_value_t = DEFAULT_MESSAGES)]
    messages: usize,

    #[arg(long, default_value_t = DEFAULT_MESSAGE_INTERVAL.as_millis() as u64)]
    interval_ms: u64,

    /// Routing target for the events. Defaults to the user owning the first token.
    #[arg(long)]
    receiver_id: Option<String>,

    #[arg(long, default_value_t = DEFAULT_P99_THRESHOLD.as_millis() as u64)]
    p99_threshold_ms: u64,

    #[arg(long, default_value_t = DEFAULT_SETTLE.as_millis() as u64)]
    settle_ms: u64,

    #[arg(long, default_value_t = DEFAULT_DRAIN.as_millis() as u64)]
    drain_ms: u64,

    /// Seconds between heartbeats on the receiving connection; 0 disables them.
    #[arg(long, default_value_t = DEFAULT_HEARTBEAT_INTERVAL.as_secs())]
    heartbeat_interval: u64,
}

impl ConcurrentArgs {
    fn config(&self) -> anyhow::Result<RampConfig> {
        if !(0.0..=1.0).contains(&self.marginal_ratio) {
            anyhow::bail!("--marginal-ratio must be between 0 and 1");
        }

        let mut config = RampConfig::new(&self.ws_url);
        config.target = self.connections;
        config.ramp_rate = self.ramp_up;
        config.hold = Duration::from_secs(self.hold_seconds);
        config.heartbeat_interval = Duration::from_secs(self.heartbeat_interval);
        config.report_interval = Duration::from_secs(self.report_interval);
        config.thresholds.pass_alive = self.pass_alive;
        config.thresholds.marginal_ratio = self.marginal_ratio;
        Ok(config)
    }
}

impl LatencyArgs {
    fn config(&self) -> LatencyConfig {
        let mut config = LatencyConfig::new(&self.ws_url);
        config.messages = self.messages;
        config.interval = Duration::from_millis(self.interval_ms);
        config.receiver_id = self.receiver_id.clone();
        config.settle = Duration::from_millis(self.settle_ms);
        config.drain = Duration::from_millis(self.drain_ms);
        config.heartbeat_interval = Duration::from_secs(self.heartbeat_interval);
        config.thresholds = Thresholds {
            p99: Duration::from_millis(self.p99_threshold_ms),
            ..Thresholds::default()
        };
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wavecrest=info")),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::InvalidSubcommand => {
                print_usage();
                return ExitCode::SUCCESS;
            }
            _ => err.exit(),
        },
    };

    #[cfg(feature = "metrics")]
    if let Some(addr) = cli.metrics_addr {
        if let Err(err) = metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            error!("Unable to start metrics exporter on {addr}: {err}");
            return ExitCode::FAILURE;
        }
    }

    let Some(mode) = cli.mode else {
        print_usage();
        return ExitCode::SUCCESS;
    };

    match run(mode).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(mode: Mode) -> anyhow::Result<()> {
    match mode {
        Mode::Concurrent(args) => {
            let config = args.config()?;
            let pool = CredentialPool::from_file(&args.tokens_file)?;
            let report = run_concurrent(config, &pool).await?;
            println!("{report}");
        }
        Mode::Latency(args) => {
            let pool = CredentialPool::from_file(&args.tokens_file)?;
            let mut publisher = RedisPublisher::connect(&args.redis_url, &args.topic)
                .await
                .with_context(|| format!("connecting to {}", args.redis_url))?;
            let report = run_latency(args.config(), &pool, &mut publisher).await?;
            println!("{report}");
        }
    }
    Ok(())
}

fn print_usage() {
    let mut command = Cli::command();
    if let Err(err) = command.print_help() {
        error!("Unable to print usage: {err}");
    }
    println!();
}

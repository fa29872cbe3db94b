use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::MockService;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;
use tracing_subscriber::FmtSubscriber;
use wavecrest_core::CredentialPool;

#[derive(Parser, Debug)]
#[command(version, about = "Stub messaging backend for local wavecrest runs")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:5051")]
    addr: SocketAddr,

    #[arg(long, default_value = "tokens.txt")]
    tokens_file: PathBuf,

    /// Refuse upgrades above this many per second.
    #[arg(long)]
    accept_rate: Option<NonZeroU32>,

    #[arg(long)]
    metrics_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter("mock_service=info,tower_http=info")
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
    }

    let pool = CredentialPool::from_file(&cli.tokens_file)?;
    let mut builder = MockService::builder().credentials(&pool).init_push(true);
    if let Some(rate) = cli.accept_rate {
        builder = builder.accept_rate(rate);
    }

    let service = builder.bind(cli.addr).await?;
    println!("Serving {} users on {}", pool.len(), service.ws_url());
    service.wait().await;
    Ok(())
}

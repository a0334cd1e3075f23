use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::{batch::BatchRegistry, serve, tps_measure_task, AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(version, about = "Load target for pacer")]
struct MockServiceCli {
    #[arg(short, long, env = "MOCK_PORT", default_value_t = 8082)]
    port: u16,

    /// Serve Prometheus metrics on this port
    #[arg(long, env = "MOCK_METRICS_PORT")]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mock_service=info,tower_http=info"));
    FmtSubscriber::builder().with_env_filter(filter).init();

    let args = MockServiceCli::parse();

    if let Some(port) = args.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
            .install()?;
    }

    let state = AppState::new(BatchRegistry::default());
    tokio::spawn(tps_measure_task(state.clone()));

    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], args.port))).await?;
    serve(listener, state).await?;

    Ok(())
}

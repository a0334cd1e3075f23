use mock_service::{batch::BatchRegistry, serve, AppState};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Start a mock service on an ephemeral port within the current runtime and return its base url.
#[allow(unused)]
pub async fn init() -> String {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::new(
                "pacer=debug,mock_service=debug,axum::rejection=trace",
            ))
            .try_init();
    });

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock service");
    let addr = listener.local_addr().expect("Listener has no address");
    tokio::spawn(async move {
        if let Err(err) = serve(listener, AppState::new(BatchRegistry::default())).await {
            error!("Mock service failed: {err}");
        }
    });

    format!("http://{addr}")
}

/// An address nothing is listening on.
#[allow(unused)]
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    listener.local_addr().expect("Listener has no address")
}

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use shipyard::config::Config;
use shipyard::git::GitCli;
use shipyard::provision::{Coordinator, ProvisionQueue};
use shipyard::registry::ProjectRegistry;
use shipyard::store::memory::MemoryStore;
use shipyard::store::postgres::PgStore;
use shipyard::store::{self, AppState, BindingStore, PackageStore, ProjectStore};

type Stores = (
    Arc<dyn ProjectStore>,
    Arc<dyn BindingStore>,
    Arc<dyn PackageStore>,
);

fn split<S>(store: Arc<S>) -> Stores
where
    S: ProjectStore + BindingStore + PackageStore + 'static,
{
    (store.clone(), store.clone(), store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("SHIPYARD_LOG").unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().json())
        .init();

    let cfg = Config::load();

    let (projects, bindings, packages): Stores = if let Some(url) = &cfg.database_url {
        let pool = store::pool::connect(url).await?;
        split(Arc::new(PgStore::new(pool)))
    } else {
        tracing::warn!("DATABASE_URL not set, using in-memory store (data is lost on exit)");
        split(Arc::new(MemoryStore::new()))
    };

    let registry = Arc::new(ProjectRegistry::new(projects));

    // Background provisioning
    let gateway = Arc::new(GitCli::new(
        cfg.git_bin.clone(),
        cfg.default_branch.clone(),
        cfg.git_timeout,
    ));
    let coordinator = Arc::new(Coordinator::new(
        registry.clone(),
        gateway,
        cfg.repository_path.clone(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let provisioner = ProvisionQueue::spawn(coordinator, shutdown_rx);

    let state = AppState {
        registry,
        bindings,
        packages,
        provisioner,
        config: Arc::new(cfg.clone()),
    };

    let app = shipyard::router(state);

    let addr: SocketAddr = cfg.listen.parse()?;
    tracing::info!(
        %addr,
        repository_path = %cfg.repository_path.display(),
        "starting shipyard"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(());
    tracing::info!("shipyard stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

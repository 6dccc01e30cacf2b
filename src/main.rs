use std::sync::Arc;

use chrono::Local;
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

mod config;
mod ddns;
mod resolve;
mod server;

struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.6f"))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_timer(LocalTime).init();

    let config_path = config::UDConfig::default_path().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to locate configuration file");
        std::process::exit(1);
    });

    let config = config::UDConfig::load_from_path(&config_path).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = %config_path.display(), "Failed to load configuration file");
        std::process::exit(1);
    });

    let resolver = resolve::HickoryResolver::from_system_conf().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to read system resolver configuration");
        std::process::exit(1);
    });

    let app = server::router(server::AppState {
        config_path,
        resolver: Arc::new(resolver),
    });

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, listen = %config.listen, "Failed to bind listener");
            std::process::exit(1);
        });

    tracing::info!(listen = %config.listen, domain = %config.domain, "Starting update-dns service...");

    axum::serve(listener, app).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Service execution failed");
        std::process::exit(1);
    });
}

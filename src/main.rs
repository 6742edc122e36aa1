pub mod config;
pub mod error;
pub mod maven;
pub mod proxy;
pub mod repo;
pub mod util;

use std::sync::Arc;

use axum::Server;
use tracing::info;

use crate::config::ServerConfig;
use crate::proxy::AppState;
use crate::repo::resolver::RepositoryResolver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::load()?;
    let resolver = RepositoryResolver::from_config(&config)?;

    let state = Arc::new(AppState {
        resolver: Arc::new(resolver),
        request_timeout: config.request_timeout,
    });
    let app = proxy::router(state);

    info!(
        "serving Maven repository proxy on {} with {} remote repository(ies), local repository at {}",
        config.listen,
        config.remote_repositories.len(),
        config.local_repository.display(),
    );

    Server::bind(&config.listen)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

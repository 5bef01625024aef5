use chronicle_common::{pagination::Paginator, util::PositiveDuration};
use chronicle_db::{client::DbClient, store::DbError};
use serde::Deserialize;
use server::{ServerState, Settings};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
};
use thiserror::Error;
use time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: String,
    #[serde(default = "default_database_max_connections")]
    database_max_connections: u32,
    #[serde(default = "default_page_size")]
    page_size: NonZeroU32,
    token_lifetime_seconds: Option<NonZeroU32>,
}

fn default_database_max_connections() -> u32 {
    5
}

fn default_page_size() -> NonZeroU32 {
    chronicle_common::pagination::DEFAULT_PAGE_SIZE
}

impl Env {
    fn settings(&self) -> Settings {
        Settings {
            paginator: Paginator::new(self.page_size),
            token_lifetime: self
                .token_lifetime_seconds
                .and_then(|seconds| PositiveDuration::new(Duration::seconds(seconds.get().into()))),
        }
    }
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "chronicle_api=debug,\
                chronicle_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();

    let cancel = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                cancel.cancel();
            }
            Err(err) => error!(%err, "Unable to listen for Ctrl-C"),
        }
    });

    token
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let db_client = DbClient::connect(&env.database_url, env.database_max_connections).await?;
    db_client.migrate().await?;

    let state = ServerState {
        store: Arc::new(db_client),
        settings: env.settings(),
    };
    let app = server::app(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_token().cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}

// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::Context;
use axum::http::HeaderName;
use clap::Parser;
use server::config::{Cli, Command};
use server::{auth, database, routes};
use std::net::SocketAddr;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let db_pool = match database::establish_connection_pool(&cli.database_url).await {
        Ok(pool) => {
            tracing::info!("Database connection was made successfully.");
            pool
        }
        Err(e) => {
            tracing::error!("Failed to connect with the database: {:?}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Command::Serve { listen } => serve(db_pool, listen).await,
        Command::CreateUser { username, admin } => {
            let mut conn = db_pool.acquire().await?;
            let (identity, token) = auth::provision_user(&mut conn, &username, admin)
                .await
                .context("Failed to create user")?;
            println!("user_id: {}", identity.user_id);
            println!("token:   {token}");
            Ok(())
        }
    }
}

async fn serve(db_pool: sqlx::SqlitePool, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("Starting up the server...");

    let app_routes = routes::create_router(db_pool);

    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("authorization"),
        ])
        .allow_origin(Any);

    let app = app_routes.layer(cors); // Apply the CORS layer

    tracing::info!("The server listens on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("Shutdown requested.");
}

// ABOUTME: Larder server binary and admin command-line interface
// ABOUTME: Serves the HTTP API and provisions spaces, users, recipes and tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

//! Usage:
//! ```bash
//! # Start the HTTP server
//! larder serve --port 8081
//!
//! # Provision a space and a user, then mint a bearer token
//! larder create-space "Home"
//! larder create-user --space <space-id> alice --display-name "Alice"
//! larder token <user-id>
//!
//! # Load a recipe from a JSON document
//! larder import-recipe --user <user-id> pancakes.json
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use larder::{
    auth::AuthManager,
    config::ServerConfig,
    database::Database,
    import::{import_recipe, RecipeDocument},
    logging,
    resources::ServerResources,
    routes::build_router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "larder",
    about = "Larder recipe shopping-list service",
    long_about = "Serve the Larder HTTP API or run administrative commands against its database."
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Database URL override
    #[arg(long, global = true)]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Port override
        #[arg(long)]
        port: Option<u16>,
    },

    /// Create a space
    CreateSpace {
        /// Space name
        name: String,
    },

    /// Create a user inside a space
    CreateUser {
        /// Space ID
        #[arg(long)]
        space: Uuid,

        /// Login name
        username: String,

        /// Display name
        #[arg(long)]
        display_name: Option<String>,
    },

    /// Print a bearer token for a user
    Token {
        /// User ID
        user_id: Uuid,
    },

    /// Import a recipe from a JSON document
    ImportRecipe {
        /// Author's user ID
        #[arg(long)]
        user: Uuid,

        /// Path to the recipe document
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(url) = &args.database_url {
        config.database_url = larder::config::DatabaseUrl::parse_url(url);
    }
    info!("{}", config.summary());

    let database = Database::new(&config.database_url).await?;

    match args.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.http_port = port;
            }
            serve(database, config).await
        }
        Command::CreateSpace { name } => {
            let space = database.users().create_space(&name).await?;
            println!("{}", space.id);
            Ok(())
        }
        Command::CreateUser {
            space,
            username,
            display_name,
        } => {
            let user = database
                .users()
                .create_user(space, &username, display_name.as_deref())
                .await?;
            println!("{}", user.id);
            Ok(())
        }
        Command::Token { user_id } => {
            let user = database
                .users()
                .get_user(user_id)
                .await?
                .ok_or_else(|| anyhow!("User {user_id} not found"))?;
            let token = AuthManager::from_config(&config.auth).generate_token(&user)?;
            println!("{token}");
            Ok(())
        }
        Command::ImportRecipe { user, file } => {
            let author = database
                .users()
                .get_user(user)
                .await?
                .ok_or_else(|| anyhow!("User {user} not found"))?;
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let document: RecipeDocument = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid recipe document {}", file.display()))?;
            let recipe = import_recipe(&database, &author, &document).await?;
            println!("{}", recipe.id);
            Ok(())
        }
    }
}

async fn serve(database: Database, config: ServerConfig) -> Result<()> {
    let port = config.http_port;
    let auth_manager = AuthManager::from_config(&config.auth);
    let resources = Arc::new(ServerResources::new(
        database,
        auth_manager,
        Arc::new(config),
    ));
    let app = build_router(resources);

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    info!(port, "Larder HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Larder stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

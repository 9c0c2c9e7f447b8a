// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use clap::{Parser, Subcommand};
use std::net::SocketAddr;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://database/sqlite.db";

#[derive(Debug, Parser)]
#[command(name = "server", version, about = "Multi-user task management API")]
pub struct Cli {
    /// SQLite database URL. The file is created on first use.
    #[arg(long, global = true, default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API.
    Serve {
        /// Where the HTTP API will listen, e.g. 127.0.0.1:8080
        #[arg(long, default_value = "0.0.0.0:3000")]
        listen: SocketAddr,
    },
    /// Create a user and print its API token. The token is shown only once.
    CreateUser {
        #[arg(long)]
        username: String,

        /// Grant administrator rights (needed to manage categories).
        #[arg(long, default_value_t = false)]
        admin: bool,
    },
}

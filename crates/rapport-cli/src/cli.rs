use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rapport",
    about = "Rapport: friendship requests and friend lists over a JSONL ledger",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every ledger-backed command.
#[derive(Args, Clone, Debug)]
pub struct StoreArgs {
    /// Path to the ledger JSONL (overrides the config file)
    #[arg(long)]
    pub store: Option<String>,

    /// Path to the TOML config
    #[arg(long, default_value = "rapport.toml")]
    pub config: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage friend requests and friendships
    Friend {
        #[command(subcommand)]
        command: FriendCommands,
    },

    /// Manage user profiles in the directory
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Serve the ledger over HTTP
    Serve {
        /// Bind address (overrides the config file)
        #[arg(long)]
        bind: Option<String>,

        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum FriendCommands {
    /// List accepted friends
    List {
        /// Acting user ID
        #[arg(long = "as")]
        acting: String,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Search accepted friends by name or email
    Search {
        /// Case-insensitive substring
        query: String,

        /// Acting user ID
        #[arg(long = "as")]
        acting: String,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Send a friend request
    Request {
        /// Receiver user ID
        receiver: String,

        /// Acting user ID
        #[arg(long = "as")]
        acting: String,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Cancel a pending request in either direction
    Cancel {
        /// Other party's user ID
        receiver: String,

        /// Acting user ID
        #[arg(long = "as")]
        acting: String,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Accept a request sent to the acting user
    Accept {
        /// Sender user ID
        sender: String,

        /// Acting user ID
        #[arg(long = "as")]
        acting: String,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Remove an accepted friend
    Remove {
        /// Friend user ID
        friend: String,

        /// Acting user ID
        #[arg(long = "as")]
        acting: String,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Show the relationship status with another user
    Status {
        /// Other party's user ID
        friend: String,

        /// Acting user ID
        #[arg(long = "as")]
        acting: String,

        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum UserCommands {
    /// Add or replace a user profile
    Add {
        /// User ID
        id: String,

        /// Display name
        #[arg(long)]
        name: String,

        /// Email address
        #[arg(long)]
        email: String,

        /// Avatar URL
        #[arg(long, default_value = "")]
        avatar: String,

        /// Stored credential hash; never shown to other users
        #[arg(long, default_value = "")]
        password: String,

        #[command(flatten)]
        store: StoreArgs,
    },
}

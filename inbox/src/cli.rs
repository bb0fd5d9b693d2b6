use clap::{Parser, Subcommand};

use crate::filter::ReadFilter;

/// Alumni network notification inbox client
#[derive(Parser)]
#[command(name = "inbox", version, about)]
pub struct Cli {
    /// Notification store base URL (overrides INBOX_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Bearer token (overrides INBOX_API_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List notifications
    List {
        /// Only this notification type, e.g. connection_request
        #[arg(long = "type")]
        kind: Option<String>,
        /// all, unread or read
        #[arg(long, default_value = "all")]
        status: ReadFilter,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
    },

    /// Print the unread count
    Count,

    /// Mark one notification as read
    Read { id: String },

    /// Mark every notification as read
    ReadAll,

    /// Delete one notification
    Delete { id: String },

    /// Delete every notification
    Clear,

    /// Keep the inbox and badge in sync and print changes until Ctrl-C
    Watch {
        /// Polling period in seconds (overrides INBOX_POLL_INTERVAL_SECS)
        #[arg(long)]
        interval: Option<u64>,
    },
}

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use pocketfriend_core::deals::SortMode;

#[derive(Parser)]
#[command(name = "pocketfriend")]
#[command(about = "Browse restaurant deals, favorites and notifications from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// CLI profile name for backend and auth configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List deals, filtered by category and sorted
    Deals {
        /// Category tag (pizza, burgers, kebabs, ...) or "all"
        #[arg(short, long, default_value = "all")]
        category: String,
        /// Sort order
        #[arg(short, long, value_enum, default_value_t = SortArg::None)]
        sort: SortArg,
        /// Only deals whose text or keywords contain this (case-insensitive)
        #[arg(short, long)]
        query: Option<String>,
        /// Use the built-in demo catalog instead of live deals
        #[arg(long)]
        demo: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage favorite deals
    Favorites {
        #[command(subcommand)]
        command: FavoritesCommands,
    },
    /// Read in-app notifications
    Notifications {
        #[command(subcommand)]
        command: NotificationsCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Authenticate CLI profile with Supabase
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SortArg {
    None,
    Affinity,
    Popularity,
    Distance,
    Discount,
}

impl From<SortArg> for SortMode {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::None => Self::None,
            SortArg::Affinity => Self::PersonalAffinity,
            SortArg::Popularity => Self::Popularity,
            SortArg::Distance => Self::Distance,
            SortArg::Discount => Self::Discount,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

impl From<CompletionShell> for Shell {
    fn from(value: CompletionShell) -> Self {
        match value {
            CompletionShell::Bash => Self::Bash,
            CompletionShell::Zsh => Self::Zsh,
            CompletionShell::Fish => Self::Fish,
        }
    }
}

#[derive(Subcommand)]
pub enum FavoritesCommands {
    /// List saved deals
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a deal, or remove it if already saved
    Toggle {
        /// Deal ID
        deal_id: String,
    },
}

#[derive(Subcommand)]
pub enum NotificationsCommands {
    /// List notifications, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a notification as read
    Read {
        /// Notification ID
        id: String,
    },
    /// Print new notifications as they arrive (Ctrl-C to stop)
    Watch,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Show the resolved profile config
    Show {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Login with Supabase email/password and store session in keychain
    Login {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Create an account and its profile row
    Signup {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
        /// Full name shown on the profile
        #[arg(long, value_name = "NAME")]
        name: String,
    },
    /// Show auth status for profile
    Status {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
    /// Logout profile and clear stored session
    Logout {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}

use clap::Subcommand;

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Initialize the server (create database, admin token and hook secret)
    Init {
        /// Data directory for database and repositories
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },

    /// Manage principals
    Principal {
        #[command(subcommand)]
        command: PrincipalCommands,
    },

    /// Grant permissions on a space and everything below it
    Grant {
        /// Data directory for database and repositories
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Principal uid
        #[arg(long)]
        principal: String,

        /// Space path, e.g. team-a/proj
        #[arg(long)]
        space: String,

        /// Permissions to allow (e.g. repo:push)
        #[arg(long, value_delimiter = ',')]
        allow: Vec<String>,

        /// Permissions to deny
        #[arg(long, value_delimiter = ',')]
        deny: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum PrincipalCommands {
    /// Add a principal and issue it a token
    Add {
        /// Data directory for database and repositories
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Unique identifier of the principal
        #[arg(long)]
        uid: Option<String>,

        /// Display name, defaults to the uid
        #[arg(long)]
        display_name: Option<String>,

        /// Skip interactive prompts (requires --uid)
        #[arg(long)]
        non_interactive: bool,
    },
}

/// Server-side git hooks. Installed into every repository; not meant to be
/// run by hand.
#[derive(Subcommand)]
pub enum HookCommands {
    /// Authorize all ref updates of a push at once
    PreReceive,

    /// Authorize a single ref update
    Update {
        ref_name: String,
        old_sha: String,
        new_sha: String,
    },

    /// Report a completed push
    PostReceive,
}

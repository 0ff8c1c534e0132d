//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use marginalia_core::{config, logging};

mod commands;

#[derive(Parser)]
#[command(name = "marginalia")]
#[command(version = "0.1")]
#[command(about = "Branching conversations with inline selection threads")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Manage stored conversations
    Conversations {
        #[command(subcommand)]
        command: ConversationCommands,
    },
    /// Add, delete and check out messages
    Messages {
        #[command(subcommand)]
        command: MessageCommands,
    },
    /// Manage selection threads
    Threads {
        #[command(subcommand)]
        command: ThreadCommands,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConversationCommands {
    /// Lists stored conversations
    List,
    /// Creates an empty conversation and prints its id
    New {
        /// Optional title
        #[arg(long)]
        title: Option<String>,
    },
    /// Shows the active chain of a conversation
    Show {
        #[arg(value_name = "CONVERSATION_ID")]
        conversation: String,
    },
}

#[derive(clap::Subcommand)]
enum MessageCommands {
    /// Appends a message (to the current node unless --parent is given)
    Add {
        #[arg(value_name = "CONVERSATION_ID")]
        conversation: String,
        /// Message text
        #[arg(value_name = "TEXT")]
        text: String,
        /// Author role (user, assistant, system)
        #[arg(long, default_value = "user")]
        role: String,
        /// Parent message id; starts a new branch when it is not the current node
        #[arg(long, value_name = "MESSAGE_ID")]
        parent: Option<String>,
    },
    /// Deletes a message, reattaching its children to its parent
    Delete {
        #[arg(value_name = "CONVERSATION_ID")]
        conversation: String,
        #[arg(value_name = "MESSAGE_ID")]
        message: String,
    },
    /// Makes a message the current node (switches branch)
    Checkout {
        #[arg(value_name = "CONVERSATION_ID")]
        conversation: String,
        #[arg(value_name = "MESSAGE_ID")]
        message: String,
    },
}

#[derive(clap::Subcommand)]
enum ThreadCommands {
    /// Lists the threads of a conversation
    List {
        #[arg(value_name = "CONVERSATION_ID")]
        conversation: String,
    },
    /// Starts a thread on selected text
    Create {
        #[arg(value_name = "CONVERSATION_ID")]
        conversation: String,
        /// Message that contains the selection
        #[arg(value_name = "MESSAGE_ID")]
        anchor: String,
        /// Selected text, matched literally
        #[arg(value_name = "SELECTION")]
        selection: String,
        /// Byte offset of the selection; picks the closest occurrence
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// First thread message; without it the thread is discarded as a draft
        #[arg(long, value_name = "TEXT")]
        message: Option<String>,
    },
    /// Appends a message to a thread
    Reply {
        #[arg(value_name = "CONVERSATION_ID")]
        conversation: String,
        #[arg(value_name = "THREAD_ID")]
        thread: String,
        #[arg(value_name = "TEXT")]
        text: String,
        /// Author role (user, assistant, system)
        #[arg(long, default_value = "user")]
        role: String,
    },
    /// Shows the messages of a thread
    Show {
        #[arg(value_name = "CONVERSATION_ID")]
        conversation: String,
        #[arg(value_name = "THREAD_ID")]
        thread: String,
    },
    /// Deletes a thread and all of its messages
    Delete {
        #[arg(value_name = "CONVERSATION_ID")]
        conversation: String,
        #[arg(value_name = "THREAD_ID")]
        thread: String,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = config::Config::load().context("load config")?;
    let _log_guard = logging::init(&config).context("init logging")?;

    match cli.command {
        Commands::Conversations { command } => match command {
            ConversationCommands::List => commands::conversations::list(),
            ConversationCommands::New { title } => commands::conversations::new(title),
            ConversationCommands::Show { conversation } => {
                commands::conversations::show(&conversation, &config).await
            }
        },

        Commands::Messages { command } => match command {
            MessageCommands::Add {
                conversation,
                text,
                role,
                parent,
            } => commands::messages::add(&conversation, &text, &role, parent.as_deref(), &config),
            MessageCommands::Delete {
                conversation,
                message,
            } => commands::messages::delete(&conversation, &message, &config),
            MessageCommands::Checkout {
                conversation,
                message,
            } => commands::messages::checkout(&conversation, &message, &config),
        },

        Commands::Threads { command } => match command {
            ThreadCommands::List { conversation } => {
                commands::threads::list(&conversation, &config)
            }
            ThreadCommands::Create {
                conversation,
                anchor,
                selection,
                offset,
                message,
            } => commands::threads::create(commands::threads::CreateOptions {
                conversation: &conversation,
                anchor: &anchor,
                selection: &selection,
                offset,
                message: message.as_deref(),
                config: &config,
            }),
            ThreadCommands::Reply {
                conversation,
                thread,
                text,
                role,
            } => commands::threads::reply(&conversation, &thread, &text, &role, &config),
            ThreadCommands::Show {
                conversation,
                thread,
            } => commands::threads::show(&conversation, &thread, &config),
            ThreadCommands::Delete {
                conversation,
                thread,
            } => commands::threads::delete(&conversation, &thread, &config),
        },

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};

use clap::Parser;
use medassist::prelude::*;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "medassist", about = "Ask the MedAssist medical assistant from a terminal", version)]
struct Cli {
    /// Backend root URL
    #[arg(long, env = "MEDASSIST_API_URL")]
    api_url: Option<String>,

    /// The URL the browser landed on after login (contains `#token=...`)
    #[arg(long)]
    callback_url: Option<String>,

    /// Token file [default: platform data directory]
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Sign in with Google, or finish signing in with --callback-url
    Login,
    /// Show the signed-in user
    Whoami,
    /// Check that the backend is up
    Health,
    /// List saved conversations
    Conversations,
    /// Print a conversation's messages
    Messages { id: i64 },
    /// Start a new conversation
    New { title: Option<String> },
    /// Delete a conversation
    Delete { id: i64 },
    /// Ask a question
    Ask {
        text: String,
        /// Continue this conversation
        #[arg(long)]
        conversation: Option<i64>,
    },
    /// Identify a medicine from a photo
    Identify {
        image: PathBuf,
        #[arg(long)]
        question: Option<String>,
        /// Continue this conversation
        #[arg(long)]
        conversation: Option<i64>,
    },
    /// Sign out
    Logout,
}

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

/// A terminal can't open pages: "navigating" prints the URL for the user
/// to open, and the launch URL is whatever `--callback-url` says.
struct TerminalNavigator {
    current: Mutex<Option<String>>,
}

impl TerminalNavigator {
    fn new(callback_url: Option<String>) -> Self {
        Self {
            current: Mutex::new(callback_url),
        }
    }
}

impl Navigator for TerminalNavigator {
    fn current_url(&self) -> Option<String> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace_url(&self, url: &str) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(url.to_string());
    }

    fn navigate(&self, url: &str) {
        println!("Open this page in a browser to sign in:\n\n    {url}\n");
        println!("Then copy the address you land on and run:\n");
        println!("    medassist --callback-url '<that address>' login");
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn run(client: &MedAssistClient, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    let api = client.api();
    match command {
        Commands::Login => match client.user().await {
            Some(user) => println!("Signed in as {}", user.display_name()),
            None => client.login(),
        },
        Commands::Whoami => match client.user().await {
            Some(user) => {
                println!("{} (id {})", user.display_name(), user.id);
                if let Some(email) = user.email {
                    println!("{email}");
                }
            }
            None => println!("Not signed in"),
        },
        Commands::Health => {
            let health = api.health().await?;
            println!("{}", health.status);
        }
        Commands::Conversations => {
            for conversation in api.list_conversations().await? {
                println!(
                    "{:>6}  {}  {}",
                    conversation.id, conversation.updated_at, conversation.title
                );
            }
        }
        Commands::Messages { id } => {
            for message in api.conversation_messages(ConversationId(id)).await? {
                println!("[{}] {}\n", message.role, message.content);
            }
        }
        Commands::New { title } => {
            let conversation = api.create_conversation(title.as_deref()).await?;
            println!("{}  {}", conversation.id, conversation.title);
        }
        Commands::Delete { id } => {
            api.delete_conversation(ConversationId(id)).await?;
            println!("Deleted conversation {id}");
        }
        Commands::Ask { text, conversation } => {
            let mut request = ChatRequest::new(text);
            if let Some(id) = conversation {
                request = request.in_conversation(ConversationId(id));
            }
            print_reply(&api.ask(&request).await?);
        }
        Commands::Identify {
            image,
            question,
            conversation,
        } => {
            let data = tokio::fs::read(&image).await?;
            let filename = image
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            let mut request = IdentifyRequest::new(ImageUpload::from_filename(filename, data));
            if let Some(question) = question {
                request = request.question(question);
            }
            if let Some(id) = conversation {
                request = request.in_conversation(ConversationId(id));
            }
            print_reply(&api.identify(request).await?);
        }
        Commands::Logout => {
            client.logout().await;
            println!("Signed out");
        }
    }
    Ok(())
}

fn print_reply(reply: &ChatReply) {
    println!("{}\n\n(conversation {})", reply.reply, reply.conversation_id);
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log);

    let mut builder = MedAssistClient::builder()
        .navigator(Arc::new(TerminalNavigator::new(cli.callback_url)));
    if let Some(url) = cli.api_url {
        builder = builder.api_url(url);
    }
    if let Some(path) = cli.token_file {
        builder = builder.token_file(path);
    }
    let client = match builder.build() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let snapshot = client.initialize().await;
    tracing::debug!(authenticated = snapshot.authenticated, "session ready");

    match run(&client, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if matches!(e.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)) {
                eprintln!("hint: run `medassist login` first");
            }
            ExitCode::FAILURE
        }
    }
}

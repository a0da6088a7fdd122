mod telemetry;
mod tui;

use std::io::{self, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use parley_api::{ChatClient, ProfileUpdate, RegisterRequest};
use parley_app::{Config, KEYRING_SERVICE};
use parley_auth::AuthManager;
use parley_core::SearchWorker;
use parley_db::Store;
use parley_realtime::RealtimeClient;

use crate::tui::app::App;

#[derive(Parser)]
#[command(name = "parley", version, about = "Terminal chat client")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Chat server base url. Overrides PARLEY_SERVER and config.toml.
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,

    /// Shorthand for `parley chat <CHANNEL>`.
    channel: Option<i64>,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and remember the access token.
    Login {
        #[arg(long)]
        username: Option<String>,
    },
    /// Create an account. Log in afterwards.
    Register {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored access token.
    Logout,
    /// List channels.
    Channels,
    /// Create a channel.
    CreateChannel {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Mark every mention as read.
    MarkRead,
    /// Mark the mention in one message as unread.
    MarkUnread { message_id: i64 },
    /// Update avatar url or bio.
    Profile {
        #[arg(long)]
        avatar_url: Option<String>,
        #[arg(long)]
        bio: Option<String>,
    },
    /// Open the chat UI for a channel.
    Chat { channel_id: i64 },
}

struct Context {
    config: Config,
    client: ChatClient,
    auth: AuthManager,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let _ = dotenvy::dotenv();

    // Install a panic hook that restores the terminal before printing the
    // panic message, so the user isn't left with a broken terminal.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tui::restore_terminal();
        default_hook(info);
    }));

    let config = Config::load()?;
    let log_guard = telemetry::init(&config.log_level, &parley_app::log_file_path()?)?;

    let command = match (cli.command, cli.channel) {
        (Some(command), _) => command,
        (None, Some(channel_id)) => Command::Chat { channel_id },
        (None, None) => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            return Ok(());
        }
    };

    let server = config.server_url(cli.server.as_deref());
    let store = Arc::new(Mutex::new(Store::open(parley_app::store_db_path()?)?));
    let context = Context {
        client: ChatClient::new(&server)?,
        auth: AuthManager::new(KEYRING_SERVICE, store),
        config,
    };
    tracing::debug!(server = %context.client.base_url(), "starting");

    if let Err(err) = run(command, &context).await {
        report(err.as_ref());
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Command, context: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let client = &context.client;
    match command {
        Command::Login { username } => {
            let username = match username {
                Some(username) => username,
                None => prompt_line("Username: ")?,
            };
            let password = rpassword::prompt_password("Password: ")?;
            let session = context.auth.login(client, &username, &password).await?;
            println!(
                "Logged in to {} as {}",
                session.server_url,
                session.username.as_deref().unwrap_or(&username)
            );
        }
        Command::Register { username, email } => {
            let username = match username {
                Some(username) => username,
                None => prompt_line("Username: ")?,
            };
            let email = match email {
                Some(email) => email,
                None => prompt_line("Email: ")?,
            };
            let password = rpassword::prompt_password("Password: ")?;
            let response = client
                .register(&RegisterRequest {
                    username,
                    email,
                    password,
                })
                .await?;
            println!(
                "{}",
                response
                    .message
                    .as_deref()
                    .unwrap_or("Registration successful")
            );
            println!("Run `parley login` to sign in.");
        }
        Command::Logout => {
            if context.auth.logout(client.base_url())? {
                println!("Logged out of {}", client.base_url());
            } else {
                println!("Not logged in to {}", client.base_url());
            }
        }
        Command::Channels => {
            let client = context.auth.authorize(client)?;
            for channel in client.list_channels().await? {
                match channel.description.as_deref().filter(|d| !d.is_empty()) {
                    Some(description) => {
                        println!("{:>5}  #{}  {}", channel.id, channel.name, description)
                    }
                    None => println!("{:>5}  #{}", channel.id, channel.name),
                }
            }
        }
        Command::CreateChannel { name, description } => {
            let client = context.auth.authorize(client)?;
            let channel = client
                .create_channel(&name, description.as_deref())
                .await?;
            println!("Created #{} ({})", channel.name, channel.id);
        }
        Command::MarkRead => {
            let client = context.auth.authorize(client)?;
            let marked = client.mark_all_mentions_read().await?;
            println!("{} ({})", marked.message, marked.count);
        }
        Command::MarkUnread { message_id } => {
            let client = context.auth.authorize(client)?;
            let marked = client.mark_mention_unread(message_id).await?;
            println!("{}", marked.message);
        }
        Command::Profile { avatar_url, bio } => {
            if avatar_url.is_none() && bio.is_none() {
                eprintln!("Nothing to update; pass --avatar-url or --bio.");
                return Ok(());
            }
            let client = context.auth.authorize(client)?;
            let updated = client
                .update_profile(&ProfileUpdate { avatar_url, bio })
                .await?;
            println!("{}", updated.message);
        }
        Command::Chat { channel_id } => chat(context, channel_id).await?,
    }
    Ok(())
}

async fn chat(context: &Context, channel_id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let session = context.auth.require_session(context.client.base_url())?;
    let client = context.client.with_token(session.access_token.clone());

    let channel_name = match client.list_channels().await {
        Ok(channels) => channels
            .into_iter()
            .find(|channel| channel.id == channel_id)
            .map(|channel| channel.name),
        Err(err) => {
            tracing::warn!(error = %err, "could not load channel list");
            None
        }
    };

    let realtime = RealtimeClient::connect(client.base_url(), Some(&session.access_token)).await?;
    let worker = SearchWorker::spawn(client);

    let mut app = App::new(
        channel_id,
        session.user_id,
        session.username,
        context.config.notifications.into(),
    );
    app.channel_name = channel_name;

    tui::launch(&mut app, realtime, worker).await
}

/// Prints a failed command the way a user should see it: server rejections
/// verbatim, transport failures as one generic line with details in the log.
fn report(err: &(dyn std::error::Error + 'static)) {
    let api = err.downcast_ref::<parley_api::Error>().or_else(|| {
        match err.downcast_ref::<parley_auth::Error>() {
            Some(parley_auth::Error::Api(api)) => Some(api),
            _ => None,
        }
    });

    match api {
        Some(rejected @ parley_api::Error::Rejected { .. }) => eprintln!("{rejected}"),
        Some(parley_api::Error::Http(http)) => {
            tracing::error!(error = %http, "request failed");
            eprintln!("could not reach the chat server");
        }
        _ => match err.downcast_ref::<parley_auth::Error>() {
            Some(parley_auth::Error::NotLoggedIn(server)) => {
                eprintln!("Not logged in to {server}. Run `parley login` first.");
            }
            _ => match err.downcast_ref::<parley_realtime::Error>() {
                Some(parley_realtime::Error::WebSocket(ws)) => {
                    tracing::error!(error = %ws, "realtime connection failed");
                    eprintln!("could not reach the chat server");
                }
                _ => {
                    tracing::error!(error = %err, "command failed");
                    eprintln!("error: {err}");
                }
            },
        },
    }
}

fn prompt_line(prompt: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(prompt.as_bytes())?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use publications_client::auth::{LoginRequest, RegisterRequest};
use publications_client::{
    ApiClient, ApiError, AppShell, AuthError, AuthService, ClientConfig, ConfigError, CrudError, FileStorage,
    ListQuery, ResourceKind, SessionEvent, StorageError,
};
use publications_client::shell::NavigationError;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Crud(#[from] CrudError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error("not logged in; run `pubctl login` first")]
    NotLoggedIn,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "pubctl", about = "Academic publication management API client")]
struct Cli {
    /// Backend address including the API prefix.
    #[arg(long, env = "PUBLICATIONS_API_BASE_URL")]
    base_url: Option<String>,

    /// File holding the stored session.
    #[arg(long, env = "PUBCTL_STATE_FILE", default_value = ".pubctl-session.json")]
    state_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "PUBCTL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Register(RegisterArgs),
    Logout,
    /// Show the stored user, or ask the backend with --remote.
    Whoami {
        #[arg(long, default_value_t = false)]
        remote: bool,
    },
    Refresh,
    Countries(ResourceCommand),
    Keywords(ResourceCommand),
    #[command(name = "publication-types")]
    PublicationTypes(ResourceCommand),
    /// Run the navigation guard for a page path and print where it lands.
    Route {
        path: String,
    },
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long, env = "PUBCTL_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    role: Option<String>,
    #[arg(long)]
    orcid_id: Option<String>,
}

#[derive(Args, Debug)]
struct ResourceCommand {
    #[command(subcommand)]
    command: ResourceSubcommand,
}

#[derive(Subcommand, Debug)]
enum ResourceSubcommand {
    List(ListArgs),
    Get {
        id: String,
    },
    Create {
        #[arg(long)]
        data: String,
    },
    Update {
        id: String,
        #[arg(long)]
        data: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    per_page: Option<u32>,
    #[arg(long)]
    sort_by: Option<String>,
    #[arg(long, default_value_t = false)]
    desc: bool,
    /// Print the paging envelope instead of just the records.
    #[arg(long, default_value_t = false)]
    with_meta: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = client_config(cli.base_url.as_deref())?;
    let storage = Arc::new(FileStorage::open(&cli.state_file)?);
    let client = ApiClient::connect(config, storage)?;
    let mut events = client.subscribe();
    let mut shell = AppShell::new(&client);

    let result = dispatch(&client, &mut shell, cli.command).await;
    report_session_events(&mut shell, &mut events);
    result
}

fn client_config(base_url: Option<&str>) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = base_url {
        config.base_url = ClientConfig::new(base_url)?.base_url;
    }
    Ok(config)
}

async fn dispatch(client: &ApiClient, shell: &mut AppShell, command: Command) -> Result<(), CliError> {
    let auth = AuthService::new(client.clone());
    match command {
        Command::Login { username, password } => {
            let session = auth.login(&LoginRequest { username, password }).await?;
            eprintln!("logged in as {}", session.user.label());
            Ok(())
        }
        Command::Register(args) => {
            let request = RegisterRequest {
                username: args.username,
                email: args.email,
                password: args.password,
                first_name: args.first_name,
                last_name: args.last_name,
                role: args.role,
                orcid_id: args.orcid_id,
            };
            let response = auth.register(&request).await?;
            if let Some(message) = &response.message {
                eprintln!("{message}");
            }
            print_json(&serde_json::to_value(&response.user)?)
        }
        Command::Logout => {
            auth.logout()?;
            eprintln!("logged out");
            Ok(())
        }
        Command::Whoami { remote } => {
            let user = if remote { Some(auth.current_user().await?) } else { auth.stored_user()? };
            let user = user.ok_or(CliError::NotLoggedIn)?;
            print_json(&serde_json::to_value(&user)?)
        }
        Command::Refresh => {
            auth.refresh().await?;
            eprintln!("access credential refreshed");
            Ok(())
        }
        Command::Countries(resource) => run_resource(client, ResourceKind::Countries, resource).await,
        Command::Keywords(resource) => run_resource(client, ResourceKind::Keywords, resource).await,
        Command::PublicationTypes(resource) => run_resource(client, ResourceKind::PublicationTypes, resource).await,
        Command::Route { path } => {
            let landed = shell.navigate(&path)?;
            println!("{landed}");
            Ok(())
        }
    }
}

async fn run_resource(client: &ApiClient, kind: ResourceKind, resource: ResourceCommand) -> Result<(), CliError> {
    let service = kind.service(client);
    match resource.command {
        ResourceSubcommand::List(args) => {
            let query = ListQuery {
                page: args.page,
                per_page: args.per_page,
                search: args.search,
                sort_by: args.sort_by,
                sort_desc: args.desc,
                extra: Vec::new(),
            };
            if args.with_meta {
                let page = service.get_page(Some(&query)).await?;
                print_json(&serde_json::to_value(&page)?)
            } else {
                let items = service.get_all(Some(&query)).await?;
                print_json(&Value::Array(items))
            }
        }
        ResourceSubcommand::Get { id } => print_json(&service.get_by_id(&id).await?),
        ResourceSubcommand::Create { data } => {
            let body = serde_json::from_str::<Value>(&data)?;
            print_json(&service.create(&body).await?)
        }
        ResourceSubcommand::Update { id, data } => {
            let body = serde_json::from_str::<Value>(&data)?;
            print_json(&service.update(&id, &body).await?)
        }
        ResourceSubcommand::Delete { id } => {
            let confirmation = service.delete(&id).await?;
            print_json(&serde_json::to_value(&confirmation)?)
        }
    }
}

fn report_session_events(shell: &mut AppShell, events: &mut broadcast::Receiver<SessionEvent>) {
    if shell.drain(events) > 0 && shell.last_event() == Some(SessionEvent::Invalidated) {
        eprintln!("session expired; run `pubctl login` to sign in again");
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

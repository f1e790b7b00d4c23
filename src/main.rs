use std::time::Duration;

use anyhow::{Context, Result, bail};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

use blockflow::chat::{ChatClient, ChatSession};
use blockflow::config::{Config, IdentityConfig};
use blockflow::dashboard::{Dashboard, RepoTab};
use blockflow::editor::{RawPoint, list_templates, matches_query, templates_by_category};
use blockflow::error::SubmitError;
use blockflow::forms::{AccessLevel, LoginForm, RepoConfig, SignupForm, Visibility};
use blockflow::identity::{AccountService, FirebaseIdentity, LocalIdentity};
use blockflow::logging::init_logging;
use blockflow::model::BlockKind;
use blockflow::tasks::{TaskBoard, TaskDraft};
use blockflow::views::{RepoOverview, Route, View, ViewSwitcher};
use blockflow::AppContext;

/// How long `place` waits for the stored diagram before giving up.
const HYDRATE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Parser, Debug)]
#[command(author, version, about = "Block diagram editor for visual IoT flows", long_about = None)]
struct Cli {
    /// Configuration file (default: ./blockflow.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<Utf8PathBuf>,

    /// Override the application id
    #[arg(long, global = true)]
    app_id: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List block templates
    Catalog {
        /// Only templates matching this text
        #[arg(short, long)]
        query: Option<String>,
        /// Group by category
        #[arg(long)]
        grouped: bool,
    },
    /// Print the stored diagram as JSON
    Show,
    /// Drop a block onto the diagram and save it
    Place {
        #[arg(value_name = "KIND")]
        kind: BlockKind,
        x: f64,
        y: f64,
    },
    /// Print every diagram update until interrupted
    Watch,
    /// Register an account
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "Select")]
        country: String,
    },
    /// Sign in with username or email
    Login {
        #[arg(long)]
        identifier: String,
        #[arg(long)]
        password: String,
    },
    /// Create a repository
    CreateRepo {
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        public: bool,
        /// Comma-separated handles
        #[arg(long)]
        insiders: Option<String>,
        #[arg(long, default_value = "write")]
        access: AccessLevel,
        /// Id of an existing repository to link
        #[arg(long)]
        connect_to: Option<String>,
        #[arg(long)]
        no_canvas: bool,
        #[arg(long)]
        no_ai_assist: bool,
    },
    /// Show repositories and AI-suggested tasks
    Dashboard {
        /// Show repositories with private access instead of owned ones
        #[arg(long)]
        private: bool,
        /// Filter repositories by name
        #[arg(long)]
        search: Option<String>,
    },
    /// Ask the AI chat endpoint for markup
    Chat {
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
        /// Print the reply without escaping
        #[arg(long)]
        raw: bool,
    },
    /// Show a repository page panel
    Repo {
        #[arg(long, default_value = "canvas")]
        view: View,
        /// File a task on the board (tasks view)
        #[arg(long)]
        new_task: Option<String>,
    },
    /// List site routes
    Routes,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(app_id) = &cli.app_id {
        config.app_id = app_id.clone();
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run(cli.command, config))
}

async fn run(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Catalog { query, grouped } => print_catalog(query.as_deref(), grouped),
        Command::Show => {
            let ctx = AppContext::initialize(config).await?;
            let gateway = ctx.gateway().context("Application context is shut down")?;
            let blocks = gateway.load().await?;
            println!("{}", serde_json::to_string_pretty(&blocks)?);
            Ok(())
        }
        Command::Place { kind, x, y } => place(config, kind, RawPoint::new(x, y)).await,
        Command::Watch => {
            let ctx = AppContext::initialize(config).await?;
            let gateway = ctx.gateway().context("Application context is shut down")?;
            let mut subscription = gateway.subscribe().await?;
            loop {
                tokio::select! {
                    snapshot = subscription.next() => match snapshot {
                        Some(blocks) => println!("{}", serde_json::to_string(&blocks)?),
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            Ok(())
        }
        Command::Signup {
            username,
            email,
            password,
            country,
        } => {
            let form = SignupForm {
                username,
                email,
                password,
                country,
            };
            let service = account_service(&config.identity);
            match form.submit(service.as_ref()).await {
                Ok(session) => {
                    println!(
                        "Signed up as {}. Continue at {}",
                        session.principal,
                        Route::Dashboard
                    );
                    Ok(())
                }
                Err(SubmitError::Invalid(errors)) => {
                    for (_, message) in errors.iter() {
                        eprintln!("  {}", message);
                    }
                    bail!("{}", errors.general().unwrap_or_default())
                }
                Err(err) => Err(err.into()),
            }
        }
        Command::Login {
            identifier,
            password,
        } => {
            let form = LoginForm {
                identifier,
                password,
            };
            let service = account_service(&config.identity);
            match form.submit(service.as_ref()).await {
                Ok(session) => {
                    println!(
                        "Signed in as {}. Continue at {}",
                        session.principal,
                        Route::Dashboard
                    );
                    Ok(())
                }
                Err(SubmitError::Invalid(errors)) => {
                    for (_, message) in errors.iter() {
                        eprintln!("  {}", message);
                    }
                    bail!("{}", errors.general().unwrap_or_default())
                }
                Err(err) => Err(err.into()),
            }
        }
        Command::CreateRepo {
            name,
            description,
            public,
            insiders,
            access,
            connect_to,
            no_canvas,
            no_ai_assist,
        } => {
            let mut repo = RepoConfig {
                name,
                description,
                visibility: if public {
                    Visibility::Public
                } else {
                    Visibility::Private
                },
                access_level: access,
                connect_to,
                enable_2d: !no_canvas,
                ai_assist_2d: !no_ai_assist,
                ..RepoConfig::default()
            };
            if let Some(list) = insiders {
                repo.set_insiders(&list);
            }
            match repo.create() {
                Ok(next) => {
                    println!("Repository created. Continue at {}", next);
                    Ok(())
                }
                Err(errors) => {
                    for (_, message) in errors.iter() {
                        eprintln!("  {}", message);
                    }
                    bail!("{}", errors.general().unwrap_or_default())
                }
            }
        }
        Command::Dashboard { private, search } => {
            let mut dashboard = Dashboard::sample();
            if private {
                dashboard.select_tab(RepoTab::PrivateAccess);
            }
            match search {
                Some(query) => {
                    for repo in dashboard.search_repos(&query) {
                        println!("{}{}", repo.name, if repo.is_private { " 🔒" } else { "" });
                    }
                }
                None => {
                    println!("{}", dashboard.tab().heading());
                    for repo in dashboard.current_repos() {
                        println!("  {}{}", repo.name, if repo.is_private { " 🔒" } else { "" });
                    }
                }
            }
            println!("AI-Suggested Tasks");
            for task in &dashboard.tasks {
                let reward = task.reward_label().map(|r| format!("  [{}]", r)).unwrap_or_default();
                println!("  {} ({}) {}{}", task.title, task.repo, task.status, reward);
            }
            Ok(())
        }
        Command::Chat { prompt, raw } => {
            let mut session = ChatSession::new(ChatClient::new(config.chat.endpoint.clone()));
            if !session.send(&prompt.join(" ")).await? {
                return Ok(());
            }
            if raw {
                println!("{}", session.output().as_raw());
            } else {
                println!("{}", session.output().escaped());
            }
            Ok(())
        }
        Command::Repo { view, new_task } => {
            let mut switcher = ViewSwitcher::new();
            switcher.select(view);
            print_repo_view(switcher.active(), config, new_task).await
        }
        Command::Routes => {
            for route in Route::ALL {
                println!("{}", route);
            }
            Ok(())
        }
    }
}

fn account_service(identity: &IdentityConfig) -> Box<dyn AccountService> {
    match identity {
        IdentityConfig::Local => Box::new(LocalIdentity),
        IdentityConfig::Firebase { api_key, base_url } => {
            let mut service = FirebaseIdentity::new(api_key.clone());
            if let Some(url) = base_url {
                service = service.with_base_url(url.clone());
            }
            Box::new(service)
        }
    }
}

fn print_catalog(query: Option<&str>, grouped: bool) -> Result<()> {
    if grouped {
        for group in templates_by_category() {
            println!("{}", group.category);
            for t in &group.templates {
                println!("  {} {:<12} {}", t.icon, t.display_name, t.id);
            }
        }
        return Ok(());
    }
    for t in list_templates()
        .iter()
        .filter(|t| query.is_none_or(|q| matches_query(t, q)))
    {
        println!("{} {:<12} {:<16} {}", t.icon, t.display_name, t.category, t.id);
    }
    Ok(())
}

async fn place(config: Config, kind: BlockKind, point: RawPoint) -> Result<()> {
    let ctx = AppContext::initialize(config).await?;
    let mut canvas = ctx.open_canvas().await?;
    let hydrated = tokio::time::timeout(HYDRATE_TIMEOUT, canvas.wait_for_update())
        .await
        .context("Timed out waiting for the stored diagram")?;
    if !hydrated {
        bail!("Diagram subscription ended before the diagram loaded");
    }
    // Catch up with writes that landed while hydrating.
    canvas.pump_updates();
    canvas.editor_mut().begin_drag(kind);
    let placed = canvas
        .editor_mut()
        .drop_at(point)
        .cloned()
        .with_context(|| format!("No template for block kind '{}'", kind))?;
    println!(
        "Placed {} {} at ({}, {})",
        placed.name(),
        placed.instance_id,
        placed.position.x,
        placed.position.y
    );
    canvas.save().await?;
    println!("Diagram saved successfully! ({} blocks)", canvas.editor().canvas.len());
    canvas.close();
    Ok(())
}

async fn print_repo_view(view: View, config: Config, new_task: Option<String>) -> Result<()> {
    println!("== {} ==", view.label());
    match view {
        View::Documentation => {
            let repo = RepoOverview::sample();
            println!("{}\n{}\nby {}", repo.name, repo.description, repo.author);
            for file in &repo.files {
                println!("  {} {:<20} {}", file.kind.icon(), file.name, file.size);
            }
        }
        View::Tasks => {
            let mut board = TaskBoard::new();
            if let Some(title) = new_task {
                board.create(TaskDraft {
                    title,
                    ..TaskDraft::default()
                });
            }
            if board.is_empty() {
                println!("No tasks yet.");
            }
            for task in board.tasks() {
                println!(
                    "  [{}] {} ({}) Assigned to: {}",
                    task.draft.status,
                    task.draft.title,
                    task.draft.priority,
                    task.draft.assigned_to.label()
                );
            }
        }
        View::Canvas => {
            let ctx = AppContext::initialize(config).await?;
            let mut canvas = ctx.open_canvas().await?;
            let hydrated = tokio::time::timeout(HYDRATE_TIMEOUT, canvas.wait_for_update()).await;
            if !matches!(hydrated, Ok(true)) {
                bail!("Could not load the stored diagram");
            }
            for block in canvas.editor().canvas.current() {
                println!(
                    "  {} {:<12} ({}, {}) {}",
                    block.template.icon,
                    block.name(),
                    block.position.x,
                    block.position.y,
                    block.instance_id
                );
            }
            canvas.close();
        }
    }
    Ok(())
}

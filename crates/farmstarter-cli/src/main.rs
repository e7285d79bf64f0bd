//! FARM Starter CLI - a terminal client for the FARM Starter API.
//!
//! Each command names a page of the client. Pages are resolved through the
//! same route table and guard the library exposes, so protected pages send
//! signed-out users to sign-in instead of rendering.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use farmstarter_core::api::{ApiClient, AuthApi};
use farmstarter_core::auth::SessionManager;
use farmstarter_core::config::{Config, API_URL_ENV};
use farmstarter_core::forms::{validate_registration, validate_sign_in};
use farmstarter_core::models::User;
use farmstarter_core::routes::{Resolution, RouteGuard, RouteTable, View};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable naming a directory for rolling log files
const LOG_DIR_ENV: &str = "FARMSTARTER_LOG_DIR";

const PASSWORD_ENV: &str = "FARMSTARTER_PASSWORD";

#[derive(Parser)]
#[command(name = "farmstarter", version, about = "Terminal client for the FARM Starter API")]
struct Cli {
    /// API base URL (overrides the config file)
    #[arg(long, global = true, env = API_URL_ENV)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the home page
    Home,
    /// Show the about page
    About,
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign in and store the access token
    Signin {
        #[arg(long)]
        email: Option<String>,
        #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign out on the server and forget the access token
    Signout,
    /// List users (requires sign-in)
    Dashboard,
    /// Show a user's profile (requires sign-in)
    Profile { user_id: String },
    /// Show who is signed in
    Whoami,
    /// Open any client path, e.g. `/profile/42`
    Open { path: String },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "farmstarter.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing();

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    if let Some(url) = cli.api_url.clone() {
        config.api_url = url;
    }
    info!(api_url = %config.api_url, "Starting");

    let mut app = App::new(config)?;
    if let Err(e) = app.session.initialize().await {
        // Public pages still work without a readable token store
        warn!(error = %e, "Failed to restore session, continuing signed out");
    }
    app.run(cli.command).await
}

struct App {
    config: Config,
    api: Arc<ApiClient>,
    session: SessionManager,
    guard: RouteGuard,
    routes: RouteTable,
}

impl App {
    fn new(config: Config) -> Result<Self> {
        let api = Arc::new(
            ApiClient::with_timeout(&config.api_url, config.request_timeout())
                .context("Failed to create API client")?,
        );
        let store = config.token_store()?;
        let session = SessionManager::new(api.clone(), store);
        let guard = RouteGuard::for_manager(&session);

        Ok(Self {
            config,
            api,
            session,
            guard,
            routes: RouteTable::default(),
        })
    }

    async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Home => self.open("/").await,
            Command::About => self.open("/about").await,
            Command::Dashboard => self.open("/dashboard").await,
            Command::Profile { user_id } => self.open(&format!("/profile/{}", user_id)).await,
            Command::Open { path } => self.open(&path).await,
            Command::Register {
                name,
                email,
                password,
            } => self.register(&name, &email, password).await,
            Command::Signin { email, password } => self.sign_in(email, password).await,
            Command::Signout => self.sign_out().await,
            Command::Whoami => {
                self.whoami().await?;
                Ok(())
            }
        }
    }

    /// Resolve a path through the route table and render the result
    async fn open(&mut self, path: &str) -> Result<()> {
        // An expired token must not pass the guard
        self.session.enforce_expiry().await?;

        match self.guard.resolve(&self.routes, path) {
            Resolution::Render { view, params } => self.render(view, &params).await,
            Resolution::Redirect { to } => {
                println!("Sign in required. Redirecting to {}", to);
                println!("Run `farmstarter signin` to continue.");
                Ok(())
            }
            Resolution::NotFound => {
                render_not_found();
                Ok(())
            }
        }
    }

    async fn render(&mut self, view: View, params: &HashMap<String, String>) -> Result<()> {
        match view {
            View::Home => render_home(),
            View::About => render_about(),
            View::NotFound => render_not_found(),
            View::SignIn => return self.sign_in(None, None).await,
            View::Register => {
                println!("Run `farmstarter register --name <NAME> --email <EMAIL>` to create an account.");
            }
            View::Dashboard => self.render_dashboard().await,
            View::Profile => {
                let user_id = params.get("userId").map(String::as_str).unwrap_or_default();
                self.render_profile(user_id).await;
            }
        }
        Ok(())
    }

    async fn register(&mut self, name: &str, email: &str, password: Option<String>) -> Result<()> {
        let (password, confirm) = match password {
            Some(p) => (p.clone(), p),
            None => (
                prompt_password("Password: ")?,
                prompt_password("Confirm Password: ")?,
            ),
        };

        if let Err(message) = validate_registration(name, email, &password, &confirm) {
            println!("{}", message);
            return Ok(());
        }

        match self.api.register(name.trim(), email.trim(), &password).await {
            Ok(_) => {
                println!("Registration successful. Run `farmstarter signin --email {}`.", email.trim());
                Ok(())
            }
            Err(e) => {
                println!("{}", e.message());
                Ok(())
            }
        }
    }

    async fn sign_in(&mut self, email: Option<String>, password: Option<String>) -> Result<()> {
        let email = match email.or_else(|| self.config.last_email.clone()) {
            Some(email) => email,
            None => prompt("Email: ")?,
        };
        let password = match password {
            Some(p) => p,
            None => prompt_password("Password: ")?,
        };

        if let Err(message) = validate_sign_in(&email, &password) {
            println!("{}", message);
            return Ok(());
        }

        match self.session.login(email.trim(), &password).await {
            Ok(claims) => {
                self.config.last_email = Some(email.trim().to_string());
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
                println!("Sign-in successful! Signed in as {}.", claims.sub);
                Ok(())
            }
            Err(e) => {
                println!("{}", e.message());
                Ok(())
            }
        }
    }

    async fn sign_out(&mut self) -> Result<()> {
        if !self.session.is_authenticated() {
            println!("Not signed in.");
            return Ok(());
        }

        let mut notices = self.session.notices();
        if let Err(e) = self.session.logout().await {
            // Stay signed in; the failure is only logged
            error!(error = %e, "Logout failed");
            return Ok(());
        }

        if let Some(notice) = notices.borrow_and_update().clone() {
            println!("{}", notice.message);
        }

        // Keep the process alive until the deferred reset has run
        let mut sessions = self.session.subscribe();
        sessions
            .wait_for(|s| !s.is_authenticated())
            .await
            .context("Session manager stopped before logout completed")?;
        Ok(())
    }

    async fn whoami(&mut self) -> Result<()> {
        let session = self.session.enforce_expiry().await?;
        match session.claims() {
            Some(claims) => {
                println!("Signed in as {}", claims.str_claim("email").unwrap_or(&claims.sub));
                if let Some(expires) = claims.expires_at() {
                    println!("Session expires {}", expires.format("%Y-%m-%d %H:%M:%S UTC"));
                }
            }
            None => println!("Not signed in."),
        }
        Ok(())
    }

    async fn render_dashboard(&self) {
        let session = self.guard.session();
        let claims = session.claims();

        let users = match self.session.list_users().await {
            Ok(users) => users,
            Err(e) => {
                error!(error = %e, "Failed to load users");
                Vec::new()
            }
        };

        println!("Dashboard");
        println!("=========");
        println!("Total Users: {}", users.len());
        println!("Role:        {}", claims.and_then(|c| c.str_claim("role")).unwrap_or("User"));
        println!(
            "Email:       {}",
            claims
                .and_then(|c| c.str_claim("email").or(Some(c.sub.as_str())))
                .unwrap_or("-")
        );
        println!();
        println!("Manage Users");
        print_user_table(&users);
    }

    async fn render_profile(&self, user_id: &str) {
        if user_id.is_empty() {
            println!("User not authenticated.");
            return;
        }
        match self.session.get_user(user_id).await {
            Ok(user) => print_profile(&user),
            Err(e) => println!("{}", e.message()),
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn render_home() {
    println!("FARM Starter");
    println!();
    println!("  FastAPI Backend        Build high-performance APIs with Python and FastAPI.");
    println!("  Authentication         Secure user authentication with JWT.");
    println!("  CRUD Operations        Manage users with create, read, update and delete endpoints.");
    println!();
    println!("Commands: about, register, signin, dashboard, profile <id>, signout");
}

fn render_about() {
    println!("About FARM Skeleton Starter Pack");
    println!();
    println!("A clean architecture for FastAPI, React, MongoDB and Tailwind CSS,");
    println!("with CRUD operations, authentication and structured routes.");
}

fn render_not_found() {
    println!("404 - Page Not Found");
    println!("Run `farmstarter home` to go home.");
}

/// Column width for user table cells
const NAME_WIDTH: usize = 24;
const EMAIL_WIDTH: usize = 32;

fn print_user_table(users: &[User]) {
    println!("{:<NAME_WIDTH$} {:<EMAIL_WIDTH$} Joined", "Name", "Email");
    for user in users {
        println!(
            "{:<NAME_WIDTH$} {:<EMAIL_WIDTH$} {}",
            user.name,
            user.email,
            user.joined_display()
        );
    }
}

fn print_profile(user: &User) {
    println!("{}", user.name);
    println!("Email:  {}", user.email);
    println!("Joined: {}", user.joined_display());
}

// ============================================================================
// Input
// ============================================================================

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_password(label: &str) -> Result<String> {
    let password = rpassword::prompt_password(label)?;
    Ok(password)
}

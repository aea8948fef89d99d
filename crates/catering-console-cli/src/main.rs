//! Catering console - command-line shell over the session core.
//!
//! Signs in against the catering API, keeps the session on disk between
//! runs, and issues authenticated calls through the same pipeline the
//! browser console uses.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use catering_console_core::models::ChangePasswordRequest;
use catering_console_core::{
    ActivityKind, Admission, AuthContext, Config, Credentials, RouteGuard, SessionEvent,
    SessionMonitor, SessionSignal,
};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Env var holding the login password (skips the prompt)
const PASSWORD_ENV: &str = "CATERING_PASSWORD";

/// Log file prefix inside `<state_dir>/logs`
const LOG_FILE: &str = "catering-console.log";

#[derive(Parser)]
#[command(name = "catering-console", version, about = "Catering contracts console")]
struct Cli {
    /// API base URL (overrides config and CATERING_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the session
    Login {
        #[arg(long, env = "CATERING_EMAIL")]
        email: Option<String>,
    },
    /// Revoke the session and forget it locally
    Logout,
    /// Show who is signed in and when the access token expires
    Status,
    /// Refresh the access token now
    Refresh,
    /// GET an API endpoint and print the JSON response
    Get { endpoint: String },
    /// POST a JSON body to an API endpoint
    Post {
        endpoint: String,
        #[arg(default_value = "{}")]
        body: String,
    },
    /// Show what the route guard would do for a path
    Guard { path: String },
    /// Change the signed-in user's password
    ChangePassword,
    /// Request a password reset email
    ForgotPassword { email: String },
    /// Set a new password with a reset token
    ResetPassword { token: String },
    /// Watch for idle timeout; each line on stdin counts as activity
    Watch,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(state_dir: &Path) {
    // RUST_LOG controls the level (e.g. RUST_LOG=catering_console_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_dir = state_dir.join("logs");
    let file_layer = std::fs::create_dir_all(&log_dir).ok().map(|_| {
        fmt::layer()
            .with_writer(tracing_appender::rolling::daily(&log_dir, LOG_FILE))
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    config.apply_overrides(cli.api_url.clone(), None);
    let state_dir = config.state_dir()?;

    init_tracing(&state_dir);
    info!(state_dir = %state_dir.display(), "Catering console starting");

    if let Command::Guard { path } = &cli.command {
        return guard(path, &state_dir);
    }

    let api_url = config.api_url()?;
    let context = AuthContext::connect(api_url.as_str(), Some(&state_dir))?;

    match cli.command {
        Command::Login { email } => login(&context, &config, email).await,
        Command::Logout => {
            context.logout().await;
            println!("Signed out");
            Ok(())
        }
        Command::Status => status(&context),
        Command::Refresh => {
            require_session(&context)?;
            context
                .refresh_access_token()
                .await
                .context("Session could not be refreshed; sign in again")?;
            status(&context)
        }
        Command::Get { endpoint } => {
            let value: serde_json::Value = context.client().get(&endpoint).await?;
            print_json(&value)
        }
        Command::Post { endpoint, body } => {
            let body: serde_json::Value =
                serde_json::from_str(&body).context("Request body is not valid JSON")?;
            let value: serde_json::Value = context.client().post(&endpoint, &body).await?;
            print_json(&value)
        }
        Command::ChangePassword => change_password(&context).await,
        Command::ForgotPassword { email } => {
            let response = context.client().forgot_password(&email).await?;
            println!("{}", or_default(&response.message, "Reset email requested"));
            Ok(())
        }
        Command::ResetPassword { token } => {
            let new_password = prompt_new_password()?;
            let response = context.client().reset_password(&token, &new_password).await?;
            println!("{}", or_default(&response.message, "Password reset"));
            Ok(())
        }
        Command::Watch => watch(&context, &config).await,
        Command::Guard { .. } => Ok(()),
    }
}

async fn login(context: &AuthContext, config: &Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt_line("Email: ")?,
    };
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password("Password: ")?,
    };

    let account = context.login(&Credentials::new(email.trim(), password)).await?;

    if let Err(e) = Config::remember_email(email.trim()) {
        warn!(error = %e, "Failed to save last email");
    }
    println!("Signed in as {} ({})", account.display_name(), account.company_type);
    Ok(())
}

fn status(context: &AuthContext) -> Result<()> {
    let Some(record) = context.gateway().store().read() else {
        println!("Not signed in");
        return Ok(());
    };

    println!("Account:  {} ({})", record.account.display_name(), record.account.id);
    if record.is_expired() {
        println!("Token:    expired (refreshed on next request)");
    } else {
        println!("Token:    expires in {} min", record.minutes_until_expiry());
    }
    match context.gateway().signal().expires_at() {
        Some(at) => println!("Signal:   present until {}", at.format("%Y-%m-%d %H:%M UTC")),
        None => println!("Signal:   absent"),
    }
    Ok(())
}

fn guard(path: &str, state_dir: &Path) -> Result<()> {
    match RouteGuard::new().admit(path, SessionSignal::probe(state_dir)) {
        Admission::Allow => println!("allow"),
        Admission::Redirect(to) => println!("redirect {}", to),
    }
    Ok(())
}

async fn change_password(context: &AuthContext) -> Result<()> {
    require_session(context)?;
    let old_password = rpassword::prompt_password("Current password: ")?;
    let new_password = prompt_new_password()?;

    let response = context
        .client()
        .change_password(&ChangePasswordRequest {
            old_password,
            password_confirmation: new_password.clone(),
            new_password,
        })
        .await?;
    println!("{}", or_default(&response.message, "Password changed"));
    Ok(())
}

async fn watch(context: &AuthContext, config: &Config) -> Result<()> {
    require_session(context)?;

    let monitor = SessionMonitor::start(config.monitor.to_monitor_config(), context.clone());
    let mut snapshots = monitor.subscribe();
    let mut events = context.gateway().subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("Watching session; press Enter to stay signed in, Ctrl-D to stop");

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim() == "extend" => {
                    if !monitor.extend_session().await {
                        eprintln!("Could not extend the session");
                    }
                }
                Some(_) => monitor.record_activity(ActivityKind::KeyDown),
                None => break,
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.is_timed_out() {
                    println!("Signed out after inactivity");
                    break;
                }
                if snapshot.show_warning() {
                    if snapshot.time_until_logout == 0 {
                        eprint!("\rSession timed out; press Enter to continue   ");
                    } else {
                        eprint!("\rSession expires in {}s   ", snapshot.time_until_logout);
                    }
                    io::stderr().flush()?;
                }
            }
            event = events.recv() => {
                if let Ok(SessionEvent::LoginRequired) = event {
                    println!("Session ended; sign in again");
                    break;
                }
            }
        }
    }

    monitor.stop();
    Ok(())
}

fn require_session(context: &AuthContext) -> Result<()> {
    if !context.is_authenticated() {
        bail!("Not signed in. Run `catering-console login` first.");
    }
    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let line = line.trim().to_string();
    if line.is_empty() {
        bail!("No input given");
    }
    Ok(line)
}

fn prompt_new_password() -> Result<String> {
    let password = rpassword::prompt_password("New password: ")?;
    let confirmation = rpassword::prompt_password("Confirm new password: ")?;
    if password != confirmation {
        bail!("Passwords do not match");
    }
    Ok(password)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn or_default<'a>(message: &'a str, fallback: &'a str) -> &'a str {
    if message.is_empty() {
        fallback
    } else {
        message
    }
}

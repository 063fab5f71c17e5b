//! Running the node: identity resolution, activation and the wait for Ctrl+C.

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password, Select};
use teneo_core::{
    supervise_reconnects, Bootstrap, Config, ConnectionManager, IdentityChoice, StateStore,
    SupervisorExit,
};
use tracing::info;

use super::{CliResult, Context};

pub async fn run(ctx: &Context, user_id: Option<String>) -> CliResult {
    let choice = match user_id {
        Some(id) => IdentityChoice::Manual(id),
        None => IdentityChoice::Stored,
    };
    start(ctx, choice).await
}

pub async fn login(ctx: &Context, email: Option<String>) -> CliResult {
    let email = match email {
        Some(email) => email,
        None => ask_email()?,
    };
    let password = ask_password()?;
    start(ctx, IdentityChoice::Login { email, password }).await
}

/// Menu shown when no subcommand is given.
pub async fn interactive(ctx: &Context) -> CliResult {
    let config = ctx.load_config()?;
    let store = ctx.store()?;
    let bootstrap = ctx.bootstrap(&config, store.clone());
    let theme = ColorfulTheme::default();

    let choice = match bootstrap.stored_identity()? {
        None => {
            let selection = Select::with_theme(&theme)
                .with_prompt("No user ID saved")
                .items(&["Login", "Enter user ID manually"])
                .default(0)
                .interact()?;
            if selection == 0 {
                IdentityChoice::Login {
                    email: ask_email()?,
                    password: ask_password()?,
                }
            } else {
                let user_id: String = Input::with_theme(&theme)
                    .with_prompt("User ID")
                    .interact_text()?;
                IdentityChoice::Manual(user_id)
            }
        }
        Some(identity) => {
            let selection = Select::with_theme(&theme)
                .with_prompt(format!("Stored user ID: {identity}"))
                .items(&["Logout", "Start running node"])
                .default(1)
                .interact()?;
            if selection == 0 {
                bootstrap.logout()?;
                println!("logged out");
                return Ok(());
            }
            IdentityChoice::Stored
        }
    };

    run_node(&config, store, &bootstrap, choice).await
}

async fn start(ctx: &Context, choice: IdentityChoice) -> CliResult {
    let config = ctx.load_config()?;
    let store = ctx.store()?;
    let bootstrap = ctx.bootstrap(&config, store.clone());
    run_node(&config, store, &bootstrap, choice).await
}

async fn run_node(
    config: &Config,
    store: StateStore,
    bootstrap: &Bootstrap,
    choice: IdentityChoice,
) -> CliResult {
    let identity = bootstrap.resolve(choice).await?;
    let manager = ConnectionManager::from_config(config, store);
    bootstrap.activate(&manager, &identity).await?;
    let refresher = bootstrap.start_session_refresh(&identity, config.auth.refresh_interval());
    info!("node running; press Ctrl+C to stop");

    let stopped: CliResult = if config.reconnect.enabled {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => signal.map_err(Into::into),
            exit = supervise_reconnects(&manager, &identity, &config.reconnect) => match exit {
                SupervisorExit::PeerClosed => tokio::signal::ctrl_c().await.map_err(Into::into),
                SupervisorExit::GaveUp => {
                    Err("node connection lost and reconnect limit reached".into())
                }
            },
        }
    } else {
        tokio::signal::ctrl_c().await.map_err(Into::into)
    };

    info!("shutting down");
    if let Some(refresher) = &refresher {
        refresher.stop();
    }
    manager.shutdown().await;
    stopped
}

fn ask_email() -> Result<String, dialoguer::Error> {
    let email: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Email")
        .interact_text()?;
    Ok(email.trim().to_string())
}

fn ask_password() -> Result<String, dialoguer::Error> {
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Password (input hidden)")
        .interact()
}

mod app;
mod notify;
mod render;
mod screens;

use anyhow::Result;
use app::App;
use clap::{Parser, Subcommand};
use colored::*;
use common::{Config, DashboardRoute, Route};
use log::{error, info};
use screens::incidents::IncidentFields;
use screens::services::ServiceFields;
use statuspage_client::StatusBackend;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "statuspage", version, about = "Status pages for your services")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Backend base URL, overrides the config file
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a path such as /status/acme or /dashboard/services
    Open { path: String },
    /// Show an organization's public status page
    Status {
        slug: String,
        /// Print the raw page as JSON
        #[arg(long)]
        json: bool,
    },
    /// Public status page, refreshed until you press q
    Live {
        slug: String,
        /// Seconds between refreshes
        #[arg(long)]
        interval: Option<u64>,
    },
    SignIn {
        #[arg(long)]
        email: Option<String>,
    },
    SignOut,
    /// Create or select an organization
    Setup,
    Overview,
    #[command(subcommand)]
    Services(ServiceCommand),
    #[command(subcommand)]
    Incidents(IncidentCommand),
    /// Check configuration, session file and backend reachability
    Doctor,
}

#[derive(Subcommand, Debug)]
enum ServiceCommand {
    List,
    Show { id: String },
    Add(ServiceFields),
    Edit {
        id: String,
        #[command(flatten)]
        fields: ServiceFields,
    },
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    SetStatus { id: String, status: String },
}

#[derive(Subcommand, Debug)]
enum IncidentCommand {
    List,
    Show { id: String },
    Report(IncidentFields),
    Edit {
        id: String,
        #[command(flatten)]
        fields: IncidentFields,
    },
    Resolve { id: String },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("{} {:#}", "❌ Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::resolve(&path)?;
    config.apply_overrides(cli.api_url.clone(), None);
    config.validate()?;
    info!("using backend {}", config.api.base_url);

    let mut app = App::new(config)?;
    app.bootstrap().await?;

    let Some(command) = cli.command else {
        return screens::landing::menu(&mut app).await;
    };

    match command {
        Command::Open { path } => app.navigate(Route::parse(&path)).await,
        Command::Status { slug, json: true } => screens::public_status::print_json(&app, &slug).await,
        Command::Status { slug, json: false } => app.navigate(Route::PublicStatus { slug }).await,
        Command::Live { slug, interval } => {
            let secs = interval.unwrap_or(app.config.live.refresh_secs).max(1);
            screens::live::run(&app, &slug, Duration::from_secs(secs)).await
        }
        Command::SignIn { email } => {
            if let Some(next) = screens::sign_in::run(&mut app, email).await? {
                app.navigate(next).await?;
            }
            Ok(())
        }
        Command::SignOut => screens::sign_in::sign_out(&mut app).await,
        Command::Setup => screens::setup::switch(&mut app).await,
        Command::Overview => app.navigate(Route::Dashboard(DashboardRoute::Overview)).await,
        Command::Services(command) => services(&mut app, command).await,
        Command::Incidents(command) => incidents(&mut app, command).await,
        Command::Doctor => doctor(&app).await,
    }
}

async fn services(app: &mut App, command: ServiceCommand) -> Result<()> {
    let command = match command {
        ServiceCommand::List => return app.navigate(Route::Dashboard(DashboardRoute::Services)).await,
        ServiceCommand::Show { id } => {
            return app.navigate(Route::Dashboard(DashboardRoute::ServiceDetail { id })).await;
        }
        mutation => mutation,
    };

    let Some(session) = app.require_organization().await? else {
        return Ok(());
    };
    match command {
        ServiceCommand::Add(fields) => screens::services::add(app, &session, &fields).await,
        ServiceCommand::Edit { id, fields } => screens::services::edit(app, &session, &id, &fields).await,
        ServiceCommand::Delete { id, yes } => screens::services::delete(app, &session, &id, yes).await,
        ServiceCommand::SetStatus { id, status } => screens::services::set_status(app, &session, &id, &status).await,
        ServiceCommand::List | ServiceCommand::Show { .. } => Ok(()),
    }
}

async fn incidents(app: &mut App, command: IncidentCommand) -> Result<()> {
    if let IncidentCommand::List = command {
        return app.navigate(Route::Dashboard(DashboardRoute::Incidents)).await;
    }

    let Some(session) = app.require_organization().await? else {
        return Ok(());
    };
    match command {
        IncidentCommand::Show { id } => screens::incidents::show(app, &session, &id).await,
        IncidentCommand::Report(fields) => screens::incidents::report(app, &session, &fields).await,
        IncidentCommand::Edit { id, fields } => screens::incidents::edit(app, &session, &id, &fields).await,
        IncidentCommand::Resolve { id } => screens::incidents::resolve(app, &session, &id).await,
        IncidentCommand::List => Ok(()),
    }
}

async fn doctor(app: &App) -> Result<()> {
    println!("\n{}", "StatusPage Doctor".bright_cyan().bold());
    println!("  {:16} {}", "Backend:".bright_cyan(), app.config.api.base_url);
    println!("  {:16} {}s", "Timeout:".bright_cyan(), app.config.api.timeout_secs);
    println!("  {:16} {}", "Session file:".bright_cyan(), app.identity.path().display());
    match app.session() {
        Some(session) => {
            let org = session.organization.as_ref().map(|o| o.name.as_str()).unwrap_or("no organization");
            println!("  {:16} {} ({})", "Signed in:".bright_cyan(), session.email, org);
        }
        None => println!("  {:16} {}", "Signed in:".bright_cyan(), "no".dimmed()),
    }

    match app.store.backend().health().await {
        Ok(health) => notify::success(&format!("Backend reachable ({})", health.status)),
        Err(e) => notify::error(&format!("Backend unreachable: {}", e)),
    }
    if let Some(org) = app.session().and_then(|s| s.organization.as_ref()) {
        match app.store.backend().get_organization(&org.id).await {
            Ok(found) => notify::success(&format!("Organization {} is live at /status/{}", found.name, found.slug)),
            Err(e) => notify::error(&format!("Active organization {} not found at backend: {}", org.id, e)),
        }
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_service_flags() {
        let cli = Cli::try_parse_from([
            "statuspage", "services", "edit", "svc-1", "--status", "DEGRADED", "--api-url", "http://localhost:9",
        ])
        .unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://localhost:9"));
        match cli.command {
            Some(Command::Services(ServiceCommand::Edit { id, fields })) => {
                assert_eq!(id, "svc-1");
                assert_eq!(fields.status.as_deref(), Some("DEGRADED"));
                assert!(fields.name.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn repeated_service_ids_on_incidents() {
        let cli = Cli::try_parse_from([
            "statuspage", "incidents", "report", "--title", "API down", "--service", "a", "--service", "b",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Incidents(IncidentCommand::Report(fields))) => {
                assert_eq!(fields.services, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn no_command_opens_landing() {
        let cli = Cli::try_parse_from(["statuspage"]).unwrap();
        assert!(cli.command.is_none());
    }
}

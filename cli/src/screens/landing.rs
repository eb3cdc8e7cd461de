use super::answered;
use crate::app::App;
use crate::render::Panel;
use anyhow::Result;
use colored::*;
use common::{DashboardRoute, Route};
use inquire::{Select, Text};
use std::fmt;

const COMMANDS: &[(&str, &str)] = &[
    ("status <slug>", "Public status page"),
    ("live <slug>", "Live public status (auto refresh)"),
    ("sign-in", "Sign in to manage your services"),
    ("setup", "Create or select an organization"),
    ("overview", "Dashboard overview"),
    ("services list", "List and manage services"),
    ("incidents list", "Report and resolve incidents"),
    ("doctor", "Check configuration and backend"),
];

pub fn show(app: &App) {
    let mut panel = Panel::new("StatusPage - Status Monitoring");
    panel
        .line("Keep your users informed when things go wrong.")
        .blank()
        .line("Everything you need for status monitoring:".bold().to_string())
        .line("  • Service monitoring with four health levels")
        .line("  • Incident management with affected services")
        .line("  • A public status page for every organization")
        .line("  • Multi-tenant: switch between organizations")
        .separator()
        .line("Commands:".bold().to_string());
    for (command, about) in COMMANDS {
        panel.line(format!("  {} {}", format!("{:18}", command).bright_cyan(), about));
    }
    panel.print();

    match app.session() {
        Some(session) => {
            let org = session
                .organization
                .as_ref()
                .map(|o| format!(" ({})", o.name))
                .unwrap_or_default();
            println!("{} {}{}\n", "Signed in as".dimmed(), session.email.bright_white(), org.dimmed());
        }
        None => println!("{}\n", "Run 'statuspage sign-in' to get started. Free 14-day trial.".dimmed()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    PublicStatus,
    SignIn,
    Overview,
    Services,
    Incidents,
    Setup,
    SignOut,
    Quit,
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuItem::PublicStatus => "View a public status page",
            MenuItem::SignIn => "Sign in",
            MenuItem::Overview => "Dashboard overview",
            MenuItem::Services => "Manage services",
            MenuItem::Incidents => "Manage incidents",
            MenuItem::Setup => "Switch or create organization",
            MenuItem::SignOut => "Sign out",
            MenuItem::Quit => "Quit",
        };
        f.write_str(label)
    }
}

fn menu_items(app: &App) -> Vec<MenuItem> {
    let mut items = vec![MenuItem::PublicStatus];
    if app.session().is_some() {
        items.extend([
            MenuItem::Overview,
            MenuItem::Services,
            MenuItem::Incidents,
            MenuItem::Setup,
            MenuItem::SignOut,
        ]);
    } else {
        items.push(MenuItem::SignIn);
    }
    items.push(MenuItem::Quit);
    items
}

/// Landing page followed by a menu loop, used when no command is given.
pub async fn menu(app: &mut App) -> Result<()> {
    show(app);

    loop {
        let Some(choice) = answered(Select::new("What would you like to do?", menu_items(app)).prompt())? else {
            break;
        };

        let outcome = match choice {
            MenuItem::PublicStatus => match answered(Text::new("Organization slug:").prompt())? {
                Some(slug) => app.navigate(Route::PublicStatus { slug: slug.trim().to_string() }).await,
                None => Ok(()),
            },
            MenuItem::SignIn => app.navigate(Route::SignIn).await,
            MenuItem::Overview => app.navigate(Route::Dashboard(DashboardRoute::Overview)).await,
            MenuItem::Services => super::services::manage(app).await,
            MenuItem::Incidents => super::incidents::manage(app).await,
            MenuItem::Setup => super::setup::switch(app).await,
            MenuItem::SignOut => super::sign_in::sign_out(app).await,
            MenuItem::Quit => break,
        };

        if let Err(e) = outcome {
            crate::notify::error(&format!("{:#}", e));
        }
    }

    println!("\n{}", "Goodbye!".bright_green());
    Ok(())
}

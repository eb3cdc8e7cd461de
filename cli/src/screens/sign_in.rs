use super::answered;
use crate::app::App;
use crate::notify;
use anyhow::{Context, Result};
use colored::*;
use common::{AuthState, DashboardRoute, Route};
use inquire::Text;
use statuspage_client::{IdentityError, IdentityProvider};

/// Signs in, then continues to the dashboard. An `email` given up front is
/// tried once; otherwise the user is prompted until a valid address is given.
pub async fn run(app: &mut App, email: Option<String>) -> Result<Option<Route>> {
    if let Some(session) = app.session() {
        println!("{} {}", "Already signed in as".dimmed(), session.email.bright_white());
        return Ok(Some(Route::Dashboard(DashboardRoute::Overview)));
    }

    println!("\n{}", "Sign in to StatusPage".bright_cyan().bold());
    let interactive = email.is_none();
    let mut email = email;

    loop {
        let address = match email.take() {
            Some(address) => address,
            None => match answered(Text::new("Email:").with_placeholder("you@company.com").prompt())? {
                Some(address) => address,
                None => return Ok(None),
            },
        };

        match app.identity.sign_in(&address).await {
            Ok(session) => {
                notify::success(&format!("Signed in as {}", session.email));
                app.set_auth(AuthState::SignedIn(session)).await;
                return Ok(Some(Route::Dashboard(DashboardRoute::Overview)));
            }
            Err(e @ IdentityError::InvalidEmail(_)) if interactive => notify::error(&e.to_string()),
            Err(e) => return Err(e).context("Sign-in failed"),
        }
    }
}

pub async fn sign_out(app: &mut App) -> Result<()> {
    if app.session().is_none() {
        notify::hint("Not signed in.");
        return Ok(());
    }
    app.identity.sign_out().await.context("Sign-out failed")?;
    app.set_auth(AuthState::SignedOut).await;
    notify::success("Signed out");
    Ok(())
}

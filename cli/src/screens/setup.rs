use super::answered;
use crate::app::App;
use crate::notify;
use anyhow::{Context, Result};
use colored::*;
use common::validate::{suggest_slug, OrganizationForm};
use common::{AuthState, DashboardRoute, Route};
use inquire::{Select, Text};
use statuspage_client::{IdentityProvider, Membership, StoreError};
use std::fmt;

enum Choice {
    Existing(Membership),
    /// Provider organization whose backend record was never created.
    Unfinished(Membership),
    Create,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::Existing(m) => match &m.organization {
                Some(org) => write!(f, "{} (/status/{})", org.name, org.slug),
                None => write!(f, "{}", m.name),
            },
            Choice::Unfinished(m) => write!(f, "{} (finish setup)", m.name),
            Choice::Create => write!(f, "Create new organization"),
        }
    }
}

pub async fn run(app: &mut App) -> Result<Option<Route>> {
    println!("\n{}", "Setup Your Organization".bright_cyan().bold());
    println!("{}", "Select an existing organization or create a new one.".dimmed());

    let memberships = app.identity.memberships().await.context("Failed to load organizations")?;
    let mut choices: Vec<Choice> = memberships
        .into_iter()
        .map(|m| if m.is_linked() { Choice::Existing(m) } else { Choice::Unfinished(m) })
        .collect();
    choices.push(Choice::Create);

    let choice = if choices.len() == 1 {
        Choice::Create
    } else {
        match answered(Select::new("Organization:", choices).prompt())? {
            Some(choice) => choice,
            None => return Ok(None),
        }
    };

    let activated = match choice {
        Choice::Existing(membership) => activate(app, &membership.provider_org_id).await?,
        Choice::Unfinished(membership) => create(app, Some(membership)).await?,
        Choice::Create => create(app, None).await?,
    };
    Ok(activated.then_some(Route::Dashboard(DashboardRoute::Overview)))
}

/// Organization picker reachable while an organization is already active.
pub async fn switch(app: &mut App) -> Result<()> {
    if app.session().is_none() {
        return app.navigate(Route::SignIn).await;
    }
    if let Some(next) = run(app).await? {
        app.navigate(next).await?;
    }
    Ok(())
}

async fn activate(app: &mut App, provider_org_id: &str) -> Result<bool> {
    let session = app
        .identity
        .set_active(provider_org_id)
        .await
        .context("Failed to switch organization")?;
    if let Some(org) = &session.organization {
        notify::success(&format!("Now working in {}", org.name));
    }
    app.set_auth(AuthState::SignedIn(session)).await;
    Ok(true)
}

fn prompt_form(initial: &OrganizationForm) -> Result<Option<OrganizationForm>> {
    let Some(name) = answered(Text::new("Organization Name:").with_initial_value(&initial.name).prompt())? else {
        return Ok(None);
    };
    let suggested = if initial.slug.is_empty() { suggest_slug(&name) } else { initial.slug.clone() };
    let Some(slug) = answered(
        Text::new("Status Page URL: /status/")
            .with_initial_value(&suggested)
            .with_help_message("This will be your public status page URL")
            .prompt(),
    )?
    else {
        return Ok(None);
    };
    Ok(Some(OrganizationForm { name, slug }))
}

/// provider create → backend create → link → activate. A membership left
/// over from an earlier failed attempt skips the provider step.
async fn create(app: &mut App, mut pending: Option<Membership>) -> Result<bool> {
    let mut form = OrganizationForm {
        name: pending.as_ref().map(|m| m.name.clone()).unwrap_or_default(),
        slug: String::new(),
    };

    loop {
        form = match prompt_form(&form)? {
            Some(form) => form,
            None => return Ok(false),
        };
        if let Err(errors) = form.validate() {
            notify::field_errors(&errors);
            continue;
        }

        let membership = match &pending {
            Some(m) => m.clone(),
            None => {
                let created = app
                    .identity
                    .create_organization(&form.name)
                    .await
                    .context("Failed to create organization")?;
                pending = Some(created.clone());
                created
            }
        };

        let organization = match app.store.create_organization(&form, &membership.provider_org_id).await {
            Ok(organization) => organization,
            Err(StoreError::Validation(errors)) => {
                notify::field_errors(&errors);
                continue;
            }
            Err(e) => {
                notify::store_error("Failed to create organization", &e);
                return Ok(false);
            }
        };

        app.identity
            .link_organization(&membership.provider_org_id, &organization)
            .await
            .context("Failed to link organization")?;
        activate(app, &membership.provider_org_id).await?;
        notify::success("Organization created successfully!");
        return Ok(true);
    }
}

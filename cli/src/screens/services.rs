use super::{answered, loading};
use crate::app::App;
use crate::notify;
use crate::render::{format_time, service_badge, time_ago, truncate, Panel};
use anyhow::Result;
use colored::*;
use common::validate::ServiceForm;
use common::{Service, ServiceStatus, Session};
use inquire::{Confirm, Select, Text};
use statuspage_client::{Query, StoreError};
use std::fmt;

/// Service fields given on the command line. Any field present skips the
/// interactive form.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServiceFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// OPERATIONAL, DEGRADED, PARTIAL_OUTAGE or MAJOR_OUTAGE
    #[arg(long)]
    pub status: Option<String>,
}

impl ServiceFields {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.status.is_none()
    }

    fn apply(&self, mut form: ServiceForm) -> ServiceForm {
        if let Some(name) = &self.name {
            form.name = name.clone();
        }
        if let Some(description) = &self.description {
            form.description = description.clone();
        }
        if let Some(status) = &self.status {
            form.status = status.clone();
        }
        form
    }
}

struct StatusChoice(ServiceStatus);

impl fmt::Display for StatusChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.label())
    }
}

struct ServiceChoice(Service);

impl fmt::Display for ServiceChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0.name, self.0.status.label())
    }
}

fn form_from(service: &Service) -> ServiceForm {
    ServiceForm {
        name: service.name.clone(),
        description: service.description.clone().unwrap_or_default(),
        status: service.status.as_str().to_string(),
    }
}

fn prompt_form(initial: &ServiceForm) -> Result<Option<ServiceForm>> {
    let Some(name) = answered(Text::new("Service Name:").with_initial_value(&initial.name).prompt())? else {
        return Ok(None);
    };
    let Some(description) = answered(
        Text::new("Description:")
            .with_initial_value(&initial.description)
            .with_help_message("Optional")
            .prompt(),
    )?
    else {
        return Ok(None);
    };

    let current = initial.status.parse::<ServiceStatus>().ok();
    let start = ServiceStatus::ALL.iter().position(|s| Some(*s) == current).unwrap_or(0);
    let options: Vec<StatusChoice> = ServiceStatus::ALL.into_iter().map(StatusChoice).collect();
    let Some(StatusChoice(status)) = answered(Select::new("Status:", options).with_starting_cursor(start).prompt())?
    else {
        return Ok(None);
    };

    Ok(Some(ServiceForm { name, description, status: status.as_str().to_string() }))
}

pub async fn list(app: &App, session: &Session) -> Result<()> {
    let services = match app.store.services(session).await {
        Ok(Query::Ready(services)) => services,
        Ok(_) => {
            loading("services");
            return Ok(());
        }
        Err(e) => {
            notify::store_error("Failed to load services", &e);
            return Ok(());
        }
    };

    println!("\n{}", "Services".bright_cyan().bold());
    println!("{}", "Manage your services and their current status".dimmed());

    if services.is_empty() {
        println!("\n{}", "📭 No services yet".dimmed());
        notify::hint("Get started by adding your first service: statuspage services add");
        println!();
        return Ok(());
    }

    let now = chrono::Utc::now();
    println!("\n{}", format!("{:<24} {:<18} {:<22} {}", "NAME", "STATUS", "UPDATED", "ID").bright_cyan().bold());
    for service in &services {
        let updated = service.updated_at.unwrap_or(service.created_at);
        // badge carries colour codes, so pad by its printable width
        let badge = service_badge(service.status);
        let pad = 18usize.saturating_sub(crate::render::display_width(&badge));
        println!(
            "{} {}{} {} {}",
            truncate(&service.name, 24).bright_white(),
            badge,
            " ".repeat(pad),
            truncate(&time_ago(updated, now), 22).dimmed(),
            service.id.dimmed()
        );
        if let Some(description) = service.description.as_deref().filter(|d| !d.is_empty()) {
            println!("  {}", truncate(description, 60).dimmed());
        }
    }
    println!();
    Ok(())
}

pub async fn detail(app: &App, session: &Session, service_id: &str) -> Result<()> {
    let service = match app.store.service(session, service_id).await {
        Ok(Query::Ready(service)) => service,
        Ok(Query::NotFound) => {
            notify::error("Service not found");
            return Ok(());
        }
        Ok(Query::NotReady) => {
            loading("service");
            return Ok(());
        }
        Err(e) => {
            notify::store_error("Failed to load service", &e);
            return Ok(());
        }
    };

    let now = chrono::Utc::now();
    let mut panel = Panel::new(&service.name);
    panel
        .field("Service Name", service.name.bright_white().bold().to_string())
        .field("Current Status", service_badge(service.status))
        .field("ID", service.id.dimmed().to_string())
        .field(
            "Created",
            format!("{} ({})", time_ago(service.created_at, now), format_time(service.created_at).dimmed()),
        );
    if let Some(updated) = service.updated_at {
        panel.field("Last Updated", format!("{} ({})", time_ago(updated, now), format_time(updated).dimmed()));
    }
    panel.separator().line("Description".bold().to_string());
    match service.description.as_deref().filter(|d| !d.is_empty()) {
        Some(description) => panel.paragraph(description),
        None => panel.line("No description".dimmed().to_string()),
    };
    panel.print();
    Ok(())
}

pub async fn add(app: &App, session: &Session, fields: &ServiceFields) -> Result<()> {
    if !fields.is_empty() {
        let form = fields.apply(ServiceForm::default());
        match app.store.create_service(session, &form).await {
            Ok(service) => notify::success(&format!("Service '{}' created successfully", service.name)),
            Err(e) => notify::store_error("Failed to create service", &e),
        }
        return Ok(());
    }

    println!("\n{}", "Add Service".bright_cyan().bold());
    let mut form = ServiceForm::default();
    loop {
        form = match prompt_form(&form)? {
            Some(form) => form,
            None => return Ok(()),
        };
        match app.store.create_service(session, &form).await {
            Ok(service) => {
                notify::success(&format!("Service '{}' created successfully", service.name));
                return Ok(());
            }
            Err(StoreError::Validation(errors)) => notify::field_errors(&errors),
            Err(e) => {
                notify::store_error("Failed to create service", &e);
                return Ok(());
            }
        }
    }
}

async fn load(app: &App, session: &Session, service_id: &str) -> Result<Option<Service>> {
    match app.store.service(session, service_id).await {
        Ok(Query::Ready(service)) => Ok(Some(service)),
        Ok(Query::NotFound) => {
            notify::error("Service not found");
            Ok(None)
        }
        Ok(Query::NotReady) => {
            loading("service");
            Ok(None)
        }
        Err(e) => {
            notify::store_error("Failed to load service", &e);
            Ok(None)
        }
    }
}

pub async fn edit(app: &App, session: &Session, service_id: &str, fields: &ServiceFields) -> Result<()> {
    let Some(service) = load(app, session, service_id).await? else {
        return Ok(());
    };

    if !fields.is_empty() {
        let form = fields.apply(form_from(&service));
        match app.store.update_service(session, service_id, &form).await {
            Ok(_) => notify::success("Service updated successfully"),
            Err(e) => notify::store_error("Failed to update service", &e),
        }
        return Ok(());
    }

    println!("\n{}", "Edit Service".bright_cyan().bold());
    let mut form = form_from(&service);
    loop {
        form = match prompt_form(&form)? {
            Some(form) => form,
            None => return Ok(()),
        };
        match app.store.update_service(session, service_id, &form).await {
            Ok(_) => {
                notify::success("Service updated successfully");
                return Ok(());
            }
            Err(StoreError::Validation(errors)) => notify::field_errors(&errors),
            Err(e) => {
                notify::store_error("Failed to update service", &e);
                return Ok(());
            }
        }
    }
}

pub async fn delete(app: &App, session: &Session, service_id: &str, yes: bool) -> Result<()> {
    let Some(service) = load(app, session, service_id).await? else {
        return Ok(());
    };

    if !yes {
        let question = format!("Are you sure you want to delete '{}'?", service.name);
        match answered(Confirm::new(&question).with_default(false).prompt())? {
            Some(true) => {}
            _ => return Ok(()),
        }
    }

    match app.store.delete_service(session, service_id).await {
        Ok(()) => notify::success("Service deleted successfully"),
        Err(e) => notify::store_error("Failed to delete service", &e),
    }
    Ok(())
}

pub async fn set_status(app: &App, session: &Session, service_id: &str, status: &str) -> Result<()> {
    let status = match status.parse::<ServiceStatus>() {
        Ok(status) => status,
        Err(e) => {
            notify::error(&e.to_string());
            notify::hint("Expected one of OPERATIONAL, DEGRADED, PARTIAL_OUTAGE, MAJOR_OUTAGE");
            return Ok(());
        }
    };

    match app.store.set_service_status(session, service_id, status).await {
        Ok(service) => notify::success(&format!("{} is now {}", service.name, service.status.label())),
        Err(e) => notify::store_error("Failed to update status", &e),
    }
    Ok(())
}

async fn pick(app: &App, session: &Session) -> Result<Option<Service>> {
    let services = match app.store.services(session).await {
        Ok(Query::Ready(services)) => services,
        Ok(_) => return Ok(None),
        Err(e) => {
            notify::store_error("Failed to load services", &e);
            return Ok(None);
        }
    };
    if services.is_empty() {
        notify::hint("No services yet.");
        return Ok(None);
    }
    let options: Vec<ServiceChoice> = services.into_iter().map(ServiceChoice).collect();
    Ok(answered(Select::new("Service:", options).prompt())?.map(|ServiceChoice(service)| service))
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Add,
    View,
    Edit,
    SetStatus,
    Delete,
    Back,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Add => "Add service",
            Action::View => "View details",
            Action::Edit => "Edit service",
            Action::SetStatus => "Change status",
            Action::Delete => "Delete service",
            Action::Back => "Back",
        })
    }
}

pub async fn manage(app: &mut App) -> Result<()> {
    let Some(session) = app.require_organization().await? else {
        return Ok(());
    };

    loop {
        list(app, &session).await?;
        let actions = vec![Action::Add, Action::View, Action::Edit, Action::SetStatus, Action::Delete, Action::Back];
        let Some(action) = answered(Select::new("Services:", actions).prompt())? else {
            return Ok(());
        };

        match action {
            Action::Back => return Ok(()),
            Action::Add => add(app, &session, &ServiceFields::default()).await?,
            Action::View | Action::Edit | Action::SetStatus | Action::Delete => {
                let Some(service) = pick(app, &session).await? else {
                    continue;
                };
                match action {
                    Action::View => detail(app, &session, &service.id).await?,
                    Action::Edit => edit(app, &session, &service.id, &ServiceFields::default()).await?,
                    Action::Delete => delete(app, &session, &service.id, false).await?,
                    _ => {
                        let options: Vec<StatusChoice> = ServiceStatus::ALL.into_iter().map(StatusChoice).collect();
                        if let Some(StatusChoice(status)) = answered(Select::new("New status:", options).prompt())? {
                            set_status(app, &session, &service.id, status.as_str()).await?;
                        }
                    }
                }
            }
        }
    }
}

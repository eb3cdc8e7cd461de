use super::{answered, loading};
use crate::app::App;
use crate::notify;
use crate::render::{format_time, incident_badge, time_ago, truncate, wrap_text, Panel};
use anyhow::Result;
use colored::*;
use common::status::affected_services;
use common::validate::IncidentForm;
use common::{partition_incidents, Incident, IncidentStatus, Service, Session};
use inquire::{MultiSelect, Select, Text};
use statuspage_client::{Query, StoreError};
use std::fmt;

#[derive(clap::Args, Debug, Clone, Default)]
pub struct IncidentFields {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// OPEN or RESOLVED
    #[arg(long)]
    pub status: Option<String>,
    /// Affected service id; repeat for several
    #[arg(long = "service")]
    pub services: Vec<String>,
}

impl IncidentFields {
    fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.status.is_none() && self.services.is_empty()
    }

    fn apply(&self, mut form: IncidentForm) -> IncidentForm {
        if let Some(title) = &self.title {
            form.title = title.clone();
        }
        if let Some(description) = &self.description {
            form.description = description.clone();
        }
        if let Some(status) = &self.status {
            form.status = status.clone();
        }
        if !self.services.is_empty() {
            form.service_ids = self.services.clone();
        }
        form
    }
}

struct StatusChoice(IncidentStatus);

impl fmt::Display for StatusChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.label())
    }
}

#[derive(Clone)]
struct ServiceChoice(Service);

impl fmt::Display for ServiceChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

struct IncidentChoice(Incident);

impl fmt::Display for IncidentChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.0.title, self.0.status.label())
    }
}

fn form_from(incident: &Incident) -> IncidentForm {
    IncidentForm {
        title: incident.title.clone(),
        description: incident.description.clone(),
        status: incident.status.as_str().to_string(),
        service_ids: incident.service_ids.clone(),
    }
}

/// Services and incidents of the session's organization, or `None` after
/// telling the user why they are unavailable.
async fn load(app: &App, session: &Session) -> Option<(Vec<Service>, Vec<Incident>)> {
    let (services, incidents) = tokio::join!(app.store.services(session), app.store.incidents(session));
    match (services, incidents) {
        (Ok(Query::Ready(services)), Ok(Query::Ready(incidents))) => Some((services, incidents)),
        (Err(e), _) | (_, Err(e)) => {
            notify::store_error("Failed to load incidents", &e);
            None
        }
        _ => {
            loading("incidents");
            None
        }
    }
}

fn affected_line(incident: &Incident, services: &[Service]) -> Option<String> {
    let names: Vec<&str> = affected_services(incident, services).into_iter().map(|s| s.name.as_str()).collect();
    (!names.is_empty()).then(|| format!("Affected: {}", names.join(", ")))
}

fn print_incident(incident: &Incident, services: &[Service], now: chrono::DateTime<chrono::Utc>) {
    println!(
        "  {} {} {}",
        incident_badge(incident.status),
        incident.title.bright_white().bold(),
        time_ago(incident.created_at, now).dimmed()
    );
    for line in wrap_text(&incident.description, 70) {
        println!("      {}", line);
    }
    if let Some(affected) = affected_line(incident, services) {
        println!("      {}", affected.dimmed());
    }
    println!("      {}", format!("id: {}", incident.id).dimmed());
}

pub async fn list(app: &App, session: &Session) -> Result<()> {
    let Some((services, incidents)) = load(app, session).await else {
        return Ok(());
    };

    println!("\n{}", "Incidents".bright_cyan().bold());
    if incidents.is_empty() {
        println!("\n{}", "📭 No incidents".dimmed());
        notify::hint("Report one with: statuspage incidents report");
        println!();
        return Ok(());
    }

    let now = chrono::Utc::now();
    let partition = partition_incidents(&incidents);

    println!("\n{} {}", "Active".red().bold(), format!("({})", partition.active.len()).dimmed());
    if partition.active.is_empty() {
        println!("  {}", "No active incidents".dimmed());
    }
    for incident in &partition.active {
        print_incident(incident, &services, now);
    }

    println!("\n{} {}", "Resolved".bright_black().bold(), format!("({})", partition.resolved.len()).dimmed());
    for incident in &partition.resolved {
        print_incident(incident, &services, now);
    }
    println!();
    Ok(())
}

pub async fn show(app: &App, session: &Session, incident_id: &str) -> Result<()> {
    let Some((services, incidents)) = load(app, session).await else {
        return Ok(());
    };
    let Some(incident) = incidents.iter().find(|i| i.id == incident_id) else {
        notify::error("Incident not found");
        return Ok(());
    };

    let now = chrono::Utc::now();
    let mut panel = Panel::new(&truncate(&incident.title, 50).trim_end().to_string());
    panel
        .field("Status", incident_badge(incident.status))
        .field("ID", incident.id.dimmed().to_string())
        .field(
            "Reported",
            format!("{} ({})", time_ago(incident.created_at, now), format_time(incident.created_at).dimmed()),
        );
    if let Some(updated) = incident.updated_at {
        panel.field("Last Updated", time_ago(updated, now));
    }
    if let Some(affected) = affected_line(incident, &services) {
        panel.line(affected);
    }
    panel.separator().line("Description".bold().to_string()).paragraph(&incident.description);

    if !incident.updates.is_empty() {
        panel.separator().line("Updates".bold().to_string());
        for update in &incident.updates {
            panel.line(time_ago(update.created_at, now).dimmed().to_string());
            panel.paragraph(&update.content);
        }
    }
    panel.print();
    Ok(())
}

fn prompt_form(initial: &IncidentForm, services: &[Service]) -> Result<Option<IncidentForm>> {
    let Some(title) = answered(Text::new("Title:").with_initial_value(&initial.title).prompt())? else {
        return Ok(None);
    };
    let Some(description) = answered(Text::new("Description:").with_initial_value(&initial.description).prompt())?
    else {
        return Ok(None);
    };

    let current = initial.status.parse::<IncidentStatus>().ok();
    let start = IncidentStatus::ALL.iter().position(|s| Some(*s) == current).unwrap_or(0);
    let options: Vec<StatusChoice> = IncidentStatus::ALL.into_iter().map(StatusChoice).collect();
    let Some(StatusChoice(status)) = answered(Select::new("Status:", options).with_starting_cursor(start).prompt())?
    else {
        return Ok(None);
    };

    let service_ids = if services.is_empty() {
        Vec::new()
    } else {
        let selected: Vec<usize> = services
            .iter()
            .enumerate()
            .filter(|(_, s)| initial.service_ids.contains(&s.id))
            .map(|(i, _)| i)
            .collect();
        let options: Vec<ServiceChoice> = services.iter().cloned().map(ServiceChoice).collect();
        match answered(
            MultiSelect::new("Affected services:", options)
                .with_default(&selected)
                .prompt(),
        )? {
            Some(chosen) => chosen.into_iter().map(|ServiceChoice(s)| s.id).collect(),
            None => return Ok(None),
        }
    };

    Ok(Some(IncidentForm {
        title,
        description,
        status: status.as_str().to_string(),
        service_ids,
    }))
}

pub async fn report(app: &App, session: &Session, fields: &IncidentFields) -> Result<()> {
    if !fields.is_empty() {
        let form = fields.apply(IncidentForm::default());
        match app.store.create_incident(session, &form).await {
            Ok(incident) => notify::success(&format!("Incident '{}' reported", incident.title)),
            Err(e) => notify::store_error("Failed to report incident", &e),
        }
        return Ok(());
    }

    let Some((services, _)) = load(app, session).await else {
        return Ok(());
    };

    println!("\n{}", "Report Incident".bright_cyan().bold());
    let mut form = IncidentForm::default();
    loop {
        form = match prompt_form(&form, &services)? {
            Some(form) => form,
            None => return Ok(()),
        };
        match app.store.create_incident(session, &form).await {
            Ok(incident) => {
                notify::success(&format!("Incident '{}' reported", incident.title));
                return Ok(());
            }
            Err(StoreError::Validation(errors)) => notify::field_errors(&errors),
            Err(e) => {
                notify::store_error("Failed to report incident", &e);
                return Ok(());
            }
        }
    }
}

pub async fn edit(app: &App, session: &Session, incident_id: &str, fields: &IncidentFields) -> Result<()> {
    let Some((services, incidents)) = load(app, session).await else {
        return Ok(());
    };
    let Some(incident) = incidents.into_iter().find(|i| i.id == incident_id) else {
        notify::error("Incident not found");
        return Ok(());
    };

    if !fields.is_empty() {
        let form = fields.apply(form_from(&incident));
        match app.store.update_incident(session, incident_id, &form).await {
            Ok(_) => notify::success("Incident updated successfully"),
            Err(e) => notify::store_error("Failed to update incident", &e),
        }
        return Ok(());
    }

    println!("\n{}", "Edit Incident".bright_cyan().bold());
    let mut form = form_from(&incident);
    loop {
        form = match prompt_form(&form, &services)? {
            Some(form) => form,
            None => return Ok(()),
        };
        match app.store.update_incident(session, incident_id, &form).await {
            Ok(_) => {
                notify::success("Incident updated successfully");
                return Ok(());
            }
            Err(StoreError::Validation(errors)) => notify::field_errors(&errors),
            Err(e) => {
                notify::store_error("Failed to update incident", &e);
                return Ok(());
            }
        }
    }
}

pub async fn resolve(app: &App, session: &Session, incident_id: &str) -> Result<()> {
    match app.store.resolve_incident(session, incident_id).await {
        Ok(incident) => notify::success(&format!("Incident '{}' resolved", incident.title)),
        Err(e) => notify::store_error("Failed to resolve incident", &e),
    }
    Ok(())
}

async fn pick(app: &App, session: &Session, open_only: bool) -> Result<Option<Incident>> {
    let Some((_, incidents)) = load(app, session).await else {
        return Ok(None);
    };
    let options: Vec<IncidentChoice> = incidents
        .into_iter()
        .filter(|i| !open_only || i.is_open())
        .map(IncidentChoice)
        .collect();
    if options.is_empty() {
        notify::hint(if open_only { "No active incidents." } else { "No incidents yet." });
        return Ok(None);
    }
    Ok(answered(Select::new("Incident:", options).prompt())?.map(|IncidentChoice(incident)| incident))
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Report,
    View,
    Edit,
    Resolve,
    Back,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Report => "Report incident",
            Action::View => "View details",
            Action::Edit => "Edit incident",
            Action::Resolve => "Resolve incident",
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
        let actions = vec![Action::Report, Action::View, Action::Edit, Action::Resolve, Action::Back];
        let Some(action) = answered(Select::new("Incidents:", actions).prompt())? else {
            return Ok(());
        };

        match action {
            Action::Back => return Ok(()),
            Action::Report => report(app, &session, &IncidentFields::default()).await?,
            Action::View => {
                if let Some(incident) = pick(app, &session, false).await? {
                    show(app, &session, &incident.id).await?;
                }
            }
            Action::Edit => {
                if let Some(incident) = pick(app, &session, false).await? {
                    edit(app, &session, &incident.id, &IncidentFields::default()).await?;
                }
            }
            Action::Resolve => {
                if let Some(incident) = pick(app, &session, true).await? {
                    resolve(app, &session, &incident.id).await?;
                }
            }
        }
    }
}

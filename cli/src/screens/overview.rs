use super::loading;
use crate::app::App;
use crate::notify;
use crate::render::{color_of, incident_badge, service_badge, time_ago, truncate, Panel};
use anyhow::Result;
use colored::*;
use common::status::{active_incident_count, ServiceSummary};
use common::{aggregate_status, recent_incidents, Session};
use statuspage_client::Query;

const RECENT_SERVICES: usize = 5;

pub async fn show(app: &App, session: &Session) -> Result<()> {
    let (services, incidents) = tokio::join!(app.store.services(session), app.store.incidents(session));

    let (services, incidents) = match (services, incidents) {
        (Ok(Query::Ready(services)), Ok(Query::Ready(incidents))) => (services, incidents),
        (Err(e), _) | (_, Err(e)) => {
            notify::store_error("Failed to load overview", &e);
            return Ok(());
        }
        _ => {
            loading("overview");
            return Ok(());
        }
    };

    let org_name = session.organization.as_ref().map(|o| o.name.as_str()).unwrap_or("Overview");
    let summary = ServiceSummary::of(&services);
    let active = active_incident_count(&incidents);
    let now = chrono::Utc::now();

    let mut panel = Panel::new(&format!("{} - Overview", org_name));
    panel.field("Total Services", summary.total.to_string().bright_white().bold().to_string());

    let (headline, detail) = if summary.all_good() {
        ("All Good".green().bold(), format!("{}/{} services operational", summary.operational, summary.total))
    } else {
        ("Issues".red().bold(), format!("{}/{} services operational", summary.operational, summary.total))
    };
    panel.field("System Status", format!("{}  {}", headline, detail.dimmed()));

    let incident_note = if active == 0 { "No active incidents".dimmed() } else { "Requires attention".red() };
    panel.field("Active", format!("{}  {}", active.to_string().bright_white().bold(), incident_note));

    let aggregate = aggregate_status(&services);
    panel.field("Public Page", aggregate.label().color(color_of(aggregate.color())).to_string());

    panel.separator().line("Services Status".bold().to_string());
    if services.is_empty() {
        panel.line("No services yet".dimmed().to_string());
        panel.line("Get started by adding your first service: statuspage services add".dimmed().to_string());
    }
    for service in services.iter().take(RECENT_SERVICES) {
        panel.line(format!("  {} {}", truncate(&service.name, 30), service_badge(service.status)));
    }

    panel.separator().line("Recent Incidents".bold().to_string());
    let recent = recent_incidents(&incidents);
    if recent.is_empty() {
        panel.line("No incidents".dimmed().to_string());
        panel.line("All systems are running smoothly".dimmed().to_string());
    }
    for incident in recent {
        panel.line(format!(
            "  {} {} {}",
            incident_badge(incident.status),
            truncate(&incident.title, 26),
            time_ago(incident.created_at, now).dimmed()
        ));
    }

    panel.print();
    Ok(())
}

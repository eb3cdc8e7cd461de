use super::loading;
use crate::app::App;
use crate::notify;
use crate::render::{color_of, format_time, incident_badge, service_badge, time_ago, truncate, Panel};
use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::*;
use common::status::affected_services;
use common::{aggregate_status, partition_incidents, recent_incidents, Incident, PublicStatus, Service};
use statuspage_client::Query;

/// What the public page shows for `slug` right now.
pub enum PageState {
    Loading,
    NotFound,
    Ready(PublicStatus),
}

pub async fn fetch(app: &App, slug: &str) -> Result<PageState, statuspage_client::StoreError> {
    Ok(match app.store.public_status(slug).await? {
        Query::Ready(page) => PageState::Ready(page),
        Query::NotFound => PageState::NotFound,
        Query::NotReady => PageState::Loading,
    })
}

pub async fn show(app: &App, slug: &str) -> Result<()> {
    match fetch(app, slug).await {
        Ok(PageState::Ready(page)) => {
            for line in page_lines(&page, Utc::now()) {
                println!("{}", line);
            }
            println!();
        }
        Ok(PageState::NotFound) => notify::error("Status page not found"),
        Ok(PageState::Loading) => loading("status page"),
        Err(e) => notify::store_error("Failed to load status page", &e),
    }
    Ok(())
}

/// Machine-readable page for scripts; exits non-zero when there is none.
pub async fn print_json(app: &App, slug: &str) -> Result<()> {
    match fetch(app, slug).await? {
        PageState::Ready(page) => {
            println!("{}", serde_json::to_string_pretty(&page)?);
            Ok(())
        }
        PageState::NotFound => anyhow::bail!("Status page not found: {}", slug),
        PageState::Loading => anyhow::bail!("No status page slug given"),
    }
}

fn incident_rows(panel: &mut Panel, incident: &Incident, services: &[Service], now: DateTime<Utc>) {
    panel.line(format!(
        "{} {} {}",
        incident_badge(incident.status),
        truncate(&incident.title, 28).bright_white().bold(),
        time_ago(incident.created_at, now).dimmed()
    ));
    panel.paragraph(&incident.description);
    let names: Vec<&str> = affected_services(incident, services).into_iter().map(|s| s.name.as_str()).collect();
    if !names.is_empty() {
        panel.line(format!("  {}", format!("Affected: {}", names.join(", ")).dimmed()));
    }
}

/// The public status page as box-drawn lines, without trailing newlines.
pub fn page_lines(page: &PublicStatus, now: DateTime<Utc>) -> Vec<String> {
    let mut panel = Panel::new(&format!("{} Status", page.organization.name));

    let overall = aggregate_status(&page.services);
    panel.line(overall.label().color(color_of(overall.color())).bold().to_string());

    let partition = partition_incidents(&page.incidents);
    if !partition.active.is_empty() {
        panel.separator().line("Active Incidents".red().bold().to_string());
        for incident in &partition.active {
            incident_rows(&mut panel, incident, &page.services, now);
        }
    }

    panel.separator().line("Services".bold().to_string());
    if page.services.is_empty() {
        panel.line("No services listed".dimmed().to_string());
    }
    for service in &page.services {
        panel.line(format!("{} {}", truncate(&service.name, 36), service_badge(service.status)));
        if let Some(description) = service.description.as_deref().filter(|d| !d.is_empty()) {
            panel.line(format!("  {}", truncate(description, 56).dimmed()));
        }
    }

    panel.separator().line("Recent Incidents".bold().to_string());
    let recent = recent_incidents(&page.incidents);
    if recent.is_empty() {
        panel.line("No incidents to report".dimmed().to_string());
    }
    for incident in recent {
        incident_rows(&mut panel, incident, &page.services, now);
    }

    panel
        .separator()
        .line(format!("Last updated: {}", format_time(now)).dimmed().to_string())
        .line(format!("/status/{}", page.organization.slug).dimmed().to_string());
    panel.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{display_width, strip_ansi};
    use chrono::{Duration, TimeZone};
    use common::{IncidentStatus, Organization, ServiceStatus};

    fn page(services: Vec<Service>, incidents: Vec<Incident>) -> PublicStatus {
        PublicStatus {
            organization: Organization {
                id: "org-1".into(),
                name: "Acme".into(),
                slug: "acme".into(),
                provider_org_id: "org_abc".into(),
                created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                updated_at: None,
            },
            services,
            incidents,
        }
    }

    fn service(id: &str, status: ServiceStatus) -> Service {
        Service {
            id: id.into(),
            name: format!("svc {}", id),
            description: None,
            status,
            org_id: "org-1".into(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    fn incident(id: &str, status: IncidentStatus, minutes_ago: i64, now: DateTime<Utc>) -> Incident {
        Incident {
            id: id.into(),
            title: format!("incident {}", id),
            description: "Something broke".into(),
            status,
            org_id: "org-1".into(),
            service_ids: vec!["a".into()],
            updates: Vec::new(),
            created_at: now - Duration::minutes(minutes_ago),
            updated_at: None,
        }
    }

    fn plain(lines: &[String]) -> String {
        lines.iter().map(|l| strip_ansi(l)).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn empty_page_reads_all_operational_with_no_incidents() {
        let now = Utc::now();
        let text = plain(&page_lines(&page(vec![], vec![]), now));
        assert!(text.contains("Acme Status"));
        assert!(text.contains("All Systems Operational"));
        assert!(text.contains("No incidents to report"));
        assert!(!text.contains("Active Incidents"));
    }

    #[test]
    fn degraded_service_and_open_incident_are_called_out() {
        let now = Utc::now();
        let services = vec![service("a", ServiceStatus::Operational), service("b", ServiceStatus::Degraded)];
        let incidents = vec![
            incident("1", IncidentStatus::Resolved, 90, now),
            incident("2", IncidentStatus::Open, 5, now),
        ];
        let lines = page_lines(&page(services, incidents), now);
        let text = plain(&lines);

        assert!(text.contains("Some Systems Affected"));
        assert!(text.contains("Active Incidents"));
        assert!(text.contains("Affected: svc a"));
        assert!(text.contains("Degraded"));
        for line in &lines {
            assert_eq!(display_width(line), crate::render::WIDTH + 2);
        }
    }

    #[test]
    fn recent_section_is_capped() {
        let now = Utc::now();
        let incidents: Vec<Incident> = (0..8)
            .map(|i| incident(&i.to_string(), IncidentStatus::Resolved, i * 10, now))
            .collect();
        let text = plain(&page_lines(&page(vec![], incidents), now));
        assert_eq!(text.matches("[RESOLVED]").count(), 5);
        assert!(text.contains("incident 0"));
        assert!(!text.contains("incident 7"));
    }
}

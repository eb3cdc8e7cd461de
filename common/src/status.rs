//! Derived status: aggregate system health, incident grouping for the
//! public page, and the fixed label/colour tables used by every screen.

use crate::types::{Incident, IncidentStatus, Service, ServiceStatus};
use std::collections::HashSet;

/// The public page shows at most this many entries under "Recent Incidents".
pub const RECENT_INCIDENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusColor {
    Green,
    Yellow,
    Orange,
    Red,
    Grey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemStatus {
    AllOperational,
    SomeAffected,
}

impl SystemStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SystemStatus::AllOperational => "All Systems Operational",
            SystemStatus::SomeAffected => "Some Systems Affected",
        }
    }

    pub fn color(&self) -> StatusColor {
        match self {
            SystemStatus::AllOperational => StatusColor::Green,
            SystemStatus::SomeAffected => StatusColor::Red,
        }
    }
}

impl ServiceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceStatus::Operational => "Operational",
            ServiceStatus::Degraded => "Degraded",
            ServiceStatus::PartialOutage => "Partial Outage",
            ServiceStatus::MajorOutage => "Major Outage",
        }
    }

    pub fn color(&self) -> StatusColor {
        match self {
            ServiceStatus::Operational => StatusColor::Green,
            ServiceStatus::Degraded => StatusColor::Yellow,
            ServiceStatus::PartialOutage => StatusColor::Orange,
            ServiceStatus::MajorOutage => StatusColor::Red,
        }
    }
}

impl IncidentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "Open",
            IncidentStatus::Resolved => "Resolved",
        }
    }

    pub fn color(&self) -> StatusColor {
        match self {
            IncidentStatus::Open => StatusColor::Red,
            IncidentStatus::Resolved => StatusColor::Grey,
        }
    }
}

/// `AllOperational` iff every service is `OPERATIONAL`.
///
/// An empty slice is vacuously all-operational.
pub fn aggregate_status(services: &[Service]) -> SystemStatus {
    if services.iter().all(|s| s.status == ServiceStatus::Operational) {
        SystemStatus::AllOperational
    } else {
        SystemStatus::SomeAffected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServiceSummary {
    pub total: usize,
    pub operational: usize,
}

impl ServiceSummary {
    pub fn of(services: &[Service]) -> Self {
        ServiceSummary {
            total: services.len(),
            operational: services
                .iter()
                .filter(|s| s.status == ServiceStatus::Operational)
                .count(),
        }
    }

    pub fn all_good(&self) -> bool {
        self.operational == self.total
    }
}

pub fn active_incident_count(incidents: &[Incident]) -> usize {
    incidents.iter().filter(|i| i.is_open()).count()
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncidentPartition<'a> {
    pub active: Vec<&'a Incident>,
    pub resolved: Vec<&'a Incident>,
}

/// Splits incidents into open and everything else, keeping input order.
pub fn partition_incidents(incidents: &[Incident]) -> IncidentPartition<'_> {
    let (active, resolved): (Vec<&Incident>, Vec<&Incident>) =
        incidents.iter().partition(|i| i.is_open());
    IncidentPartition { active, resolved }
}

/// Newest first by creation time, regardless of status, capped at
/// [`RECENT_INCIDENT_LIMIT`]. Equal timestamps keep their input order.
pub fn recent_incidents(incidents: &[Incident]) -> Vec<&Incident> {
    let mut ordered: Vec<&Incident> = incidents.iter().collect();
    // sort_by is stable
    ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    ordered.truncate(RECENT_INCIDENT_LIMIT);
    ordered
}

/// Resolves an incident's service ids against a service list. Unknown ids
/// are skipped and duplicates collapse to one entry.
pub fn affected_services<'a>(incident: &Incident, services: &'a [Service]) -> Vec<&'a Service> {
    let mut seen = HashSet::new();
    incident
        .service_ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .filter_map(|id| services.iter().find(|s| &s.id == id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn service(id: &str, status: ServiceStatus) -> Service {
        Service {
            id: id.to_string(),
            name: format!("service {}", id),
            description: None,
            status,
            org_id: "org-1".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    fn incident(id: &str, status: IncidentStatus, minutes: i64) -> Incident {
        Incident {
            id: id.to_string(),
            title: format!("incident {}", id),
            description: String::new(),
            status,
            org_id: "org-1".to_string(),
            service_ids: Vec::new(),
            updates: Vec::new(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes),
            updated_at: None,
        }
    }

    #[test]
    fn all_operational_services_aggregate_to_operational() {
        let services = vec![
            service("a", ServiceStatus::Operational),
            service("b", ServiceStatus::Operational),
        ];
        assert_eq!(aggregate_status(&services), SystemStatus::AllOperational);
    }

    #[test]
    fn single_degraded_service_flips_aggregate() {
        let services = vec![service("a", ServiceStatus::Degraded)];
        assert_eq!(aggregate_status(&services), SystemStatus::SomeAffected);

        let services = vec![
            service("a", ServiceStatus::Operational),
            service("b", ServiceStatus::Degraded),
            service("c", ServiceStatus::Operational),
        ];
        assert_eq!(aggregate_status(&services), SystemStatus::SomeAffected);
    }

    #[test]
    fn no_services_is_vacuously_operational() {
        assert_eq!(aggregate_status(&[]), SystemStatus::AllOperational);
    }

    #[test]
    fn aggregate_ignores_order() {
        let mut services = vec![
            service("a", ServiceStatus::MajorOutage),
            service("b", ServiceStatus::Operational),
        ];
        let before = aggregate_status(&services);
        services.reverse();
        assert_eq!(aggregate_status(&services), before);
    }

    #[test]
    fn every_status_has_a_label_and_color() {
        let labels: HashSet<_> = ServiceStatus::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(labels.len(), ServiceStatus::ALL.len());
        assert_eq!(ServiceStatus::Operational.color(), StatusColor::Green);
        assert_eq!(ServiceStatus::Degraded.color(), StatusColor::Yellow);
        assert_eq!(ServiceStatus::PartialOutage.color(), StatusColor::Orange);
        assert_eq!(ServiceStatus::MajorOutage.color(), StatusColor::Red);
        assert_eq!(ServiceStatus::PartialOutage.label(), "Partial Outage");

        for status in IncidentStatus::ALL {
            assert!(!status.label().is_empty());
        }
        assert_eq!(IncidentStatus::Open.color(), StatusColor::Red);
        assert_eq!(IncidentStatus::Resolved.color(), StatusColor::Grey);
    }

    #[test]
    fn partition_is_exact_and_disjoint() {
        let incidents = vec![
            incident("1", IncidentStatus::Open, 0),
            incident("2", IncidentStatus::Resolved, 1),
            incident("3", IncidentStatus::Open, 2),
            incident("4", IncidentStatus::Resolved, 3),
        ];
        let split = partition_incidents(&incidents);

        let active: Vec<_> = split.active.iter().map(|i| i.id.as_str()).collect();
        let resolved: Vec<_> = split.resolved.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(active, vec!["1", "3"]);
        assert_eq!(resolved, vec!["2", "4"]);
        assert!(split.active.iter().all(|i| i.status == IncidentStatus::Open));
        assert_eq!(split.active.len() + split.resolved.len(), incidents.len());
    }

    #[test]
    fn recent_incidents_are_capped_and_newest_first() {
        let incidents: Vec<Incident> = (0..9)
            .map(|n| incident(&n.to_string(), IncidentStatus::Resolved, n))
            .collect();
        let recent = recent_incidents(&incidents);

        assert_eq!(recent.len(), RECENT_INCIDENT_LIMIT);
        let ids: Vec<_> = recent.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["8", "7", "6", "5", "4"]);
    }

    #[test]
    fn recent_incidents_include_open_ones_and_keep_ties_stable() {
        let incidents = vec![
            incident("first", IncidentStatus::Resolved, 5),
            incident("second", IncidentStatus::Open, 5),
            incident("older", IncidentStatus::Resolved, 1),
        ];
        let ids: Vec<_> = recent_incidents(&incidents).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "older"]);
    }

    #[test]
    fn summary_counts_operational_services() {
        let services = vec![
            service("a", ServiceStatus::Operational),
            service("b", ServiceStatus::MajorOutage),
        ];
        let summary = ServiceSummary::of(&services);
        assert_eq!(summary, ServiceSummary { total: 2, operational: 1 });
        assert!(!summary.all_good());
        assert!(ServiceSummary::of(&[]).all_good());
    }

    #[test]
    fn affected_services_skip_unknown_and_duplicate_ids() {
        let services = vec![
            service("a", ServiceStatus::Operational),
            service("b", ServiceStatus::Degraded),
        ];
        let mut inc = incident("1", IncidentStatus::Open, 0);
        inc.service_ids = vec!["b".into(), "zzz".into(), "b".into(), "a".into()];

        let names: Vec<_> = affected_services(&inc, &services).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(active_incident_count(std::slice::from_ref(&inc)), 1);
    }
}

//! Client-side form rules. A form that fails here is never sent to the
//! backend; each failure is reported against the field it belongs to.

use crate::types::{
    IncidentPatch, IncidentStatus, NewIncident, NewOrganization, NewService, ServicePatch,
    ServiceStatus,
};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError { field, message: message.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// First message recorded for `field`, if any.
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

fn required(errors: &mut ValidationErrors, field: &'static str, label: &str, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, format!("{} is required", label));
    }
    trimmed.to_string()
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceForm {
    pub name: String,
    pub description: String,
    pub status: String,
}

impl Default for ServiceForm {
    fn default() -> Self {
        ServiceForm {
            name: String::new(),
            description: String::new(),
            status: ServiceStatus::Operational.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDraft {
    pub name: String,
    pub description: Option<String>,
    pub status: ServiceStatus,
}

impl ServiceForm {
    pub fn validate(&self) -> Result<ServiceDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = required(&mut errors, "name", "Name", &self.name);
        let status = match self.status.parse::<ServiceStatus>() {
            Ok(status) => status,
            Err(_) => {
                errors.add("status", format!("Unknown status '{}'", self.status));
                ServiceStatus::Operational
            }
        };
        errors.into_result(ServiceDraft {
            name,
            description: optional(&self.description),
            status,
        })
    }
}

impl ServiceDraft {
    pub fn into_new(self, org_id: &str) -> NewService {
        NewService {
            name: self.name,
            description: self.description,
            status: self.status,
            org_id: org_id.to_string(),
        }
    }

    pub fn into_patch(self) -> ServicePatch {
        ServicePatch {
            name: Some(self.name),
            // an edit that clears the description sends an empty string
            description: Some(self.description.unwrap_or_default()),
            status: Some(self.status),
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentForm {
    pub title: String,
    pub description: String,
    pub status: String,
    pub service_ids: Vec<String>,
}

impl Default for IncidentForm {
    fn default() -> Self {
        IncidentForm {
            title: String::new(),
            description: String::new(),
            status: IncidentStatus::Open.as_str().to_string(),
            service_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncidentDraft {
    pub title: String,
    pub description: String,
    pub status: IncidentStatus,
    pub service_ids: Vec<String>,
}

impl IncidentForm {
    pub fn validate(&self) -> Result<IncidentDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let title = required(&mut errors, "title", "Title", &self.title);
        let description = required(&mut errors, "description", "Description", &self.description);
        let status = match self.status.parse::<IncidentStatus>() {
            Ok(status) => status,
            Err(_) => {
                errors.add("status", format!("Unknown status '{}'", self.status));
                IncidentStatus::Open
            }
        };

        // set semantics, first occurrence wins
        let mut service_ids: Vec<String> = Vec::new();
        for id in self.service_ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
            if !service_ids.iter().any(|existing| existing == id) {
                service_ids.push(id.to_string());
            }
        }

        errors.into_result(IncidentDraft { title, description, status, service_ids })
    }
}

impl IncidentDraft {
    pub fn into_new(self, org_id: &str) -> NewIncident {
        NewIncident {
            title: self.title,
            description: self.description,
            status: self.status,
            service_ids: self.service_ids,
            org_id: org_id.to_string(),
        }
    }

    pub fn into_patch(self) -> IncidentPatch {
        IncidentPatch {
            title: Some(self.title),
            description: Some(self.description),
            status: Some(self.status),
            service_ids: Some(self.service_ids),
        }
    }
}


#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationForm {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationDraft {
    pub name: String,
    pub slug: String,
}

impl OrganizationForm {
    pub fn validate(&self) -> Result<OrganizationDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = required(&mut errors, "name", "Organization name", &self.name);
        let slug = required(&mut errors, "slug", "Slug", &self.slug);
        if !slug.is_empty() && !is_valid_slug(&slug) {
            errors.add(
                "slug",
                "Slug may only contain lowercase letters, digits and single hyphens",
            );
        }
        errors.into_result(OrganizationDraft { name, slug })
    }
}

impl OrganizationDraft {
    pub fn into_new(self, provider_org_id: &str) -> NewOrganization {
        NewOrganization {
            name: self.name,
            slug: self.slug,
            provider_org_id: provider_org_id.to_string(),
        }
    }
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Slug proposed from an organization name, e.g. `Acme Cloud, Inc.` -> `acme-cloud-inc`.
pub fn suggest_slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

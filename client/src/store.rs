//! Reads and writes the screens go through.
//!
//! Reads consult the [`QueryCache`]; writes call the backend directly and,
//! on success only, invalidate the reads they affect. Every
//! organization-scoped call takes the caller's [`Session`] explicitly, and
//! records addressed by id are only visible to their own organization.

use crate::api::{ApiError, StatusBackend};
use crate::cache::{Invalidation, QueryCache, QueryKey, ResourceKind};
use common::validate::{IncidentForm, OrganizationForm, ServiceForm};
use common::{
    Incident, IncidentPatch, IncidentStatus, Organization, PublicStatus, Service, ServicePatch,
    ServiceStatus, Session, ValidationErrors,
};
use log::{info, warn};

/// Outcome of a read that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Query<T> {
    /// A scoping parameter (organization, slug, id) is not known yet.
    NotReady,
    NotFound,
    Ready(T),
}

impl<T> Query<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Query::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Query::Ready(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("Organization ID is required")]
    NoOrganization,

    /// Missing, or owned by an organization other than the session's.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub struct StatusStore<B> {
    backend: B,
    cache: QueryCache,
}

impl<B: StatusBackend> StatusStore<B> {
    pub fn new(backend: B, cache: QueryCache) -> Self {
        Self { backend, cache }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Forget every cached read, e.g. after sign-out or an organization switch.
    pub async fn reset(&self) {
        self.cache.clear().await;
    }

    async fn invalidate(&self, invalidations: &[Invalidation]) {
        for invalidation in invalidations {
            self.cache.invalidate(invalidation).await;
        }
    }

    pub async fn services(&self, session: &Session) -> Result<Query<Vec<Service>>, StoreError> {
        let Some(org_id) = session.org_id() else {
            return Ok(Query::NotReady);
        };
        let key = QueryKey::Services { org_id: org_id.to_string() };
        let services = self.cache.fetch(key, || self.backend.list_services(org_id)).await?;
        Ok(Query::Ready(services))
    }

    pub async fn incidents(&self, session: &Session) -> Result<Query<Vec<Incident>>, StoreError> {
        let Some(org_id) = session.org_id() else {
            return Ok(Query::NotReady);
        };
        let key = QueryKey::Incidents { org_id: org_id.to_string() };
        let incidents = self.cache.fetch(key, || self.backend.list_incidents(org_id)).await?;
        Ok(Query::Ready(incidents))
    }

    /// A service of the session's organization. Services of any other
    /// organization read as [`Query::NotFound`].
    pub async fn service(&self, session: &Session, service_id: &str) -> Result<Query<Service>, StoreError> {
        let Some(org_id) = session.org_id() else {
            return Ok(Query::NotReady);
        };
        if service_id.trim().is_empty() {
            return Ok(Query::NotReady);
        }
        let key = QueryKey::Service { service_id: service_id.to_string() };
        match self.cache.fetch(key, || self.backend.get_service(service_id)).await {
            Ok(service) if service.org_id == org_id => Ok(Query::Ready(service)),
            Ok(service) => {
                warn!("service {} belongs to {}, not {}", service.id, service.org_id, org_id);
                Ok(Query::NotFound)
            }
            Err(e) if e.is_not_found() => Ok(Query::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Target of a by-id service write, checked against the session's organization.
    async fn owned_service(&self, session: &Session, service_id: &str) -> Result<Service, StoreError> {
        session.org_id().ok_or(StoreError::NoOrganization)?;
        match self.service(session, service_id).await? {
            Query::Ready(service) => Ok(service),
            Query::NotFound | Query::NotReady => Err(StoreError::NotFound("Service")),
        }
    }

    async fn owned_incident(&self, session: &Session, incident_id: &str) -> Result<Incident, StoreError> {
        let incidents = match self.incidents(session).await? {
            Query::Ready(incidents) => incidents,
            Query::NotFound | Query::NotReady => return Err(StoreError::NoOrganization),
        };
        incidents
            .into_iter()
            .find(|i| i.id == incident_id)
            .ok_or(StoreError::NotFound("Incident"))
    }

    pub async fn public_status(&self, slug: &str) -> Result<Query<PublicStatus>, StoreError> {
        if slug.trim().is_empty() {
            return Ok(Query::NotReady);
        }
        let key = QueryKey::PublicStatus { slug: slug.to_string() };
        match self.cache.fetch(key, || self.backend.get_public_status(slug)).await {
            Ok(status) => Ok(Query::Ready(status)),
            Err(e) if e.is_not_found() => Ok(Query::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn create_service(&self, session: &Session, form: &ServiceForm) -> Result<Service, StoreError> {
        let draft = form.validate()?;
        let org_id = session.org_id().ok_or(StoreError::NoOrganization)?;

        let service = self
            .backend
            .create_service(&draft.into_new(org_id))
            .await
            .map_err(|e| failed("create service", e))?;

        info!("created service {} ({}) in {}", service.name, service.id, org_id);
        self.invalidate(&[
            Invalidation::org(ResourceKind::Services, org_id),
            Invalidation::all(ResourceKind::PublicStatus),
        ])
        .await;
        Ok(service)
    }

    pub async fn update_service(
        &self,
        session: &Session,
        service_id: &str,
        form: &ServiceForm,
    ) -> Result<Service, StoreError> {
        let draft = form.validate()?;
        self.patch_service(session, service_id, draft.into_patch()).await
    }

    pub async fn set_service_status(
        &self,
        session: &Session,
        service_id: &str,
        status: ServiceStatus,
    ) -> Result<Service, StoreError> {
        let patch = ServicePatch { status: Some(status), ..Default::default() };
        self.patch_service(session, service_id, patch).await
    }

    async fn patch_service(
        &self,
        session: &Session,
        service_id: &str,
        patch: ServicePatch,
    ) -> Result<Service, StoreError> {
        let target = self.owned_service(session, service_id).await?;

        let service = self
            .backend
            .update_service(&target.id, &patch)
            .await
            .map_err(|e| failed("update service", e))?;

        info!("updated service {} ({})", service.name, service.id);
        self.invalidate(&[
            Invalidation::org(ResourceKind::Services, &service.org_id),
            Invalidation::service(service_id),
            Invalidation::all(ResourceKind::PublicStatus),
        ])
        .await;
        Ok(service)
    }

    pub async fn delete_service(&self, session: &Session, service_id: &str) -> Result<(), StoreError> {
        let target = self.owned_service(session, service_id).await?;

        self.backend
            .delete_service(&target.id)
            .await
            .map_err(|e| failed("delete service", e))?;

        info!("deleted service {} from {}", target.id, target.org_id);
        self.invalidate(&[
            Invalidation::org(ResourceKind::Services, &target.org_id),
            Invalidation::service(service_id),
            Invalidation::all(ResourceKind::PublicStatus),
        ])
        .await;
        Ok(())
    }

    pub async fn create_incident(&self, session: &Session, form: &IncidentForm) -> Result<Incident, StoreError> {
        let draft = form.validate()?;
        let org_id = session.org_id().ok_or(StoreError::NoOrganization)?;

        let incident = self
            .backend
            .create_incident(&draft.into_new(org_id))
            .await
            .map_err(|e| failed("create incident", e))?;

        info!("reported incident {} ({}) in {}", incident.title, incident.id, org_id);
        self.invalidate_incidents(org_id).await;
        Ok(incident)
    }

    pub async fn update_incident(
        &self,
        session: &Session,
        incident_id: &str,
        form: &IncidentForm,
    ) -> Result<Incident, StoreError> {
        let draft = form.validate()?;
        self.patch_incident(session, incident_id, draft.into_patch()).await
    }

    pub async fn resolve_incident(&self, session: &Session, incident_id: &str) -> Result<Incident, StoreError> {
        let patch = IncidentPatch { status: Some(IncidentStatus::Resolved), ..Default::default() };
        self.patch_incident(session, incident_id, patch).await
    }

    async fn patch_incident(
        &self,
        session: &Session,
        incident_id: &str,
        patch: IncidentPatch,
    ) -> Result<Incident, StoreError> {
        let target = self.owned_incident(session, incident_id).await?;

        let incident = self
            .backend
            .update_incident(&target.id, &patch)
            .await
            .map_err(|e| failed("update incident", e))?;

        info!("updated incident {} ({}), now {}", incident.title, incident.id, incident.status);
        self.invalidate_incidents(&incident.org_id).await;
        Ok(incident)
    }

    async fn invalidate_incidents(&self, org_id: &str) {
        self.invalidate(&[
            Invalidation::org(ResourceKind::Incidents, org_id),
            Invalidation::all(ResourceKind::PublicStatus),
        ])
        .await;
    }

    /// Registers an organization with the backend. `provider_org_id` links
    /// it to the identity provider's record of the same organization.
    pub async fn create_organization(
        &self,
        form: &OrganizationForm,
        provider_org_id: &str,
    ) -> Result<Organization, StoreError> {
        let draft = form.validate()?;
        let organization = self
            .backend
            .create_organization(&draft.into_new(provider_org_id))
            .await
            .map_err(|e| failed("create organization", e))?;

        info!("created organization {} ({})", organization.slug, organization.id);
        Ok(organization)
    }
}

fn failed(action: &str, error: ApiError) -> StoreError {
    warn!("{} failed: {}", action, error);
    StoreError::Api(error)
}

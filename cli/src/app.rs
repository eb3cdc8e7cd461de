use crate::screens;
use anyhow::{Context, Result};
use colored::*;
use common::{gate, AuthState, Config, DashboardRoute, GateDecision, Route, Session};
use log::{debug, info};
use statuspage_client::{ApiClient, IdentityProvider, LocalIdentity, QueryCache, StatusStore};
use std::time::Duration;

/// Everything a screen needs: configuration, the store, the identity
/// provider and the current auth state.
pub struct App {
    pub config: Config,
    pub store: StatusStore<ApiClient>,
    pub identity: LocalIdentity,
    auth: AuthState,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let client = ApiClient::from_config(&config.api).context("Failed to create API client")?;
        let cache = QueryCache::new(config.cache.stale_after_secs.map(Duration::from_secs));
        let identity = LocalIdentity::from_config(&config.identity, config.publishable_key()?);

        Ok(App {
            store: StatusStore::new(client, cache),
            identity,
            config,
            auth: AuthState::Loading,
        })
    }

    pub async fn bootstrap(&mut self) -> Result<()> {
        self.auth = self
            .identity
            .bootstrap()
            .await
            .context("Failed to read session")?;
        debug!("auth state after bootstrap: {:?}", self.auth.access());
        Ok(())
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn session(&self) -> Option<&Session> {
        self.auth.session()
    }

    /// Replaces the session. Cached reads are dropped whenever the user or
    /// the active organization changes.
    pub async fn set_auth(&mut self, auth: AuthState) {
        let before = self.session().map(|s| (s.user_id.clone(), s.org_id().map(str::to_string)));
        let after = auth.session().map(|s| (s.user_id.clone(), s.org_id().map(str::to_string)));
        if before != after {
            info!("session changed, clearing cached data");
            self.store.reset().await;
        }
        self.auth = auth;
    }

    /// Resolves `route` through the access gate, following redirects and
    /// screen continuations until a screen has nothing further to show.
    pub async fn navigate(&mut self, route: Route) -> Result<()> {
        let mut next = Some(route);
        let mut hops = 0;

        while let Some(route) = next.take() {
            hops += 1;
            if hops > 8 {
                anyhow::bail!("Too many redirects while opening {}", route);
            }

            match gate(route, &self.auth) {
                GateDecision::Blank => return Ok(()),
                GateDecision::Redirect(target) => {
                    println!("{} {}", "↪ Redirecting to".dimmed(), target.to_string().dimmed());
                    next = Some(target);
                }
                GateDecision::Render(route) => {
                    debug!("rendering {}", route);
                    next = self.render(route).await?;
                }
            }
        }
        Ok(())
    }

    async fn render(&mut self, route: Route) -> Result<Option<Route>> {
        match route {
            Route::Landing => {
                screens::landing::show(self);
                Ok(None)
            }
            Route::PublicStatus { slug } => {
                screens::public_status::show(self, &slug).await?;
                Ok(None)
            }
            Route::SignIn => screens::sign_in::run(self, None).await,
            Route::Setup => screens::setup::run(self).await,
            Route::Dashboard(page) => {
                let Some(session) = self.session().cloned() else {
                    return Ok(Some(Route::SignIn));
                };
                match page {
                    DashboardRoute::Overview => screens::overview::show(self, &session).await?,
                    DashboardRoute::Services => screens::services::list(self, &session).await?,
                    DashboardRoute::ServiceDetail { id } => screens::services::detail(self, &session, &id).await?,
                    DashboardRoute::Incidents => screens::incidents::list(self, &session).await?,
                }
                Ok(None)
            }
        }
    }

    /// Session with an active organization. When there is none the user is
    /// sent wherever the gate says they belong first, which may end with one.
    pub async fn require_organization(&mut self) -> Result<Option<Session>> {
        match gate(Route::Dashboard(DashboardRoute::Overview), &self.auth) {
            GateDecision::Render(_) => Ok(self.session().cloned()),
            GateDecision::Redirect(target) => {
                println!("{} {}", "↪ Redirecting to".dimmed(), target.to_string().dimmed());
                self.navigate(target).await?;
                Ok(self.session().filter(|s| s.organization.is_some()).cloned())
            }
            GateDecision::Blank => Ok(None),
        }
    }
}

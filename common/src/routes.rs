//! Path routing and the access gate in front of protected screens.

use crate::session::{Access, AuthState};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Landing,
    PublicStatus { slug: String },
    SignIn,
    Setup,
    Dashboard(DashboardRoute),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardRoute {
    Overview,
    Services,
    ServiceDetail { id: String },
    Incidents,
}

impl Route {
    /// Unknown paths fall through to the landing page.
    pub fn parse(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Route::Landing,
            ["status", slug] => Route::PublicStatus { slug: slug.to_string() },
            ["sign-in"] => Route::SignIn,
            ["setup"] => Route::Setup,
            ["dashboard", rest @ ..] => Route::Dashboard(DashboardRoute::parse(rest)),
            _ => Route::Landing,
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Dashboard(_) | Route::Setup)
    }
}

impl DashboardRoute {
    fn parse(segments: &[&str]) -> DashboardRoute {
        match segments {
            ["services"] => DashboardRoute::Services,
            ["services", id] => DashboardRoute::ServiceDetail { id: id.to_string() },
            ["incidents"] => DashboardRoute::Incidents,
            _ => DashboardRoute::Overview,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Landing => write!(f, "/"),
            Route::PublicStatus { slug } => write!(f, "/status/{}", slug),
            Route::SignIn => write!(f, "/sign-in"),
            Route::Setup => write!(f, "/setup"),
            Route::Dashboard(DashboardRoute::Overview) => write!(f, "/dashboard"),
            Route::Dashboard(DashboardRoute::Services) => write!(f, "/dashboard/services"),
            Route::Dashboard(DashboardRoute::ServiceDetail { id }) => {
                write!(f, "/dashboard/services/{}", id)
            }
            Route::Dashboard(DashboardRoute::Incidents) => write!(f, "/dashboard/incidents"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Auth state is still unknown; render nothing rather than guess.
    Blank,
    Render(Route),
    Redirect(Route),
}

pub fn gate(route: Route, auth: &AuthState) -> GateDecision {
    let access = auth.access();
    if access == Access::Pending {
        return GateDecision::Blank;
    }

    let redirect = match (&route, access) {
        (r, Access::Unauthenticated) if r.is_protected() => Some(Route::SignIn),
        (Route::Dashboard(_), Access::NoOrganization) => Some(Route::Setup),
        (Route::Setup, Access::WithOrganization) => Some(Route::Dashboard(DashboardRoute::Overview)),
        _ => None,
    };

    match redirect {
        Some(target) => GateDecision::Redirect(target),
        None => GateDecision::Render(route),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ActiveOrganization, Session};

    fn signed_in(with_org: bool) -> AuthState {
        AuthState::SignedIn(Session {
            user_id: "user-1".into(),
            email: "ops@acme.test".into(),
            organization: with_org.then(|| ActiveOrganization {
                id: "org-1".into(),
                name: "Acme".into(),
                slug: "acme".into(),
            }),
        })
    }

    #[test]
    fn parses_known_paths() {
        assert_eq!(Route::parse("/"), Route::Landing);
        assert_eq!(Route::parse(""), Route::Landing);
        assert_eq!(Route::parse("/status/acme"), Route::PublicStatus { slug: "acme".into() });
        assert_eq!(Route::parse("/sign-in/"), Route::SignIn);
        assert_eq!(Route::parse("/setup"), Route::Setup);
        assert_eq!(Route::parse("/dashboard"), Route::Dashboard(DashboardRoute::Overview));
        assert_eq!(
            Route::parse("/dashboard/services/svc-9?tab=info"),
            Route::Dashboard(DashboardRoute::ServiceDetail { id: "svc-9".into() })
        );
        assert_eq!(Route::parse("/dashboard/incidents"), Route::Dashboard(DashboardRoute::Incidents));
        assert_eq!(Route::parse("/dashboard/nope/deeper"), Route::Dashboard(DashboardRoute::Overview));
    }

    #[test]
    fn unknown_paths_fall_back_to_landing() {
        assert_eq!(Route::parse("/pricing"), Route::Landing);
        assert_eq!(Route::parse("/status"), Route::Landing);
        assert_eq!(Route::parse("/status/acme/extra"), Route::Landing);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for path in ["/", "/status/acme", "/sign-in", "/setup", "/dashboard", "/dashboard/services/x"] {
            assert_eq!(Route::parse(path).to_string(), path);
        }
    }

    #[test]
    fn pending_bootstrap_renders_nothing() {
        assert_eq!(gate(Route::Landing, &AuthState::Loading), GateDecision::Blank);
        assert_eq!(gate(Route::Setup, &AuthState::Loading), GateDecision::Blank);
    }

    #[test]
    fn public_routes_need_no_session() {
        for route in [Route::Landing, Route::SignIn, Route::PublicStatus { slug: "acme".into() }] {
            assert_eq!(gate(route.clone(), &AuthState::SignedOut), GateDecision::Render(route));
        }
    }

    #[test]
    fn protected_routes_redirect_to_sign_in() {
        let dash = Route::Dashboard(DashboardRoute::Services);
        assert_eq!(gate(dash, &AuthState::SignedOut), GateDecision::Redirect(Route::SignIn));
        assert_eq!(gate(Route::Setup, &AuthState::SignedOut), GateDecision::Redirect(Route::SignIn));
    }

    #[test]
    fn dashboard_without_organization_redirects_to_setup() {
        let dash = Route::Dashboard(DashboardRoute::Overview);
        assert_eq!(gate(dash, &signed_in(false)), GateDecision::Redirect(Route::Setup));
        assert_eq!(gate(Route::Setup, &signed_in(false)), GateDecision::Render(Route::Setup));
    }

    #[test]
    fn organization_members_reach_the_dashboard() {
        let dash = Route::Dashboard(DashboardRoute::Incidents);
        assert_eq!(gate(dash.clone(), &signed_in(true)), GateDecision::Render(dash));
        assert_eq!(
            gate(Route::Setup, &signed_in(true)),
            GateDecision::Redirect(Route::Dashboard(DashboardRoute::Overview))
        );
    }
}

use serde::{Serialize, Deserialize};


/// Organization the signed-in user is currently acting for. Its `id` scopes
/// every service and incident read or write.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ActiveOrganization {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub organization: Option<ActiveOrganization>,
}

impl Session {
    pub fn org_id(&self) -> Option<&str> {
        self.organization.as_ref().map(|org| org.id.as_str())
    }
}

/// What the identity provider knows about the current user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Provider bootstrap has not finished.
    Loading,
    SignedOut,
    SignedIn(Session),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Pending,
    Unauthenticated,
    NoOrganization,
    WithOrganization,
}

impl AuthState {
    pub fn access(&self) -> Access {
        match self {
            AuthState::Loading => Access::Pending,
            AuthState::SignedOut => Access::Unauthenticated,
            AuthState::SignedIn(session) if session.organization.is_some() => Access::WithOrganization,
            AuthState::SignedIn(_) => Access::NoOrganization,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::SignedIn(session) => Some(session),
            _ => None,
        }
    }
}

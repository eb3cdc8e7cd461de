//! Identity provider: who is signed in and which organization they act for.
//!
//! [`LocalIdentity`] keeps accounts and memberships in a TOML file next to
//! the user's config. The record is signed with HMAC-SHA256 keyed by the
//! publishable key; a record that fails verification is treated as absent.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use common::config::IdentityConfig;
use common::{ActiveOrganization, AuthState, Organization, Session};
use hmac::{Hmac, Mac};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Not signed in")]
    NotSignedIn,

    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),

    #[error("Organization name is required")]
    MissingName,

    #[error("No membership for organization {0}")]
    UnknownOrganization(String),

    #[error("Organization {0} has not finished setup")]
    NotLinked(String),

    #[error("invalid signing key")]
    SigningKey,

    #[error("session file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode session: {0}")]
    Encode(String),
}

/// An organization the signed-in user belongs to at the identity provider.
/// `organization` is set once the backend record exists and is linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub provider_org_id: String,
    pub name: String,
    #[serde(default)]
    pub organization: Option<ActiveOrganization>,
}

impl Membership {
    pub fn is_linked(&self) -> bool {
        self.organization.is_some()
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves the stored session. Never returns [`AuthState::Loading`].
    async fn bootstrap(&self) -> Result<AuthState, IdentityError>;
    async fn sign_in(&self, email: &str) -> Result<Session, IdentityError>;
    async fn sign_out(&self) -> Result<(), IdentityError>;
    async fn memberships(&self) -> Result<Vec<Membership>, IdentityError>;
    /// Creates the provider-side organization; it is not active until linked.
    async fn create_organization(&self, name: &str) -> Result<Membership, IdentityError>;
    async fn link_organization(
        &self,
        provider_org_id: &str,
        organization: &Organization,
    ) -> Result<(), IdentityError>;
    async fn set_active(&self, provider_org_id: &str) -> Result<Session, IdentityError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    current: Option<String>,
    #[serde(default)]
    signature: String,
    #[serde(default)]
    accounts: Vec<Account>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    user_id: String,
    email: String,
    #[serde(default)]
    active_org: Option<String>,
    #[serde(default)]
    memberships: Vec<Membership>,
}

impl Account {
    fn session(&self) -> Session {
        let organization = self.active_org.as_deref().and_then(|active| {
            self.memberships
                .iter()
                .find(|m| m.provider_org_id == active)
                .and_then(|m| m.organization.clone())
        });
        Session {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            organization,
        }
    }
}

impl SessionFile {
    fn current_account(&self) -> Option<&Account> {
        let current = self.current.as_deref()?;
        self.accounts.iter().find(|a| a.user_id == current)
    }

    fn current_account_mut(&mut self) -> Result<&mut Account, IdentityError> {
        let current = self.current.clone().ok_or(IdentityError::NotSignedIn)?;
        self.accounts
            .iter_mut()
            .find(|a| a.user_id == current)
            .ok_or(IdentityError::NotSignedIn)
    }
}

pub struct LocalIdentity {
    path: PathBuf,
    key: Vec<u8>,
    // load-modify-save is not atomic on its own
    lock: Mutex<()>,
}

impl LocalIdentity {
    pub fn new(path: impl Into<PathBuf>, publishable_key: &str) -> Self {
        Self {
            path: path.into(),
            key: publishable_key.as_bytes().to_vec(),
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &IdentityConfig, publishable_key: &str) -> Self {
        Self::new(&config.session_path, publishable_key)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> IdentityError {
        IdentityError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn signature(&self, file: &SessionFile) -> Result<String, IdentityError> {
        let payload = serde_json::to_vec(&(&file.current, &file.accounts))
            .map_err(|e| IdentityError::Encode(e.to_string()))?;
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| IdentityError::SigningKey)?;
        mac.update(&payload);
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    fn verify(&self, file: &SessionFile) -> bool {
        let Ok(expected) = STANDARD.decode(file.signature.trim()) else {
            return false;
        };
        let Ok(payload) = serde_json::to_vec(&(&file.current, &file.accounts)) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.key) else {
            return false;
        };
        mac.update(&payload);
        mac.verify_slice(&expected).is_ok()
    }

    /// Missing, unreadable-as-TOML or unverifiable files all load as empty.
    async fn load(&self) -> Result<SessionFile, IdentityError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no session file at {}", self.path.display());
                return Ok(SessionFile::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let file: SessionFile = match toml::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                warn!("ignoring malformed session file {}: {}", self.path.display(), e);
                return Ok(SessionFile::default());
            }
        };

        if !self.verify(&file) {
            warn!("session file {} failed verification, starting signed out", self.path.display());
            return Ok(SessionFile::default());
        }
        Ok(file)
    }

    async fn save(&self, mut file: SessionFile) -> Result<(), IdentityError> {
        file.signature = self.signature(&file)?;
        let content = toml::to_string(&file).map_err(|e| IdentityError::Encode(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| self.io_error(e))?;
        }
        tokio::fs::write(&self.path, content).await.map_err(|e| self.io_error(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&self.path, perms).await.map_err(|e| self.io_error(e))?;
        }
        Ok(())
    }
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

fn normalize_email(email: &str) -> Result<String, IdentityError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => {
            Ok(email)
        }
        _ => Err(IdentityError::InvalidEmail(email)),
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn bootstrap(&self) -> Result<AuthState, IdentityError> {
        let _guard = self.lock.lock().await;
        let file = self.load().await?;
        Ok(match file.current_account() {
            Some(account) => AuthState::SignedIn(account.session()),
            None => AuthState::SignedOut,
        })
    }

    async fn sign_in(&self, email: &str) -> Result<Session, IdentityError> {
        let email = normalize_email(email)?;
        let user_id = format!("user_{}", short_hash(&email));

        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;
        if !file.accounts.iter().any(|a| a.user_id == user_id) {
            file.accounts.push(Account {
                user_id: user_id.clone(),
                email: email.clone(),
                active_org: None,
                memberships: Vec::new(),
            });
        }
        file.current = Some(user_id);

        let session = file.current_account_mut()?.session();
        self.save(file).await?;
        info!("signed in as {}", session.email);
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;
        if file.current.take().is_some() {
            self.save(file).await?;
            info!("signed out");
        }
        Ok(())
    }

    async fn memberships(&self) -> Result<Vec<Membership>, IdentityError> {
        let _guard = self.lock.lock().await;
        let file = self.load().await?;
        file.current_account()
            .map(|a| a.memberships.clone())
            .ok_or(IdentityError::NotSignedIn)
    }

    async fn create_organization(&self, name: &str) -> Result<Membership, IdentityError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IdentityError::MissingName);
        }

        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;
        let account = file.current_account_mut()?;

        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let membership = Membership {
            provider_org_id: format!("org_{}", short_hash(&format!("{}:{}:{}", account.email, name, nanos))),
            name: name.to_string(),
            organization: None,
        };
        account.memberships.push(membership.clone());

        self.save(file).await?;
        info!("created provider organization {} ({})", membership.name, membership.provider_org_id);
        Ok(membership)
    }

    async fn link_organization(
        &self,
        provider_org_id: &str,
        organization: &Organization,
    ) -> Result<(), IdentityError> {
        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;
        let membership = file
            .current_account_mut()?
            .memberships
            .iter_mut()
            .find(|m| m.provider_org_id == provider_org_id)
            .ok_or_else(|| IdentityError::UnknownOrganization(provider_org_id.to_string()))?;

        membership.organization = Some(ActiveOrganization {
            id: organization.id.clone(),
            name: organization.name.clone(),
            slug: organization.slug.clone(),
        });
        self.save(file).await?;
        debug!("linked {} to backend organization {}", provider_org_id, organization.id);
        Ok(())
    }

    async fn set_active(&self, provider_org_id: &str) -> Result<Session, IdentityError> {
        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;
        let account = file.current_account_mut()?;

        let membership = account
            .memberships
            .iter()
            .find(|m| m.provider_org_id == provider_org_id)
            .ok_or_else(|| IdentityError::UnknownOrganization(provider_org_id.to_string()))?;
        if !membership.is_linked() {
            return Err(IdentityError::NotLinked(provider_org_id.to_string()));
        }

        account.active_org = Some(provider_org_id.to_string());
        let session = account.session();
        self.save(file).await?;
        info!("active organization is now {}", provider_org_id);
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized_and_checked() {
        assert_eq!(normalize_email("  Ops@Acme.Test ").unwrap(), "ops@acme.test");
        assert!(normalize_email("ops").is_err());
        assert!(normalize_email("@acme.test").is_err());
        assert!(normalize_email("ops@localhost").is_err());
    }

    #[test]
    fn user_ids_are_stable_per_email() {
        assert_eq!(short_hash("ops@acme.test"), short_hash("ops@acme.test"));
        assert_ne!(short_hash("ops@acme.test"), short_hash("dev@acme.test"));
        assert_eq!(short_hash("x").len(), 16);
    }

    #[test]
    fn signature_depends_on_key_and_content() {
        let a = LocalIdentity::new("unused.toml", "pk_a");
        let b = LocalIdentity::new("unused.toml", "pk_b");
        let mut file = SessionFile { current: Some("user_1".into()), ..Default::default() };

        file.signature = a.signature(&file).unwrap();
        assert!(a.verify(&file));
        assert!(!b.verify(&file));

        file.current = Some("user_2".into());
        assert!(!a.verify(&file));
    }
}

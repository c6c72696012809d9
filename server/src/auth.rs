//! API key authentication (§7.2): resolves a bearer token to a caller
//! identity, role and optional brand scope. Keys live in a small TOML table
//! next to `catalog.toml`, following the same discover/load pattern as
//! `CatalogConfig` rather than a database-backed key store (§9 Open
//! Question: dynamic key issuance is future work, not needed for a
//! single-tenant deployment).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::Deserialize;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    SalesEngineer,
    ProductManager,
    Admin,
}

impl Role {
    /// §7.2: only product managers and admins may ingest documents or
    /// resolve conflicts; everyone else is read-only.
    pub fn can_write(&self) -> bool {
        matches!(self, Role::ProductManager | Role::Admin)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyEntry {
    pub caller_id: String,
    pub role: Role,
    /// Restricts the caller to one brand's products; `None` means unscoped.
    pub brand_scope: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ApiKeyFile {
    #[serde(default)]
    keys: HashMap<String, ApiKeyEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct ApiKeyTable {
    keys: HashMap<String, ApiKeyEntry>,
}

impl ApiKeyTable {
    pub fn new(keys: HashMap<String, ApiKeyEntry>) -> Self {
        Self { keys }
    }

    pub fn resolve(&self, key: &str) -> Option<&ApiKeyEntry> {
        self.keys.get(key)
    }

    /// Walks up from `start` looking for `api_keys.toml`, mirroring
    /// `CatalogConfig::discover`.
    pub fn discover(start: &Path) -> Option<PathBuf> {
        let mut dir = Some(start);
        while let Some(d) = dir {
            let candidate = d.join("api_keys.toml");
            if candidate.is_file() {
                return Some(candidate);
            }
            dir = d.parent();
        }
        None
    }

    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::warn!("no api_keys.toml found; starting with an empty API key table, every request will be rejected");
            return Self::default();
        };
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ApiKeyFile>(&contents) {
                Ok(file) => Self::new(file.keys),
                Err(e) => {
                    tracing::error!(error = %e, path = %path.display(), "failed to parse api_keys.toml, starting empty");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "failed to read api_keys.toml, starting empty");
                Self::default()
            }
        }
    }
}

/// The resolved caller identity attached to a request, extracted from the
/// `Authorization: Bearer <key>` header against the app's `ApiKeyTable`.
#[derive(Debug, Clone)]
pub struct Caller {
    pub caller_id: String,
    pub role: Role,
    pub brand_scope: Option<String>,
}

impl Caller {
    pub fn in_scope(&self, brand: &str) -> bool {
        self.brand_scope.as_deref().map(|scope| scope.eq_ignore_ascii_case(brand)).unwrap_or(true)
    }

    pub fn require_write(&self) -> Result<(), ApiError> {
        if self.role.can_write() {
            Ok(())
        } else {
            Err(ApiError::forbidden("caller's role does not permit write operations"))
        }
    }
}

impl<S> FromRequestParts<S> for Caller
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::forbidden("missing Authorization header"))?;
        let key = header.strip_prefix("Bearer ").ok_or_else(|| ApiError::forbidden("expected a Bearer token"))?;
        let entry = app_state.api_keys.resolve(key).ok_or_else(|| ApiError::forbidden("invalid API key"))?;
        Ok(Caller { caller_id: entry.caller_id.clone(), role: entry.role, brand_scope: entry.brand_scope.clone() })
    }
}

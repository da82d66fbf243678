//! Profile repository backed by the hosted relational REST endpoint.
//!
//! Row-level policies on `profiles` only expose a user's own row, so the
//! lookup is authorized with the signed-in user's bearer token.

use std::sync::Arc;

use reqwest::Method;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use super::{HttpSessionStore, PlatformClient};
use crate::auth::{CollaboratorError, ProfileRepository, Role};

const PROFILES_PATH: &str = "/rest/v1/profiles";

pub struct HttpProfileRepository {
    client: PlatformClient,
    sessions: Arc<HttpSessionStore>,
}

impl HttpProfileRepository {
    #[must_use]
    pub fn new(client: PlatformClient, sessions: Arc<HttpSessionStore>) -> Self {
        Self { client, sessions }
    }
}

#[async_trait::async_trait]
impl ProfileRepository for HttpProfileRepository {
    async fn role_for_identity(&self, id: Uuid) -> Result<Option<Role>, CollaboratorError> {
        let bearer = self
            .sessions
            .access_token()
            .unwrap_or_else(|| self.client.anon_key().to_owned());
        let request = self
            .client
            .request(Method::GET, &role_query_path(id))
            .bearer_auth(bearer)
            .header("Accept", "application/json");
        let body = self.client.send(request).await?;
        parse_role_rows(&body, id)
    }
}

#[must_use]
pub fn role_query_path(id: Uuid) -> String {
    format!("{PROFILES_PATH}?select=role&id=eq.{id}&limit=1")
}

#[derive(Deserialize)]
struct RoleRow {
    role: Option<String>,
}

/// Parse the row set returned for a role query. No rows, a null role and an
/// unrecognized role all resolve to `None`.
///
/// # Errors
///
/// Returns [`CollaboratorError::Malformed`] if the body is not a row array.
pub fn parse_role_rows(body: &str, id: Uuid) -> Result<Option<Role>, CollaboratorError> {
    let rows: Vec<RoleRow> =
        serde_json::from_str(body).map_err(|e| CollaboratorError::Malformed(format!("profile rows: {e}")))?;
    let Some(raw) = rows.into_iter().next().and_then(|row| row.role) else {
        return Ok(None);
    };
    let role = Role::parse(&raw);
    if role.is_none() {
        warn!(identity = %id, role = %raw, "unrecognized role on profile");
    }
    Ok(role)
}

//! Route guard endpoint used by the dashboard before rendering a page.

use axum::{extract::Query, Json};
use serde::{Deserialize, Serialize};

use crate::access::{self, GuardDecision};
use crate::db::User;

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub allowed: bool,
    /// Where to send the actor when access is denied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_label: Option<String>,
}

/// Evaluate the guard for a dashboard path.
///
/// Public pages are open to anonymous visitors. Every other page needs a
/// session, and a failed session lookup counts as no session.
pub async fn check_access(
    user: Option<User>,
    Query(query): Query<AccessQuery>,
) -> Json<AccessResponse> {
    let allowed_roles = access::allowed_roles_for(&query.path);
    let role = user.as_ref().map(|u| u.role.as_str());

    let decision = match role {
        None if allowed_roles.is_empty() => GuardDecision::Allow,
        _ => access::evaluate(role, allowed_roles),
    };

    Json(AccessResponse {
        allowed: decision == GuardDecision::Allow,
        redirect: match decision {
            GuardDecision::Allow => None,
            GuardDecision::Redirect(target) => Some(target.path().to_string()),
        },
        role_label: role.map(access::role_label),
    })
}

//! Role-based access control.
//!
//! Every page of the dashboard and every gated API area is described by the
//! set of roles allowed to see it. [`evaluate`] turns an optional actor and
//! such a set into either [`GuardDecision::Allow`] or a redirect to the
//! place the actor belongs.

use serde::{Deserialize, Serialize};

/// Actor roles. Stored as lowercase strings in `users.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Owner,
    User,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Owner, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Owner => "owner",
            Role::User => "user",
        }
    }

    /// Landing page for this role
    pub fn home(&self) -> RouteTarget {
        match self {
            Role::Admin => RouteTarget::AdminDashboard,
            Role::Owner | Role::User => RouteTarget::OwnerDashboard,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            "user" => Ok(Role::User),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Display names shown in the dashboard, keyed by role.
const ROLE_LABELS: [(Role, &str); 3] = [
    (Role::Admin, "Admin"),
    (Role::Owner, "Pemilik"),
    (Role::User, "Pemilik"),
];

/// Presentation label for a raw role string. Unknown roles are shown as-is.
pub fn role_label(role: &str) -> String {
    role.parse::<Role>()
        .ok()
        .and_then(|parsed| {
            ROLE_LABELS
                .iter()
                .find(|(r, _)| *r == parsed)
                .map(|(_, label)| label.to_string())
        })
        .unwrap_or_else(|| role.to_string())
}

/// Where a denied actor is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTarget {
    Login,
    AdminDashboard,
    OwnerDashboard,
    Unauthorized,
}

impl RouteTarget {
    pub fn path(&self) -> &'static str {
        match self {
            RouteTarget::Login => "/login",
            RouteTarget::AdminDashboard => "/admin/dashboard",
            RouteTarget::OwnerDashboard => "/owner/dashboard",
            RouteTarget::Unauthorized => "/unauthorized",
        }
    }
}

/// Home page for a raw role string; unrecognized roles land on the
/// unauthorized page.
pub fn home_for(role: &str) -> RouteTarget {
    role.parse::<Role>()
        .map(|r| r.home())
        .unwrap_or(RouteTarget::Unauthorized)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(RouteTarget),
}

/// Evaluate the guard for an actor given by its raw role string.
///
/// `None` means there is no authenticated actor; a failed session lookup
/// must be passed as `None` as well.
pub fn evaluate(actor_role: Option<&str>, allowed: &[Role]) -> GuardDecision {
    let Some(role) = actor_role else {
        return GuardDecision::Redirect(RouteTarget::Login);
    };

    if allowed.is_empty() {
        return GuardDecision::Allow;
    }

    match role.parse::<Role>() {
        Ok(parsed) if allowed.contains(&parsed) => GuardDecision::Allow,
        _ => GuardDecision::Redirect(home_for(role)),
    }
}

pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
pub const OWNER_AREA: &[Role] = &[Role::Owner, Role::User];
pub const PUBLIC: &[Role] = &[];

/// Dashboard pages and the roles allowed to view them.
/// `:id` segments match any single path segment.
const PAGES: &[(&str, &[Role])] = &[
    ("/login", PUBLIC),
    ("/register", PUBLIC),
    ("/unauthorized", PUBLIC),
    ("/owner/dashboard", OWNER_AREA),
    ("/owner/listings", OWNER_AREA),
    ("/owner/listings/new", OWNER_AREA),
    ("/owner/listings/:id", OWNER_AREA),
    ("/owner/listings/:id/edit", OWNER_AREA),
    ("/admin/dashboard", ADMIN_ONLY),
    ("/admin/listings", ADMIN_ONLY),
    ("/admin/users", ADMIN_ONLY),
];

fn pattern_matches(pattern: &str, path: &str) -> bool {
    let mut pattern_parts = pattern.trim_matches('/').split('/');
    let mut path_parts = path.trim_matches('/').split('/');
    loop {
        match (pattern_parts.next(), path_parts.next()) {
            (None, None) => return true,
            (Some(p), Some(s)) if p.starts_with(':') && !s.is_empty() => continue,
            (Some(p), Some(s)) if p == s => continue,
            _ => return false,
        }
    }
}

/// Allowed roles for a dashboard path. Literal patterns win over
/// parameterized ones, so `/owner/listings/new` is not read as an id.
/// Unregistered paths carry no role restriction.
pub fn allowed_roles_for(path: &str) -> &'static [Role] {
    let path = path.split('?').next().unwrap_or(path);
    PAGES
        .iter()
        .filter(|(pattern, _)| pattern_matches(pattern, path))
        .min_by_key(|(pattern, _)| pattern.matches(':').count())
        .map(|(_, roles)| *roles)
        .unwrap_or(PUBLIC)
}

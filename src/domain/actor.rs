use crate::error::TrackingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who performs a mutating operation. Passed explicitly; there is no ambient session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum Actor {
    Admin(String),
    Customer(String),
    System,
}

impl Actor {
    pub fn admin(id: impl Into<String>) -> Self {
        Actor::Admin(id.into())
    }

    pub fn customer(email: impl Into<String>) -> Self {
        Actor::Customer(email.into())
    }

    /// Admins and automated feeds may record courier events.
    pub fn can_record_events(&self) -> bool {
        matches!(self, Actor::Admin(_) | Actor::System)
    }

    pub(crate) fn require_admin(&self, operation: &str) -> Result<&str, TrackingError> {
        match self {
            Actor::Admin(id) => Ok(id),
            other => Err(TrackingError::Forbidden(format!(
                "{other} may not {operation}"
            ))),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Admin(id) => write!(f, "admin:{id}"),
            Actor::Customer(email) => write!(f, "customer:{email}"),
            Actor::System => f.write_str("system"),
        }
    }
}

impl FromStr for Actor {
    type Err = TrackingError;

    /// Parses `admin:<id>`, `customer:<email>` or `system`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("system") {
            return Ok(Actor::System);
        }
        match s.split_once(':') {
            Some((role, id)) if !id.trim().is_empty() => match role.to_ascii_lowercase().as_str()
            {
                "admin" => Ok(Actor::admin(id.trim())),
                "customer" => Ok(Actor::customer(id.trim())),
                _ => Err(TrackingError::Validation(format!("unknown actor role '{role}'"))),
            },
            _ => Err(TrackingError::Validation(format!("malformed actor '{s}'"))),
        }
    }
}

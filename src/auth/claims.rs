use serde::{Deserialize, Serialize};

use crate::auth::repo_types::{Role, User};

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,      // user ID
    pub email: String,
    pub role: Role,
    pub name: String,
    pub iat: usize,    // issued at (unix timestamp)
    pub exp: usize,    // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}

/// The authenticated caller, as carried by a valid token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub name: String,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owners and admins may change a resource.
    pub fn can_modify(&self, owner_id: Option<i64>) -> bool {
        self.is_admin() || owner_id == Some(self.id)
    }
}

impl From<Claims> for Identity {
    fn from(c: Claims) -> Self {
        Self {
            id: c.sub,
            email: c.email,
            role: c.role,
            name: c.name,
        }
    }
}

impl From<&User> for Identity {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            role: u.role,
            name: u.name.clone(),
        }
    }
}

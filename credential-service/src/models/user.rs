//! Portal user model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    /// Subject identifier from the external identity provider.
    pub uid: String,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    /// Provider-gateway identifier, set when the user registers as an
    /// Authorized Official. Never overwritten once present.
    pub pac_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(uid: String, email: String, given_name: String, family_name: String) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            uid,
            email,
            given_name,
            family_name,
            pac_id: None,
            created_at: Utc::now(),
        }
    }
}

use serde::{Deserialize, Serialize};

/// Claims carried by every access token issued to a marketplace user.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn is_expired_at(&self, unix_seconds: i64) -> bool {
        self.exp <= unix_seconds
    }
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub(crate) const LIKE_COLUMNS: &str = "id, user_id, property_id, created_at";

/// A user's like of a property. At most one per (user, property) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Like {
    pub id: Uuid,
    pub user_id: Uuid,
    pub property_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Like {
    pub fn new(user_id: Uuid, property_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            property_id,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

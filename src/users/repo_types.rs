use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::StoreError;
use crate::users::model::{HashedPassword, Role, User, UserProps};

pub(crate) const USER_COLUMNS: &str =
    "id, name, email, password, avatar, role, is_active, created_at, updated_at, deleted_at";

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String, // case-folded, unique
    pub password: String, // Argon2 PHC string
    pub avatar: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let id = r.id;
        let role = r
            .role
            .parse::<Role>()
            .map_err(|e| anyhow::anyhow!("user {} has unknown role: {}", id, e))?;
        User::from_persistence(UserProps {
            id: r.id,
            name: r.name,
            email: r.email,
            password: HashedPassword::from_stored(r.password),
            avatar: r.avatar,
            role,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
            deleted_at: r.deleted_at,
        })
        .map_err(|e| StoreError::Other(anyhow::anyhow!("user {} failed validation: {}", id, e)))
    }
}

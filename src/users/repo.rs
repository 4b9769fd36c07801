use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::StoreResult;
use crate::users::model::{ProfileChanges, Role, User};
use crate::users::repo_types::{UserRow, USER_COLUMNS};

/// Persistence contract for users.
///
/// Reads named "active" skip soft-deleted rows. `find_by_id` and
/// `find_by_email` return a row whatever its state so callers can tell
/// "absent" from "deactivated". Email uniqueness is enforced by the store.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Includes the password hash; used by login.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Active users, newest first.
    async fn find_all_active(&self) -> StoreResult<Vec<User>>;

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool>;

    /// Inserts a new user or fully overwrites the row with the same id.
    async fn save(&self, user: &User) -> StoreResult<User>;

    /// Overwrites profile fields and password of an active row. Returns None
    /// when the row is absent or deactivated; activity is never touched.
    async fn update_active(&self, user: &User) -> StoreResult<Option<User>>;

    /// Applies a partial profile change to the stored row atomically.
    async fn update(&self, id: Uuid, changes: ProfileChanges) -> StoreResult<Option<User>>;

    /// Soft delete. Returns false when no active row matched.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    /// Number of active users.
    async fn count(&self) -> StoreResult<i64>;

    /// Active users with the given role, newest first.
    async fn find_by_role(&self, role: Role) -> StoreResult<Vec<User>>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_users(rows: Vec<UserRow>) -> StoreResult<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_all_active(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE is_active ORDER BY created_at DESC",
            USER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        into_users(rows)
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.db)
                .await?;
        Ok(exists)
    }

    async fn save(&self, user: &User) -> StoreResult<User> {
        let p = user.props();
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, name, email, password, avatar, role, is_active,
                               created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                password = EXCLUDED.password,
                avatar = EXCLUDED.avatar,
                role = EXCLUDED.role,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at,
                deleted_at = EXCLUDED.deleted_at
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(p.id)
        .bind(&p.name)
        .bind(&p.email)
        .bind(p.password.as_str())
        .bind(&p.avatar)
        .bind(p.role.as_str())
        .bind(p.is_active)
        .bind(p.created_at)
        .bind(p.updated_at)
        .bind(p.deleted_at)
        .fetch_one(&self.db)
        .await?;
        User::try_from(row)
    }

    async fn update_active(&self, user: &User) -> StoreResult<Option<User>> {
        let p = user.props();
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET name = $2, email = $3, password = $4, avatar = $5, role = $6,
                   updated_at = $7
             WHERE id = $1 AND is_active
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(p.id)
        .bind(&p.name)
        .bind(&p.email)
        .bind(p.password.as_str())
        .bind(&p.avatar)
        .bind(p.role.as_str())
        .bind(p.updated_at)
        .fetch_optional(&self.db)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn update(&self, id: Uuid, changes: ProfileChanges) -> StoreResult<Option<User>> {
        let mut tx = self.db.begin().await?;
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1 FOR UPDATE",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let updated = User::try_from(row)?.update_profile(changes)?;
        let p = updated.props();
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET name = $2, email = $3, avatar = $4, role = $5, updated_at = $6
             WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(p.id)
        .bind(&p.name)
        .bind(&p.email)
        .bind(&p.avatar)
        .bind(p.role.as_str())
        .bind(p.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        User::try_from(row).map(Some)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET is_active = FALSE, deleted_at = now(), updated_at = now()
             WHERE id = $1 AND is_active
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> StoreResult<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active")
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }

    async fn find_by_role(&self, role: Role) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE is_active AND role = $1 ORDER BY created_at DESC",
            USER_COLUMNS
        ))
        .bind(role.as_str())
        .fetch_all(&self.db)
        .await?;
        into_users(rows)
    }
}

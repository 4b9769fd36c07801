use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{StoreError, StoreResult};
use crate::users::model::{ProfileChanges, Role, User};
use crate::users::repo::UserRepository;

const EMAIL_CONSTRAINT: &str = "users_email_key";

/// In-memory implementation of UserRepository (for development/testing).
/// Enforces the same email unique constraint as the SQL schema.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(users: &HashMap<Uuid, User>, candidate: &User) -> bool {
    users
        .values()
        .any(|u| u.id() != candidate.id() && u.email() == candidate.email())
}

fn newest_first(mut users: Vec<User>) -> Vec<User> {
    users.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    users
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email() == email).cloned())
    }

    async fn find_all_active(&self) -> StoreResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(newest_first(
            users.values().filter(|u| u.is_active()).cloned().collect(),
        ))
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        let users = self.users.read().await;
        Ok(users.values().any(|u| u.email() == email))
    }

    async fn save(&self, user: &User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if email_taken(&users, user) {
            return Err(StoreError::UniqueViolation(EMAIL_CONSTRAINT.into()));
        }
        users.insert(user.id(), user.clone());
        Ok(user.clone())
    }

    async fn update_active(&self, user: &User) -> StoreResult<Option<User>> {
        let mut users = self.users.write().await;
        match users.get(&user.id()) {
            Some(current) if current.is_active() => {}
            _ => return Ok(None),
        }
        if email_taken(&users, user) {
            return Err(StoreError::UniqueViolation(EMAIL_CONSTRAINT.into()));
        }
        users.insert(user.id(), user.clone());
        Ok(Some(user.clone()))
    }

    async fn update(&self, id: Uuid, changes: ProfileChanges) -> StoreResult<Option<User>> {
        let mut users = self.users.write().await;
        let Some(current) = users.get(&id) else {
            return Ok(None);
        };
        let updated = current.update_profile(changes)?;
        if email_taken(&users, &updated) {
            return Err(StoreError::UniqueViolation(EMAIL_CONSTRAINT.into()));
        }
        users.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        let gone = match users.get(&id) {
            Some(u) if u.is_active() => u.deactivate(),
            _ => return Ok(false),
        };
        users.insert(id, gone);
        Ok(true)
    }

    async fn count(&self) -> StoreResult<i64> {
        let users = self.users.read().await;
        Ok(users.values().filter(|u| u.is_active()).count() as i64)
    }

    async fn find_by_role(&self, role: Role) -> StoreResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(newest_first(
            users
                .values()
                .filter(|u| u.is_active() && u.role() == role)
                .cloned()
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::model::{HashedPassword, NewUser, UserProps};
    use time::OffsetDateTime;

    fn user(name: &str, email: &str, role: Role) -> User {
        User::create(NewUser {
            name: name.into(),
            email: email.into(),
            password: HashedPassword::from_stored("$argon2id$stub".into()),
            avatar: None,
            role,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn save_and_find() {
        let repo = InMemoryUserRepository::new();
        let ana = repo.save(&user("Ana", "ana@x.com", Role::Buyer)).await.unwrap();

        assert_eq!(repo.find_by_id(ana.id()).await.unwrap(), Some(ana.clone()));
        assert!(repo.find_by_email("ana@x.com").await.unwrap().is_some());
        assert!(repo.exists_by_email("ana@x.com").await.unwrap());
        assert!(!repo.exists_by_email("bob@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_email_violates_constraint() {
        let repo = InMemoryUserRepository::new();
        repo.save(&user("Ana", "ana@x.com", Role::Buyer)).await.unwrap();
        let err = repo
            .save(&user("Other Ana", "ANA@x.com", Role::Seller))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn save_overwrites_existing_row() {
        let repo = InMemoryUserRepository::new();
        let ana = repo.save(&user("Ana", "ana@x.com", Role::Buyer)).await.unwrap();
        let renamed = ana
            .update_profile(ProfileChanges {
                name: Some("Ana Maria".into()),
                ..Default::default()
            })
            .unwrap();
        repo.save(&renamed).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
        let stored = repo.find_by_id(ana.id()).await.unwrap().unwrap();
        assert_eq!(stored.name(), "Ana Maria");
    }

    #[tokio::test]
    async fn update_active_skips_deactivated_rows() {
        let repo = InMemoryUserRepository::new();
        let ana = repo.save(&user("Ana", "ana@x.com", Role::Buyer)).await.unwrap();
        let renamed = ana
            .update_profile(ProfileChanges {
                name: Some("Ana Maria".into()),
                ..Default::default()
            })
            .unwrap();
        let stored = repo.update_active(&renamed).await.unwrap().unwrap();
        assert_eq!(stored.name(), "Ana Maria");

        repo.delete(ana.id()).await.unwrap();
        let late = renamed
            .update_profile(ProfileChanges {
                name: Some("Ana Late".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(repo.update_active(&late).await.unwrap().is_none());
        let stored = repo.find_by_id(ana.id()).await.unwrap().unwrap();
        assert!(!stored.is_active());
        assert_eq!(stored.name(), "Ana Maria");

        let ghost = user("Ghost", "ghost@x.com", Role::Buyer);
        assert!(repo.update_active(&ghost).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn soft_delete_hides_from_active_reads_but_keeps_row() {
        let repo = InMemoryUserRepository::new();
        let ana = repo.save(&user("Ana", "ana@x.com", Role::Buyer)).await.unwrap();
        repo.save(&user("Bob", "bob@x.com", Role::Buyer)).await.unwrap();

        assert!(repo.delete(ana.id()).await.unwrap());
        assert!(!repo.delete(ana.id()).await.unwrap());

        let active = repo.find_all_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].email(), "bob@x.com");
        assert_eq!(repo.count().await.unwrap(), 1);

        let row = repo.find_by_id(ana.id()).await.unwrap().expect("row kept");
        assert!(!row.is_active());
        assert!(row.deleted_at().is_some());
    }

    #[tokio::test]
    async fn find_by_role_filters_active_users() {
        let repo = InMemoryUserRepository::new();
        repo.save(&user("Ana", "ana@x.com", Role::Seller)).await.unwrap();
        let bob = repo.save(&user("Bob", "bob@x.com", Role::Seller)).await.unwrap();
        repo.save(&user("Cid", "cid@x.com", Role::Buyer)).await.unwrap();
        repo.delete(bob.id()).await.unwrap();

        let sellers = repo.find_by_role(Role::Seller).await.unwrap();
        assert_eq!(sellers.len(), 1);
        assert_eq!(sellers[0].email(), "ana@x.com");
    }

    #[tokio::test]
    async fn update_applies_partial_changes() {
        let repo = InMemoryUserRepository::new();
        let ana = repo.save(&user("Ana", "ana@x.com", Role::Buyer)).await.unwrap();
        repo.save(&user("Bob", "bob@x.com", Role::Buyer)).await.unwrap();

        let updated = repo
            .update(
                ana.id(),
                ProfileChanges {
                    avatar: Some("https://cdn.local/ana.png".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.avatar(), Some("https://cdn.local/ana.png"));
        assert_eq!(updated.name(), "Ana");

        let clash = repo
            .update(
                ana.id(),
                ProfileChanges {
                    email: Some("bob@x.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(clash, StoreError::UniqueViolation(_)));

        assert!(repo
            .update(Uuid::new_v4(), ProfileChanges::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn active_listing_is_newest_first() {
        let repo = InMemoryUserRepository::new();
        let older = user("Old", "old@x.com", Role::Buyer);
        let older = User::from_persistence(UserProps {
            created_at: OffsetDateTime::now_utc() - time::Duration::hours(1),
            ..older.props().clone()
        })
        .unwrap();
        repo.save(&older).await.unwrap();
        repo.save(&user("New", "new@x.com", Role::Buyer)).await.unwrap();

        let all = repo.find_all_active().await.unwrap();
        assert_eq!(all[0].email(), "new@x.com");
        assert_eq!(all[1].email(), "old@x.com");
    }
}

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ValidationError;

const NAME_MIN_LEN: usize = 2;
const PASSWORD_MIN_LEN: usize = 9;
const PASSWORD_MAX_LEN: usize = 15;
pub const PASSWORD_SPECIALS: &str = "?_#$%^&";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails are stored and compared case-folded.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Closed role enumeration. There is no hierarchy between roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" => Ok(Role::Buyer),
            "seller" => Ok(Role::Seller),
            "admin" => Ok(Role::Admin),
            other => Err(ValidationError::rule(format!(
                "role must be one of buyer, seller, admin (got '{}')",
                other
            ))),
        }
    }
}

/// Plaintext password that satisfies the password policy.
///
/// Policy: 9 to 15 characters drawn from ASCII letters, digits and
/// `? _ # $ % ^ &`, with at least one uppercase letter and at least one of
/// those special characters.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn parse(plain: &str) -> Result<Self, ValidationError> {
        let mut violations = Vec::new();
        let len = plain.chars().count();
        if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
            violations.push(format!(
                "password must be {}-{} characters long",
                PASSWORD_MIN_LEN, PASSWORD_MAX_LEN
            ));
        }
        if !plain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c))
        {
            violations.push(format!(
                "password may only contain letters, digits and {}",
                PASSWORD_SPECIALS
            ));
        }
        if !plain.chars().any(|c| c.is_ascii_uppercase()) {
            violations.push("password must include at least one uppercase letter".into());
        }
        if !plain.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
            violations.push(format!(
                "password must include at least one special character ({})",
                PASSWORD_SPECIALS
            ));
        }
        if violations.is_empty() {
            Ok(Self(plain.to_string()))
        } else {
            Err(ValidationError(violations))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Argon2 PHC string, produced by the credential manager from a
/// policy-checked [`Password`] or loaded back from storage.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword(String);

impl HashedPassword {
    pub fn from_stored(phc: String) -> Self {
        Self(phc)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HashedPassword(***)")
    }
}

/// Input for [`User::create`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: HashedPassword,
    pub avatar: Option<String>,
    pub role: Role,
}

/// Every stored field of a user, used to rebuild the aggregate from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProps {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: HashedPassword,
    pub avatar: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

/// Fields accepted by [`User::update_profile`]; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub role: Option<Role>,
    pub email: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.avatar.is_none() && self.role.is_none() && self.email.is_none()
    }
}

/// User aggregate. Immutable: every transition returns a new, fully
/// re-validated value with a refreshed `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    props: UserProps,
}

impl User {
    pub fn create(new: NewUser) -> Result<User, ValidationError> {
        let now = OffsetDateTime::now_utc();
        Self::from_props(UserProps {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password: new.password,
            avatar: new.avatar,
            role: new.role,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    pub fn from_persistence(props: UserProps) -> Result<User, ValidationError> {
        Self::from_props(props)
    }

    fn from_props(mut props: UserProps) -> Result<User, ValidationError> {
        props.name = props.name.trim().to_string();
        props.email = normalize_email(&props.email);
        props.avatar = props.avatar.filter(|a| !a.trim().is_empty());

        let mut violations = Vec::new();
        if props.name.chars().count() < NAME_MIN_LEN {
            violations.push(format!(
                "name must be at least {} characters long",
                NAME_MIN_LEN
            ));
        }
        if !is_valid_email(&props.email) {
            violations.push("email must be a valid address".to_string());
        }
        if violations.is_empty() {
            Ok(User { props })
        } else {
            Err(ValidationError(violations))
        }
    }

    pub fn id(&self) -> Uuid {
        self.props.id
    }
    pub fn name(&self) -> &str {
        &self.props.name
    }
    pub fn email(&self) -> &str {
        &self.props.email
    }
    pub fn password(&self) -> &HashedPassword {
        &self.props.password
    }
    pub fn avatar(&self) -> Option<&str> {
        self.props.avatar.as_deref()
    }
    pub fn role(&self) -> Role {
        self.props.role
    }
    pub fn is_active(&self) -> bool {
        self.props.is_active
    }
    pub fn created_at(&self) -> OffsetDateTime {
        self.props.created_at
    }
    pub fn updated_at(&self) -> OffsetDateTime {
        self.props.updated_at
    }
    pub fn deleted_at(&self) -> Option<OffsetDateTime> {
        self.props.deleted_at
    }

    pub fn props(&self) -> &UserProps {
        &self.props
    }

    pub fn update_profile(&self, changes: ProfileChanges) -> Result<User, ValidationError> {
        let current = &self.props;
        Self::from_props(UserProps {
            name: changes.name.unwrap_or_else(|| current.name.clone()),
            avatar: changes.avatar.or_else(|| current.avatar.clone()),
            role: changes.role.unwrap_or(current.role),
            email: changes.email.unwrap_or_else(|| current.email.clone()),
            updated_at: OffsetDateTime::now_utc(),
            ..current.clone()
        })
    }

    pub fn change_password(&self, new_password: HashedPassword) -> User {
        User {
            props: UserProps {
                password: new_password,
                updated_at: OffsetDateTime::now_utc(),
                ..self.props.clone()
            },
        }
    }

    pub fn deactivate(&self) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            props: UserProps {
                is_active: false,
                deleted_at: Some(now),
                updated_at: now,
                ..self.props.clone()
            },
        }
    }

    pub fn activate(&self) -> User {
        User {
            props: UserProps {
                is_active: true,
                deleted_at: None,
                updated_at: OffsetDateTime::now_utc(),
                ..self.props.clone()
            },
        }
    }

    pub fn to_response(&self) -> UserResponse {
        let p = &self.props;
        UserResponse {
            id: p.id,
            name: p.name.clone(),
            email: p.email.clone(),
            avatar: p.avatar.clone(),
            role: p.role,
            is_active: p.is_active,
            created_at: p.created_at,
            updated_at: p.updated_at,
            deleted_at: p.deleted_at,
        }
    }
}

/// Outward projection of a user. Carries no password field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub deleted_at: Option<OffsetDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user() -> NewUser {
        NewUser {
            name: "  Ana Diaz ".into(),
            email: " Ana@X.com".into(),
            password: HashedPassword::from_stored("$argon2id$stub".into()),
            avatar: None,
            role: Role::Buyer,
        }
    }

    #[test]
    fn create_normalizes_name_and_email() {
        let user = User::create(new_user()).expect("valid user");
        assert_eq!(user.name(), "Ana Diaz");
        assert_eq!(user.email(), "ana@x.com");
        assert!(user.is_active());
        assert!(user.deleted_at().is_none());
        assert_eq!(user.created_at(), user.updated_at());
    }

    #[test]
    fn create_collects_every_violation() {
        let err = User::create(NewUser {
            name: " a ".into(),
            email: "not-an-email".into(),
            ..new_user()
        })
        .unwrap_err();
        assert_eq!(err.0.len(), 2);
        assert!(err.to_string().contains("name"));
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn password_policy_accepts_canonical_example() {
        assert!(Password::parse("Abcdefg1?").is_ok());
        assert!(Password::parse("ABCDEFGHIJKLMN#").is_ok());
    }

    #[test]
    fn password_policy_rejects_each_rule() {
        // too short
        assert!(Password::parse("Abcdef1?").is_err());
        // too long
        assert!(Password::parse("Abcdefghijklmn1?").is_err());
        // no uppercase
        assert!(Password::parse("abcdefg1?").is_err());
        // no special
        assert!(Password::parse("Abcdefgh1").is_err());
        // character outside the allowed set
        let err = Password::parse("Abcdefg1?!").unwrap_err();
        assert!(err.to_string().contains("may only contain"));
    }

    #[test]
    fn password_debug_is_redacted() {
        let p = Password::parse("Abcdefg1?").unwrap();
        assert!(!format!("{:?}", p).contains("Abcdefg1?"));
    }

    #[test]
    fn update_profile_merges_and_revalidates() {
        let user = User::create(new_user()).unwrap();
        let updated = user
            .update_profile(ProfileChanges {
                name: Some("Ana Maria".into()),
                role: Some(Role::Seller),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.name(), "Ana Maria");
        assert_eq!(updated.role(), Role::Seller);
        assert_eq!(updated.email(), user.email());
        assert_eq!(updated.id(), user.id());
        // original value untouched
        assert_eq!(user.name(), "Ana Diaz");
        assert!(updated.updated_at() >= user.updated_at());

        let err = user
            .update_profile(ProfileChanges {
                email: Some("broken".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn deactivate_then_activate_round_trips_flags() {
        let user = User::create(new_user()).unwrap();
        let gone = user.deactivate();
        assert!(!gone.is_active());
        assert!(gone.deleted_at().is_some());
        assert!(user.is_active());

        let back = gone.activate();
        assert!(back.is_active());
        assert!(back.deleted_at().is_none());
    }

    #[test]
    fn change_password_replaces_hash_only() {
        let user = User::create(new_user()).unwrap();
        let changed = user.change_password(HashedPassword::from_stored("$argon2id$other".into()));
        assert_eq!(changed.password().as_str(), "$argon2id$other");
        assert_eq!(changed.name(), user.name());
    }

    #[test]
    fn response_omits_password() {
        let user = User::create(new_user()).unwrap();
        let json = serde_json::to_value(user.to_response()).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["email"], "ana@x.com");
        assert_eq!(json["role"], "buyer");
    }

    #[test]
    fn role_parses_closed_set_only() {
        assert_eq!("seller".parse::<Role>().unwrap(), Role::Seller);
        assert!("superuser".parse::<Role>().is_err());
    }
}

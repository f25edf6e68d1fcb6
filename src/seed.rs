//! Startup Data
//!
//! Role records every deployment needs, plus optional demo accounts for
//! local development.

use crate::error::AuthError;
use crate::models::{NewUser, Role};
use crate::password::PasswordHasher;
use crate::store::CredentialStore;

use std::collections::BTreeSet;

/// Demo accounts: (username, email, password, role)
pub const DEMO_USERS: &[(&str, &str, &str, Role)] = &[
    ("student", "student@lms.com", "student123", Role::Student),
    ("instructor", "instructor@lms.com", "instructor123", Role::Instructor),
    ("admin", "admin@lms.com", "admin123", Role::Admin),
    ("john_doe", "john.doe@lms.com", "password", Role::Student),
    ("dr_smith", "dr.smith@lms.com", "password", Role::Instructor),
];

/// Make sure every role exists
pub async fn seed_roles(users: &dyn CredentialStore) -> Result<(), AuthError> {
    for role in Role::ALL {
        users.ensure_role(role).await?;
    }
    Ok(())
}

/// Create the demo accounts, but only on an empty user table.
///
/// Returns the number of accounts created.
pub async fn seed_demo_users(
    users: &dyn CredentialStore,
    passwords: &dyn PasswordHasher,
) -> Result<usize, AuthError> {
    if users.count().await? > 0 {
        tracing::debug!("Users present, skipping demo accounts");
        return Ok(0);
    }

    for (username, email, password, role) in DEMO_USERS {
        users
            .save(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash: passwords.hash_password(password)?,
                enabled: true,
                roles: BTreeSet::from([*role]),
            })
            .await?;
    }

    tracing::info!(count = DEMO_USERS.len(), "Demo accounts created");
    Ok(DEMO_USERS.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::password::Argon2PasswordHasher;
    use crate::store::InMemoryCredentialStore;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_seed_roles_is_idempotent() {
        let users = InMemoryCredentialStore::new();

        assert_ok!(seed_roles(&users).await);
        assert_ok!(seed_roles(&users).await);

        assert_eq!(users.roles().await, Role::ALL.into_iter().collect());
    }

    #[tokio::test]
    async fn test_demo_users_only_on_empty_store() {
        let users = InMemoryCredentialStore::new();
        let hasher = Argon2PasswordHasher::new(&test_config()).unwrap();

        seed_roles(&users).await.unwrap();
        assert_eq!(seed_demo_users(&users, &hasher).await.unwrap(), DEMO_USERS.len());
        assert_eq!(seed_demo_users(&users, &hasher).await.unwrap(), 0);
        assert_eq!(users.count().await.unwrap(), DEMO_USERS.len() as u64);

        let admin = users.find_by_identifier("admin").await.unwrap().unwrap();
        assert!(admin.has_role(Role::Admin));
        assert!(!admin.has_role(Role::Student));
        assert!(hasher.verify_password("admin123", &admin.password_hash));
    }
}

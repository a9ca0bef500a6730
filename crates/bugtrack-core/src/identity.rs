//! Identity store: registration, credential checks, and acting-user
//! resolution.

use crate::error::{Entity, Result, TrackerError};
use crate::model::{Credential, NewUser, User, UserId};
use crate::store::Store;

pub struct IdentityStore<'s> {
    store: &'s dyn Store,
}

impl<'s> IdentityStore<'s> {
    pub const fn new(store: &'s dyn Store) -> Self {
        Self { store }
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if any field is blank or the email has no `@`
    /// - `Conflict` if the email is already registered
    pub fn register(&self, name: &str, email: &str, secret: &str) -> Result<User> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() {
            return Err(TrackerError::invalid("name", "must not be empty"));
        }
        if email.is_empty() {
            return Err(TrackerError::invalid("email", "must not be empty"));
        }
        if !is_plausible_email(email) {
            return Err(TrackerError::invalid(
                "email",
                format!("'{email}' is not an email address"),
            ));
        }
        if secret.is_empty() {
            return Err(TrackerError::invalid("credential", "must not be empty"));
        }

        let created = self.store.create_user(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            credential: Credential::derive(secret),
        })?;
        let Some(user) = created else {
            return Err(TrackerError::Conflict(format!(
                "an account with email {email} already exists"
            )));
        };
        tracing::info!(user = %user.id, "registered user");
        Ok(user)
    }

    /// Check an email/secret pair.
    ///
    /// Unknown emails and wrong secrets fail identically.
    pub fn authenticate(&self, email: &str, secret: &str) -> Result<User> {
        match self.store.find_user_by_email(email.trim())? {
            Some(user) if user.credential.verify(secret) => Ok(user),
            _ => Err(TrackerError::Unauthenticated(
                "wrong email or credential".to_string(),
            )),
        }
    }

    /// Resolve the acting user by id.
    pub fn resolve(&self, id: UserId) -> Result<User> {
        self.store
            .find_user(id)?
            .ok_or_else(|| TrackerError::Unauthenticated(format!("no user with id {id}")))
    }

    /// Resolve the acting user from a handle: a numeric id or an email.
    pub fn resolve_handle(&self, handle: &str) -> Result<User> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(TrackerError::Unauthenticated(
                "no acting user given".to_string(),
            ));
        }
        if let Ok(id) = handle.parse::<UserId>() {
            return self.resolve(id);
        }
        self.store
            .find_user_by_email(handle)?
            .ok_or_else(|| TrackerError::Unauthenticated(format!("no user with email {handle}")))
    }

    /// Look up any user by id (not necessarily the actor).
    pub fn find(&self, id: UserId) -> Result<User> {
        self.store
            .find_user(id)?
            .ok_or_else(|| TrackerError::not_found(Entity::User, id))
    }

    /// Replace the acting user's credential. The only mutable user field.
    pub fn change_credential(&self, user: &User, secret: &str) -> Result<()> {
        if secret.is_empty() {
            return Err(TrackerError::invalid("credential", "must not be empty"));
        }
        if !self
            .store
            .update_credential(user.id, &Credential::derive(secret))?
        {
            return Err(TrackerError::not_found(Entity::User, user.id));
        }
        tracing::info!(user = %user.id, "credential changed");
        Ok(())
    }
}

fn is_plausible_email(email: &str) -> bool {
    email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
        && !email.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::IdentityStore;
    use crate::error::TrackerError;
    use crate::store::MemoryStore;

    #[test]
    fn register_then_authenticate() {
        let store = MemoryStore::new();
        let ids = IdentityStore::new(&store);
        let user = ids.register("Ana", "ana@example.com", "pw").unwrap();

        assert_eq!(ids.authenticate("ana@example.com", "pw").unwrap().id, user.id);
        assert!(matches!(
            ids.authenticate("ana@example.com", "nope"),
            Err(TrackerError::Unauthenticated(_))
        ));
        assert!(matches!(
            ids.authenticate("ghost@example.com", "pw"),
            Err(TrackerError::Unauthenticated(_))
        ));
    }

    #[test]
    fn register_validates_fields() {
        let store = MemoryStore::new();
        let ids = IdentityStore::new(&store);
        for (name, email, secret) in [
            ("", "a@b.io", "pw"),
            ("Ana", "", "pw"),
            ("Ana", "not-an-email", "pw"),
            ("Ana", "a@b.io", ""),
        ] {
            assert!(
                matches!(
                    ids.register(name, email, secret),
                    Err(TrackerError::InvalidInput { .. })
                ),
                "expected InvalidInput for ({name:?}, {email:?}, {secret:?})"
            );
        }
    }

    #[test]
    fn duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let ids = IdentityStore::new(&store);
        ids.register("Ana", "ana@example.com", "pw").unwrap();
        assert!(matches!(
            ids.register("Other", "ana@example.com", "pw2"),
            Err(TrackerError::Conflict(_))
        ));
    }

    #[test]
    fn resolve_handle_accepts_id_or_email() {
        let store = MemoryStore::new();
        let ids = IdentityStore::new(&store);
        let user = ids.register("Ana", "ana@example.com", "pw").unwrap();

        assert_eq!(ids.resolve_handle(&user.id.to_string()).unwrap().id, user.id);
        assert_eq!(ids.resolve_handle("ana@example.com").unwrap().id, user.id);
        assert!(matches!(
            ids.resolve_handle("99"),
            Err(TrackerError::Unauthenticated(_))
        ));
        assert!(matches!(
            ids.resolve_handle("  "),
            Err(TrackerError::Unauthenticated(_))
        ));
    }

    #[test]
    fn change_credential_replaces_secret() {
        let store = MemoryStore::new();
        let ids = IdentityStore::new(&store);
        let user = ids.register("Ana", "ana@example.com", "old").unwrap();
        ids.change_credential(&user, "new").unwrap();

        assert!(ids.authenticate("ana@example.com", "old").is_err());
        assert!(ids.authenticate("ana@example.com", "new").is_ok());
    }
}

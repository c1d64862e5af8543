//! Teacher authentication.
//!
//! Every teacher operation (start, stop, token, list) carries a teacher id
//! and a password. The server checks them through the [`Authenticator`]
//! trait before the engine ever sees the request, so the engine can stay
//! ignorant of credentials.
//!
//! [`TeacherDirectory`] is the built-in implementation: an in-memory map of
//! teacher ids to SHA-256 password digests. Swap in your own
//! `Authenticator` to check against LDAP, a database, or an SSO provider.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rollcall_protocol::TeacherId;
use sha2::{Digest, Sha256};

use crate::SessionError;

/// Checks teacher credentials and registers new teachers.
///
/// # Trait bounds
///
/// - `Send + Sync` → shared by every connection task.
/// - `'static` → lives as long as the server.
///
/// # Example
///
/// ```rust
/// use rollcall_session::{Authenticator, SessionError};
/// use rollcall_protocol::TeacherId;
///
/// /// Lets everyone in. Development only.
/// struct OpenDoor;
///
/// impl Authenticator for OpenDoor {
///     async fn authenticate(&self, _: &TeacherId, _: &str) -> Result<(), SessionError> {
///         Ok(())
///     }
///
///     async fn register(&self, _: &TeacherId, _: &str) -> Result<(), SessionError> {
///         Err(SessionError::Validation("registration is closed".into()))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Succeeds if `password` is correct for `teacher`.
    ///
    /// # Returns
    /// - `Ok(())` — credentials match
    /// - `Err(SessionError::AuthFailed)` — unknown teacher or wrong password
    fn authenticate(
        &self,
        teacher: &TeacherId,
        password: &str,
    ) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;

    /// Adds a teacher account.
    ///
    /// # Returns
    /// - `Err(SessionError::TeacherExists)` — the id is taken
    /// - `Err(SessionError::Validation)` — blank id or password
    fn register(
        &self,
        teacher: &TeacherId,
        password: &str,
    ) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;
}

/// In-memory teacher accounts keyed by id, storing SHA-256 password
/// digests rather than the passwords themselves.
#[derive(Debug, Default)]
pub struct TeacherDirectory {
    accounts: DashMap<TeacherId, [u8; 32]>,
}

impl TeacherDirectory {
    /// An empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory seeded with `(teacher, password)` pairs. Blank entries
    /// are skipped.
    pub fn with_teachers<I, T, P>(teachers: I) -> Self
    where
        I: IntoIterator<Item = (T, P)>,
        T: Into<TeacherId>,
        P: AsRef<str>,
    {
        let directory = Self::new();
        for (teacher, password) in teachers {
            let teacher = teacher.into();
            if teacher.is_blank() || password.as_ref().is_empty() {
                tracing::warn!(%teacher, "skipping blank teacher account");
                continue;
            }
            directory.accounts.insert(teacher, digest(password.as_ref()));
        }
        directory
    }

    /// Number of registered teachers.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl Authenticator for TeacherDirectory {
    async fn authenticate(&self, teacher: &TeacherId, password: &str) -> Result<(), SessionError> {
        let matches = self
            .accounts
            .get(teacher)
            .is_some_and(|stored| *stored == digest(password));
        if !matches {
            tracing::debug!(%teacher, "teacher authentication failed");
            return Err(SessionError::AuthFailed("invalid teacher credentials".into()));
        }
        Ok(())
    }

    async fn register(&self, teacher: &TeacherId, password: &str) -> Result<(), SessionError> {
        if teacher.is_blank() {
            return Err(SessionError::Validation("missing teacher".into()));
        }
        if password.is_empty() {
            return Err(SessionError::Validation("missing password".into()));
        }

        match self.accounts.entry(teacher.clone()) {
            Entry::Occupied(_) => Err(SessionError::TeacherExists(teacher.clone())),
            Entry::Vacant(slot) => {
                slot.insert(digest(password));
                tracing::info!(%teacher, "teacher registered");
                Ok(())
            }
        }
    }
}

fn digest(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

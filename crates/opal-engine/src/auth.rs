//! Users, password hashing, and privilege types.

use std::fmt;
use std::str::FromStr;

use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use password_hash::rand_core::OsRng;

use crate::error::{EngineError, Result};

/// A grantable privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Read rows.
    Select,
    /// Insert rows.
    Insert,
    /// Update rows.
    Update,
    /// Delete rows.
    Delete,
    /// Every privilege.
    All,
}

impl Privilege {
    /// Returns the SQL spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::All => "ALL",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privilege {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "SELECT" => Ok(Self::Select),
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            "ALL" => Ok(Self::All),
            other => Err(EngineError::Auth(format!("unknown privilege '{other}'"))),
        }
    }
}

/// A database user with an Argon2-hashed password.
#[derive(Debug, Clone)]
pub struct User {
    username: String,
    password_hash: String,
}

impl User {
    /// Creates a user, hashing the password.
    ///
    /// # Errors
    ///
    /// Fails when password hashing fails.
    pub fn new(username: impl Into<String>, password: &str) -> Result<Self> {
        Ok(Self {
            username: username.into(),
            password_hash: hash_password(password)?,
        })
    }

    /// The user name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Verifies a password attempt against the stored hash.
    #[must_use]
    pub fn authenticate(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash)
    }

    /// Replaces the password.
    ///
    /// # Errors
    ///
    /// Fails when password hashing fails.
    pub fn change_password(&mut self, new_password: &str) -> Result<()> {
        self.password_hash = hash_password(new_password)?;
        Ok(())
    }
}

/// Hashes a password with Argon2id, returning a PHC string with the salt.
///
/// # Errors
///
/// Fails when the hasher rejects the input.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| EngineError::Auth("password hashing failed".to_string()))?;
    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC hash string.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let user = User::new("ann", "hunter42x").unwrap();
        assert!(user.authenticate("hunter42x"));
        assert!(!user.authenticate("wrong"));
    }

    #[test]
    fn test_change_password() {
        let mut user = User::new("bob", "first1pass").unwrap();
        user.change_password("second2pass").unwrap();
        assert!(!user.authenticate("first1pass"));
        assert!(user.authenticate("second2pass"));
    }

    #[test]
    fn test_privilege_parsing() {
        assert_eq!("select".parse::<Privilege>().unwrap(), Privilege::Select);
        assert_eq!("ALL".parse::<Privilege>().unwrap(), Privilege::All);
        assert!("ADMIN".parse::<Privilege>().is_err());
    }
}

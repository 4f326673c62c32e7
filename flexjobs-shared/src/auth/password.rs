/// Argon2id password hashing
///
/// Hashes are PHC strings (`$argon2id$v=19$m=65536,t=3,p=4$...`), so the
/// cost parameters are read back from the stored hash on verification and
/// can be raised later without invalidating existing accounts.
///
/// ```
/// use flexjobs_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("correct horse")?;
/// assert!(verify_password("correct horse", &hash)?);
/// assert!(!verify_password("battery staple", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::password_hash::{self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::{distributions::Alphanumeric, Rng};

const MEMORY_KIB: u32 = 64 * 1024;
const PASSES: u32 = 3;
const LANES: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(password_hash::Error),

    /// Stored value is not a PHC string
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(password_hash::Error),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_KIB, PASSES, LANES, Some(32))
        .map_err(|e| PasswordError::Hash(e.into()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(PasswordError::Hash)?;
    Ok(hash.to_string())
}

/// `Ok(false)` for a wrong password; errors only for unusable hashes
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(PasswordError::MalformedHash)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Hash(e)),
    }
}

/// Hash of a random 48 character secret
///
/// Admin-created agent accounts get this; the owner sets a real password
/// through the reset flow.
pub fn unusable_password_hash() -> Result<String, PasswordError> {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect();
    hash_password(&secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_uses_configured_costs() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=65536,t=3,p=4$"));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("same-password", &a).unwrap());
        assert!(verify_password("same-password", &b).unwrap());
    }

    #[test]
    fn test_wrong_password() {
        let hash = hash_password("right-one").unwrap();
        assert!(!verify_password("wrong-one", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(PasswordError::MalformedHash(_))
        ));
    }

    #[test]
    fn test_unusable_hash_rejects_empty_password() {
        let hash = unusable_password_hash().unwrap();
        assert!(!verify_password("", &hash).unwrap());
    }
}

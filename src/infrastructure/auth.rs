//! Password hashing for accounts created by the engine itself (demo seed).
//! Login and session handling live outside this crate.

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};

pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| e.to_string())?
        .to_string();
    Ok(password_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{PasswordHash, PasswordVerifier};

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = hash_password("librarian").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"librarian", &parsed)
                .is_ok()
        );
        assert!(
            Argon2::default()
                .verify_password(b"intruder", &parsed)
                .is_err()
        );
    }

    #[test]
    fn same_password_gets_a_fresh_salt() {
        assert_ne!(
            hash_password("librarian").unwrap(),
            hash_password("librarian").unwrap()
        );
    }
}

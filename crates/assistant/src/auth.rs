//! Login credential checks.

use crate::config::AuthConfig;

/// Decides whether a username/password pair may start a session.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> bool;
}

/// A single fixed username/password pair.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    username: Vec<u8>,
    password: Vec<u8>,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into().into_bytes(),
            password: password.into().into_bytes(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.username, &config.password)
    }
}

impl Default for StaticCredentials {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}

impl Authenticator for StaticCredentials {
    fn authenticate(&self, username: &str, password: &str) -> bool {
        // Evaluate both so timing does not reveal which field was wrong.
        let user_ok = constant_time_eq(&self.username, username.as_bytes());
        let pass_ok = constant_time_eq(&self.password, password.as_bytes());
        user_ok & pass_ok
    }
}

fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    if expected.len() != provided.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (a, b) in expected.iter().zip(provided.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_accepts_admin_admin() {
        let auth = StaticCredentials::default();
        assert!(auth.authenticate("admin", "admin"));
    }

    #[test]
    fn rejects_wrong_password_or_user() {
        let auth = StaticCredentials::default();
        assert!(!auth.authenticate("admin", "wrong"));
        assert!(!auth.authenticate("root", "admin"));
        assert!(!auth.authenticate("", ""));
    }

    #[test]
    fn comparison_is_exact() {
        let auth = StaticCredentials::new("clinician", "s3cret");
        assert!(auth.authenticate("clinician", "s3cret"));
        assert!(!auth.authenticate("Clinician", "s3cret"));
        assert!(!auth.authenticate("clinician", "s3cret "));
        assert!(!auth.authenticate("clinician", "s3cre"));
    }

    #[test]
    fn from_config_uses_configured_pair() {
        let auth = StaticCredentials::from_config(&AuthConfig {
            username: "doc".into(),
            password: "pw".into(),
        });
        assert!(auth.authenticate("doc", "pw"));
        assert!(!auth.authenticate("admin", "admin"));
    }
}

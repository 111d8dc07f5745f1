use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Jenkins user name and API token used for HTTP basic auth.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub token: String,
}

// Never print the token.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("token", &"***")
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct UserFile {
    user: Option<String>,
    token: Option<String>,
}

impl Credentials {
    /// Load credentials from a user file (YAML, JSON or TOML).
    ///
    /// Returns `None` when the file does not carry both `user` and `token`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read user file: {}", path.display()))?;

        let user_file: UserFile = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML user file: {}", path.display()))?,
            Some("json") => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON user file: {}", path.display()))?,
            _ => serde_yaml::from_str::<Option<UserFile>>(&contents)
                .with_context(|| format!("Failed to parse YAML user file: {}", path.display()))?
                .unwrap_or_default(),
        };

        Ok(match (user_file.user, user_file.token) {
            (Some(user), Some(token)) => Some(Self { user, token }),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_yaml_user_file() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "user: jdoe\ntoken: abc123\n").unwrap();

        let credentials = Credentials::load(temp_file.path()).unwrap().unwrap();
        assert_eq!(credentials.user, "jdoe");
        assert_eq!(credentials.token, "abc123");
    }

    #[test]
    fn test_missing_token_yields_none() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        write!(temp_file, r#"{{"user": "jdoe"}}"#).unwrap();

        assert!(Credentials::load(temp_file.path()).unwrap().is_none());
    }

    #[test]
    fn test_debug_hides_token() {
        let credentials = Credentials {
            user: "jdoe".to_string(),
            token: "secret".to_string(),
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("jdoe"));
        assert!(!rendered.contains("secret"));
    }
}

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub hook_token: String,
    pub file_root: PathBuf,
    pub admins: HashSet<String>,
    pub retention_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = var("TABULA_JWT_SECRET", "");
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("TABULA_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let hook_token = var("TABULA_HOOK_TOKEN", "");
        if hook_token.is_empty() {
            bail!("TABULA_HOOK_TOKEN is unset; the host needs it to call /hooks");
        }

        let port = var("TABULA_PORT", "3000")
            .parse()
            .context("TABULA_PORT must be a port number")?;
        let retention_days: i64 = var("TABULA_ACTIVITY_RETENTION_DAYS", "90")
            .parse()
            .context("TABULA_ACTIVITY_RETENTION_DAYS must be a whole number of days")?;
        if retention_days < 1 {
            bail!("TABULA_ACTIVITY_RETENTION_DAYS must be at least 1");
        }

        let admins = var("TABULA_ADMIN_USERS", "")
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            host: var("TABULA_HOST", "0.0.0.0"),
            port,
            db_path: var("TABULA_DB_PATH", "tabula.db").into(),
            jwt_secret,
            hook_token,
            file_root: var("TABULA_FILE_ROOT", "./files").into(),
            admins,
            retention_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("TABULA_JWT_SECRET", "s3cr3t-for-tests"),
        ("TABULA_HOOK_TOKEN", "hook"),
    ];

    #[test]
    fn defaults() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("tabula.db"));
        assert_eq!(config.file_root, PathBuf::from("./files"));
        assert_eq!(config.retention_days, 90);
        assert!(config.admins.is_empty());
    }

    #[test]
    fn placeholder_secret_is_rejected() {
        assert!(load(&[("TABULA_HOOK_TOKEN", "hook")]).is_err());
        assert!(load(&[
            ("TABULA_JWT_SECRET", "dev-secret-change-me"),
            ("TABULA_HOOK_TOKEN", "hook"),
        ])
        .is_err());
        assert!(load(&[("TABULA_JWT_SECRET", "s3cr3t")]).is_err());
    }

    #[test]
    fn admin_list_and_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("TABULA_ADMIN_USERS", " alice, ,bob "));
        vars.push(("TABULA_PORT", "8080"));
        let config = load(&vars).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.admins, HashSet::from(["alice".to_string(), "bob".to_string()]));

        vars.push(("TABULA_ACTIVITY_RETENTION_DAYS", "0"));
        assert!(load(&vars).is_err());
    }
}

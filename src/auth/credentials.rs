use anyhow::Result;
use log::info;
use std::path::Path;

use crate::api::constants::{LOGIN_HOST, SANDBOX_LOGIN_HOST};

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub security_token: String,
    pub is_sandbox: bool,
    /// My Domain prefix such as `acme.my` or a full `https://` host
    pub domain: Option<String>,
    /// Explicit login host, wins over `domain` and `is_sandbox`
    pub login_url: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("security_token", &"***")
            .field("is_sandbox", &self.is_sandbox)
            .field("domain", &self.domain)
            .field("login_url", &self.login_url)
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Credentials> {
        info!("Importing Salesforce credentials from environment variables");
        Self::read_vars("environment")
    }

    pub fn from_env_file(path: &str) -> Result<Credentials> {
        info!("Importing from .env file: {}", path);

        if !Path::new(path).exists() {
            anyhow::bail!("Environment file not found: {}", path);
        }

        dotenvy::from_path(path)
            .map_err(|e| anyhow::anyhow!("Failed to load .env file '{}': {}", path, e))?;

        Self::read_vars(path)
    }

    fn read_vars(source: &str) -> Result<Credentials> {
        let required = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow::anyhow!("{} not set ({})", name, source))
        };
        let optional = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let username = required("SF_USERNAME")?;
        let password = required("SF_PASSWORD")?;
        let security_token = required("SF_SECURITY_TOKEN")?;
        let is_sandbox = optional("SF_IS_SANDBOX")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Credentials {
            username,
            password,
            security_token,
            is_sandbox,
            domain: optional("SF_DOMAIN"),
            login_url: optional("SF_LOGIN_URL"),
        })
    }

    /// Host the SOAP login call goes to
    pub fn login_host(&self) -> String {
        if let Some(url) = &self.login_url {
            return url.trim_end_matches('/').to_string();
        }
        match &self.domain {
            Some(domain) if domain.starts_with("https://") => {
                domain.trim_end_matches('/').to_string()
            }
            Some(domain) => format!("https://{}.salesforce.com", domain.trim_end_matches('/')),
            None if self.is_sandbox => SANDBOX_LOGIN_HOST.to_string(),
            None => LOGIN_HOST.to_string(),
        }
    }

    /// Password with the security token appended, as the login call expects
    pub fn login_password(&self) -> String {
        format!("{}{}", self.password, self.security_token)
    }
}

//! Provider configuration: explicit settings first, then environment.

use std::time::Duration;
use tflifecycle::validator::Diagnostics;
use tflifecycle::{LifecycleError, State, Timeouts};

use crate::api::{ApiError, Client, RetryConfig};

pub const DEFAULT_REGION: &str = "mypurecloud.com";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// AWS-style region names accepted in place of the platform domain
const REGION_DOMAINS: &[(&str, &str)] = &[
    ("us-east-1", "mypurecloud.com"),
    ("us-east-2", "use2.us-gov-pure.cloud"),
    ("us-west-2", "usw2.pure.cloud"),
    ("ca-central-1", "cac1.pure.cloud"),
    ("eu-west-1", "mypurecloud.ie"),
    ("eu-west-2", "euw2.pure.cloud"),
    ("eu-central-1", "mypurecloud.de"),
    ("ap-south-1", "aps1.pure.cloud"),
    ("ap-northeast-1", "mypurecloud.jp"),
    ("ap-northeast-2", "apne2.pure.cloud"),
    ("ap-southeast-2", "mypurecloud.com.au"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
    AccessToken(String),
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub api_url: String,
    pub login_url: String,
    pub credentials: Credentials,
    pub request_timeout: Duration,
    pub timeouts: Timeouts,
}

impl ProviderConfig {
    /// Resolve from provider settings, falling back to `GENESYSCLOUD_*`
    /// environment variables for anything not set explicitly.
    pub fn resolve(settings: &State) -> Result<Self, LifecycleError> {
        let mut diags = Diagnostics::new();

        let region = setting(settings, "region", "GENESYSCLOUD_REGION")?
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let domain = region_domain(&region);

        let api_url = setting(settings, "api_url", "GENESYSCLOUD_API_URL")?
            .unwrap_or_else(|| format!("https://api.{}", domain));
        let login_url = match setting(settings, "login_url", "GENESYSCLOUD_LOGIN_URL")? {
            Some(url) => url,
            None => login_url_for(&api_url).unwrap_or_else(|| format!("https://login.{}", domain)),
        };

        let access_token = setting(settings, "access_token", "GENESYSCLOUD_ACCESS_TOKEN")?;
        let client_id = setting(settings, "oauthclient_id", "GENESYSCLOUD_OAUTHCLIENT_ID")?;
        let client_secret =
            setting(settings, "oauthclient_secret", "GENESYSCLOUD_OAUTHCLIENT_SECRET")?;

        let credentials = match (access_token, client_id, client_secret) {
            (Some(token), _, _) => Some(Credentials::AccessToken(token)),
            (None, Some(client_id), Some(client_secret)) => Some(Credentials::ClientCredentials {
                client_id,
                client_secret,
            }),
            (None, Some(_), None) => {
                diags.add_error(
                    "oauthclient_secret is required (set in provider config or GENESYSCLOUD_OAUTHCLIENT_SECRET env var)",
                    None::<String>,
                );
                None
            }
            (None, None, _) => {
                diags.add_error(
                    "access_token or oauthclient_id is required (set in provider config or GENESYSCLOUD_ACCESS_TOKEN / GENESYSCLOUD_OAUTHCLIENT_ID env vars)",
                    None::<String>,
                );
                None
            }
        };

        let request_timeout = seconds(
            settings,
            "request_timeout_secs",
            "GENESYSCLOUD_REQUEST_TIMEOUT_SECS",
            &mut diags,
        )?
        .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));

        let defaults = Timeouts::default();
        let timeouts = Timeouts {
            read: seconds(settings, "read_timeout_secs", "GENESYSCLOUD_READ_TIMEOUT_SECS", &mut diags)?
                .unwrap_or(defaults.read),
            delete: seconds(
                settings,
                "delete_timeout_secs",
                "GENESYSCLOUD_DELETE_TIMEOUT_SECS",
                &mut diags,
            )?
            .unwrap_or(defaults.delete),
            ..defaults
        };

        if url::Url::parse(&api_url).is_err() {
            diags.add_error(format!("api_url '{}' is not a valid URL", api_url), None::<String>);
        }

        diags.into_result()?;
        let credentials = credentials
            .ok_or_else(|| LifecycleError::validation("missing provider credentials"))?;

        Ok(Self {
            api_url,
            login_url,
            credentials,
            request_timeout,
            timeouts,
        })
    }

    /// Build an authenticated API client, exchanging client credentials for
    /// a token when no access token was configured.
    pub async fn connect(&self) -> Result<Client, ApiError> {
        let token = match &self.credentials {
            Credentials::AccessToken(token) => token.clone(),
            Credentials::ClientCredentials {
                client_id,
                client_secret,
            } => {
                tracing::info!("Authenticating client {} against {}", client_id, self.login_url);
                Client::authenticate(&self.login_url, client_id, client_secret, self.request_timeout)
                    .await?
            }
        };

        Client::with_config(
            &self.api_url,
            &token,
            RetryConfig {
                timeout_seconds: self.request_timeout.as_secs(),
                ..RetryConfig::default()
            },
        )
    }
}

fn region_domain(region: &str) -> &str {
    REGION_DOMAINS
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, domain)| *domain)
        .unwrap_or(region)
}

/// `https://api.<domain>` pairs with `https://login.<domain>`.
fn login_url_for(api_url: &str) -> Option<String> {
    let mut url = url::Url::parse(api_url).ok()?;
    let login_host = url.host_str()?.strip_prefix("api.")?.to_string();
    url.set_host(Some(&format!("login.{}", login_host))).ok()?;
    Some(url.as_str().trim_end_matches('/').to_string())
}

fn setting(settings: &State, key: &str, env_var: &str) -> Result<Option<String>, LifecycleError> {
    Ok(settings
        .get_string(key)?
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|v| !v.is_empty())))
}

fn seconds(
    settings: &State,
    key: &str,
    env_var: &str,
    diags: &mut Diagnostics,
) -> Result<Option<Duration>, LifecycleError> {
    if let Some(secs) = settings.get_i64(key)? {
        return Ok(positive_seconds(key, secs, diags));
    }
    match std::env::var(env_var) {
        Ok(raw) => match raw.parse::<i64>() {
            Ok(secs) => Ok(positive_seconds(env_var, secs, diags)),
            Err(_) => {
                diags.add_error(
                    format!("{} must be a whole number of seconds", env_var),
                    Some(format!("Got '{}'", raw)),
                );
                Ok(None)
            }
        },
        Err(_) => Ok(None),
    }
}

fn positive_seconds(name: &str, secs: i64, diags: &mut Diagnostics) -> Option<Duration> {
    if secs <= 0 {
        diags.add_error(format!("{} must be positive", name), Some(format!("Got {}", secs)));
        return None;
    }
    Some(Duration::from_secs(secs as u64))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "GENESYSCLOUD_REGION",
        "GENESYSCLOUD_API_URL",
        "GENESYSCLOUD_LOGIN_URL",
        "GENESYSCLOUD_ACCESS_TOKEN",
        "GENESYSCLOUD_OAUTHCLIENT_ID",
        "GENESYSCLOUD_OAUTHCLIENT_SECRET",
        "GENESYSCLOUD_REQUEST_TIMEOUT_SECS",
        "GENESYSCLOUD_READ_TIMEOUT_SECS",
        "GENESYSCLOUD_DELETE_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn client_credentials_from_env_with_region_alias() {
        clear_env();
        std::env::set_var("GENESYSCLOUD_REGION", "eu-west-1");
        std::env::set_var("GENESYSCLOUD_OAUTHCLIENT_ID", "client");
        std::env::set_var("GENESYSCLOUD_OAUTHCLIENT_SECRET", "secret");

        let config = ProviderConfig::resolve(&State::new()).unwrap();

        assert_eq!(config.api_url, "https://api.mypurecloud.ie");
        assert_eq!(config.login_url, "https://login.mypurecloud.ie");
        assert_eq!(
            config.credentials,
            Credentials::ClientCredentials {
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
            }
        );
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.timeouts, Timeouts::default());
        clear_env();
    }

    #[test]
    #[serial]
    fn explicit_settings_win_over_env() {
        clear_env();
        std::env::set_var("GENESYSCLOUD_ACCESS_TOKEN", "from-env");
        std::env::set_var("GENESYSCLOUD_READ_TIMEOUT_SECS", "90");

        let settings = State::new()
            .with("api_url", "https://api.usw2.pure.cloud")
            .with("access_token", "from-config")
            .with("request_timeout_secs", 15i64);
        let config = ProviderConfig::resolve(&settings).unwrap();

        assert_eq!(config.login_url, "https://login.usw2.pure.cloud");
        assert_eq!(
            config.credentials,
            Credentials::AccessToken("from-config".to_string())
        );
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.timeouts.read, Duration::from_secs(90));
        clear_env();
    }

    #[test]
    #[serial]
    fn missing_credentials_are_reported() {
        clear_env();

        let err = ProviderConfig::resolve(&State::new()).unwrap_err();
        assert!(err.to_string().contains("access_token or oauthclient_id is required"));
    }

    #[test]
    #[serial]
    fn bad_timeout_is_reported() {
        clear_env();
        std::env::set_var("GENESYSCLOUD_ACCESS_TOKEN", "t");
        std::env::set_var("GENESYSCLOUD_DELETE_TIMEOUT_SECS", "soon");

        let err = ProviderConfig::resolve(&State::new()).unwrap_err();
        assert!(err
            .to_string()
            .contains("GENESYSCLOUD_DELETE_TIMEOUT_SECS must be a whole number of seconds"));
        clear_env();
    }
}

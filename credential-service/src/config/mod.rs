use portal_core::config as core_config;
use portal_core::error::AppError;
use secrecy::SecretString;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone)]
pub struct CredentialConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub identity_gateway: IdentityGatewayConfig,
    pub org_api: OrgApiConfig,
    pub smtp: SmtpConfig,
    pub mail_throttle: MailThrottleConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// OAuth2 identity gateway: token endpoint for the client-credentials
/// grant and the userinfo endpoint for verified identity claims.
#[derive(Debug, Clone)]
pub struct IdentityGatewayConfig {
    pub token_url: String,
    pub userinfo_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct OrgApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub password: SecretString,
    pub from_email: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct MailThrottleConfig {
    pub limit: u32,
    pub expiration_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub invitation_attempts: u32,
    pub invitation_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

impl CredentialConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = CredentialConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("credential-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            redis: RedisConfig {
                url: get_env("REDIS_URL", None, is_prod)?,
            },
            identity_gateway: IdentityGatewayConfig {
                token_url: get_env("IDENTITY_GATEWAY_TOKEN_URL", None, is_prod)?,
                userinfo_url: get_env("IDENTITY_GATEWAY_USERINFO_URL", None, is_prod)?,
                client_id: get_env("IDENTITY_GATEWAY_CLIENT_ID", None, is_prod)?,
                client_secret: SecretString::new(get_env(
                    "IDENTITY_GATEWAY_CLIENT_SECRET",
                    None,
                    is_prod,
                )?),
                timeout_seconds: parse_env("IDENTITY_GATEWAY_TIMEOUT_SECONDS", "10", is_prod)?,
            },
            org_api: OrgApiConfig {
                base_url: get_env("ORG_API_BASE_URL", None, is_prod)?,
                timeout_seconds: parse_env("ORG_API_TIMEOUT_SECONDS", "10", is_prod)?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("localhost"), is_prod)?,
                user: get_env("SMTP_USER", None, is_prod)?,
                password: SecretString::new(get_env("SMTP_PASSWORD", None, is_prod)?),
                from_email: get_env("SMTP_FROM_EMAIL", None, is_prod)?,
                base_url: get_env("PORTAL_BASE_URL", Some("http://localhost:3100"), is_prod)?,
            },
            mail_throttle: MailThrottleConfig {
                limit: parse_env("MAIL_THROTTLE_LIMIT", "5", is_prod)?,
                expiration_seconds: parse_env("MAIL_THROTTLE_EXPIRATION_SECONDS", "300", is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3100"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            },
            rate_limit: RateLimitConfig {
                invitation_attempts: parse_env("RATE_LIMIT_INVITATION_ATTEMPTS", "10", is_prod)?,
                invitation_window_seconds: parse_env(
                    "RATE_LIMIT_INVITATION_WINDOW_SECONDS",
                    "3600",
                    is_prod,
                )?,
                global_ip_limit: parse_env("RATE_LIMIT_GLOBAL_IP_LIMIT", "100", is_prod)?,
                global_ip_window_seconds: parse_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    "60",
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.mail_throttle.limit == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MAIL_THROTTLE_LIMIT must be greater than 0"
            )));
        }

        if self.mail_throttle.expiration_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MAIL_THROTTLE_EXPIRATION_SECONDS must be greater than 0"
            )));
        }

        if self.environment == Environment::Prod
            && self.security.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Wildcard CORS origin not allowed in production"
            )));
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

use std::env;

const DEFAULT_FROM_ADDRESS: &str = "noreply@boutique-ecommerce.com";
const DEFAULT_ADMIN_ADDRESS: &str = "admin@boutique-ecommerce.com";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub mail: MailConfig,
}

/// Mail settings. `smtp_url` is optional; without it the application falls
/// back to a log-only mailer so order placement keeps working in development
/// environments that have no SMTP relay.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_url: Option<String>,
    pub from_address: String,
    pub admin_address: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let mail = MailConfig::from_env();
        Ok(Self {
            port,
            database_url,
            host,
            mail,
        })
    }
}

impl MailConfig {
    pub fn from_env() -> Self {
        let smtp_url = env::var("SMTP_URL").ok().filter(|url| !url.is_empty());
        let from_address =
            env::var("MAIL_FROM").unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string());
        let admin_address =
            env::var("ADMIN_EMAIL").unwrap_or_else(|_| DEFAULT_ADMIN_ADDRESS.to_string());
        Self {
            smtp_url,
            from_address,
            admin_address,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_url: None,
            from_address: DEFAULT_FROM_ADDRESS.to_string(),
            admin_address: DEFAULT_ADMIN_ADDRESS.to_string(),
        }
    }
}

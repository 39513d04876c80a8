use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Access token lifetime in minutes.
    pub jwt_maxage: i64,
    /// Refresh token lifetime in minutes.
    pub jwt_refresh_maxage: i64,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub bootstrap_admin: Option<(String, String)>,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET_KEY")?;
        if jwt_secret.is_empty() {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET_KEY",
                value: String::new(),
            });
        }

        let jwt_maxage = parsed_or("JWT_MAXAGE", 60)?;
        let jwt_refresh_maxage = parsed_or("JWT_REFRESH_MAXAGE", 24 * 60)?;
        let port = parsed_or("PORT", 8000)?;

        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let bootstrap_admin = match (
            std::env::var("BOOTSTRAP_ADMIN_EMAIL"),
            std::env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            jwt_maxage,
            jwt_refresh_maxage,
            port,
            cors_origins,
            bootstrap_admin,
        })
    }
}

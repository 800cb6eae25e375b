use anyhow::{Context, Result};
use std::str::FromStr;

use super::config_model::{BackendServer, Database, DotEnvyConfig, Stripe, Supabase};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: parse_env("SERVER_PORT_BACKEND")?,
        body_limit: parse_env("SERVER_BODY_LIMIT")?,
        timeout: parse_env("SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: require_env("DATABASE_URL")?,
    };

    let supabase = Supabase {
        jwt_secret: require_env("SUPABASE_JWT_SECRET")?,
    };

    let stripe = Stripe {
        secret_key: require_env("STRIPE_SECRET_KEY")?,
        webhook_secret: require_env("STRIPE_WEBHOOK_SECRET")?,
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        supabase,
        stripe,
    })
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is invalid"))
}

fn parse_env<T>(key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    require_env(key)?
        .trim()
        .parse::<T>()
        .with_context(|| format!("{key} is invalid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_reports_the_offending_key() {
        unsafe {
            std::env::set_var("CONFIG_LOADER_TEST_PORT", "not-a-port");
        }

        let err = parse_env::<u16>("CONFIG_LOADER_TEST_PORT").unwrap_err();
        assert!(err.to_string().contains("CONFIG_LOADER_TEST_PORT"));
    }

    #[test]
    fn parse_env_trims_whitespace() {
        unsafe {
            std::env::set_var("CONFIG_LOADER_TEST_TIMEOUT", " 30 ");
        }

        let timeout = parse_env::<u64>("CONFIG_LOADER_TEST_TIMEOUT").unwrap();
        assert_eq!(timeout, 30);
    }
}

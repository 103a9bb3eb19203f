// src/utils/http.rs

//! HTTP client utilities.

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::{Environment, ProbeConfig};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Create an asynchronous HTTP client presenting as the given environment.
pub fn create_client(environment: &Environment, probe: &ProbeConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_str(&environment.accept_language).map_err(|e| {
            AppError::config(format!(
                "environment '{}' has an invalid accept_language: {e}",
                environment.id
            ))
        })?,
    );

    let client = reqwest::Client::builder()
        .user_agent(&environment.user_agent)
        .default_headers(headers)
        .timeout(probe.navigation_timeout())
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;

    #[test]
    fn test_create_client_for_default_environments() {
        let config = Config::default();
        for env in &config.environments {
            assert!(create_client(env, &config.probe).is_ok());
        }
    }

    #[test]
    fn test_rejects_bad_accept_language() {
        let config = Config::default();
        let mut env = config.environments[0].clone();
        env.accept_language = "en\nUS".to_string();
        assert!(matches!(
            create_client(&env, &config.probe),
            Err(AppError::Config(_))
        ));
    }
}

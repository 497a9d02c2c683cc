use crate::error::AppError;

/// Table holding the bill rows unless overridden via `TABLE`.
pub const DEFAULT_TABLE: &str = "disc_bills";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Runtime configuration, loaded once at startup.
///
/// `SUPABASE_URL` and `SUPABASE_KEY` are required; their absence is a fatal
/// configuration error raised before any fetch is attempted.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Supabase project, e.g. `https://xyz.supabase.co`.
    pub supabase_url: String,

    /// API key (anon or service role) sent as both `apikey` and bearer token.
    pub supabase_key: String,

    /// Name of the bill table on the REST endpoint.
    pub table: String,

    /// Address the web server binds to.
    pub bind_addr: String,
}

impl Config {
    /// Build the configuration from process environment variables.
    ///
    /// # Errors
    /// * `AppError::Config` when `SUPABASE_URL` or `SUPABASE_KEY` is unset
    ///   or blank.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let supabase_url = required(&get, "SUPABASE_URL")?;
        let supabase_key = required(&get, "SUPABASE_KEY")?;

        Ok(Self {
            // A trailing slash would produce `//rest/v1/...` URLs.
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_key,
            table: get("TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }
}

fn required(get: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, AppError> {
    match get(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::Config(format!(
            "{} not set in environment (.env)",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn loads_required_settings_and_defaults() {
        let config = Config::from_lookup(env(&[
            ("SUPABASE_URL", "https://xyz.supabase.co"),
            ("SUPABASE_KEY", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.supabase_url, "https://xyz.supabase.co");
        assert_eq!(config.supabase_key, "secret");
        assert_eq!(config.table, DEFAULT_TABLE);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
    }

    #[test]
    fn trims_trailing_slash_from_url() {
        let config = Config::from_lookup(env(&[
            ("SUPABASE_URL", "https://xyz.supabase.co/"),
            ("SUPABASE_KEY", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.supabase_url, "https://xyz.supabase.co");
    }

    #[test]
    fn missing_url_is_a_config_error() {
        let err = Config::from_lookup(env(&[("SUPABASE_KEY", "secret")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn blank_key_is_a_config_error() {
        let err = Config::from_lookup(env(&[
            ("SUPABASE_URL", "https://xyz.supabase.co"),
            ("SUPABASE_KEY", "   "),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn overrides_table_and_bind_addr() {
        let config = Config::from_lookup(env(&[
            ("SUPABASE_URL", "https://xyz.supabase.co"),
            ("SUPABASE_KEY", "secret"),
            ("TABLE", "other_bills"),
            ("BIND_ADDR", "0.0.0.0:8080"),
        ]))
        .unwrap();

        assert_eq!(config.table, "other_bills");
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }
}

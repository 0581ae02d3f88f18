use config::{Config, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use std::env;
use std::path::PathBuf;

pub mod env_vars;
pub mod models;
pub use models::*;

/// Placeholder used in config files for values that come from the environment.
pub const SECRET_MARKER: &str = "secret_from_env";

/// Loads the application configuration.
///
/// Sources, later ones overriding earlier ones:
/// 1. `<config dir>/default.*`
/// 2. `<config dir>/<RUN_ENV>.*` (`RUN_ENV` defaults to `debug`)
/// 3. `CITAS__SECTION__KEY` environment variables (prefix changeable via `PREFIX`)
///
/// Afterwards every `secret_from_env` value is resolved from the environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();

    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());
    let prefix = env_vars::get_config_prefix();
    let config_dir = config_dir();

    let default_path = config_dir.join("default");
    let env_path = config_dir.join(&run_env);

    tracing::debug!(
        "Loading config from {} (RUN_ENV={}, prefix={})",
        config_dir.display(),
        run_env,
        prefix
    );

    let builder = Config::builder()
        .add_source(File::with_name(&default_path.to_string_lossy()).required(false))
        .add_source(File::with_name(&env_path.to_string_lossy()).required(false))
        .add_source(
            Environment::with_prefix(&prefix)
                .prefix_separator(env_vars::CONFIG_SEPARATOR)
                .separator(env_vars::CONFIG_SEPARATOR)
                .try_parsing(true),
        );

    let raw: serde_json::Value = builder.build()?.try_deserialize()?;
    resolve_config(raw)
}

/// Resolves secret markers in an already merged config tree and deserializes it.
pub fn resolve_config(mut raw: serde_json::Value) -> Result<AppConfig, ConfigError> {
    env_vars::fill_secrets(&mut raw);
    serde_json::from_value(raw)
        .map_err(|err| ConfigError::Message(format!("invalid configuration: {err}")))
}

/// `CONFIG_DIR` wins; otherwise `./config` when present, else the workspace `config/`.
fn config_dir() -> PathBuf {
    if let Ok(dir) = env::var("CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    let local = PathBuf::from("config");
    if local.is_dir() {
        return local;
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2) // crates/citas_config -> workspace root
        .map(|root| root.join("config"))
        .unwrap_or(local)
}

static INIT_DOTENV: OnceCell<()> = OnceCell::new();

/// Loads the dotenv file into the process environment, once.
///
/// `DOTENV_OVERRIDE` names the file; otherwise a first CLI argument starting with
/// `.env` is used, falling back to `.env`. Returns the path that was chosen.
pub fn ensure_dotenv_loaded() -> String {
    let dotenv_path_override = env::var("DOTENV_OVERRIDE").ok();
    let dotenv_path_arg = env::args().nth(1).filter(|s| s.starts_with(".env"));

    let dotenv_path = dotenv_path_override
        .or(dotenv_path_arg)
        .unwrap_or_else(|| ".env".to_string());

    INIT_DOTENV.get_or_init(|| {
        dotenv::from_filename(&dotenv_path).ok();
    });

    dotenv_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = resolve_config(json!({
            "server": { "host": "127.0.0.1", "port": 8080 }
        }))
        .unwrap();

        assert!(!config.use_crm);
        assert!(config.crm.is_none());
        assert_eq!(config.scheduling.work_start, "09:00");
        assert_eq!(config.scheduling.slot_duration, 30);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_unresolved_secret_counts_as_missing() {
        let config = resolve_config(json!({
            "server": { "host": "127.0.0.1", "port": 8080 },
            "use_crm": true,
            "crm": { "api_key": "secret_from_env", "api_secret": "secret_from_env" }
        }))
        .unwrap();

        let crm = config.crm.unwrap();
        assert_eq!(crm.base_url, "https://crm.dranikkita.com");
        assert!(crm.credentials().is_none());
        assert!(crm.lead.attach_comment);
        assert_eq!(crm.lead.max_photos, 3);
    }

    #[test]
    fn test_companion_defaults() {
        let config = resolve_config(json!({
            "server": { "host": "0.0.0.0", "port": 8080 },
            "whatsapp_service": { "gateway_url": "http://localhost:3000" }
        }))
        .unwrap();

        let service = config.whatsapp_service.unwrap();
        assert_eq!(service.port, 3001);
        assert_eq!(service.code_ttl_secs, 600);
        assert_eq!(service.max_attempts, 3);
        assert!(service.api_key().is_none());
    }

    #[test]
    fn test_proxy_url_is_trimmed() {
        let proxy = WhatsAppProxyConfig {
            service_url: Some("http://vps:3001/".to_string()),
            api_key: None,
        };
        assert_eq!(proxy.service_url(), Some("http://vps:3001"));
    }
}

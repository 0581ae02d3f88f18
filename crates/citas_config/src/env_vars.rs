//! Environment lookups for the citas services.
//!
//! Plain settings are overridden by the `config` crate as `CITAS__SECTION__KEY`.
//! Values written as `secret_from_env` are filled in here from
//! `CITAS_SECRET_SECTION_KEY`, or from the short `SECTION_KEY` form used by
//! existing deployments.

use serde_json::Value;
use std::env;
use tracing::warn;

pub const DEFAULT_PREFIX: &str = "CITAS";
pub const CONFIG_SEPARATOR: &str = "__";
const SECRET_PREFIX: &str = "CITAS_SECRET";

/// `PREFIX` overrides the `CITAS` prefix of plain settings.
pub fn get_config_prefix() -> String {
    env::var("PREFIX").unwrap_or_else(|_| DEFAULT_PREFIX.to_string())
}

/// Candidate variable names for the secret at `path`, most specific first.
///
/// `crm.api_secret` -> `CITAS_SECRET_CRM_API_SECRET`, `CRM_API_SECRET`.
pub fn secret_var_names(path: &[&str]) -> [String; 2] {
    let joined = path.join("_").to_uppercase();
    [format!("{}_{}", SECRET_PREFIX, joined), joined]
}

fn lookup_secret(path: &[&str]) -> Option<String> {
    secret_var_names(path)
        .iter()
        .find_map(|name| env::var(name).ok().filter(|value| !value.is_empty()))
}

/// Replaces every `secret_from_env` marker in `value` from the environment.
///
/// Returns the number of markers filled. Markers without a variable stay in
/// place; the typed accessors in `models` treat them as absent.
pub fn fill_secrets(value: &mut Value) -> usize {
    let mut path = Vec::new();
    fill_markers(value, &mut path)
}

fn fill_markers(value: &mut Value, path: &mut Vec<String>) -> usize {
    match value {
        Value::Object(map) => map
            .iter_mut()
            .map(|(key, child)| {
                path.push(key.clone());
                let filled = fill_markers(child, path);
                path.pop();
                filled
            })
            .sum(),
        Value::String(marker) if marker == crate::SECRET_MARKER => {
            let segments: Vec<&str> = path.iter().map(String::as_str).collect();
            match lookup_secret(&segments) {
                Some(secret) => {
                    *marker = secret;
                    1
                }
                None => {
                    warn!("No environment value found for secret '{}'", segments.join("."));
                    0
                }
            }
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_secret_var_names() {
        assert_eq!(
            secret_var_names(&["crm", "api_secret"]),
            ["CITAS_SECRET_CRM_API_SECRET".to_string(), "CRM_API_SECRET".to_string()]
        );
        assert_eq!(
            secret_var_names(&["whatsapp_service", "gateway_api_key"])[1],
            "WHATSAPP_SERVICE_GATEWAY_API_KEY"
        );
    }

    #[test]
    fn test_markers_are_filled_prefixed_name_first() {
        env::set_var("CITAS_SECRET_FILLSECTION_API_TOKEN", "tok-123");
        env::set_var("FILLSECTION_API_TOKEN", "short-form");
        env::set_var("FILLSECTION_WEBHOOK_SECRET", "whsec");
        let mut value = json!({
            "fillsection": {
                "api_token": "secret_from_env",
                "webhook_secret": "secret_from_env",
                "plain": "x"
            }
        });

        assert_eq!(fill_secrets(&mut value), 2);
        assert_eq!(value["fillsection"]["api_token"], "tok-123");
        assert_eq!(value["fillsection"]["webhook_secret"], "whsec");
        assert_eq!(value["fillsection"]["plain"], "x");

        for name in [
            "CITAS_SECRET_FILLSECTION_API_TOKEN",
            "FILLSECTION_API_TOKEN",
            "FILLSECTION_WEBHOOK_SECRET",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_unresolved_marker_is_kept() {
        let mut value = json!({ "nosuchsection": { "api_key": "secret_from_env" } });
        assert_eq!(fill_secrets(&mut value), 0);
        assert_eq!(value["nosuchsection"]["api_key"], "secret_from_env");
    }
}

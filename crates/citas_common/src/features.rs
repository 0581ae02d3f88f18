//! Runtime feature switches.
//!
//! Integrations are gated twice: at compile time through cargo features on the
//! backend (`crm`, `mercadopago`, `whatsapp`, `openapi`) and at runtime through the
//! `use_*` flags plus the presence of the matching config section.

use citas_config::AppConfig;

/// A feature is on when its flag is set and its config section exists.
pub fn is_feature_enabled<T>(use_feature: bool, feature_config: Option<&T>) -> bool {
    use_feature && feature_config.is_some()
}

pub fn is_crm_enabled(config: &AppConfig) -> bool {
    is_feature_enabled(config.use_crm, config.crm.as_ref())
}

pub fn is_mercadopago_enabled(config: &AppConfig) -> bool {
    is_feature_enabled(config.use_mercadopago, config.mercadopago.as_ref())
}

pub fn is_whatsapp_enabled(config: &AppConfig) -> bool {
    is_feature_enabled(config.use_whatsapp, config.whatsapp.as_ref())
}

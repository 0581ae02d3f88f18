pub mod best_effort; // Secondary calls that never fail a request
pub mod error; // Error taxonomy
pub mod features; // Runtime feature switches
pub mod http; // Error responses, shared client, CORS
pub mod logging; // Subscriber setup
pub mod services; // Shared async trait plumbing

pub use best_effort::BestEffort;

pub use error::{
    config_error, internal_error, upstream_error, validation_error, CitasError, HttpStatusCode,
};

pub use http::{
    client::{create_client, data_name, is_success, read_body, HTTP_CLIENT},
    cors::{method_not_allowed, preflight, with_cors},
    json_body, value_as_string, IntoHttpResponse,
};

pub use features::{is_crm_enabled, is_feature_enabled, is_mercadopago_enabled, is_whatsapp_enabled};

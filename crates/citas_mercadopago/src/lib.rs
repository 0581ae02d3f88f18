// --- File: crates/citas_mercadopago/src/lib.rs ---
pub mod doc;
pub mod error;
pub mod handlers;
pub mod logic;
#[cfg(test)]
mod logic_test;
pub mod routes;
pub mod service;
pub mod signature;

pub use error::MercadoPagoError;
pub use service::{gateway_from_config, MercadoPagoClient, Payment, PaymentGateway};

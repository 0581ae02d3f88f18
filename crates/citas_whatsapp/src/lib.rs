// --- File: crates/citas_whatsapp/src/lib.rs ---
pub mod companion;
pub mod doc;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod message;
pub mod phone;
pub mod qr;
pub mod routes;
pub mod verification;
#[cfg(test)]
mod verification_proptest;

pub use error::{GatewayError, QrError};
pub use gateway::{gateway_from_config, HttpWhatsAppGateway, SessionStatus, WhatsAppGateway};
pub use verification::{
    spawn_expiry_sweeper, Clock, CodeGenerator, InMemoryVerificationStore, RandomCodeGenerator,
    SystemClock, VerificationEntry, VerificationError, VerificationManager, VerificationStore,
};

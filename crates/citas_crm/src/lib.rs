// --- File: crates/citas_crm/src/lib.rs ---
pub mod doc;
pub mod error;
pub mod handlers;
#[cfg(test)]
mod handlers_test;
pub mod logic;
#[cfg(test)]
mod logic_proptest;
pub mod routes;
pub mod service;

pub use error::CrmError;
pub use service::{
    crm_from_config, Attachment, CrmEvent, CrmService, FrappeClient, NewEvent, NewLead,
    LEAD_DOCTYPE,
};

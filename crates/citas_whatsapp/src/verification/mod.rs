//! One-time phone verification codes.
//!
//! A code is issued per phone key, lives for a fixed TTL and tolerates a bounded
//! number of wrong guesses. Every terminal outcome (verified, expired, locked out)
//! removes the entry from the store.

pub mod manager;
pub mod store;

use chrono::{DateTime, Utc};
use citas_common::{internal_error, validation_error, CitasError, HttpStatusCode};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use manager::{spawn_expiry_sweeper, VerificationManager};
pub use store::{InMemoryVerificationStore, StoreError, VerificationStore};

/// Lowest and highest code values; every code has exactly six digits.
pub const CODE_MIN: u32 = 100_000;
pub const CODE_MAX: u32 = 999_999;

/// One outstanding verification attempt, keyed by phone in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationEntry {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: u8,
}

impl VerificationEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Teléfono requerido")]
    InvalidInput,

    #[error("No hay código pendiente para este número. Solicita uno nuevo.")]
    NoPendingCode,

    #[error("El código ha expirado. Solicita uno nuevo.")]
    CodeExpired,

    #[error("Demasiados intentos fallidos. Solicita un nuevo código.")]
    TooManyAttempts,

    #[error("Código incorrecto. Intentos restantes: {remaining}")]
    CodeMismatch { remaining: u8 },

    #[error("Verification store failure: {0}")]
    Store(String),
}

impl VerificationError {
    /// Remaining guesses, only known after a mismatch.
    pub fn remaining_attempts(&self) -> Option<u8> {
        match self {
            VerificationError::CodeMismatch { remaining } => Some(*remaining),
            _ => None,
        }
    }
}

impl HttpStatusCode for VerificationError {
    fn status_code(&self) -> u16 {
        match self {
            VerificationError::Store(_) => 500,
            _ => 400,
        }
    }
}

impl From<StoreError> for VerificationError {
    fn from(err: StoreError) -> Self {
        VerificationError::Store(err.to_string())
    }
}

impl From<VerificationError> for CitasError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::InvalidInput => validation_error(err),
            VerificationError::Store(msg) => internal_error(msg),
            other => CitasError::VerificationError {
                remaining_attempts: other.remaining_attempts(),
                message: other.to_string(),
            },
        }
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
            .lock()
            .map(|now| *now)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

/// Produces the secret sent to the phone.
#[cfg_attr(test, mockall::automock)]
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniform six-digit codes from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        code_from_rng(&mut rand::thread_rng())
    }
}

/// Draws one code from `rng`, uniform over `CODE_MIN..=CODE_MAX`.
pub fn code_from_rng<R: Rng>(rng: &mut R) -> String {
    rng.gen_range(CODE_MIN..=CODE_MAX).to_string()
}

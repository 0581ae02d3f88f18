use chrono::Duration;
use citas_config::WhatsAppServiceConfig;
use constant_time_eq::constant_time_eq;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::store::{InMemoryVerificationStore, VerificationStore};
use super::{
    Clock, CodeGenerator, RandomCodeGenerator, SystemClock, VerificationEntry, VerificationError,
};

pub const DEFAULT_TTL_SECS: i64 = 600;
pub const DEFAULT_MAX_ATTEMPTS: u8 = 3;

/// Issues and checks verification codes over a [`VerificationStore`].
///
/// Operations on the same phone key are serialized through a per-key lock, so
/// a burst of concurrent guesses cannot read the same attempt count twice.
pub struct VerificationManager<S: VerificationStore = InMemoryVerificationStore> {
    store: S,
    clock: Arc<dyn Clock>,
    generator: Arc<dyn CodeGenerator>,
    ttl: Duration,
    max_attempts: u8,
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VerificationManager<InMemoryVerificationStore> {
    /// In-memory manager with the limits from the companion config.
    pub fn from_config(config: &WhatsAppServiceConfig) -> Self {
        Self::new(
            InMemoryVerificationStore::new(),
            Arc::new(SystemClock),
            Arc::new(RandomCodeGenerator),
        )
        .with_limits(config.code_ttl_secs, config.max_attempts)
    }
}

impl<S: VerificationStore> VerificationManager<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, generator: Arc<dyn CodeGenerator>) -> Self {
        Self {
            store,
            clock,
            generator,
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Overrides the TTL and attempt budget. Non-positive values keep the defaults.
    pub fn with_limits(mut self, ttl_secs: i64, max_attempts: u8) -> Self {
        if ttl_secs > 0 {
            self.ttl = Duration::seconds(ttl_secs);
        }
        if max_attempts > 0 {
            self.max_attempts = max_attempts;
        }
        self
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn max_attempts(&self) -> u8 {
        self.max_attempts
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Generates a fresh code for `phone_key`, replacing any pending one.
    pub async fn issue_code(&self, phone_key: &str) -> Result<String, VerificationError> {
        let key = phone_key.trim();
        if key.is_empty() {
            return Err(VerificationError::InvalidInput);
        }
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        let code = self.generator.generate();
        let entry = VerificationEntry {
            code: code.clone(),
            expires_at: self.clock.now() + self.ttl,
            attempts: 0,
        };
        self.store.put(key, entry).await?;
        debug!("Issued verification code for {}", key);
        Ok(code)
    }

    /// Checks `submitted` against the pending code for `phone_key`.
    pub async fn check_code(&self, phone_key: &str, submitted: &str) -> Result<(), VerificationError> {
        let key = phone_key.trim();
        if key.is_empty() {
            return Err(VerificationError::InvalidInput);
        }
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        let Some(mut entry) = self.store.get(key).await? else {
            return Err(VerificationError::NoPendingCode);
        };

        if entry.is_expired(self.clock.now()) {
            self.store.delete(key).await?;
            return Err(VerificationError::CodeExpired);
        }

        if entry.attempts >= self.max_attempts {
            self.store.delete(key).await?;
            return Err(VerificationError::TooManyAttempts);
        }

        if constant_time_eq(entry.code.as_bytes(), submitted.trim().as_bytes()) {
            self.store.delete(key).await?;
            info!("Phone {} verified", key);
            return Ok(());
        }

        entry.attempts += 1;
        let remaining = self.max_attempts.saturating_sub(entry.attempts);
        if remaining == 0 {
            self.store.delete(key).await?;
            warn!("Phone {} locked out after {} attempts", key, entry.attempts);
        } else {
            self.store.put(key, entry).await?;
        }
        Err(VerificationError::CodeMismatch { remaining })
    }

    /// Number of entries in the store, expired ones included until swept.
    pub async fn pending(&self) -> Result<usize, VerificationError> {
        Ok(self.store.count().await?)
    }

    /// Drops expired entries and idle per-key locks.
    pub async fn sweep(&self) -> Result<usize, VerificationError> {
        let purged = self.store.purge_expired(self.clock.now()).await?;
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(purged)
    }
}

/// Runs [`VerificationManager::sweep`] every `every` until the task is aborted.
pub fn spawn_expiry_sweeper<S>(
    manager: Arc<VerificationManager<S>>,
    every: std::time::Duration,
) -> JoinHandle<()>
where
    S: VerificationStore + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(std::time::Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            match manager.sweep().await {
                Ok(0) => {}
                Ok(purged) => debug!("Swept {} expired verification codes", purged),
                Err(err) => warn!("Verification sweep failed: {}", err),
            }
        }
    })
}

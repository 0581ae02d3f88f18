//! Service abstractions for external collaborators.
//!
//! Integration crates define their client traits (CRM, payment gateway, chat gateway,
//! verification store) with methods returning [`BoxFuture`], so the traits stay object
//! safe and can be shared as `Arc<dyn Trait>` inside axum state.

use std::future::Future;
use std::pin::Pin;

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

//! A fixed-size pool of reusable converter instances.
//!
//! ## Why a pool instead of a bare semaphore?
//!
//! Renderers are expensive to start (a browser, a TeX engine, a scratch
//! directory) and are not safe to share between two documents at once. The
//! pool owns `N` instances and lends each to exactly one job at a time via
//! a [`PoolToken`]. The number of tokens in flight therefore never exceeds
//! `N`, which is also the batch's concurrency bound.
//!
//! ## Token ownership
//!
//! A token is an RAII guard: dropping it returns the instance, so every
//! exit path (success, error, panic, cancellation) releases. Tokens cannot
//! be constructed, cloned or copied outside this module, and
//! [`ConverterPool::release`] consumes its token, so double release cannot
//! be expressed. Releasing into a pool that did not issue the token is a
//! programmer error and panics.
//!
//! ## Closing
//!
//! [`ConverterPool::close`] wakes every waiter with [`PoolError::Closed`]
//! and closes the idle instances. Instances still lent out at that moment
//! are closed when their token comes back, on a spawned task so that the
//! returning side never blocks.

use crate::converter::Converter;
use crate::error::PoolError;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// A bounded pool of `C` instances. Cheap to clone; clones share the pool.
pub struct ConverterPool<C> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    capacity: usize,
    state: Mutex<State<C>>,
    /// One permit per idle instance. FIFO-fair.
    permits: Semaphore,
    /// Shuts down an instance returned after close.
    retire: fn(C),
}

struct State<C> {
    idle: Vec<C>,
    closed: bool,
}

impl<C> Inner<C> {
    fn state(&self) -> MutexGuard<'_, State<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return an instance. Never blocks beyond the short state lock.
    fn give_back(&self, converter: C) {
        let mut state = self.state();
        if state.closed {
            drop(state);
            (self.retire)(converter);
            return;
        }
        state.idle.push(converter);
        drop(state);
        self.permits.add_permits(1);
    }
}

/// Close a converter that came back after the pool closed.
fn retire_late<C: Converter + 'static>(mut converter: C) {
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(e) = converter.close().await {
                    warn!("Failed to close returned converter: {}", e);
                }
            });
        }
        Err(_) => warn!("Converter returned after close outside a runtime; dropping it unclosed"),
    }
}

impl<C: Converter + 'static> ConverterPool<C> {
    /// Build a pool over `converters`; its capacity is their count.
    pub fn new(converters: Vec<C>) -> Result<Self, PoolError> {
        if converters.is_empty() {
            return Err(PoolError::Empty);
        }
        let capacity = converters.len();
        debug!("Converter pool created with {} instances", capacity);
        Ok(Self {
            inner: Arc::new(Inner {
                capacity,
                state: Mutex::new(State {
                    idle: converters,
                    closed: false,
                }),
                permits: Semaphore::new(capacity),
                retire: retire_late::<C>,
            }),
        })
    }
}

impl<C: Converter> ConverterPool<C> {
    /// Wait until an instance is idle and borrow it.
    ///
    /// Waiters are served in arrival order. Fails with
    /// [`PoolError::Closed`] once the pool is closed, including for callers
    /// already waiting when it closes.
    pub async fn acquire(&self) -> Result<PoolToken<C>, PoolError> {
        let permit = self
            .inner
            .permits
            .acquire()
            .await
            .map_err(|_| PoolError::Closed)?;
        // The instance now belongs to the token; `give_back` re-adds the permit.
        permit.forget();

        let converter = self.inner.state().idle.pop().ok_or(PoolError::Closed)?;
        Ok(PoolToken {
            converter: Some(converter),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Close the pool and release every idle instance's resources.
    ///
    /// Instances lent out are closed once returned. Idempotent. Reports how many instances failed to close, with the
    /// first failure.
    pub async fn close(&self) -> Result<(), PoolError> {
        let drained = {
            let mut state = self.inner.state();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        self.inner.permits.close();

        let mut failed = 0usize;
        let mut first_error: Option<String> = None;
        for mut converter in drained {
            if let Err(e) = converter.close().await {
                warn!("Failed to close converter: {}", e);
                failed += 1;
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
        debug!("Converter pool closed");

        match first_error {
            None => Ok(()),
            Some(first_error) => Err(PoolError::CloseFailed {
                failed,
                first_error,
            }),
        }
    }
}

impl<C> ConverterPool<C> {
    /// Return a token's instance to the pool.
    ///
    /// Equivalent to dropping the token, plus a check that the token came
    /// from this pool. After [`close`](Self::close) the instance is closed
    /// instead of being made available.
    ///
    /// # Panics
    /// If `token` was issued by a different pool.
    pub fn release(&self, token: PoolToken<C>) {
        assert!(
            Arc::ptr_eq(&self.inner, &token.pool),
            "PoolToken released into a pool that did not issue it"
        );
        drop(token);
    }

    /// Fixed capacity `N`.
    pub fn size(&self) -> usize {
        self.inner.capacity
    }

    /// Instances currently idle.
    pub fn available(&self) -> usize {
        self.inner.state().idle.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state().closed
    }
}

impl<C> Clone for ConverterPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for ConverterPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state();
        f.debug_struct("ConverterPool")
            .field("capacity", &self.inner.capacity)
            .field("idle", &state.idle.len())
            .field("closed", &state.closed)
            .finish()
    }
}

/// Exclusive, temporary use of one pooled converter.
///
/// Dereferences to the converter. Dropping the token returns it.
pub struct PoolToken<C> {
    converter: Option<C>,
    pool: Arc<Inner<C>>,
}

impl<C> Deref for PoolToken<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.converter
            .as_ref()
            .expect("PoolToken holds its converter until dropped")
    }
}

impl<C> Drop for PoolToken<C> {
    fn drop(&mut self) {
        if let Some(converter) = self.converter.take() {
            self.pool.give_back(converter);
        }
    }
}

impl<C> fmt::Debug for PoolToken<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolToken").finish_non_exhaustive()
    }
}

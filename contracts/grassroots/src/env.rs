//! # Environment
//!
//! Per-operation context: who is calling and what time it is.
//!
//! An [`Env`] is built exactly once per operation. The clock is read at that
//! moment and the same `now` is used for every window comparison inside the
//! operation, so a single call never observes two different times.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::config::Config;
use crate::types::{Principal, Timestamp};
use crate::Error;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        u64::try_from(Utc::now().timestamp()).unwrap_or(0)
    }
}

/// A settable clock shared between the engine and whoever drives it.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        ManualClock(Arc::new(AtomicU64::new(start)))
    }

    pub fn set(&self, now: Timestamp) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.0.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.0.load(Ordering::SeqCst)
    }
}

/// The proven identity behind an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Caller {
    /// A principal whose authorization was verified upstream.
    User(Principal),
    /// The platform itself, reacting to the custodial system.
    Platform,
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Caller::User(name) => write!(f, "{name}"),
            Caller::Platform => f.write_str("<platform>"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Env {
    caller: Caller,
    now: Timestamp,
}

impl Env {
    pub fn new(caller: Caller, now: Timestamp) -> Self {
        Env { caller, now }
    }

    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Fail unless the caller is `principal`.
    pub fn require_auth(&self, principal: &Principal) -> Result<(), Error> {
        match &self.caller {
            Caller::User(name) if name == principal => Ok(()),
            other => Err(Error::Unauthorized {
                caller: other.to_string(),
                required: principal.clone(),
            }),
        }
    }

    /// Fail unless the caller is the configured admin.
    pub fn require_admin(&self, config: &Config) -> Result<(), Error> {
        self.require_auth(&config.admin)
    }

    /// Fail unless the caller is the platform.
    pub fn require_platform(&self) -> Result<(), Error> {
        match &self.caller {
            Caller::Platform => Ok(()),
            Caller::User(name) => Err(Error::Unauthorized {
                caller: name.to_string(),
                required: Principal::new("platform")?,
            }),
        }
    }
}

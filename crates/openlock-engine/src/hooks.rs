//! Lifecycle notification hooks.
//!
//! The engine holds exactly one [`LockupHooks`] implementation, fixed at
//! construction. Each hook runs after the state change it reports, inside
//! the same atomic unit: a hook error aborts the operation and every
//! mutation it made is rolled back.

use std::time::Duration;

use openlock_types::{Coins, Lock, Result};

/// Observer of lock lifecycle transitions.
///
/// Every method defaults to a no-op so consumers implement only what they
/// react to.
pub trait LockupHooks {
    /// A lock was created.
    fn on_token_locked(&mut self, lock: &Lock) -> Result<()> {
        let _ = lock;
        Ok(())
    }

    /// `added` was escrowed into an existing lock. `lock` is the updated record.
    fn on_add_tokens(&mut self, lock: &Lock, added: &Coins) -> Result<()> {
        let _ = (lock, added);
        Ok(())
    }

    /// A lock entered the unlocking queue. `lock.end_time` is set.
    fn on_start_unlock(&mut self, lock: &Lock) -> Result<()> {
        let _ = lock;
        Ok(())
    }

    /// A lock's duration grew from `previous` to `lock.duration`.
    fn on_lockup_extend(&mut self, lock: &Lock, previous: Duration) -> Result<()> {
        let _ = (lock, previous);
        Ok(())
    }

    /// A lock was finalized and its coins returned. `lock` is the deleted record.
    fn on_token_unlocked(&mut self, lock: &Lock) -> Result<()> {
        let _ = lock;
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl LockupHooks for NoopHooks {}

#[cfg(any(test, feature = "test-helpers"))]
pub use recording::{FailingHooks, HookEvent, RecordingHooks};

#[cfg(any(test, feature = "test-helpers"))]
mod recording {
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use openlock_types::{Coins, Lock, LockId, LockupError, Result};

    use super::LockupHooks;

    /// One observed hook call.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum HookEvent {
        TokenLocked(LockId),
        AddTokens(LockId, Coins),
        StartUnlock(LockId, DateTime<Utc>),
        LockupExtend {
            id: LockId,
            from: Duration,
            to: Duration,
        },
        TokenUnlocked(LockId),
    }

    /// Records every hook call in order.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingHooks {
        pub events: Vec<HookEvent>,
    }

    impl LockupHooks for RecordingHooks {
        fn on_token_locked(&mut self, lock: &Lock) -> Result<()> {
            self.events.push(HookEvent::TokenLocked(lock.id));
            Ok(())
        }

        fn on_add_tokens(&mut self, lock: &Lock, added: &Coins) -> Result<()> {
            self.events.push(HookEvent::AddTokens(lock.id, added.clone()));
            Ok(())
        }

        fn on_start_unlock(&mut self, lock: &Lock) -> Result<()> {
            let end = lock.end_time.unwrap_or(DateTime::<Utc>::MIN_UTC);
            self.events.push(HookEvent::StartUnlock(lock.id, end));
            Ok(())
        }

        fn on_lockup_extend(&mut self, lock: &Lock, previous: Duration) -> Result<()> {
            self.events.push(HookEvent::LockupExtend {
                id: lock.id,
                from: previous,
                to: lock.duration,
            });
            Ok(())
        }

        fn on_token_unlocked(&mut self, lock: &Lock) -> Result<()> {
            self.events.push(HookEvent::TokenUnlocked(lock.id));
            Ok(())
        }
    }

    /// Fails the named hook while `armed`; every other hook succeeds.
    #[derive(Debug, Clone)]
    pub struct FailingHooks {
        pub hook: &'static str,
        pub armed: bool,
    }

    impl FailingHooks {
        /// Fail every call to `hook`, e.g. `"on_start_unlock"`.
        #[must_use]
        pub fn on(hook: &'static str) -> Self {
            Self { hook, armed: true }
        }

        fn check(&self, hook: &'static str) -> Result<()> {
            if self.armed && self.hook == hook {
                return Err(LockupError::HookFailed {
                    hook,
                    reason: "injected failure".into(),
                });
            }
            Ok(())
        }
    }

    impl LockupHooks for FailingHooks {
        fn on_token_locked(&mut self, _lock: &Lock) -> Result<()> {
            self.check("on_token_locked")
        }

        fn on_add_tokens(&mut self, _lock: &Lock, _added: &Coins) -> Result<()> {
            self.check("on_add_tokens")
        }

        fn on_start_unlock(&mut self, _lock: &Lock) -> Result<()> {
            self.check("on_start_unlock")
        }

        fn on_lockup_extend(&mut self, _lock: &Lock, _previous: Duration) -> Result<()> {
            self.check("on_lockup_extend")
        }

        fn on_token_unlocked(&mut self, _lock: &Lock) -> Result<()> {
            self.check("on_token_unlocked")
        }
    }
}

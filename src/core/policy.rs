//! Index policies and entry families

use serde::{Deserialize, Serialize};

/// How index values are laid out within one sibling group
///
/// After every structural change a sibling group holds exactly
/// `base, base + step, base + 2 * step, ...` in its relative order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPolicy {
    pub base: i64,
    pub step: i64,
}

impl IndexPolicy {
    /// Application menus: 1, 2, 3, ...
    pub const MENU: IndexPolicy = IndexPolicy { base: 1, step: 1 };

    /// Profile entries: 0, 2, 4, ...
    pub const PROFILE_ENTRY: IndexPolicy = IndexPolicy { base: 0, step: 2 };

    pub fn new(base: i64, step: i64) -> Result<Self, String> {
        let policy = Self { base, step };
        policy.validate()?;
        Ok(policy)
    }

    /// Largest base a policy may declare
    pub const MAX_BASE: i64 = 1_000_000;

    /// Largest step a policy may declare
    pub const MAX_STEP: i64 = 1_000_000;

    pub fn validate(&self) -> Result<(), String> {
        if self.step < 1 || self.step > Self::MAX_STEP {
            return Err(format!(
                "index step must be between 1 and {} (got {})",
                Self::MAX_STEP,
                self.step
            ));
        }
        if self.base < 0 || self.base > Self::MAX_BASE {
            return Err(format!(
                "index base must be between 0 and {} (got {})",
                Self::MAX_BASE,
                self.base
            ));
        }
        Ok(())
    }

    /// Index value of the given slot in a densely numbered group, `None` on overflow
    pub fn index_at(&self, slot: usize) -> Option<i64> {
        i64::try_from(slot)
            .ok()?
            .checked_mul(self.step)?
            .checked_add(self.base)
    }

    /// Index for an entry appended after `max_existing`, `None` on overflow
    pub fn next_after(&self, max_existing: Option<i64>) -> Option<i64> {
        match max_existing {
            Some(max) => max.checked_add(self.step),
            None => Some(self.base),
        }
    }

    /// Slot a requested index value lands in, for a group of `len` other siblings
    ///
    /// Values at or below `base` land first, values past the end land last,
    /// and values between two lattice points round down.
    pub fn slot_for(&self, requested: i64, len: usize) -> usize {
        if requested <= self.base {
            return 0;
        }
        let slot = (requested - self.base) / self.step;
        usize::try_from(slot).map_or(len, |slot| slot.min(len))
    }
}

impl Default for IndexPolicy {
    fn default() -> Self {
        IndexPolicy::MENU
    }
}

/// One call site of the engine: a named entry family with its index policy
///
/// Every scope is `(family, container, parent)`, so two families may reuse
/// the same container ids without their entries ever mixing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Family {
    name: String,
    policy: IndexPolicy,
}

impl Family {
    pub const APPLICATION_MENU: &'static str = "application_menu";
    pub const PROFILE_ENTRY: &'static str = "profile_entry";

    pub fn new(name: impl Into<String>, policy: IndexPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
        }
    }

    pub fn application_menu() -> Self {
        Self::new(Self::APPLICATION_MENU, IndexPolicy::MENU)
    }

    pub fn profile_entry() -> Self {
        Self::new(Self::PROFILE_ENTRY, IndexPolicy::PROFILE_ENTRY)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> IndexPolicy {
        self.policy
    }
}

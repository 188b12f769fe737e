//! Typed call sites of the engine
//!
//! - [`MenuService`] - application menus, indexed 1, 2, 3, ...
//! - [`ProfileEntryService`] - profile folders and links, indexed 0, 2, 4, ...

pub mod menu;
pub mod profile_entry;

pub use menu::{Menu, MenuCreator, MenuService, MenuUpdater};
pub use profile_entry::{ProfileEntry, ProfileEntryKind, ProfileEntryService};

//! YAML loading helpers

pub mod diagnostics;

pub use diagnostics::{YamlError, YamlSyntaxError};

//! Compiler version

/// Version reported by the CLI and used for module compatibility
/// checks.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

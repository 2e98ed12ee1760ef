//! This crate reexports all ringchat crates.

pub use ringchat_core as core;
pub use ringchat_crypto as crypto;
pub use ringchat_packet as packet;

/// The ringchat crate version string in the form "major.minor.patch" (e.g. "1.2.3")
pub fn crate_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
/// The ringchat crate major version represented as unsigned integer
pub fn crate_version_major() -> u32 {
    env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or_default()
}
/// The ringchat crate minor version represented as unsigned integer
pub fn crate_version_minor() -> u32 {
    env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or_default()
}
/// The ringchat crate patch version represented as unsigned integer
pub fn crate_version_patch() -> u32 {
    env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or_default()
}

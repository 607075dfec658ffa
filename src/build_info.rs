//! Build metadata, captured by `build.rs` into environment variables and
//! exposed here for diagnostics. Ambient engineering substrate (SPEC_FULL.md
//! §0.3) — not part of the 11-component core, carried regardless.

use core::cmp::min;

use alloc::format;
use alloc::string::{String, ToString};

/// Full, multi-line build information block.
pub fn get_build_info() -> String {
    let commit = option_env!("GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("GIT_BRANCH").unwrap_or("unknown");
    let dirty = option_env!("GIT_DIRTY").map(|s| s == "1").unwrap_or(false);
    let ts = option_env!("BUILD_TIMESTAMP").unwrap_or("0");
    let rustv = option_env!("RUST_VERSION").unwrap_or("unknown");
    let feats = option_env!("FEATURES").unwrap_or("");
    let profile = option_env!("PROFILE").unwrap_or("unknown");
    let target = option_env!("TARGET").unwrap_or("unknown");

    let dirty_marker = if dirty { " (dirty)" } else { "" };
    format!(
        "sis_kernel build information\n\
         Git:       {} @ {}{}\n\
         Built:     {}\n\
         Rust:      {}\n\
         Features:  {}\n\
         Profile:   {}\n\
         Target:    {}",
        &commit[..min(12, commit.len())],
        branch,
        dirty_marker,
        ts,
        rustv,
        if feats.is_empty() { "(none)".to_string() } else { feats.to_string() },
        profile,
        target
    )
}

/// Print the build info block to the console. Called once from
/// `kernel_main` after boot-info verification (spec.md §4.11 step 8).
pub fn print_build_info() {
    let info = get_build_info();
    unsafe {
        crate::uart::write_bytes(b"\n----------------------------------------\n");
        crate::uart::write_bytes(info.as_bytes());
        crate::uart::write_bytes(b"\n----------------------------------------\n");
    }
}

/// Short one-line version string, e.g. for panic diagnostics.
pub fn get_version_string() -> String {
    let commit = option_env!("GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("GIT_BRANCH").unwrap_or("unknown");
    let dirty = option_env!("GIT_DIRTY").map(|s| s == "1").unwrap_or(false);
    let ts = option_env!("BUILD_TIMESTAMP").unwrap_or("0");
    let dirty_marker = if dirty { "+" } else { "" };
    format!(
        "sis_kernel {} ({}{})",
        &commit[..min(7, commit.len())],
        branch,
        dirty_marker,
    )
    + &format!(" built {}", ts)
}

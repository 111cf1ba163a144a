//! Common utilities shared between Android and iOS builders.
//!
//! All functions in this module provide actionable error messages that name
//! what is missing and where it was expected.

use std::fs;
use std::path::Path;

use crate::types::ShellError;

/// Fails with [`ShellError::ToolchainNotFound`] unless `entry_point` exists.
///
/// Checked before invoking a platform build so a missing shell project is
/// reported clearly instead of as an opaque tool failure.
pub fn ensure_entry_point(entry_point: &Path, tool: &str, hint: &str) -> Result<(), ShellError> {
    if entry_point.exists() {
        Ok(())
    } else {
        Err(ShellError::ToolchainNotFound {
            tool: tool.to_string(),
            path: entry_point.to_path_buf(),
            hint: hint.to_string(),
        })
    }
}

/// Device selector arguments for adb-style tools.
///
/// An empty identifier yields no arguments at all: device tools reject an
/// explicit empty selector.
pub fn device_selector(flag: &str, device_id: &str) -> Vec<String> {
    let device_id = device_id.trim();
    if device_id.is_empty() {
        Vec::new()
    } else {
        vec![flag.to_string(), device_id.to_string()]
    }
}

/// Replaces `dest` with a recursive copy of `src`.
///
/// Any previous content of `dest` is removed first, so repeated calls
/// leave exactly one copy of `src` behind.
pub fn replace_dir(src: &Path, dest: &Path) -> Result<(), ShellError> {
    let copy_error = |reason: String| ShellError::CopyFailed {
        from: src.to_path_buf(),
        to: dest.to_path_buf(),
        reason,
    };

    if dest.exists() {
        fs::remove_dir_all(dest)
            .map_err(|e| copy_error(format!("removing previous output: {}", e)))?;
    }
    copy_dir_recursive(src, dest).map_err(|e| copy_error(e.to_string()))
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dest)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&path, &dest_path)?;
        } else {
            fs::copy(&path, &dest_path)?;
        }
    }

    Ok(())
}

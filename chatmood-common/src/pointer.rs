//! Session pointer file
//!
//! A plain-text file holding exactly the path of the active dataset. The
//! reporting layer reads it to find the live CSV, so it is rewritten in full
//! on every new session.

use std::path::Path;

use crate::Result;

/// Replace the pointer file's contents with `dataset`
pub fn write_pointer(pointer: &Path, dataset: &str) -> Result<()> {
    if let Some(parent) = pointer.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(pointer, dataset)?;
    Ok(())
}

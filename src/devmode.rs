//! Detection of development checkouts.
//! Running kiln from its own source tree must not create commits inside the
//! generated project, so the commit phase is skipped in that case.

use crate::constants::{DEV_MODE_VAR, DEV_SEARCH_DEPTH, MANIFEST_FILE};
use crate::env::Environment;
use log::debug;
use std::path::Path;

/// Checks whether kiln runs from a development checkout.
///
/// True when `KILN_DEV` is set to a non-empty value, or when one of the first
/// few ancestors of the running executable holds a `Cargo.toml` next to a git
/// repository.
pub fn is_dev_checkout(env: &Environment) -> bool {
    if env.var(DEV_MODE_VAR).is_some_and(|value| !value.is_empty()) {
        debug!("{DEV_MODE_VAR} is set, running in development mode");
        return true;
    }

    let Some(exe) = env.current_exe() else {
        return false;
    };

    match exe.ancestors().skip(1).take(DEV_SEARCH_DEPTH).find(|dir| is_checkout_root(dir)) {
        Some(root) => {
            debug!("Development checkout detected at {}", root.display());
            true
        }
        None => false,
    }
}

fn is_checkout_root(dir: &Path) -> bool {
    dir.join(MANIFEST_FILE).is_file() && git2::Repository::open(dir).is_ok()
}

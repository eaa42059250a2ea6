// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::path::{Path, PathBuf};

use path_clean::clean;

pub type FindInParent = fn(&Path, &str) -> Option<PathBuf>;

/// Walk up from `start` looking for `filename`.
pub fn find_in_parent(start: &Path, filename: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(filename))
        .find(|candidate| candidate.is_file())
}

/// Where to read configuration from, in order of preference:
/// an explicit file, the nearest `filename` above `cwd`, then the per-user config directory.
pub fn resolve_config_path(
    find_in_parent: FindInParent,
    cwd: &Path,
    default_config_dir: &Path,
    filename: &str,
    explicit: Option<&Path>,
) -> PathBuf {
    if let Some(explicit) = explicit {
        if explicit.is_absolute() {
            return explicit.to_path_buf();
        }
        return clean(cwd.join(explicit));
    }

    find_in_parent(cwd, filename).unwrap_or_else(|| clean(default_config_dir.join(filename)))
}

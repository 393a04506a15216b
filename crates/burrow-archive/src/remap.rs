//! Rewriting of symlink targets that point into an app's versioned install directory.
//!
//! Installed packages live under a path such as `/data/app/<pkg>-<rand>` (or
//! `/data/app/~~<rand>/<pkg>-<rand>` on newer layouts) that changes on every
//! reinstall. Links recorded at backup time into that directory are moved onto
//! the directory that is current at restore time, matching by segment position.

use std::path::{Path, PathBuf};

/// Root under which installed packages keep their versioned directories.
pub const VOLATILE_APP_ROOT: &str = "/data/app";

/// Remaps symlink targets under a volatile root onto a replacement root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathRemapRule {
    volatile_root: String,
    replacement: Option<PathBuf>,
}

impl PathRemapRule {
    pub fn new(replacement: Option<PathBuf>) -> Self {
        Self {
            volatile_root: VOLATILE_APP_ROOT.to_string(),
            replacement,
        }
    }

    pub fn with_volatile_root(mut self, root: impl Into<String>) -> Self {
        let root = root.into();
        self.volatile_root = match root.trim_end_matches('/') {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        };
        self
    }

    pub fn volatile_root(&self) -> &str {
        &self.volatile_root
    }

    pub fn replacement(&self) -> Option<&Path> {
        self.replacement.as_deref()
    }

    /// Whether `target` lies at or below the volatile root.
    pub fn applies_to(&self, target: &str) -> bool {
        target == self.volatile_root
            || target
                .strip_prefix(self.volatile_root.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Rewrite a link target, leaving it untouched when the rule does not apply.
    pub fn remap_target(&self, target: &Path) -> PathBuf {
        match target.to_str() {
            Some(text) if self.applies_to(text) => self.remap(text),
            _ => target.to_path_buf(),
        }
    }

    /// Positional rewrite of a path under the volatile root.
    ///
    /// With the default root, segment 3 is the package directory and segment 4
    /// is either a known sub-path (`lib`, `oat`, `*.apk`) or, on newer layouts,
    /// the real package directory under a random parent.
    pub fn remap(&self, broken: &str) -> PathBuf {
        let Some(replacement) = self.replacement.as_deref() else {
            return PathBuf::from(broken);
        };

        let broken = broken.strip_suffix('/').unwrap_or(broken);
        if broken == self.volatile_root {
            return PathBuf::from(broken);
        }

        let segments: Vec<&str> = broken.split('/').collect();
        let root_len = self.volatile_root.split('/').count();
        let first_inner = root_len + 1;

        if segments.len() <= first_inner {
            return replacement.to_path_buf();
        }

        let skip = if is_known_sub_path(segments[first_inner]) || segments.len() == first_inner + 1 {
            first_inner
        } else {
            first_inner + 1
        };

        let mut remapped = replacement.to_path_buf();
        for segment in segments.iter().skip(skip).filter(|s| !s.is_empty()) {
            remapped.push(segment);
        }
        remapped
    }
}

fn is_known_sub_path(segment: &str) -> bool {
    segment == "lib" || segment == "oat" || segment.ends_with(".apk")
}

#[cfg(test)]
mod tests {
    use super::*;

    const REAL: &str = "/data/app/~~fresh==/com.example-new==";

    fn rule() -> PathRemapRule {
        PathRemapRule::new(Some(PathBuf::from(REAL)))
    }

    #[test]
    fn without_replacement_nothing_changes() {
        let rule = PathRemapRule::new(None);
        assert_eq!(
            rule.remap("/data/app/com.example-1/lib/arm64"),
            Path::new("/data/app/com.example-1/lib/arm64")
        );
    }

    #[test]
    fn bare_root_is_left_alone() {
        assert_eq!(rule().remap("/data/app"), Path::new("/data/app"));
        assert_eq!(rule().remap("/data/app/"), Path::new("/data/app"));
    }

    #[test]
    fn package_directory_maps_to_replacement() {
        assert_eq!(rule().remap("/data/app/com.example-1"), Path::new(REAL));
        assert_eq!(rule().remap("/data/app/com.example-1/"), Path::new(REAL));
    }

    #[test]
    fn legacy_native_library_path() {
        assert_eq!(
            rule().remap("/data/app/pkg-id/lib/arm64/libfoo.so"),
            Path::new(REAL).join("lib/arm64/libfoo.so")
        );
    }

    #[test]
    fn legacy_oat_and_apk_paths() {
        assert_eq!(
            rule().remap("/data/app/pkg-id/oat/arm64/base.odex"),
            Path::new(REAL).join("oat/arm64/base.odex")
        );
        assert_eq!(
            rule().remap("/data/app/pkg-id/split_config.arm64_v8a.apk"),
            Path::new(REAL).join("split_config.arm64_v8a.apk")
        );
    }

    #[test]
    fn five_segments_keep_the_last_one() {
        assert_eq!(
            rule().remap("/data/app/~~old==/com.example-old=="),
            Path::new(REAL).join("com.example-old==")
        );
    }

    #[test]
    fn randomized_parent_layout_drops_both_directories() {
        assert_eq!(
            rule().remap("/data/app/~~old==/com.example-old==/lib/arm64/libfoo.so"),
            Path::new(REAL).join("lib/arm64/libfoo.so")
        );
    }

    #[test]
    fn applies_only_under_root() {
        let rule = rule();
        assert!(rule.applies_to("/data/app"));
        assert!(rule.applies_to("/data/app/x"));
        assert!(!rule.applies_to("/data/application/x"));
        assert!(!rule.applies_to("relative/lib"));
        assert_eq!(
            rule.remap_target(Path::new("../shared/lib.so")),
            Path::new("../shared/lib.so")
        );
    }

    #[test]
    fn custom_volatile_root() {
        let rule = PathRemapRule::new(Some(PathBuf::from("/opt/current")))
            .with_volatile_root("/opt/releases/");
        assert_eq!(rule.volatile_root(), "/opt/releases");
        assert_eq!(
            rule.remap_target(Path::new("/opt/releases/v1/lib/libx.so")),
            Path::new("/opt/current/lib/libx.so")
        );
    }
}

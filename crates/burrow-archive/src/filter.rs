//! Inclusion/exclusion filtering of archive-relative paths.
//!
//! A path is selected iff (no inclusion patterns, or at least one matches)
//! and no exclusion pattern matches. Patterns are regular expressions searched
//! anywhere in the path, so anchor with `^`/`$` to pin them. Directory paths
//! carry a trailing `/`.

use std::borrow::Cow;

use regex::Regex;

use crate::{Error, Result};

/// Uncompiled inclusion and exclusion pattern lists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl FilterSpec {
    pub fn new<I, E, S, T>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            include: include.into_iter().map(Into::into).collect(),
            exclude: exclude.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Compile every pattern, failing on the first malformed one.
    pub fn compile(&self) -> Result<Filter> {
        Ok(Filter {
            include: compile_all(&self.include)?,
            exclude: compile_all(&self.exclude)?,
        })
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| Error::InvalidFilter {
                pattern: pattern.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Compiled filter, built once per create/extract call.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl Filter {
    /// A filter that selects everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        !self.include.is_empty() || !self.exclude.is_empty()
    }

    pub fn selects(&self, relative: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|re| re.is_match(relative));
        included && !self.exclude.iter().any(|re| re.is_match(relative))
    }

    pub fn selects_entry(&self, relative: &str, is_dir: bool) -> bool {
        self.selects(&filter_key(relative, is_dir))
    }
}

/// The string a filter sees for a path: directories end with `/`.
pub fn filter_key(relative: &str, is_dir: bool) -> Cow<'_, str> {
    if is_dir && !relative.ends_with('/') {
        Cow::Owned(format!("{relative}/"))
    } else {
        Cow::Borrowed(relative)
    }
}

//! Entry path type and name matching.
//!
//! Entry names are posix-style relative paths. Directories carry a trailing
//! `/`. Lookups may spell a directory with or without that slash, and may ask
//! for a match on the full path or on the last component only (see
//! [`MatchPath`]).

use std::fmt;
use std::path::{Component, Path};

use crate::{Error, Result};

/// How a lookup name is compared against entry names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchPath {
    /// The name must equal the full relative path of the entry.
    #[default]
    Match,
    /// The name, as given, is compared against the last path component of
    /// each entry. A name containing `/` (other than a trailing one) never
    /// matches.
    ///
    /// The first entry in iteration order whose file name matches wins.
    Ignore,
}

/// A relative, `/`-separated entry path.
///
/// # Examples
///
/// ```
/// use zipcollection::{EntryPath, MatchPath};
///
/// let dir = EntryPath::new("docs/api/").unwrap();
/// assert!(dir.is_directory());
/// assert_eq!(dir.file_name(), "api");
/// assert!(dir.matches("docs/api", MatchPath::Match));
/// assert!(dir.matches("api", MatchPath::Ignore));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryPath(String);

impl EntryPath {
    /// Creates a new `EntryPath`.
    ///
    /// Backslashes are converted to `/` and leading `/` are removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty or contains NUL bytes.
    pub fn new(s: &str) -> Result<Self> {
        if s.contains('\0') {
            return Err(Error::InvalidArgument(format!(
                "entry path '{}' contains NUL byte",
                s.escape_debug()
            )));
        }
        let normalized = s.replace('\\', "/");
        let normalized = normalized.trim_start_matches('/');
        if normalized.is_empty() || normalized == "/" {
            return Err(Error::InvalidArgument("empty entry path".into()));
        }
        Ok(Self(normalized.to_string()))
    }

    /// Builds a path from a relative file system path.
    ///
    /// `.` components are dropped; `..`, roots and prefixes are rejected.
    pub fn from_relative(path: &Path, is_directory: bool) -> Result<Self> {
        let mut parts = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => {
                    return Err(Error::InvalidArgument(format!(
                        "'{}' is not a relative path",
                        path.display()
                    )));
                }
            }
        }
        let mut joined = parts.join("/");
        if is_directory {
            joined.push('/');
        }
        Self::new(&joined)
    }

    /// Returns the path as a string slice, including any trailing `/`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the path has the directory form (trailing `/`).
    pub fn is_directory(&self) -> bool {
        self.0.ends_with('/')
    }

    /// Returns the path without its trailing `/`.
    pub fn trimmed(&self) -> &str {
        trim_dir_suffix(&self.0)
    }

    /// Returns the last component of the path, ignoring a trailing `/`.
    pub fn file_name(&self) -> &str {
        file_name(&self.0)
    }

    /// Returns the parent directory, with a trailing `/`, if any.
    pub fn parent(&self) -> Option<Self> {
        let trimmed = self.trimmed();
        trimmed
            .rfind('/')
            .map(|idx| Self(trimmed[..=idx].to_string()))
    }

    /// Returns an iterator over the path components.
    ///
    /// ```
    /// use zipcollection::EntryPath;
    ///
    /// let path = EntryPath::new("a/b/c/").unwrap();
    /// let components: Vec<_> = path.components().collect();
    /// assert_eq!(components, vec!["a", "b", "c"]);
    /// ```
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.trimmed().split('/')
    }

    /// Returns `true` if `query` names this entry under `mode`.
    pub fn matches(&self, query: &str, mode: MatchPath) -> bool {
        matches_name(&self.0, query, mode)
    }
}

impl AsRef<str> for EntryPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for EntryPath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

fn trim_dir_suffix(s: &str) -> &str {
    s.strip_suffix('/').unwrap_or(s)
}

/// Returns the last component of `path`, ignoring a trailing `/`.
pub(crate) fn file_name(path: &str) -> &str {
    let trimmed = trim_dir_suffix(path);
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Compares an entry name with a lookup name.
pub(crate) fn matches_name(entry: &str, query: &str, mode: MatchPath) -> bool {
    match mode {
        MatchPath::Match => trim_dir_suffix(entry) == trim_dir_suffix(query),
        MatchPath::Ignore => file_name(entry) == trim_dir_suffix(query),
    }
}

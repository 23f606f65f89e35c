//! core::types
//!
//! Strong types for the values the tracker reads out of a repository.
//!
//! # Types
//!
//! - [`BranchName`] - Validated branch name (local short name)
//! - [`Oid`] - Commit identifier (SHA-1 or SHA-256 hex)
//! - [`RefName`] - Validated full reference name
//! - [`UtcTimestamp`] - Moment a snapshot was taken
//! - [`Fingerprint`] - Hash over ref state, used to detect changes between refreshes
//!
//! Values are validated at construction time, so a `BranchCollection` can
//! never hold a malformed name or hash.
//!
//! # Examples
//!
//! ```
//! use worktrack::core::types::{BranchName, Oid, RefName};
//!
//! let branch = BranchName::new("feature/login").unwrap();
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! assert_eq!(RefName::for_branch(&branch).as_str(), "refs/heads/feature/login");
//! assert_eq!(oid.short(7), "abc123d");
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),
}

/// Characters git refuses anywhere in a ref name.
const FORBIDDEN_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];

/// Shared refname checks (`git check-ref-format`), returning a description
/// of the first violated rule.
fn check_refname_rules(name: &str) -> Option<String> {
    if name.is_empty() {
        return Some("cannot be empty".into());
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Some("cannot start or end with '/'".into());
    }
    if name.ends_with(".lock") {
        return Some("cannot end with '.lock'".into());
    }
    for seq in ["..", "@{", "//"] {
        if name.contains(seq) {
            return Some(format!("cannot contain '{seq}'"));
        }
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Some(format!("cannot contain '{c}'"));
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Some("cannot contain control characters".into());
    }
    for component in name.split('/').filter(|c| !c.is_empty()) {
        if component.starts_with('.') {
            return Some("path component cannot start with '.'".into());
        }
        if component.ends_with(".lock") {
            return Some("path component cannot end with '.lock'".into());
        }
    }
    None
}

/// A validated git branch name, without any `refs/` prefix.
///
/// Remote-tracking branches use the same type for the part after the remote
/// name (`feature` in `origin/feature`).
///
/// # Example
///
/// ```
/// use worktrack::core::types::BranchName;
///
/// let name = BranchName::new("feature/my-branch").unwrap();
/// assert_eq!(name.as_str(), "feature/my-branch");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("-flag").is_err());
/// assert!(BranchName::new("@").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name == "@" {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be '@' (reserved)".into(),
            ));
        }
        if name.starts_with('.') || name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(format!(
                "branch name cannot start with '{}'",
                &name[..1]
            )));
        }
        if let Some(problem) = check_refname_rules(&name) {
            return Err(TypeError::InvalidBranchName(format!(
                "branch name {problem}"
            )));
        }
        Ok(Self(name))
    }

    /// Accept the short name of a branch ref that already exists.
    ///
    /// Git refuses to create branches named `@` or starting with `-`, but
    /// `update-ref` can still write them, so reads only apply the refname rules.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name is not a valid ref component path.
    pub fn from_ref(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if let Some(problem) = check_refname_rules(&name) {
            return Err(TypeError::InvalidBranchName(format!(
                "branch name {problem}"
            )));
        }
        Ok(Self(name))
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase so that hashes read from different
/// backends compare equal.
///
/// # Example
///
/// ```
/// use worktrack::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// assert!(!oid.is_zero());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` unless the input is 40 or 64 hex characters.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Check if this is the zero/null OID.
    pub fn is_zero(&self) -> bool {
        self.0.chars().all(|c| c == '0')
    }

    /// Get an abbreviated form of the OID.
    ///
    /// If `len` exceeds the OID length the full OID is returned.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated full git reference name (`refs/heads/main`, `HEAD`).
///
/// # Example
///
/// ```
/// use worktrack::core::types::{BranchName, RefName};
///
/// let branch = BranchName::new("feature/foo").unwrap();
/// assert_eq!(RefName::for_branch(&branch).as_str(), "refs/heads/feature/foo");
///
/// let remote = RefName::for_remote_branch("origin", &branch);
/// assert_eq!(remote.as_str(), "refs/remotes/origin/feature/foo");
/// assert!(remote.is_remote_ref());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Prefix of local branch refs.
    pub const HEADS: &'static str = "refs/heads/";

    /// Prefix of remote-tracking branch refs.
    pub const REMOTES: &'static str = "refs/remotes/";

    /// Create a new validated ref name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the name violates git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if let Some(problem) = check_refname_rules(&name) {
            return Err(TypeError::InvalidRefName(format!("ref name {problem}")));
        }
        Ok(Self(name))
    }

    /// Ref name for a local branch (`refs/heads/<branch>`).
    pub fn for_branch(branch: &BranchName) -> Self {
        Self(format!("{}{}", Self::HEADS, branch.as_str()))
    }

    /// Ref name for a remote-tracking branch (`refs/remotes/<remote>/<branch>`).
    pub fn for_remote_branch(remote: &str, branch: &BranchName) -> Self {
        Self(format!("{}{}/{}", Self::REMOTES, remote, branch.as_str()))
    }

    /// Strip a prefix from the ref name and return the remainder.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0.strip_prefix(prefix)
    }

    /// Check if this ref is a local branch ref.
    pub fn is_branch_ref(&self) -> bool {
        self.0.starts_with(Self::HEADS)
    }

    /// Check if this ref is a remote-tracking branch ref.
    pub fn is_remote_ref(&self) -> bool {
        self.0.starts_with(Self::REMOTES)
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RefName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefName> for String {
    fn from(name: RefName) -> Self {
        name.0
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A UTC timestamp, displayed as RFC3339.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// Get the underlying datetime.
    pub fn as_datetime(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// A stable hash over (name, value) pairs describing repository state.
///
/// Entries are sorted by name before hashing, so enumeration order of the
/// underlying store does not affect the result.
///
/// # Example
///
/// ```
/// use worktrack::core::types::Fingerprint;
///
/// let a = Fingerprint::compute([("refs/heads/main", "aaa"), ("HEAD", "refs/heads/main")]);
/// let b = Fingerprint::compute([("HEAD", "refs/heads/main"), ("refs/heads/main", "aaa")]);
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute a fingerprint from (name, value) pairs.
    pub fn compute<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut sorted: Vec<(K, V)> = entries.into_iter().collect();
        sorted.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));

        let mut hasher = Sha256::new();
        for (name, value) in &sorted {
            hasher.update(name.as_ref().as_bytes());
            hasher.update(b"\0");
            hasher.update(value.as_ref().as_bytes());
            hasher.update(b"\n");
        }

        Self(hex::encode(hasher.finalize()))
    }

    /// Get the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn valid_branch_names() {
            for name in ["master", "feature/foo", "fix-123", "user@feature", "with.dot", "a/b/c"] {
                assert!(BranchName::new(name).is_ok(), "{name} should be valid");
            }
        }

        #[test]
        fn invalid_branch_names() {
            for name in [
                "",
                ".hidden",
                "foo/.hidden",
                "-flag",
                "branch.lock",
                "foo/bar.lock",
                "branch/",
                "bad..path",
                "foo@{bar",
                "foo//bar",
                "@",
                "has space",
                "has~tilde",
                "has:colon",
                "has*star",
                "has\ttab",
            ] {
                assert!(BranchName::new(name).is_err(), "{name:?} should be rejected");
            }
        }

        #[test]
        fn existing_refs_skip_creation_rules() {
            for name in ["-wip", "@"] {
                assert!(BranchName::new(name).is_err(), "{name} is not creatable");
                assert_eq!(BranchName::from_ref(name).unwrap().as_str(), name);
            }
            for name in ["", "bad..path", "branch.lock", "has space"] {
                assert!(BranchName::from_ref(name).is_err(), "{name:?} should be rejected");
            }
        }

        #[test]
        fn comparison_is_case_sensitive() {
            let lower = BranchName::new("feature").unwrap();
            let upper = BranchName::new("Feature").unwrap();
            assert_ne!(lower, upper);
        }

        #[test]
        fn serde_rejects_invalid() {
            let parsed: Result<BranchName, _> = serde_json::from_str("\"bad..name\"");
            assert!(parsed.is_err());
        }
    }

    mod oid {
        use super::*;

        #[test]
        fn sha1_and_sha256_lengths() {
            assert!(Oid::new("a".repeat(40)).is_ok());
            assert!(Oid::new("b".repeat(64)).is_ok());
            assert!(Oid::new("c".repeat(41)).is_err());
        }

        #[test]
        fn non_hex_rejected() {
            assert!(Oid::new("g".repeat(40)).is_err());
        }

        #[test]
        fn normalized_to_lowercase() {
            let oid = Oid::new("ABCDEF".repeat(6) + "ABCD").unwrap();
            assert_eq!(oid.as_str(), "abcdef".repeat(6) + "abcd");
        }

        #[test]
        fn short_clamps_to_length() {
            let oid = Oid::new("1".repeat(40)).unwrap();
            assert_eq!(oid.short(100).len(), 40);
        }

        #[test]
        fn zero_detection() {
            assert!(Oid::new("0".repeat(40)).unwrap().is_zero());
            assert!(!Oid::new("0".repeat(39) + "1").unwrap().is_zero());
        }
    }

    mod ref_name {
        use super::*;

        #[test]
        fn head_is_valid() {
            assert!(RefName::new("HEAD").is_ok());
        }

        #[test]
        fn namespaces() {
            let branch = BranchName::new("main").unwrap();
            assert!(RefName::for_branch(&branch).is_branch_ref());
            assert!(!RefName::for_branch(&branch).is_remote_ref());
            assert!(RefName::for_remote_branch("upstream", &branch).is_remote_ref());
        }

        #[test]
        fn strip_prefix() {
            let r = RefName::new("refs/remotes/origin/feature").unwrap();
            assert_eq!(r.strip_prefix(RefName::REMOTES), Some("origin/feature"));
            assert_eq!(r.strip_prefix(RefName::HEADS), None);
        }

        #[test]
        fn invalid_ref_names() {
            assert!(RefName::new("").is_err());
            assert!(RefName::new("/refs/heads/x").is_err());
            assert!(RefName::new("refs/heads/x.lock").is_err());
        }
    }

    mod fingerprint {
        use super::*;

        #[test]
        fn order_independent() {
            let a = Fingerprint::compute([("b", "2"), ("a", "1")]);
            let b = Fingerprint::compute([("a", "1"), ("b", "2")]);
            assert_eq!(a, b);
        }

        #[test]
        fn value_sensitive() {
            let a = Fingerprint::compute([("a", "1")]);
            let b = Fingerprint::compute([("a", "2")]);
            assert_ne!(a, b);
        }

        #[test]
        fn hex_sha256() {
            let fp = Fingerprint::compute(Vec::<(String, String)>::new());
            assert_eq!(fp.as_str().len(), 64);
        }
    }
}

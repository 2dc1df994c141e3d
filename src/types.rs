use serde::Deserialize;

/// What a node does when it is told that one of its inputs changed.
///
/// - `Lazy`: mark every dependent computable stale; nothing is rebuilt until
///   someone asks for a value with `compute`.
/// - `Eager`: rebuild every dependent computable right away, so readers always
///   observe current values. Every single write pays for the full downstream
///   rebuild; bursts of writes are not batched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePolicy {
    Lazy,
    #[serde(alias = "auto")]
    Eager,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        UpdatePolicy::Lazy
    }
}

//! OAuth 授权范围
//!
//! ScopeSet 只增不减：令牌缓存记录的范围集合始终覆盖此前任一动作所需范围。

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

pub const GMAIL_READONLY: &str = "https://www.googleapis.com/auth/gmail.readonly";
pub const GMAIL_SEND: &str = "https://www.googleapis.com/auth/gmail.send";
pub const CALENDAR_EVENTS: &str = "https://www.googleapis.com/auth/calendar.events";
pub const DRIVE_METADATA_READONLY: &str = "https://www.googleapis.com/auth/drive.metadata.readonly";
pub const TASKS: &str = "https://www.googleapis.com/auth/tasks";

/// 每次授权都会带上的基础范围
pub const BASELINE_SCOPES: [&str; 3] = [GMAIL_READONLY, GMAIL_SEND, CALENDAR_EVENTS];

/// 有序的范围集合
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn baseline() -> Self {
        BASELINE_SCOPES.iter().copied().collect()
    }

    pub fn insert(&mut self, scope: impl Into<String>) -> bool {
        self.0.insert(scope.into())
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    pub fn union(&self, other: &ScopeSet) -> ScopeSet {
        ScopeSet(self.0.union(&other.0).cloned().collect())
    }

    /// self 是否包含 other 的全部范围
    pub fn covers(&self, other: &ScopeSet) -> bool {
        other.0.is_subset(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// OAuth `scope` 参数格式：空格分隔
    pub fn to_param(&self) -> String {
        self.iter().collect::<Vec<_>>().join(" ")
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        ScopeSet(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_param())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_and_covers() {
        let required: ScopeSet = [TASKS].into_iter().collect();
        let needed = ScopeSet::baseline().union(&required);
        assert_eq!(needed.len(), 4);
        assert!(needed.covers(&required));
        assert!(needed.covers(&ScopeSet::baseline()));
        assert!(!ScopeSet::baseline().covers(&needed));
    }

    #[test]
    fn test_to_param_is_space_separated() {
        let set: ScopeSet = [GMAIL_SEND, CALENDAR_EVENTS].into_iter().collect();
        assert_eq!(
            set.to_param(),
            format!("{} {}", CALENDAR_EVENTS, GMAIL_SEND)
        );
    }
}

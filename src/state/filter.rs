//! Board filter applied while columns are built.

use crate::model::{Item, Priority, Status};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssigneeFilter {
    Unassigned,
    User(i64),
}

/// Criteria an item must meet to appear on the board. Every `None` field
/// matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IssueFilter {
    /// Case-insensitive substring of the title or description.
    pub search: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub assignee: Option<AssigneeFilter>,
    pub tag_id: Option<String>,
}

impl IssueFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            if !item.title.to_lowercase().contains(&needle)
                && !item.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if self.priority.is_some_and(|p| p != item.priority) {
            return false;
        }
        if self.status.is_some_and(|s| s != item.status) {
            return false;
        }
        match &self.assignee {
            Some(AssigneeFilter::Unassigned) if item.assignee_id.is_some() => return false,
            Some(AssigneeFilter::User(id)) if item.assignee_id != Some(*id) => return false,
            _ => {}
        }
        if let Some(tag_id) = &self.tag_id {
            if !item.tags.iter().any(|t| &t.id == tag_id) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "filter_test.rs"]
mod tests;

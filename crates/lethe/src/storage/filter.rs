//! Filter types for lifecycle record queries
//!
//! The same filter is rendered as a SQL predicate for LanceDB and evaluated
//! directly against records by the in-memory store.

use crate::memory::types::{ForgettingStage, MemoryRecord};

/// Filter criteria for listing lifecycle records.
///
/// All fields are optional - when `None`, that filter is not applied.
/// Multiple filters are combined with AND logic.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Restrict to one user's memories
    pub user_id: Option<String>,
    /// Only these stages (OR logic within this filter)
    pub stages: Option<Vec<ForgettingStage>>,
    /// Drop forgotten memories
    pub exclude_forgotten: bool,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every memory the forgetting pass should still look at for `user_id`
    pub fn active_for(user_id: &str) -> Self {
        Self::new().with_user(user_id).excluding_forgotten()
    }

    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn with_stages(mut self, stages: Vec<ForgettingStage>) -> Self {
        self.stages = Some(stages);
        self
    }

    pub fn excluding_forgotten(mut self) -> Self {
        self.exclude_forgotten = true;
        self
    }

    /// Build a SQL WHERE clause from this filter.
    /// Returns `None` if no filters are set.
    pub fn to_sql_clause(&self) -> Option<String> {
        let mut conditions = Vec::new();

        if let Some(ref user_id) = self.user_id {
            conditions.push(format!("user_id = '{}'", escape_sql(user_id)));
        }

        if let Some(ref stages) = self.stages {
            if !stages.is_empty() {
                if stages.len() == 1 {
                    conditions.push(format!("forgetting_stage = '{}'", stages[0].as_str()));
                } else {
                    let in_clause = stages
                        .iter()
                        .map(|s| format!("'{}'", s.as_str()))
                        .collect::<Vec<_>>()
                        .join(", ");
                    conditions.push(format!("forgetting_stage IN ({in_clause})"));
                }
            }
        }

        if self.exclude_forgotten {
            conditions.push(format!(
                "forgetting_stage != '{}'",
                ForgettingStage::Forgotten.as_str()
            ));
        }

        if conditions.is_empty() {
            None
        } else {
            Some(conditions.join(" AND "))
        }
    }

    /// Evaluate this filter against a record
    pub fn matches(&self, record: &MemoryRecord) -> bool {
        if let Some(ref user_id) = self.user_id {
            if &record.user_id != user_id {
                return false;
            }
        }
        if let Some(ref stages) = self.stages {
            if !stages.is_empty() && !stages.contains(&record.forgetting_stage) {
                return false;
            }
        }
        !(self.exclude_forgotten && record.is_forgotten())
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.stages.is_none() && !self.exclude_forgotten
    }
}

/// Escape a string literal for a LanceDB SQL predicate
pub fn escape_sql(value: &str) -> String {
    value.replace('\'', "''")
}

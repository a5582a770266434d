//! Load reports
//!
//! A report maps association paths of a loaded User to their load state.
//! Collection members are addressed by id (`related_departments[21].company`)
//! and only appear when their owner is loaded.

use std::collections::BTreeMap;

use graphfetch_orm::PersistenceUnitUtil;
use serde::{Deserialize, Serialize};

use crate::entities::{User, COMPANY, DEPARTMENT, RELATED_DEPARTMENTS};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    entries: BTreeMap<String, bool>,
}

impl LoadReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect a user through `util` without forcing anything
    pub fn inspect(user: &User, util: &PersistenceUnitUtil) -> Self {
        let mut report = Self::new();

        let department_loaded = util.is_loaded(user, DEPARTMENT);
        report.record(DEPARTMENT, department_loaded);
        if let Some(department) = user.department.get() {
            report.record(
                format!("{}.{}", DEPARTMENT, COMPANY),
                util.is_loaded(department, COMPANY),
            );
        }

        report.record(RELATED_DEPARTMENTS, util.is_loaded(user, RELATED_DEPARTMENTS));
        for department in user.related_departments.get().unwrap_or_default() {
            report.record(
                format!("{}[{}].{}", RELATED_DEPARTMENTS, department.id, COMPANY),
                util.is_loaded(department, COMPANY),
            );
        }

        report
    }

    /// Build a report from literal entries
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        let mut report = Self::new();
        for (path, loaded) in entries {
            report.record(path, loaded);
        }
        report
    }

    pub fn record(&mut self, path: impl Into<String>, loaded: bool) {
        self.entries.insert(path.into(), loaded);
    }

    /// Load state at `path`, `None` if the report does not cover it
    pub fn is_loaded(&self, path: &str) -> Option<bool> {
        self.entries.get(path).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(path, loaded)| (path.as_str(), *loaded))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON snapshot
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Drop member ids: `related_departments[21].company` -> `related_departments.company`
pub fn strip_member_ids(path: &str) -> String {
    let mut stripped = String::with_capacity(path.len());
    let mut depth = 0usize;
    for c in path.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => stripped.push(c),
            _ => {}
        }
    }
    stripped
}

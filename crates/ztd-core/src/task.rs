use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display name for tasks whose category is absent or empty.
pub const UNCATEGORIZED: &str = "Uncategorized";

const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Task priority. The service stores whatever text it was given, so values outside the
/// known set are kept as [`Priority::Other`] and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum Priority {
    Urgent,
    Today,
    Tomorrow,
    Later,
    #[default]
    None,
    Other(String),
}

impl Priority {
    /// Wire value; `None` is the empty string.
    pub fn as_str(&self) -> &str {
        match self {
            Priority::Urgent => "urgent",
            Priority::Today => "today",
            Priority::Tomorrow => "tomorrow",
            Priority::Later => "later",
            Priority::None => "",
            Priority::Other(raw) => raw,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Priority::Urgent => "Urgent",
            Priority::Today => "Today",
            Priority::Tomorrow => "Tomorrow",
            Priority::Later => "Later",
            Priority::None => "",
            Priority::Other(raw) => raw,
        }
    }

    pub fn is_none(&self) -> bool {
        *self == Priority::None
    }

    /// Known variant for stored text that differs only in case or padding (`URGENT`);
    /// anything else is returned as is.
    pub fn normalized(&self) -> Priority {
        match self {
            Priority::Other(raw) => raw.parse().unwrap_or_else(|_| self.clone()),
            known => known.clone(),
        }
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "urgent" => Ok(Priority::Urgent),
            "today" => Ok(Priority::Today),
            "tomorrow" => Ok(Priority::Tomorrow),
            "later" => Ok(Priority::Later),
            "" | "none" => Ok(Priority::None),
            other => Err(anyhow!(
                "invalid priority '{other}' (expected urgent, today, tomorrow, later or none)"
            )),
        }
    }
}

impl From<Option<String>> for Priority {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            None | Some("") => Priority::None,
            Some("urgent") => Priority::Urgent,
            Some("today") => Priority::Today,
            Some("tomorrow") => Priority::Tomorrow,
            Some("later") => Priority::Later,
            Some(_) => Priority::Other(value.unwrap_or_default()),
        }
    }
}

impl From<Priority> for String {
    fn from(value: Priority) -> Self {
        match value {
            Priority::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurrence, with unknown stored values kept verbatim like [`Priority::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
    #[default]
    None,
    Other(String),
}

impl Recurrence {
    pub fn as_str(&self) -> &str {
        match self {
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
            Recurrence::None => "",
            Recurrence::Other(raw) => raw,
        }
    }

    pub fn is_none(&self) -> bool {
        *self == Recurrence::None
    }
}

impl FromStr for Recurrence {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            "" | "none" => Ok(Recurrence::None),
            other => Err(anyhow!(
                "invalid recurrence '{other}' (expected daily, weekly, monthly or none)"
            )),
        }
    }
}

impl From<Option<String>> for Recurrence {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            None | Some("") => Recurrence::None,
            Some("daily") => Recurrence::Daily,
            Some("weekly") => Recurrence::Weekly,
            Some("monthly") => Recurrence::Monthly,
            Some(_) => Recurrence::Other(value.unwrap_or_default()),
        }
    }
}

impl From<Recurrence> for String {
    fn from(value: Recurrence) -> Self {
        match value {
            Recurrence::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task record as the backend stores it.
///
/// Records carry no identifier of their own; they are addressed by 1-based position in the
/// canonical sequence. Fields this client does not model are kept in `extra` so a reorder,
/// which writes whole records back, does not strip them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,

    pub description: String,

    #[serde(default, with = "blank_string")]
    pub category: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub recurring: Recurrence,

    #[serde(default, deserialize_with = "blank_string::deserialize")]
    pub due: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: None,
            description: description.into(),
            category: None,
            priority: Priority::None,
            recurring: Recurrence::None,
            due: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        self.category = (!category.is_empty()).then_some(category);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due(mut self, due: impl Into<String>) -> Self {
        let due = due.into();
        self.due = (!due.is_empty()).then_some(due);
        self
    }

    /// Category used for grouping and filtering.
    pub fn category_name(&self) -> &str {
        self.category.as_deref().unwrap_or(UNCATEGORIZED)
    }

    /// The due date, when the backend stored a parsable `YYYY-MM-DD` value.
    pub fn due_date(&self) -> Option<NaiveDate> {
        let raw = self.due.as_deref()?;
        NaiveDate::parse_from_str(raw.trim(), DUE_DATE_FORMAT).ok()
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date().is_some_and(|due| due < today)
    }
}

/// Optional text that the backend writes as `""` when absent.
pub(crate) mod blank_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value.as_deref().unwrap_or_default())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.filter(|value| !value.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::{Priority, Recurrence, Task, UNCATEGORIZED};

    #[test]
    fn reads_backend_records_with_blank_fields() {
        let task: Task = serde_json::from_value(json!({
            "description": "water plants",
            "category": "",
            "priority": "",
            "recurring": "weekly",
            "due": null
        }))
        .expect("decode task");

        assert_eq!(task.category, None);
        assert_eq!(task.category_name(), UNCATEGORIZED);
        assert_eq!(task.priority, Priority::None);
        assert_eq!(task.recurring, Recurrence::Weekly);
        assert_eq!(task.due, None);
    }

    #[test]
    fn stored_case_is_kept_and_missing_fields_default() {
        let task: Task = serde_json::from_value(json!({
            "description": "email boss",
            "priority": "URGENT"
        }))
        .expect("decode task");

        assert_eq!(task.priority, Priority::Other("URGENT".to_string()));
        assert_eq!(task.priority.normalized(), Priority::Urgent);
        assert_eq!(task.recurring, Recurrence::None);

        let back = serde_json::to_value(&task).expect("encode task");
        assert_eq!(back["priority"], json!("URGENT"));
    }

    #[test]
    fn unknown_priority_and_recurrence_do_not_break_the_list() {
        let raw = r#"[
            {"description": "a", "category": "", "priority": "high", "recurring": "yearly", "due": null},
            {"description": "b", "category": "work", "priority": "today", "recurring": "", "due": null}
        ]"#;
        let tasks: Vec<Task> = serde_json::from_str(raw).expect("decode list");

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].priority, Priority::Other("high".to_string()));
        assert_eq!(tasks[0].priority.normalized(), Priority::Other("high".to_string()));
        assert_eq!(tasks[0].recurring, Recurrence::Other("yearly".to_string()));
        assert_eq!(tasks[1].priority, Priority::Today);

        let back = serde_json::to_value(&tasks).expect("encode list");
        assert_eq!(back[0]["priority"], json!("high"));
        assert_eq!(back[0]["recurring"], json!("yearly"));
        assert_eq!(back[1]["priority"], json!("today"));
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = json!({
            "description": "stretch",
            "category": "health",
            "priority": "today",
            "recurring": "daily",
            "due": "2026-03-01",
            "last_done": "2026-02-28"
        });
        let task: Task = serde_json::from_value(raw.clone()).expect("decode task");
        assert_eq!(task.extra.get("last_done"), Some(&json!("2026-02-28")));

        let back = serde_json::to_value(&task).expect("encode task");
        assert_eq!(back, raw);
    }

    #[test]
    fn absent_category_is_written_as_empty_string() {
        let value = serde_json::to_value(Task::new("x")).expect("encode task");
        assert_eq!(value["category"], json!(""));
        assert_eq!(value["priority"], json!(""));
        assert_eq!(value["due"], json!(null));
        assert!(value.get("id").is_none());
    }

    #[test]
    fn overdue_only_for_parsable_past_dates() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).expect("date");

        assert!(Task::new("a").with_due("2026-03-09").is_overdue(today));
        assert!(!Task::new("b").with_due("2026-03-10").is_overdue(today));
        assert!(!Task::new("c").with_due("next friday").is_overdue(today));
        assert!(!Task::new("d").is_overdue(today));
    }
}

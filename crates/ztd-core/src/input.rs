use crate::task::{Priority, Recurrence};
use crate::wire::CreateTask;

/// Pieces of a CLI-style entry, assembled into the shorthand the task service parses:
/// `text @category !priority ~recurring ^due`.
///
/// The service reads the markers in that order only; a category placed after the priority
/// ends up inside the description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuickEntry {
    pub text: String,
    pub category: Option<String>,
    pub priority: Priority,
    pub recurring: Recurrence,
    pub due: Option<String>,
}

impl QuickEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// `None` when there is no text to add.
    pub fn to_input(&self) -> Option<String> {
        let text = self.text.trim();
        if text.is_empty() {
            return None;
        }

        let mut input = text.to_string();
        if let Some(category) = self.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            input.push_str(" @");
            input.push_str(category);
        }
        if !self.priority.is_none() {
            input.push_str(" !");
            input.push_str(self.priority.as_str());
        }
        if !self.recurring.is_none() {
            input.push_str(" ~");
            input.push_str(self.recurring.as_str());
        }
        if let Some(due) = self.due.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            input.push_str(" ^");
            input.push_str(due);
        }
        Some(input)
    }

    pub fn to_request(&self) -> Option<CreateTask> {
        self.to_input().map(CreateTask::input)
    }
}

#[cfg(test)]
mod tests {
    use super::QuickEntry;
    use crate::task::{Priority, Recurrence};

    #[test]
    fn markers_follow_the_parser_order() {
        let entry = QuickEntry {
            text: "  email boss ".to_string(),
            category: Some("work".to_string()),
            priority: Priority::Urgent,
            recurring: Recurrence::Daily,
            due: Some("tomorrow".to_string()),
        };

        assert_eq!(
            entry.to_input().as_deref(),
            Some("email boss @work !urgent ~daily ^tomorrow")
        );
    }

    #[test]
    fn blank_parts_are_left_out() {
        let entry = QuickEntry {
            category: Some(" ".to_string()),
            due: Some(String::new()),
            ..QuickEntry::new("read")
        };
        assert_eq!(entry.to_input().as_deref(), Some("read"));
        assert_eq!(QuickEntry::new("   ").to_request(), None);
    }
}

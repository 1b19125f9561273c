//! Verb vocabulary for status messages.
//!
//! Each mutation primitive is configured with a verb set so its status
//! messages read naturally: "Updating task" while in flight, "Failed to
//! update task" on error.

/// The three tenses of an operation verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verbs {
    /// Present tense ("update").
    pub present: &'static str,
    /// Present participle ("updating").
    pub participle: &'static str,
    /// Past tense ("updated").
    pub past: &'static str,
}

impl Verbs {
    pub const CREATE: Verbs = Verbs::new("create", "creating", "created");
    pub const UPDATE: Verbs = Verbs::new("update", "updating", "updated");
    pub const DELETE: Verbs = Verbs::new("delete", "deleting", "deleted");
    pub const RENAME: Verbs = Verbs::new("rename", "renaming", "renamed");
    pub const RETRIEVE: Verbs = Verbs::new("retrieve", "retrieving", "retrieved");
    pub const SAVE: Verbs = Verbs::new("save", "saving", "saved");

    /// Creates a custom verb set.
    #[must_use]
    pub const fn new(present: &'static str, participle: &'static str, past: &'static str) -> Self {
        Self {
            present,
            participle,
            past,
        }
    }

    /// The in-flight message: "Updating task".
    #[must_use]
    pub fn working_message(&self, subject: &str) -> String {
        let mut chars = self.participle.chars();
        match chars.next() {
            Some(first) => format!("{}{} {subject}", first.to_uppercase(), chars.as_str()),
            None => subject.to_string(),
        }
    }

    /// The failure headline: "Failed to update task".
    #[must_use]
    pub fn failure_message(&self, subject: &str) -> String {
        format!("Failed to {} {subject}", self.present)
    }
}

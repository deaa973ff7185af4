//! In-memory reminder list. Nothing is scheduled and nothing fires; entries
//! live until the process exits.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub task: String,
    /// Free text as typed, e.g. `"5pm"`.
    pub time_text: String,
}

/// Append-only.
#[derive(Debug, Default)]
pub struct ReminderStore {
    items: Vec<Reminder>,
}

impl ReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, task: impl Into<String>, time_text: impl Into<String>) -> &Reminder {
        self.items.push(Reminder { task: task.into(), time_text: time_text.into() });
        &self.items[self.items.len() - 1]
    }

    pub fn list(&self) -> &[Reminder] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_appends_in_order() {
        let mut store = ReminderStore::new();
        assert!(store.is_empty());
        store.add("call mom", "5pm");
        let r = store.add("call mom", "5pm").clone();
        assert_eq!(r.task, "call mom");
        assert_eq!(store.len(), 2);
        assert_eq!(store.list()[0], r);
    }
}

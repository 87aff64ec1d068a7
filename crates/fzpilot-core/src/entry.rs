//! Entries handed to the finder and recovered from its selections
//!
//! The finder itself only ever sees one display line per entry; the session
//! keeps the original values so callbacks and the final result can hand back
//! real objects instead of strings.

use std::borrow::Cow;
use std::sync::Arc;

/// A value that can be listed in the finder.
pub trait Entry: Send + Sync {
    /// The line shown (and matched) in the finder. One line per entry; any
    /// embedded newline would silently split the entry, so converters must
    /// not produce one.
    fn display(&self) -> Cow<'_, str>;

    /// Stable identity used when selections must survive an entry reload.
    /// Defaults to the display line.
    fn key(&self) -> Cow<'_, str> {
        self.display()
    }
}

/// Shared handle to an entry; sessions, results, and callbacks all hold these.
pub type EntryRef = Arc<dyn Entry>;

impl Entry for String {
    fn display(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl Entry for &'static str {
    fn display(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

/// Wrap a list of displayable values as entry handles.
pub fn entries_from<I, E>(values: I) -> Vec<EntryRef>
where
    I: IntoIterator<Item = E>,
    E: Entry + 'static,
{
    values
        .into_iter()
        .map(|value| Arc::new(value) as EntryRef)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Versioned {
        name: String,
        revision: u32,
    }

    impl Entry for Versioned {
        fn display(&self) -> Cow<'_, str> {
            Cow::Owned(format!("{} (r{})", self.name, self.revision))
        }

        fn key(&self) -> Cow<'_, str> {
            Cow::Borrowed(&self.name)
        }
    }

    #[test]
    fn test_string_entry_key_defaults_to_display() {
        let entry: EntryRef = Arc::new("alpha".to_string());
        assert_eq!(entry.display(), "alpha");
        assert_eq!(entry.key(), "alpha");
    }

    #[test]
    fn test_custom_key_diverges_from_display() {
        let entry = Versioned {
            name: "config.toml".into(),
            revision: 7,
        };
        assert_eq!(entry.display(), "config.toml (r7)");
        assert_eq!(entry.key(), "config.toml");
    }

    #[test]
    fn test_entries_from_builds_handles() {
        let entries = entries_from(["one", "two"]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].display(), "two");
    }
}

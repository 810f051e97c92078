//! File metadata value object shared by every backend.

use chrono::{DateTime, Utc};

/// Immutable metadata snapshot for one remote file or directory.
///
/// `size` is 0 for directories on every backend. `owner` and `create_date`
/// stay `None` when the protocol response does not carry them; they are never
/// fabricated. Equality is defined by `name` only, so listings taken at
/// different times compare by identity rather than by mutable metadata.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub update_date: Option<DateTime<Utc>>,
    pub create_date: Option<DateTime<Utc>>,
    pub size: u64,
    pub owner: Option<String>,
}

impl FileDescriptor {
    /// Descriptor with no metadata beyond the name (size 0, no dates).
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        FileDescriptor {
            name: name.into(),
            update_date: None,
            create_date: None,
            size: 0,
            owner: None,
        }
    }
}

impl PartialEq for FileDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for FileDescriptor {}

impl std::fmt::Display for FileDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "name:'{}', update_date:{}, create_date:{}, size:{}B, owner:{}",
            self.name,
            fmt_option(&self.update_date),
            fmt_option(&self.create_date),
            self.size,
            fmt_option(&self.owner),
        )
    }
}

fn fmt_option<T: std::fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "none".to_string(),
    }
}

/// Descriptors present in `current` but not in `previous` (name equality).
///
/// Used to detect files that arrived on the remote side between two listings
/// of the same directory.
#[must_use]
pub fn new_files<'a>(
    previous: &[FileDescriptor],
    current: &'a [FileDescriptor],
) -> Vec<&'a FileDescriptor> {
    current
        .iter()
        .filter(|descriptor| !previous.contains(descriptor))
        .collect()
}

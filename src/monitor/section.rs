//! Presentation sections.
//!
//! Every entry known to the monitor sits in at most one of three ordered sections.
//! Each section is observable: after every committed change the ordered list of the
//! paths it holds is published on a `tokio::sync::watch` channel, so a UI can redraw
//! without polling.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut rx = monitor.store().subscribe(Section::Displayed);
//! tokio::spawn(async move {
//!     while rx.changed().await.is_ok() {
//!         println!("displayed: {:?}", *rx.borrow());
//!     }
//! });
//! ```

use super::entry::EntryId;
use crate::error::MonitorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::watch;

/// One of the three mutually exclusive presentation sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// Shown while a measurement runs
    Displayed,
    /// Known but not shown
    Undisplayed,
    /// Redundant with another entry (typically one built by a rule)
    Hidden,
}

impl Section {
    /// All sections, in reconciliation priority order.
    pub const ALL: [Section; 3] = [Section::Displayed, Section::Undisplayed, Section::Hidden];

    /// Name used in persisted state and by rule configurations.
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Displayed => "displayed",
            Section::Undisplayed => "undisplayed",
            Section::Hidden => "hidden",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "displayed" => Ok(Section::Displayed),
            "undisplayed" => Ok(Section::Undisplayed),
            "hidden" => Ok(Section::Hidden),
            other => Err(MonitorError::InvalidSection(other.to_string())),
        }
    }
}

/// Anything naming a section: the enum itself or its textual name.
pub trait IntoSection {
    /// Resolve the section, failing with [`MonitorError::InvalidSection`] on unknown names.
    fn into_section(self) -> Result<Section, MonitorError>;
}

impl IntoSection for Section {
    fn into_section(self) -> Result<Section, MonitorError> {
        Ok(self)
    }
}

impl IntoSection for &str {
    fn into_section(self) -> Result<Section, MonitorError> {
        self.parse()
    }
}

// =============================================================================
// EntrySection
// =============================================================================

/// Ordered, observable container of entry ids.
///
/// The container only changes through [`EntrySection::commit`], which replaces the
/// whole content and publishes the new path list in one step.
pub struct EntrySection {
    section: Section,
    ids: Vec<EntryId>,
    sender: watch::Sender<Vec<String>>,
}

impl fmt::Debug for EntrySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntrySection")
            .field("section", &self.section)
            .field("ids", &self.ids)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl EntrySection {
    /// Create an empty section.
    pub fn new(section: Section) -> Self {
        let (sender, _) = watch::channel(Vec::new());
        Self {
            section,
            ids: Vec::new(),
            sender,
        }
    }

    /// Which section this is.
    pub fn section(&self) -> Section {
        self.section
    }

    /// Entry ids in display order.
    pub fn ids(&self) -> &[EntryId] {
        &self.ids
    }

    /// Whether the section holds `id`.
    pub fn contains(&self, id: EntryId) -> bool {
        self.ids.contains(&id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the section is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Replace the content and notify subscribers with the matching paths.
    pub fn commit(&mut self, ids: Vec<EntryId>, paths: Vec<String>) {
        self.ids = ids;
        self.sender.send_replace(paths);
    }

    /// Subscribe to committed changes.
    pub fn subscribe(&self) -> watch::Receiver<Vec<String>> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

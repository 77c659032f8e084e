//! The ordered list of files waiting to be merged.
//!
//! Order is significant: the merged PDF contains the items' pages in queue
//! order. Callers arrange the queue with [`Queue::enqueue`],
//! [`Queue::reorder`] and [`Queue::remove`] and then hand it to
//! [`crate::execute()`], which takes `&mut Queue` for the whole run. While a
//! run is in flight nothing else can reorder the queue or start another run.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, stable identifier of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file-{}", self.0.simple())
    }
}

/// A user-supplied input file: its name and raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Lower-cased text after the last `.` of the name; empty if there is none.
    pub fn extension(&self) -> String {
        match self.name.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => String::new(),
        }
    }
}

/// Processing status of one item within a run.
///
/// ```text
/// pending ─┬─────────────────────────────▶ merging ──▶ done
///          └─▶ uploading ──▶ converting ──┘
///   (any non-terminal state) ──▶ error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Pending,
    Uploading,
    Converting,
    Merging,
    Done,
    Error,
}

impl ItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Done | ItemStatus::Error)
    }

    /// Whether the executor may move an item from `self` to `next`.
    ///
    /// Repeated `Uploading` is allowed so upload progress can be reported.
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        match (self, next) {
            (s, Error) => !s.is_terminal(),
            (Pending, Uploading) | (Pending, Merging) => true,
            (Uploading, Uploading) | (Uploading, Converting) => true,
            (Converting, Merging) => true,
            (Merging, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Uploading => "uploading",
            ItemStatus::Converting => "converting",
            ItemStatus::Merging => "merging",
            ItemStatus::Done => "done",
            ItemStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// One file in the queue plus its per-run status.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: ItemId,
    pub file: RawFile,
    pub status: ItemStatus,
    /// Last reported upload percentage. Kept after the upload finishes.
    pub upload_progress: Option<u8>,
    /// Set only when `status` is `Error`.
    pub error_message: Option<String>,
}

impl QueueItem {
    fn new(file: RawFile) -> Self {
        Self {
            id: ItemId::new(),
            file,
            status: ItemStatus::Pending,
            upload_progress: None,
            error_message: None,
        }
    }

    /// Overall progress for display, 0–100.
    ///
    /// Uploading fills the first 40%, conversion sits at 70% and merging at
    /// 90%; terminal states are full.
    pub fn progress_percent(&self) -> u8 {
        match self.status {
            ItemStatus::Pending => 0,
            ItemStatus::Uploading => {
                let p = u32::from(self.upload_progress.unwrap_or(0).min(100));
                (p * 40 / 100) as u8
            }
            ItemStatus::Converting => 70,
            ItemStatus::Merging => 90,
            ItemStatus::Done | ItemStatus::Error => 100,
        }
    }

    pub(crate) fn set_status(&mut self, status: ItemStatus) {
        debug_assert!(
            self.status.can_transition_to(status),
            "invalid transition {} -> {}",
            self.status,
            status
        );
        self.status = status;
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.set_status(ItemStatus::Error);
        self.error_message = Some(message);
    }

    fn reset(&mut self) {
        self.status = ItemStatus::Pending;
        self.upload_progress = None;
        self.error_message = None;
    }
}

/// Ordered, user-arranged collection of [`QueueItem`]s.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    items: Vec<QueueItem>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append files as `pending` items. Returns the new ids in order.
    ///
    /// Content is not inspected here; format problems surface when the item
    /// is processed.
    pub fn enqueue(&mut self, files: impl IntoIterator<Item = RawFile>) -> Vec<ItemId> {
        files
            .into_iter()
            .map(|file| {
                let item = QueueItem::new(file);
                let id = item.id;
                self.items.push(item);
                id
            })
            .collect()
    }

    /// Move one item to `new_index`, shifting the others (remove, then insert).
    ///
    /// An index past the end moves the item to the last position. Returns
    /// `false` and leaves the queue untouched when `id` is unknown.
    pub fn reorder(&mut self, id: ItemId, new_index: usize) -> bool {
        let Some(old_index) = self.position(id) else {
            return false;
        };
        let item = self.items.remove(old_index);
        let new_index = new_index.min(self.items.len());
        self.items.insert(new_index, item);
        true
    }

    /// Remove an item. Unknown ids are ignored.
    pub fn remove(&mut self, id: ItemId) -> Option<QueueItem> {
        let index = self.position(id)?;
        Some(self.items.remove(index))
    }

    /// Put every item back to `pending` with no error or progress.
    pub fn reset_for_run(&mut self) {
        self.items.iter_mut().for_each(QueueItem::reset);
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|i| i.id).collect()
    }

    pub fn get(&self, id: ItemId) -> Option<&QueueItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Mutable view for the executor. Items cannot be added or removed through it.
    pub(crate) fn items_mut(&mut self) -> &mut [QueueItem] {
        &mut self.items
    }

    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

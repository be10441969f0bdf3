//! Classification of raw ledger notifications.

use crate::feed::FeedError;
use crate::ledger::{ChangeKind, Documents, Notification};
use crate::model::RecordId;
use serde_json::Value;
use std::collections::BTreeSet;

/// What a notification means for the local projections.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// Root put: the whole collection (empty when the payload is `null`).
    Snapshot(Documents),
    /// Root patch: a multi-record update made by some client, ids in key order.
    ForeignBulkChange(Vec<RecordId>),
    /// A record was written as a whole.
    RecordCreated(RecordId),
    /// A single record was updated.
    RecordPatched(RecordId),
}

/// Maps a notification to a [`ChangeEvent`].
///
/// | path | kind | event |
/// |---|---|---|
/// | `/` | put | `Snapshot` |
/// | `/` | patch | `ForeignBulkChange` |
/// | `/<id>` | put | `RecordCreated` |
/// | `/<id>` | patch | `RecordPatched` |
/// | `/<id>/<field>` | put or patch | `RecordPatched` |
///
/// # Errors
///
/// [`FeedError::Malformed`] for deeper paths, empty segments, a path without the
/// leading `/`, or a root payload of the wrong shape.
pub fn classify(notification: &Notification) -> Result<ChangeEvent, FeedError> {
    let path = notification.path.as_str();
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| FeedError::malformed(path, "path must start with '/'"))?;

    if rest.is_empty() {
        return match notification.kind {
            ChangeKind::Put => snapshot(path, &notification.payload),
            ChangeKind::Patch => bulk_change(path, &notification.payload),
        };
    }

    let segments: Vec<&str> = rest.split('/').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(FeedError::malformed(path, "empty path segment"));
    }

    match (segments.as_slice(), notification.kind) {
        ([id], ChangeKind::Put) => Ok(ChangeEvent::RecordCreated(RecordId::from(*id))),
        ([id], ChangeKind::Patch) => Ok(ChangeEvent::RecordPatched(RecordId::from(*id))),
        ([id, _field], _) => Ok(ChangeEvent::RecordPatched(RecordId::from(*id))),
        _ => Err(FeedError::malformed(path, "path is too deep")),
    }
}

fn snapshot(path: &str, payload: &Value) -> Result<ChangeEvent, FeedError> {
    match payload {
        Value::Null => Ok(ChangeEvent::Snapshot(Documents::new())),
        Value::Object(entries) => Ok(ChangeEvent::Snapshot(
            entries
                .iter()
                .map(|(id, doc)| (RecordId::from(id.as_str()), doc.clone()))
                .collect(),
        )),
        _ => Err(FeedError::malformed(path, "snapshot payload is not an object")),
    }
}

fn bulk_change(path: &str, payload: &Value) -> Result<ChangeEvent, FeedError> {
    let entries = payload
        .as_object()
        .ok_or_else(|| FeedError::malformed(path, "bulk payload is not an object"))?;

    let mut ids = BTreeSet::new();
    for key in entries.keys() {
        match key.split('/').next() {
            Some(id) if !id.is_empty() => {
                ids.insert(RecordId::from(id));
            }
            _ => return Err(FeedError::malformed(path, format!("bad bulk key '{key}'"))),
        }
    }
    Ok(ChangeEvent::ForeignBulkChange(ids.into_iter().collect()))
}

//! In-memory table projections.

use crate::model::{OrderRecord, OrderState, RecordId};
use std::collections::HashMap;
use std::fmt::Display;

/// The two tables a client displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Orders waiting to be packed.
    Invoiced,
    /// The dispatch queue: packed orders, including those marked pending.
    PackedPending,
}

impl ViewKind {
    pub const ALL: [ViewKind; 2] = [ViewKind::Invoiced, ViewKind::PackedPending];

    /// States whose records belong in this view.
    pub fn states(self) -> &'static [OrderState] {
        match self {
            ViewKind::Invoiced => &[OrderState::Invoiced],
            ViewKind::PackedPending => &[OrderState::Packed, OrderState::Pending],
        }
    }

    pub fn accepts(self, state: OrderState) -> bool {
        self.states().contains(&state)
    }
}

impl Display for ViewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewKind::Invoiced => f.write_str("invoiced"),
            ViewKind::PackedPending => f.write_str("packed_pending"),
        }
    }
}

/// One displayed row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: RecordId,
    pub record: OrderRecord,
}

impl Row {
    /// Pending rows are highlighted in the dispatch queue.
    pub fn is_pending(&self) -> bool {
        self.record.is_pending()
    }
}

/// Rows of one table, keyed by id and kept in arrival order.
///
/// Every operation is idempotent: applying the same command twice leaves the
/// projection as applying it once.
#[derive(Debug, Clone)]
pub struct Projection {
    kind: ViewKind,
    records: HashMap<RecordId, OrderRecord>,
    order: Vec<RecordId>,
}

impl Projection {
    pub fn new(kind: ViewKind) -> Self {
        Self {
            kind,
            records: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    /// Replaces the whole content.
    pub fn apply_bulk_load(&mut self, records: Vec<(RecordId, OrderRecord)>) {
        self.records.clear();
        self.order.clear();
        for (id, record) in records {
            self.upsert(id, record);
        }
    }

    /// Adds a row; an existing row with the same id is replaced in place.
    /// Returns `true` if the id was new.
    pub fn apply_insert(&mut self, id: RecordId, record: OrderRecord) -> bool {
        self.upsert(id, record)
    }

    /// Replaces a row's record. An absent id is inserted so a missed insert converges.
    /// Returns `true` if the row already existed.
    pub fn apply_update(&mut self, id: RecordId, record: OrderRecord) -> bool {
        !self.upsert(id, record)
    }

    /// Removes a row. Returns `false` (and changes nothing) if it was absent.
    pub fn apply_removal(&mut self, id: &RecordId) -> bool {
        if self.records.remove(id).is_none() {
            return false;
        }
        self.order.retain(|existing| existing != id);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<&OrderRecord> {
        self.records.get(id)
    }

    /// Copies the rows out in display order.
    pub fn rows(&self) -> Vec<Row> {
        self.order
            .iter()
            .filter_map(|id| {
                self.records.get(id).map(|record| Row {
                    id: id.clone(),
                    record: record.clone(),
                })
            })
            .collect()
    }

    fn upsert(&mut self, id: RecordId, record: OrderRecord) -> bool {
        let is_new = self.records.insert(id.clone(), record).is_none();
        if is_new {
            self.order.push(id);
        }
        is_new
    }
}

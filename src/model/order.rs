//! # Order Record
//!
//! The dispatch order record as stored in the ledger.
//!
//! The record is a fixed-field document: its JSON form carries exactly the fields
//! below (unknown keys are rejected). The ledger key ([`RecordId`]) is not part of
//! the document; it is the key the document is stored under.
//!
//! Fields split in two groups:
//! - **Invoice fields** (`invoice_number` .. `notes`): written once at ingestion.
//! - **Progress fields** (`packer` .. `observations`): filled in while the order is
//!   packed and dispatched, and frozen once the order reaches a terminal state.
use crate::model::{LifecycleError, OrderState};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;

/// Opaque ledger-assigned key of an order record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field set delivered by an ingestion source for a freshly invoiced order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub invoice_number: u64,
    pub client: String,
    pub address: String,
    pub phone: String,
    pub items: u32,
    pub value: i64,
    pub biller: String,
    pub payment_method: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderRecord {
    pub invoice_number: u64,
    pub client: String,
    pub address: String,
    pub phone: String,
    pub items: u32,
    pub value: i64,
    pub biller: String,
    pub payment_method: String,
    pub notes: String,

    #[serde(default)]
    pub packer: String,
    #[serde(default)]
    pub courier: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub boxes: u32,
    #[serde(default)]
    pub bags: u32,
    #[serde(default)]
    pub bundles: u32,
    #[serde(default)]
    pub collected_value: i64,
    #[serde(default)]
    pub departed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub observations: String,

    pub state: OrderState,
    pub created_at: DateTime<Utc>,
}

impl OrderRecord {
    /// Builds the record written at ingestion: state `Invoiced`, empty progress fields.
    pub fn invoiced(order: NewOrder, created_at: DateTime<Utc>) -> Self {
        Self {
            invoice_number: order.invoice_number,
            client: order.client,
            address: order.address,
            phone: order.phone,
            items: order.items,
            value: order.value,
            biller: order.biller,
            payment_method: order.payment_method,
            notes: order.notes,
            packer: String::new(),
            courier: String::new(),
            zone: String::new(),
            boxes: 0,
            bags: 0,
            bundles: 0,
            collected_value: 0,
            departed_at: None,
            observations: String::new(),
            state: OrderState::Invoiced,
            created_at,
        }
    }

    /// Decodes a ledger document.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::UnknownState`] if the `state` code is not a known one.
    /// - [`LifecycleError::ValidationError`] for any other shape problem.
    pub fn from_value(value: Value) -> Result<Self, LifecycleError> {
        if let Some(code) = value.get("state").and_then(Value::as_i64) {
            OrderState::from_code(code)?;
        }
        serde_json::from_value(value).map_err(|e| LifecycleError::ValidationError(e.to_string()))
    }

    /// Encodes the record as a ledger document.
    pub fn to_value(&self) -> Result<Value, LifecycleError> {
        serde_json::to_value(self).map_err(|e| LifecycleError::ValidationError(e.to_string()))
    }

    pub fn is_pending(&self) -> bool {
        self.state == OrderState::Pending
    }

    /// Applies the set fields of `update`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Frozen`] when the record is Dispatched or Deleted.
    pub fn apply_progress(&mut self, update: &ProgressUpdate) -> Result<(), LifecycleError> {
        if !self.state.is_mutable() {
            return Err(LifecycleError::Frozen(self.state));
        }
        if let Some(packer) = &update.packer {
            self.packer = packer.clone();
        }
        if let Some(courier) = &update.courier {
            self.courier = courier.clone();
        }
        if let Some(zone) = &update.zone {
            self.zone = zone.clone();
        }
        if let Some(boxes) = update.boxes {
            self.boxes = boxes;
        }
        if let Some(bags) = update.bags {
            self.bags = bags;
        }
        if let Some(bundles) = update.bundles {
            self.bundles = bundles;
        }
        if let Some(collected) = update.collected_value {
            self.collected_value = collected;
        }
        if let Some(departed_at) = update.departed_at {
            self.departed_at = Some(departed_at);
        }
        if let Some(observations) = &update.observations {
            self.observations = observations.clone();
        }
        Ok(())
    }
}

/// Partial edit of the progress fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub packer: Option<String>,
    pub courier: Option<String>,
    pub zone: Option<String>,
    pub boxes: Option<u32>,
    pub bags: Option<u32>,
    pub bundles: Option<u32>,
    pub collected_value: Option<i64>,
    pub departed_at: Option<DateTime<Utc>>,
    pub observations: Option<String>,
}

impl ProgressUpdate {
    pub fn with_packer(mut self, packer: impl Into<String>) -> Self {
        self.packer = Some(packer.into());
        self
    }

    pub fn with_courier(mut self, courier: impl Into<String>) -> Self {
        self.courier = Some(courier.into());
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn with_packages(mut self, boxes: u32, bags: u32, bundles: u32) -> Self {
        self.boxes = Some(boxes);
        self.bags = Some(bags);
        self.bundles = Some(bundles);
        self
    }

    pub fn with_collected_value(mut self, value: i64) -> Self {
        self.collected_value = Some(value);
        self
    }

    pub fn with_departed_at(mut self, at: DateTime<Utc>) -> Self {
        self.departed_at = Some(at);
        self
    }

    pub fn with_observations(mut self, observations: impl Into<String>) -> Self {
        self.observations = Some(observations.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// The set fields as `(field name, ledger value)` pairs, in record order.
    pub fn fields(&self) -> Vec<(&'static str, Value)> {
        let mut fields = Vec::new();
        if let Some(packer) = &self.packer {
            fields.push(("packer", Value::from(packer.as_str())));
        }
        if let Some(courier) = &self.courier {
            fields.push(("courier", Value::from(courier.as_str())));
        }
        if let Some(zone) = &self.zone {
            fields.push(("zone", Value::from(zone.as_str())));
        }
        if let Some(boxes) = self.boxes {
            fields.push(("boxes", Value::from(boxes)));
        }
        if let Some(bags) = self.bags {
            fields.push(("bags", Value::from(bags)));
        }
        if let Some(bundles) = self.bundles {
            fields.push(("bundles", Value::from(bundles)));
        }
        if let Some(collected) = self.collected_value {
            fields.push(("collected_value", Value::from(collected)));
        }
        if let Some(departed_at) = self.departed_at {
            let stamp = departed_at.to_rfc3339_opts(SecondsFormat::AutoSi, true);
            fields.push(("departed_at", Value::from(stamp)));
        }
        if let Some(observations) = &self.observations {
            fields.push(("observations", Value::from(observations.as_str())));
        }
        fields
    }
}

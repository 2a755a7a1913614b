use std::fmt;

use derive_more::Deref;
use serde::Deserialize;
use serde_json::{Number, Value};

/// Column names of the destination sheet, in order
pub const HEADER: [&str; 5] = ["Datum", "Marknad", "Annonsör", "Kostnad", "Order ID"];

type JsonObject = serde_json::Map<String, Value>;

/// Body of the commissions API. Only a JSON object is accepted.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(try_from = "JsonObject")]
pub struct CommissionsResponse {
    pub commissions: Vec<CommissionRecord>,
}

impl TryFrom<JsonObject> for CommissionsResponse {
    type Error = serde_json::Error;

    fn try_from(mut obj: JsonObject) -> Result<Self, Self::Error> {
        let commissions = match obj.remove("commissions") {
            Some(list) => serde_json::from_value(list)?,
            None => Vec::new(),
        };
        Ok(Self { commissions })
    }
}

/// One transaction as returned by the commissions API.
///
/// Fields are looked up by key, so a record which is not a JSON object
/// fails to deserialize. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "JsonObject")]
pub struct CommissionRecord {
    pub event_date: Option<RawField>,
    pub country: Option<RawField>,
    pub advertiser_name: Option<RawField>,
    pub commission_amount: Option<RawField>,
    pub order_id: Option<RawField>,
}

impl From<JsonObject> for CommissionRecord {
    fn from(mut obj: JsonObject) -> Self {
        let mut field = |key: &str| obj.remove(key).and_then(RawField::from_json);

        Self {
            event_date: field("eventDate"),
            country: field("country"),
            advertiser_name: field("advertiserName"),
            commission_amount: field("commissionAmount"),
            order_id: field("orderId"),
        }
    }
}

/// The value of a commission field, usually a string or number
#[derive(Debug, Clone, PartialEq)]
pub enum RawField {
    String(String),
    Number(Number),
    Bool(bool),
    Other(Value),
}

impl RawField {
    /// `None` for JSON `null`
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(RawField::String(s)),
            Value::Number(n) => Some(RawField::Number(n)),
            Value::Bool(b) => Some(RawField::Bool(b)),
            other => Some(RawField::Other(other)),
        }
    }
}

impl fmt::Display for RawField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawField::String(s) => f.write_str(s),
            RawField::Number(n) => write!(f, "{n}"),
            RawField::Bool(b) => write!(f, "{b}"),
            RawField::Other(v) => write!(f, "{v}"),
        }
    }
}

/// A row of the destination sheet, one cell per [HEADER] column
#[derive(Debug, Clone, PartialEq, Eq, Deref)]
pub struct SheetRow([String; 5]);

impl SheetRow {
    pub fn header() -> Self {
        SheetRow(HEADER.map(str::to_owned))
    }

    pub fn into_cells(self) -> Vec<String> {
        self.0.into()
    }
}

impl From<&CommissionRecord> for SheetRow {
    fn from(record: &CommissionRecord) -> Self {
        // absent and null fields both become an empty cell
        let cell = |field: &Option<RawField>| {
            field.as_ref().map(RawField::to_string).unwrap_or_default()
        };

        SheetRow([
            cell(&record.event_date),
            cell(&record.country),
            cell(&record.advertiser_name),
            cell(&record.commission_amount),
            cell(&record.order_id),
        ])
    }
}

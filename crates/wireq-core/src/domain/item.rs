//! Items and their leased form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::ReceiptId;

/// Opaque producer document. The queue never looks inside it.
pub type Item = Value;

/// Key under which the receipt is attached to a leased document.
pub const RECEIPT_FIELD: &str = "_wireq_receipt";

/// An item handed out by `get`, together with the receipt that redeems it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeasedItem {
    pub receipt: ReceiptId,
    pub item: Item,
}

impl LeasedItem {
    pub fn new(receipt: ReceiptId, item: Item) -> Self {
        Self { receipt, item }
    }

    /// The document as a consumer sees it, carrying `_wireq_receipt`.
    ///
    /// Objects get the field added to a copy. Any other JSON value is
    /// wrapped as `{"entry": value, "_wireq_receipt": ...}`.
    pub fn annotated(&self) -> Value {
        let receipt = Value::String(self.receipt.to_string());
        match &self.item {
            Value::Object(fields) => {
                let mut fields = fields.clone();
                fields.insert(RECEIPT_FIELD.to_string(), receipt);
                Value::Object(fields)
            }
            other => {
                let mut fields = Map::new();
                fields.insert("entry".to_string(), other.clone());
                fields.insert(RECEIPT_FIELD.to_string(), receipt);
                Value::Object(fields)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ulid::Ulid;

    #[test]
    fn annotated_object_keeps_fields_and_adds_receipt() {
        let receipt = ReceiptId::from_ulid(Ulid::new());
        let leased = LeasedItem::new(receipt, json!({"urn": "urn:newsml:1", "version": 2}));

        let doc = leased.annotated();

        assert_eq!(doc["urn"], "urn:newsml:1");
        assert_eq!(doc["version"], 2);
        assert_eq!(doc[RECEIPT_FIELD], receipt.to_string());
        // the stored item is untouched
        assert!(leased.item.get(RECEIPT_FIELD).is_none());
    }

    #[test]
    fn annotated_scalar_is_wrapped() {
        let receipt = ReceiptId::from_ulid(Ulid::new());
        let leased = LeasedItem::new(receipt, json!("plain text"));

        let doc = leased.annotated();

        assert_eq!(doc["entry"], "plain text");
        assert_eq!(doc[RECEIPT_FIELD], receipt.to_string());
    }
}

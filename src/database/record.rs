use serde_json::Value;
use uuid::Uuid;

use crate::models::{document_uuid, Document};

/// Operation that produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOperation {
    Select,
    Create,
    Update,
    Delete,
}

/// A document as it passed through a write, with its pre-image when one
/// exists. Post-database observers read both sides to derive side effects.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    original: Option<Document>,
    current: Document,
    operation: RecordOperation,
}

impl Record {
    pub fn selected(doc: Document) -> Self {
        Self {
            original: Some(doc.clone()),
            current: doc,
            operation: RecordOperation::Select,
        }
    }

    pub fn created(doc: Document) -> Self {
        Self {
            original: None,
            current: doc,
            operation: RecordOperation::Create,
        }
    }

    pub fn updated(before: Document, after: Document) -> Self {
        Self {
            original: Some(before),
            current: after,
            operation: RecordOperation::Update,
        }
    }

    /// A removed document: `current` holds its last stored state.
    pub fn deleted(doc: Document) -> Self {
        Self {
            original: Some(doc.clone()),
            current: doc,
            operation: RecordOperation::Delete,
        }
    }

    pub fn operation(&self) -> RecordOperation {
        self.operation
    }

    pub fn id(&self) -> Option<Uuid> {
        document_uuid(&self.current, "id")
    }

    pub fn original(&self) -> Option<&Document> {
        self.original.as_ref()
    }

    pub fn current(&self) -> &Document {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut Document {
        &mut self.current
    }

    pub fn into_current(self) -> Document {
        self.current
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.current.get(field)
    }

    /// Previous value of a field; `None` for created records.
    pub fn previous(&self, field: &str) -> Option<&Value> {
        self.original.as_ref().and_then(|o| o.get(field))
    }

    /// Whether `field` differs between the pre-image and the current state.
    pub fn changed(&self, field: &str) -> bool {
        match &self.original {
            None => self.current.contains_key(field),
            Some(original) => original.get(field) != self.current.get(field),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn tracks_field_changes() {
        let id = Uuid::new_v4();
        let record = Record::updated(
            doc(json!({ "id": id.to_string(), "category": "a", "title": "t" })),
            doc(json!({ "id": id.to_string(), "category": "b", "title": "t" })),
        );
        assert_eq!(record.id(), Some(id));
        assert!(record.changed("category"));
        assert!(!record.changed("title"));
        assert_eq!(record.previous("category"), Some(&json!("a")));
    }

    #[test]
    fn deleted_record_keeps_last_state() {
        let record = Record::deleted(doc(json!({ "category": "a" })));
        assert_eq!(record.operation(), RecordOperation::Delete);
        assert!(!record.changed("category"));
        assert_eq!(record.get("category"), Some(&json!("a")));
    }
}

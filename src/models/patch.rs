use serde_json::{json, Map, Number, Value};

use super::{Document, ModelError};

/// Fields an update may never touch.
const PROTECTED_FIELDS: &[&str] = &["id", "createdAt"];

/// Update document applied to every matched record.
///
/// Accepts the operator form (`$set`, `$inc`, `$addToSet`, `$pull`,
/// `$unset`) or a plain object, which is treated as `$set`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    set: Map<String, Value>,
    inc: Map<String, Value>,
    add_to_set: Map<String, Value>,
    pull: Map<String, Value>,
    unset: Vec<String>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub fn inc(mut self, field: impl Into<String>, by: i64) -> Self {
        self.inc.insert(field.into(), Value::from(by));
        self
    }

    pub fn add_to_set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_to_set.insert(field.into(), value.into());
        self
    }

    pub fn pull(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.pull.insert(field.into(), value.into());
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    /// Add or replace a `$set` entry in place (used by enrichment observers).
    pub fn insert_set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.set.insert(field.into(), value.into());
    }

    pub fn from_json(value: &Value) -> Result<Self, ModelError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ModelError::validation("patch", "must be a JSON object"))?;

        let mut patch = Patch::new();
        for (key, val) in obj {
            match key.as_str() {
                "$set" => patch.set.extend(Self::operand(key, val)?),
                "$inc" => {
                    for (field, by) in Self::operand(key, val)? {
                        if !by.is_number() {
                            return Err(ModelError::validation(field, "$inc requires a number"));
                        }
                        patch.inc.insert(field, by);
                    }
                }
                "$addToSet" => patch.add_to_set.extend(Self::operand(key, val)?),
                "$pull" => patch.pull.extend(Self::operand(key, val)?),
                "$unset" => patch.unset.extend(Self::operand(key, val)?.into_iter().map(|(k, _)| k)),
                op if op.starts_with('$') => {
                    return Err(ModelError::validation("patch", format!("unsupported update operator {}", op)))
                }
                field => {
                    patch.set.insert(field.to_string(), val.clone());
                }
            }
        }
        patch.validate()?;
        Ok(patch)
    }

    fn operand(op: &str, val: &Value) -> Result<Map<String, Value>, ModelError> {
        val.as_object()
            .cloned()
            .ok_or_else(|| ModelError::validation("patch", format!("{} requires an object", op)))
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        for field in self.fields() {
            if PROTECTED_FIELDS.contains(&field) {
                return Err(ModelError::validation(field, "cannot be modified"));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        if !self.set.is_empty() {
            out.insert("$set".into(), Value::Object(self.set.clone()));
        }
        if !self.inc.is_empty() {
            out.insert("$inc".into(), Value::Object(self.inc.clone()));
        }
        if !self.add_to_set.is_empty() {
            out.insert("$addToSet".into(), Value::Object(self.add_to_set.clone()));
        }
        if !self.pull.is_empty() {
            out.insert("$pull".into(), Value::Object(self.pull.clone()));
        }
        if !self.unset.is_empty() {
            let unset: Map<String, Value> = self.unset.iter().map(|f| (f.clone(), json!(""))).collect();
            out.insert("$unset".into(), Value::Object(unset));
        }
        Value::Object(out)
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.inc.is_empty() && self.add_to_set.is_empty() && self.pull.is_empty() && self.unset.is_empty()
    }

    /// Value assigned to `field` by `$set`, if any.
    pub fn sets(&self, field: &str) -> Option<&Value> {
        self.set.get(field)
    }

    pub fn touches(&self, field: &str) -> bool {
        self.fields().any(|f| f == field)
    }

    fn fields(&self) -> impl Iterator<Item = &str> {
        self.set
            .keys()
            .chain(self.inc.keys())
            .chain(self.add_to_set.keys())
            .chain(self.pull.keys())
            .map(String::as_str)
            .chain(self.unset.iter().map(String::as_str))
    }

    /// Apply to a document in place. `$inc` on a missing field starts at 0.
    pub fn apply(&self, doc: &mut Document) -> Result<(), ModelError> {
        for (field, value) in &self.set {
            doc.insert(field.clone(), value.clone());
        }
        for (field, by) in &self.inc {
            let current = doc.get(field).cloned().unwrap_or(Value::from(0));
            doc.insert(field.clone(), add_numbers(field, &current, by)?);
        }
        for (field, value) in &self.add_to_set {
            let items = array_field(doc, field)?;
            if !items.contains(value) {
                items.push(value.clone());
            }
        }
        for (field, value) in &self.pull {
            let items = array_field(doc, field)?;
            items.retain(|item| item != value);
        }
        for field in &self.unset {
            doc.remove(field);
        }
        Ok(())
    }
}

fn add_numbers(field: &str, current: &Value, by: &Value) -> Result<Value, ModelError> {
    match (current, by) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return Ok(Value::from(a + b));
            }
            let sum = a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0);
            Number::from_f64(sum)
                .map(Value::Number)
                .ok_or_else(|| ModelError::validation(field, "increment produced a non-finite number"))
        }
        (Value::Null, Value::Number(_)) => Ok(by.clone()),
        _ => Err(ModelError::validation(field, "$inc target is not a number")),
    }
}

fn array_field<'a>(doc: &'a mut Document, field: &str) -> Result<&'a mut Vec<Value>, ModelError> {
    let entry = doc.entry(field.to_string()).or_insert_with(|| Value::Array(vec![]));
    if entry.is_null() {
        *entry = Value::Array(vec![]);
    }
    entry
        .as_array_mut()
        .ok_or_else(|| ModelError::validation(field, "is not an array"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn plain_object_is_set() {
        let patch = Patch::from_json(&json!({ "title": "New" })).unwrap();
        assert_eq!(patch.sets("title"), Some(&json!("New")));
    }

    #[test]
    fn inc_on_missing_field_starts_at_zero() {
        let mut d = doc(json!({ "postCount": 2 }));
        Patch::new().inc("postCount", -1).inc("reassignedPosts", 1).apply(&mut d).unwrap();
        assert_eq!(d["postCount"], json!(1));
        assert_eq!(d["reassignedPosts"], json!(1));
    }

    #[test]
    fn add_to_set_is_idempotent_and_pull_removes() {
        let mut d = doc(json!({ "likes": ["a"] }));
        let add = Patch::new().add_to_set("likes", "b");
        add.apply(&mut d).unwrap();
        add.apply(&mut d).unwrap();
        assert_eq!(d["likes"], json!(["a", "b"]));
        Patch::new().pull("likes", "a").apply(&mut d).unwrap();
        assert_eq!(d["likes"], json!(["b"]));
    }

    #[test]
    fn rejects_protected_and_unknown_operators() {
        assert!(Patch::from_json(&json!({ "id": "x" })).is_err());
        assert!(Patch::from_json(&json!({ "$rename": { "a": "b" } })).is_err());
        assert!(Patch::from_json(&json!({ "$inc": { "viewCount": "one" } })).is_err());
    }

    #[test]
    fn round_trips_operator_form() {
        let patch = Patch::new().set("author", "u2").inc("viewCount", 1);
        assert_eq!(Patch::from_json(&patch.to_json()).unwrap(), patch);
    }

    #[test]
    fn inc_rejects_non_numeric_target() {
        let mut d = doc(json!({ "title": "x" }));
        assert!(Patch::new().inc("title", 1).apply(&mut d).is_err());
    }
}

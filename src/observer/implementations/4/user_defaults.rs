// Ring 4: User Defaults - normalized names and e-mail, generated avatar
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::models::{Collection, Document};
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::session::Session;
use crate::observer::traits::{HookObserver, Observer, ObserverRing, Operation};

const AVATAR_BASE_URL: &str = "https://api.dicebear.com/7.x/initials/svg";

#[derive(Default)]
pub struct UserDefaultsObserver;

impl Observer for UserDefaultsObserver {
    fn name(&self) -> &'static str {
        "UserDefaultsObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Create
    }

    fn applies_to_collection(&self, collection: Collection) -> bool {
        collection == Collection::Users
    }
}

#[async_trait]
impl HookObserver for UserDefaultsObserver {
    async fn execute(&self, ctx: &mut ObserverContext, _session: &mut Session<'_>) -> Result<(), ObserverError> {
        let Some(doc) = ctx.document.as_mut() else {
            return Ok(());
        };

        for field in ["firstName", "lastName"] {
            if let Some(Value::String(name)) = doc.get_mut(field) {
                *name = name.trim().to_string();
            }
        }
        if let Some(Value::String(email)) = doc.get_mut("email") {
            *email = email.trim().to_lowercase();
        }

        let has_avatar = doc.get("avatar").and_then(Value::as_str).is_some_and(|a| !a.is_empty());
        if !has_avatar {
            let avatar = avatar_url(doc)?;
            doc.insert("avatar".to_string(), Value::String(avatar));
        }
        Ok(())
    }
}

/// Initials avatar seeded with the user's full name
fn avatar_url(doc: &Document) -> Result<String, ObserverError> {
    let part = |field: &str| doc.get(field).and_then(Value::as_str).unwrap_or_default().to_string();
    let seed = format!("{} {}", part("firstName"), part("lastName"));

    Url::parse_with_params(AVATAR_BASE_URL, &[("seed", seed.trim())])
        .map(String::from)
        .map_err(|e| ObserverError::SystemError(format!("Invalid avatar url: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn avatar_is_seeded_with_full_name() {
        let doc = json!({ "firstName": "Ada", "lastName": "Lovelace" }).as_object().cloned().unwrap();
        assert_eq!(
            avatar_url(&doc).unwrap(),
            "https://api.dicebear.com/7.x/initials/svg?seed=Ada+Lovelace"
        );
    }
}

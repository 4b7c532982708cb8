// Observer implementations organized by rings
// Each ring handles a specific phase of an entity operation

// Ring 1: Validation - entity pre-conditions, reference existence
#[path = "1/entity_validation.rs"]
pub mod entity_validation;
#[path = "1/reference_integrity.rs"]
pub mod reference_integrity;

// Ring 2: Security - soft delete filtering, user deletion guard
#[path = "2/soft_delete_filter.rs"]
pub mod soft_delete_filter;
#[path = "2/user_deletion_guard.rs"]
pub mod user_deletion_guard;

// Ring 4: Enrichment - derived and defaulted fields
#[path = "4/comment_edit.rs"]
pub mod comment_edit;
#[path = "4/post_derived_fields.rs"]
pub mod post_derived_fields;
#[path = "4/user_defaults.rs"]
pub mod user_defaults;

// Ring 6: Post-Database - counters and cascades inside the same transaction
#[path = "6/category_counter.rs"]
pub mod category_counter;
#[path = "6/post_cascade.rs"]
pub mod post_cascade;
#[path = "6/publish_stamp.rs"]
pub mod publish_stamp;

// Ring 7: Audit
#[path = "7/audit_log.rs"]
pub mod audit_log;

pub use audit_log::*;
pub use category_counter::CategoryCounterObserver;
pub use comment_edit::*;
pub use entity_validation::*;
pub use post_cascade::*;
pub use post_derived_fields::*;
pub use publish_stamp::PublishStampObserver;
pub use reference_integrity::*;
pub use soft_delete_filter::*;
pub use user_defaults::*;
pub use user_deletion_guard::*;

use crate::config::AppConfig;
use crate::observer::error::ObserverError;
use crate::observer::pipeline::ObserverPipeline;
use crate::observer::traits::ObserverBox;

/// Register the built-in observers for `config`.
pub fn register_standard(pipeline: &mut ObserverPipeline, config: &AppConfig) -> Result<(), ObserverError> {
    pipeline.register_observer(ObserverBox::hook(EntityValidationObserver))?;
    pipeline.register_observer(ObserverBox::hook(ReferenceIntegrityObserver))?;

    pipeline.register_observer(ObserverBox::hook(SoftDeleteFilterObserver))?;
    pipeline.register_observer(ObserverBox::hook(UserDeletionGuard::new(
        config.retirement.placeholder_user_id,
    )))?;

    pipeline.register_observer(ObserverBox::hook(PostDerivedFieldsObserver))?;
    pipeline.register_observer(ObserverBox::hook(UserDefaultsObserver))?;
    pipeline.register_observer(ObserverBox::hook(CommentEditObserver))?;

    pipeline.register_observer(ObserverBox::hook(CategoryCounterObserver))?;
    pipeline.register_observer(ObserverBox::hook(PublishStampObserver))?;
    pipeline.register_observer(ObserverBox::hook(PostCascadeObserver::new(config.cascade.mode)))?;

    if config.observer.enable_audit_logging {
        pipeline.register_observer(ObserverBox::audit(AuditLogObserver))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CascadeMode;
    use crate::observer::traits::ObserverRing;

    #[test]
    fn cascade_is_registered_in_every_mode() {
        for mode in [CascadeMode::Atomic, CascadeMode::BestEffort] {
            let mut pipeline = ObserverPipeline::new();
            register_standard(&mut pipeline, &AppConfig::development().with_cascade_mode(mode)).unwrap();
            assert_eq!(
                pipeline.observer_names(ObserverRing::PostDatabase),
                vec!["CategoryCounterObserver", "PublishStampObserver", "PostCascadeObserver"]
            );
        }
    }

    #[test]
    fn security_ring_guards_comments_and_users() {
        let mut pipeline = ObserverPipeline::new();
        register_standard(&mut pipeline, &AppConfig::development()).unwrap();
        assert_eq!(
            pipeline.observer_names(ObserverRing::Security),
            vec!["SoftDeleteFilterObserver", "UserDeletionGuard"]
        );
    }

    #[test]
    fn audit_ring_follows_config() {
        let mut config = AppConfig::development();
        config.observer.enable_audit_logging = false;
        let mut pipeline = ObserverPipeline::new();
        register_standard(&mut pipeline, &config).unwrap();
        assert!(pipeline.observer_names(ObserverRing::Audit).is_empty());
    }
}

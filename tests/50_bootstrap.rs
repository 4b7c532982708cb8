mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use blog_api_rust::config::{AppConfig, CascadeMode, ConfigError};
use blog_api_rust::database::{DocumentStore, MemoryStore};
use blog_api_rust::filter::FilterData;
use blog_api_rust::models::{Collection, Post};
use blog_api_rust::observer::{MemoryMonitor, Operation};
use blog_api_rust::services::{BlogService, PostExpansion};
use blog_api_rust::BlogError;

fn memory_store() -> Arc<dyn DocumentStore> {
    Arc::new(MemoryStore::new(Duration::from_secs(2)))
}

#[tokio::test]
async fn bootstrap_requires_a_placeholder_id() {
    let config = AppConfig::development();
    let result = BlogService::bootstrap(config, memory_store(), Arc::new(MemoryMonitor::new())).await;
    assert!(matches!(
        result,
        Err(BlogError::Config(ConfigError::Missing("BLOG_PLACEHOLDER_USER_ID")))
    ));
}

#[tokio::test]
async fn bootstrap_refuses_a_missing_placeholder_without_provisioning() {
    let id = uuid::Uuid::new_v4();
    let mut config = common::test_config(CascadeMode::Atomic).with_placeholder(id);
    config.retirement.provision_placeholder = false;

    let result = BlogService::bootstrap(config, memory_store(), Arc::new(MemoryMonitor::new())).await;
    match result {
        Err(BlogError::Config(ConfigError::PlaceholderMissing(missing))) => assert_eq!(missing, id),
        Err(other) => panic!("expected PlaceholderMissing, got {:?}", other),
        Ok(_) => panic!("bootstrap should fail"),
    }
}

#[tokio::test]
async fn provisioned_placeholder_is_an_inactive_account() -> Result<()> {
    let blog = common::blog().await?;
    let placeholder = blog.service.get_user(blog.placeholder()).await?;
    assert_eq!(placeholder.username, "deleted");
    assert!(!placeholder.is_active);
    assert_eq!(placeholder.reassigned_posts, 0);
    Ok(())
}

#[tokio::test]
async fn bootstrap_reuses_an_existing_placeholder() -> Result<()> {
    let blog = common::blog().await?;
    let mut config = common::test_config(CascadeMode::Atomic).with_placeholder(blog.placeholder());
    config.retirement.provision_placeholder = false;

    let store: Arc<dyn DocumentStore> = blog.store.clone();
    let again = BlogService::bootstrap(config, store, Arc::new(MemoryMonitor::new())).await?;
    assert_eq!(again.placeholder(), blog.placeholder());
    Ok(())
}

#[tokio::test]
async fn expansion_batches_reference_lookups() -> Result<()> {
    let blog = common::blog().await?;
    let alice = common::seed_user(&blog, "alice").await?;
    let bob = common::seed_user(&blog, "bob").await?;
    let rust = common::seed_category(&blog, "Rust").await?;
    let go = common::seed_category(&blog, "Go").await?;
    common::seed_post(&blog, alice.id, Some(rust.id)).await?;
    common::seed_post(&blog, bob.id, Some(go.id)).await?;
    common::seed_post(&blog, alice.id, None).await?;
    blog.monitor.clear();

    let views = blog.service.list_posts(FilterData::default(), PostExpansion::ALL).await?;
    assert_eq!(views.len(), 3);
    assert_eq!(blog.monitor.count_for(Collection::Users, Operation::Find), 1);
    assert_eq!(blog.monitor.count_for(Collection::Categories, Operation::Find), 1);

    for view in &views {
        let author = view.author_details.as_ref().expect("author expanded");
        assert_eq!(author.id, view.post.author);
        match view.post.category {
            Some(category) => assert_eq!(view.category_details.as_ref().map(|c| c.id), Some(category)),
            None => assert!(view.category_details.is_none()),
        }
    }
    Ok(())
}

#[tokio::test]
async fn posts_without_expansion_skip_lookups() -> Result<()> {
    let blog = common::blog().await?;
    let author = common::seed_user(&blog, "solo").await?;
    blog.service
        .create_post(Post::new(author.id, "Plain", common::CONTENT))
        .await?;
    blog.monitor.clear();

    let views = blog.service.posts_by_author(author.id, PostExpansion::NONE).await?;
    assert_eq!(views.len(), 1);
    assert!(views[0].author_details.is_none());
    assert_eq!(blog.monitor.len(), 1);
    Ok(())
}

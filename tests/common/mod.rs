#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use blog_api_rust::config::{AppConfig, CascadeMode};
use blog_api_rust::database::{DocumentStore, MemoryStore};
use blog_api_rust::models::{Category, Collection, Comment, Post, User};
use blog_api_rust::observer::{
    AuditObserver, HookObserver, MemoryMonitor, Observer, ObserverBox, ObserverContext, ObserverError, ObserverPipeline,
    ObserverRing, Operation, Session,
};
use blog_api_rust::services::BlogService;

pub const CONTENT: &str = "A post body that is comfortably longer than ten characters.";

/// Service on a fresh memory store with the standard pipeline
pub struct TestBlog {
    pub service: BlogService,
    pub monitor: Arc<MemoryMonitor>,
    pub store: Arc<MemoryStore>,
}

impl TestBlog {
    pub fn placeholder(&self) -> Uuid {
        self.service.placeholder()
    }
}

pub fn test_config(mode: CascadeMode) -> AppConfig {
    let mut config = AppConfig::development()
        .with_placeholder(Uuid::new_v4())
        .with_cascade_mode(mode);
    config.retirement.provision_placeholder = true;
    config.store.transaction_timeout_ms = 2_000;
    config
}

pub async fn blog() -> Result<TestBlog> {
    blog_with(test_config(CascadeMode::Atomic), vec![]).await
}

/// Standard pipeline plus `extra` observers registered after the built-in ones
pub async fn blog_with(config: AppConfig, extra: Vec<ObserverBox>) -> Result<TestBlog> {
    let monitor = Arc::new(MemoryMonitor::new());
    let store = Arc::new(MemoryStore::new(config.store.transaction_timeout()));

    let mut pipeline = ObserverPipeline::standard(&config, monitor.clone())?;
    for observer in extra {
        pipeline.register_observer(observer)?;
    }

    let dyn_store: Arc<dyn DocumentStore> = store.clone();
    let service = BlogService::with_pipeline(config, dyn_store, pipeline).await?;
    monitor.clear();
    Ok(TestBlog { service, monitor, store })
}

pub async fn seed_user(blog: &TestBlog, username: &str) -> Result<User> {
    let user = User::new(username, format!("{}@example.com", username), "Test", username);
    Ok(blog.service.create_user(user).await?)
}

pub async fn seed_category(blog: &TestBlog, name: &str) -> Result<Category> {
    Ok(blog.service.create_category(Category::new(name)).await?)
}

pub async fn seed_post(blog: &TestBlog, author: Uuid, category: Option<Uuid>) -> Result<Post> {
    let mut post = Post::new(author, "A title", CONTENT);
    if let Some(category) = category {
        post = post.in_category(category);
    }
    Ok(blog.service.create_post(post).await?)
}

pub async fn seed_comment(blog: &TestBlog, author: Uuid, post: Uuid) -> Result<Comment> {
    Ok(blog.service.create_comment(Comment::new(author, post, "Nice post")).await?)
}

/// Rejects every matching operation with a security error
pub struct FailingObserver {
    pub ring: ObserverRing,
    pub operation: Operation,
    pub collection: Collection,
}

impl FailingObserver {
    pub fn boxed(ring: ObserverRing, operation: Operation, collection: Collection) -> ObserverBox {
        ObserverBox::hook(Self {
            ring,
            operation,
            collection,
        })
    }
}

impl Observer for FailingObserver {
    fn name(&self) -> &'static str {
        "FailingObserver"
    }

    fn ring(&self) -> ObserverRing {
        self.ring
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == self.operation
    }

    fn applies_to_collection(&self, collection: Collection) -> bool {
        collection == self.collection
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(500)
    }
}

#[async_trait]
impl HookObserver for FailingObserver {
    async fn execute(&self, _ctx: &mut ObserverContext, _session: &mut Session<'_>) -> Result<(), ObserverError> {
        Err(ObserverError::SecurityError(format!(
            "{} on {} is blocked in this test",
            self.operation, self.collection
        )))
    }
}

/// Audit observer that always fails
pub struct FailingAudit;

impl Observer for FailingAudit {
    fn name(&self) -> &'static str {
        "FailingAudit"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Audit
    }

    fn applies_to_operation(&self, _op: Operation) -> bool {
        true
    }

    fn applies_to_collection(&self, _collection: Collection) -> bool {
        true
    }
}

#[async_trait]
impl AuditObserver for FailingAudit {
    async fn execute(&self, _ctx: &ObserverContext) -> Result<(), ObserverError> {
        Err(ObserverError::SystemError("audit sink unavailable".to_string()))
    }
}

mod common;

use anyhow::Result;
use serde_json::json;

use blog_api_rust::config::CascadeMode;
use blog_api_rust::database::StoreTransaction;
use blog_api_rust::filter::{Filter, FilterData};
use blog_api_rust::models::{Collection, Patch};
use blog_api_rust::observer::{ObserverContext, ObserverRing, Operation};
use blog_api_rust::services::{CascadeIncomplete, CascadeStep, PostExpansion};

async fn all_comments_of(blog: &common::TestBlog, post: uuid::Uuid) -> Result<u64> {
    // Counts soft-deleted comments too
    let ctx = ObserverContext::count(
        Collection::Comments,
        FilterData::new(json!({ "post": post.to_string() })),
    )
    .include_deleted();
    Ok(blog.service.entities().execute(ctx, None).await?.count.unwrap_or(0))
}

#[tokio::test]
async fn removing_a_post_removes_all_its_comments_and_decrements_the_category() -> Result<()> {
    let blog = common::blog().await?;
    let user = common::seed_user(&blog, "author").await?;
    let category = common::seed_category(&blog, "Rust").await?;
    let post = common::seed_post(&blog, user.id, Some(category.id)).await?;
    let other = common::seed_post(&blog, user.id, Some(category.id)).await?;

    common::seed_comment(&blog, user.id, post.id).await?;
    let hidden = common::seed_comment(&blog, user.id, post.id).await?;
    blog.service.soft_delete_comment(hidden.id).await?;
    let survivor = common::seed_comment(&blog, user.id, other.id).await?;

    assert_eq!(blog.service.get_category(category.id).await?.post_count, 2);
    assert_eq!(all_comments_of(&blog, post.id).await?, 2);

    let removal = blog.service.remove_post(post.id).await?;
    assert!(removal.is_complete());
    assert_eq!(removal.post.id, post.id);

    assert_eq!(all_comments_of(&blog, post.id).await?, 0);
    assert_eq!(blog.service.get_category(category.id).await?.post_count, 1);
    assert!(blog.service.get_post(post.id, PostExpansion::NONE).await.unwrap_err().is_not_found());
    assert_eq!(blog.service.get_comment(survivor.id).await?.id, survivor.id);
    Ok(())
}

#[tokio::test]
async fn removing_an_unknown_post_is_not_found() -> Result<()> {
    let blog = common::blog().await?;
    let err = blog.service.remove_post(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn atomic_cascade_failure_keeps_the_post() -> Result<()> {
    let blog = common::blog_with(
        common::test_config(CascadeMode::Atomic),
        vec![common::FailingObserver::boxed(ObserverRing::Security, Operation::Delete, Collection::Comments)],
    )
    .await?;
    let user = common::seed_user(&blog, "author").await?;
    let category = common::seed_category(&blog, "Go").await?;
    let post = common::seed_post(&blog, user.id, Some(category.id)).await?;
    common::seed_comment(&blog, user.id, post.id).await?;

    assert!(blog.service.remove_post(post.id).await.is_err());

    assert_eq!(blog.service.get_post(post.id, PostExpansion::NONE).await?.post.id, post.id);
    assert_eq!(all_comments_of(&blog, post.id).await?, 1);
    assert_eq!(blog.service.get_category(category.id).await?.post_count, 1);
    Ok(())
}

#[tokio::test]
async fn best_effort_cascade_completes_when_every_step_succeeds() -> Result<()> {
    let blog = common::blog_with(common::test_config(CascadeMode::BestEffort), vec![]).await?;
    let user = common::seed_user(&blog, "author").await?;
    let category = common::seed_category(&blog, "Zig").await?;
    let post = common::seed_post(&blog, user.id, Some(category.id)).await?;
    common::seed_comment(&blog, user.id, post.id).await?;

    assert!(blog.service.remove_post(post.id).await?.is_complete());

    assert_eq!(all_comments_of(&blog, post.id).await?, 0);
    assert_eq!(blog.service.get_category(category.id).await?.post_count, 0);
    Ok(())
}

#[tokio::test]
async fn best_effort_cascade_reports_failed_steps_and_still_decrements() -> Result<()> {
    let blog = common::blog_with(
        common::test_config(CascadeMode::BestEffort),
        vec![common::FailingObserver::boxed(ObserverRing::Security, Operation::Delete, Collection::Comments)],
    )
    .await?;
    let user = common::seed_user(&blog, "author").await?;
    let category = common::seed_category(&blog, "C").await?;
    let post = common::seed_post(&blog, user.id, Some(category.id)).await?;
    common::seed_comment(&blog, user.id, post.id).await?;

    let removal = blog.service.remove_post(post.id).await?;
    assert_eq!(
        removal.incomplete,
        Some(CascadeIncomplete {
            post_id: post.id,
            failed_steps: vec![CascadeStep::DeleteComments],
        })
    );

    // The deletion itself committed; the category step ran regardless
    assert!(blog.service.get_post(post.id, PostExpansion::NONE).await.unwrap_err().is_not_found());
    assert_eq!(blog.service.get_category(category.id).await?.post_count, 0);
    assert_eq!(all_comments_of(&blog, post.id).await?, 1);
    Ok(())
}

#[tokio::test]
async fn best_effort_cascade_follows_every_post_delete() -> Result<()> {
    let blog = common::blog_with(common::test_config(CascadeMode::BestEffort), vec![]).await?;
    let user = common::seed_user(&blog, "author").await?;
    let category = common::seed_category(&blog, "Lisp").await?;
    let post = common::seed_post(&blog, user.id, Some(category.id)).await?;
    common::seed_comment(&blog, user.id, post.id).await?;

    // Straight through the entity store, not the service
    blog.service.entities().delete(Collection::Posts, post.id, None).await?;

    assert_eq!(all_comments_of(&blog, post.id).await?, 0);
    assert_eq!(blog.service.get_category(category.id).await?.post_count, 0);
    Ok(())
}

#[tokio::test]
async fn best_effort_failures_on_raw_deletes_become_warnings() -> Result<()> {
    // Category counter updates are blocked, so the post gets its category
    // directly in the store
    let blog = common::blog_with(
        common::test_config(CascadeMode::BestEffort),
        vec![common::FailingObserver::boxed(ObserverRing::Business, Operation::Update, Collection::Categories)],
    )
    .await?;
    let user = common::seed_user(&blog, "author").await?;
    let category = common::seed_category(&blog, "Ada").await?;
    let post = common::seed_post(&blog, user.id, None).await?;
    common::seed_comment(&blog, user.id, post.id).await?;

    let mut tx = blog.service.entities().begin().await?;
    let filter = Filter::from_data(Collection::Posts.table_name(), &FilterData::by_id(post.id), None)?;
    tx.update_many(Collection::Posts, &filter, &Patch::new().set("category", category.id.to_string()))
        .await?;
    tx.commit().await?;

    let ctx = blog
        .service
        .entities()
        .execute(ObserverContext::delete(Collection::Posts, FilterData::by_id(post.id)), None)
        .await?;
    assert_eq!(ctx.records.len(), 1);
    assert_eq!(ctx.warnings.len(), 1);
    assert_eq!(ctx.warnings[0].observer, "PostCascadeObserver");

    assert!(blog.service.get_post(post.id, PostExpansion::NONE).await.unwrap_err().is_not_found());
    assert_eq!(all_comments_of(&blog, post.id).await?, 0);
    assert_eq!(blog.service.get_category(category.id).await?.post_count, 0);
    Ok(())
}

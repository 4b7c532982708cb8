mod common;

use anyhow::Result;
use serde_json::json;

use blog_api_rust::filter::FilterData;
use blog_api_rust::models::{Collection, Comment, Entity};
use blog_api_rust::observer::ObserverContext;

#[tokio::test]
async fn soft_deleted_comment_is_invisible_to_every_read() -> Result<()> {
    let blog = common::blog().await?;
    let user = common::seed_user(&blog, "reader").await?;
    let post = common::seed_post(&blog, user.id, None).await?;
    let hidden = common::seed_comment(&blog, user.id, post.id).await?;
    let visible = common::seed_comment(&blog, user.id, post.id).await?;

    blog.service.soft_delete_comment(hidden.id).await?;

    let err = blog.service.get_comment(hidden.id).await.unwrap_err();
    assert!(err.is_not_found(), "expected NotFound, got {:?}", err);

    // Caller filters can only narrow, never widen
    let asking_for_deleted = blog
        .service
        .list_comments(FilterData::new(json!({ "isDeleted": true })))
        .await?;
    assert!(asking_for_deleted.is_empty());

    let either = blog
        .service
        .list_comments(FilterData::new(json!({ "$or": [{ "isDeleted": true }, { "isDeleted": false }] })))
        .await?;
    assert_eq!(either.iter().map(|c| c.id).collect::<Vec<_>>(), vec![visible.id]);

    let thread = blog.service.comments_for_post(post.id).await?;
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].id, visible.id);
    Ok(())
}

#[tokio::test]
async fn soft_delete_keeps_the_document_and_is_idempotent() -> Result<()> {
    let blog = common::blog().await?;
    let user = common::seed_user(&blog, "writer").await?;
    let post = common::seed_post(&blog, user.id, None).await?;
    let comment = common::seed_comment(&blog, user.id, post.id).await?;

    blog.service.soft_delete_comment(comment.id).await?;
    blog.service.soft_delete_comment(comment.id).await?;

    let ctx = blog
        .service
        .entities()
        .execute(
            ObserverContext::find_one(Collection::Comments, FilterData::by_id(comment.id)).include_deleted(),
            None,
        )
        .await?;
    let stored = Comment::from_document(ctx.into_documents().remove(0))?;
    assert!(stored.is_deleted);
    assert!(!stored.is_edited);
    assert_eq!(stored.content, comment.content);
    Ok(())
}

#[tokio::test]
async fn soft_delete_of_unknown_comment_is_not_found() -> Result<()> {
    let blog = common::blog().await?;
    let err = blog.service.soft_delete_comment(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn soft_deleted_comment_cannot_be_edited() -> Result<()> {
    let blog = common::blog().await?;
    let user = common::seed_user(&blog, "editor").await?;
    let post = common::seed_post(&blog, user.id, None).await?;
    let comment = common::seed_comment(&blog, user.id, post.id).await?;
    blog.service.soft_delete_comment(comment.id).await?;

    let err = blog.service.edit_comment(comment.id, "changed my mind").await.unwrap_err();
    assert!(err.is_not_found(), "expected NotFound, got {:?}", err);
    Ok(())
}

#[tokio::test]
async fn replies_to_soft_deleted_parents_still_resolve() -> Result<()> {
    let blog = common::blog().await?;
    let user = common::seed_user(&blog, "threader").await?;
    let post = common::seed_post(&blog, user.id, None).await?;
    let parent = common::seed_comment(&blog, user.id, post.id).await?;
    blog.service.soft_delete_comment(parent.id).await?;

    let reply = blog
        .service
        .create_comment(Comment::new(user.id, post.id, "Replying anyway").reply_to(parent.id))
        .await?;
    assert_eq!(reply.parent_comment, Some(parent.id));
    Ok(())
}

#[tokio::test]
async fn reply_must_stay_on_the_parents_post() -> Result<()> {
    let blog = common::blog().await?;
    let user = common::seed_user(&blog, "wanderer").await?;
    let first = common::seed_post(&blog, user.id, None).await?;
    let second = common::seed_post(&blog, user.id, None).await?;
    let parent = common::seed_comment(&blog, user.id, first.id).await?;

    let err = blog
        .service
        .create_comment(Comment::new(user.id, second.id, "Wrong thread").reply_to(parent.id))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    Ok(())
}

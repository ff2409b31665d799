use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tagbind_api::{
    NewTag, Page, PublicView, SetInjected, SetStatus, Tag, TagFilter, TagId, TagList, TagStatus,
    TagWithOwner,
};

use crate::{claim, db, extractors::*, Error};

pub async fn admin_create_tag(
    AdminAuth: AdminAuth,
    State(config): State<AppConfig>,
    mut conn: PgConn,
    Json(data): Json<NewTag>,
) -> Result<(StatusCode, Json<Tag>), Error> {
    let tag = db::create_tag(&mut *conn, data.tag_id, &config.public_base_url).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn admin_list_tags(
    AdminAuth: AdminAuth,
    State(config): State<AppConfig>,
    Query(filter): Query<TagFilter>,
    Query(page): Query<Page>,
    mut conn: PgConn,
) -> Result<Json<TagList>, Error> {
    let (tags, total) = db::list_tags(&mut *conn, &filter, &page, &config.public_base_url)
        .await
        .context("listing tags")?;
    Ok(Json(TagList {
        tags,
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

pub async fn admin_delete_tag(
    AdminAuth: AdminAuth,
    Path(tag_id): Path<String>,
    mut conn: PgConn,
) -> Result<Json<serde_json::Value>, Error> {
    let id = TagId(tag_id);
    db::delete_tag(&mut *conn, &id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "tag_id": id,
    })))
}

pub async fn admin_set_injected(
    AdminAuth: AdminAuth,
    State(config): State<AppConfig>,
    Path(tag_id): Path<String>,
    mut conn: PgConn,
    Json(data): Json<SetInjected>,
) -> Result<Json<Tag>, Error> {
    let id = TagId(tag_id);
    Ok(Json(
        db::set_injected(&mut *conn, &id, data.is_injected, &config.public_base_url).await?,
    ))
}

pub async fn admin_set_status(
    AdminAuth: AdminAuth,
    State(config): State<AppConfig>,
    Path(tag_id): Path<String>,
    mut conn: PgConn,
    Json(data): Json<SetStatus>,
) -> Result<Json<Tag>, Error> {
    let id = TagId(tag_id);
    Ok(Json(
        db::set_status(
            &mut *conn,
            &id,
            TagStatus::from(data.status),
            &config.public_base_url,
        )
        .await?,
    ))
}

pub async fn claim_tag(
    Auth(user): Auth,
    State(config): State<AppConfig>,
    Path(tag_id): Path<String>,
    mut conn: PgConn,
) -> Result<Json<TagWithOwner>, Error> {
    let id = TagId(tag_id);
    id.validate_public()?;
    let tag = claim::claim(
        &mut *conn,
        &id,
        user,
        config.auto_provision,
        &config.public_base_url,
    )
    .await?;
    let owner = db::owner_summary(&mut *conn, user)
        .await
        .with_context(|| format!("fetching owner summary for {:?}", user))?;
    Ok(Json(TagWithOwner { tag, owner }))
}

pub async fn own_tag(
    Auth(user): Auth,
    State(config): State<AppConfig>,
    mut conn: PgConn,
) -> Result<Json<Option<Tag>>, Error> {
    Ok(Json(
        db::current_claim_for(&mut *conn, user, &config.public_base_url)
            .await
            .with_context(|| format!("fetching current claim of {:?}", user))?,
    ))
}

pub async fn release_own_tag(
    Auth(user): Auth,
    State(config): State<AppConfig>,
    mut conn: PgConn,
) -> Result<Json<Option<Tag>>, Error> {
    Ok(Json(
        claim::release_own(&mut *conn, user, &config.public_base_url).await?,
    ))
}

pub async fn lookup_tag(
    State(config): State<AppConfig>,
    Path(tag_id): Path<String>,
    mut conn: PgConn,
) -> Result<Json<PublicView>, Error> {
    let id = TagId(tag_id);
    id.validate_public()?;
    let mut tag = db::ensure_tag(
        &mut *conn,
        &id,
        config.auto_provision,
        &config.public_base_url,
    )
    .await?;

    // Best-effort: a failed bump is logged, never propagated, and never part
    // of any claim transaction.
    match db::increment_view_count(&mut *conn, &id).await {
        Ok(Some(count)) => tag.viewed_count = count,
        Ok(None) => tracing::warn!(tag_id = %id, "tag vanished before its view count was bumped"),
        Err(err) => tracing::warn!(?err, tag_id = %id, "failed bumping view count"),
    }

    let owner = match (tag.status, tag.owner_id) {
        (TagStatus::Disabled, _) | (_, None) => None,
        (_, Some(owner_id)) => db::owner_summary(&mut *conn, owner_id)
            .await
            .with_context(|| format!("fetching owner summary for {:?}", owner_id))?,
    };
    Ok(Json(PublicView::of(&tag, owner)))
}

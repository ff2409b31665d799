use anyhow::Context;
use sqlx::Row;
use tagbind_api::{OwnerSummary, Page, Tag, TagFilter, TagId, TagStatus, UserId, Uuid};

use crate::{filter, Error};

pub const TAG_COLUMNS: &str =
    "tag_id, status, owner_id, claimed_at, is_injected, viewed_count, created_at";

pub fn tag_from_row(row: &sqlx::postgres::PgRow, base_url: &str) -> anyhow::Result<Tag> {
    let tag_id: String = row.try_get("tag_id").context("retrieving the tag_id field")?;
    let status: String = row.try_get("status").context("retrieving the status field")?;
    let status = status
        .parse::<TagStatus>()
        .with_context(|| format!("parsing status of tag {tag_id:?}"))?;
    let owner_id: Option<Uuid> = row
        .try_get("owner_id")
        .context("retrieving the owner_id field")?;
    let tag_id = TagId(tag_id);
    Ok(Tag {
        tag_url: tag_id.url(base_url),
        tag_id,
        status,
        owner_id: owner_id.map(UserId),
        claimed_at: row
            .try_get("claimed_at")
            .context("retrieving the claimed_at field")?,
        is_injected: row
            .try_get("is_injected")
            .context("retrieving the is_injected field")?,
        viewed_count: row
            .try_get("viewed_count")
            .context("retrieving the viewed_count field")?,
        created_at: row
            .try_get("created_at")
            .context("retrieving the created_at field")?,
    })
}

/// Creates a tag. An explicit identifier colliding with an existing row is a
/// Conflict; generated identifiers are redrawn until one is free.
pub async fn create_tag(
    conn: &mut sqlx::PgConnection,
    id: Option<TagId>,
    base_url: &str,
) -> Result<Tag, Error> {
    let sql = format!(
        "INSERT INTO tags (tag_id) VALUES ($1) ON CONFLICT (tag_id) DO NOTHING RETURNING {TAG_COLUMNS}"
    );
    match id {
        Some(id) => {
            let row = sqlx::query(&sql)
                .bind(&id.0)
                .fetch_optional(&mut *conn)
                .await
                .with_context(|| format!("inserting tag {id}"))?;
            match row {
                Some(row) => Ok(tag_from_row(&row, base_url)?),
                None => Err(Error::conflict(&id)),
            }
        }
        None => loop {
            let id = TagId::generate();
            let row = sqlx::query(&sql)
                .bind(&id.0)
                .fetch_optional(&mut *conn)
                .await
                .with_context(|| format!("inserting tag {id}"))?;
            match row {
                Some(row) => return Ok(tag_from_row(&row, base_url)?),
                None => tracing::info!(%id, "generated tag identifier collided, redrawing"),
            }
        },
    }
}

pub async fn get_tag(
    conn: &mut sqlx::PgConnection,
    id: &TagId,
    base_url: &str,
) -> anyhow::Result<Option<Tag>> {
    let sql = format!("SELECT {TAG_COLUMNS} FROM tags WHERE tag_id = $1");
    sqlx::query(&sql)
        .bind(&id.0)
        .fetch_optional(conn)
        .await
        .with_context(|| format!("fetching tag {id}"))?
        .map(|row| tag_from_row(&row, base_url))
        .transpose()
}

pub async fn list_tags(
    conn: &mut sqlx::PgConnection,
    f: &TagFilter,
    page: &Page,
    base_url: &str,
) -> anyhow::Result<(Vec<Tag>, i64)> {
    let sql = filter::to_postgres(f, 1);

    let count_sql = format!("SELECT COUNT(*) FROM tags WHERE {}", sql.where_clause);
    let total: i64 = sql
        .bind_all(sqlx::query(&count_sql))
        .fetch_one(&mut *conn)
        .await
        .context("counting tags")?
        .try_get(0)
        .context("retrieving the tag count")?;

    let limit_idx = 1 + sql.binds.len();
    let offset_idx = limit_idx + 1;
    let list_sql = format!(
        "SELECT {TAG_COLUMNS} FROM tags WHERE {} ORDER BY created_at DESC, tag_id LIMIT ${limit_idx} OFFSET ${offset_idx}",
        sql.where_clause
    );
    let tags = sql
        .bind_all(sqlx::query(&list_sql))
        .bind(page.limit.max(0))
        .bind(page.offset.max(0))
        .fetch_all(&mut *conn)
        .await
        .context("listing tags")?
        .iter()
        .map(|row| tag_from_row(row, base_url))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok((tags, total))
}

/// Unconditional hard delete, claimed or not: ownership lives on the tag row
/// itself, so removing the row is also the compensating unclaim.
pub async fn delete_tag(conn: &mut sqlx::PgConnection, id: &TagId) -> Result<(), Error> {
    let res = sqlx::query("DELETE FROM tags WHERE tag_id = $1")
        .bind(&id.0)
        .execute(conn)
        .await
        .with_context(|| format!("deleting tag {id}"))?;
    if res.rows_affected() == 0 {
        return Err(Error::not_found(id));
    }
    Ok(())
}

pub async fn set_injected(
    conn: &mut sqlx::PgConnection,
    id: &TagId,
    injected: bool,
    base_url: &str,
) -> Result<Tag, Error> {
    let sql = format!("UPDATE tags SET is_injected = $2 WHERE tag_id = $1 RETURNING {TAG_COLUMNS}");
    let row = sqlx::query(&sql)
        .bind(&id.0)
        .bind(injected)
        .fetch_optional(conn)
        .await
        .with_context(|| format!("setting injected flag on tag {id}"))?;
    match row {
        Some(row) => Ok(tag_from_row(&row, base_url)?),
        None => Err(Error::not_found(id)),
    }
}

/// Administrative status override. Callers can only pass non-claimed
/// statuses; ownership is cleared in the same statement so a tag moved out of
/// claimed never keeps a stale owner.
pub async fn set_status(
    conn: &mut sqlx::PgConnection,
    id: &TagId,
    status: TagStatus,
    base_url: &str,
) -> Result<Tag, Error> {
    let sql = format!(
        "UPDATE tags SET status = $2, owner_id = NULL, claimed_at = NULL WHERE tag_id = $1 RETURNING {TAG_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(&id.0)
        .bind(status.as_str())
        .fetch_optional(conn)
        .await
        .with_context(|| format!("setting status of tag {id}"))?;
    match row {
        Some(row) => Ok(tag_from_row(&row, base_url)?),
        None => Err(Error::not_found(id)),
    }
}

/// Provision-or-fetch. Concurrent provisioning of the same identifier is
/// resolved by the primary key: the losing insert comes back empty and the
/// loser reads the winner's row.
pub async fn ensure_tag(
    conn: &mut sqlx::PgConnection,
    id: &TagId,
    auto_provision: bool,
    base_url: &str,
) -> Result<Tag, Error> {
    if let Some(tag) = get_tag(&mut *conn, id, base_url).await? {
        return Ok(tag);
    }
    if !auto_provision {
        return Err(Error::not_found(id));
    }
    // a provisioned tag is marked injected: its identifier could only come
    // from scanning already-written hardware
    let sql = format!(
        "INSERT INTO tags (tag_id, is_injected) VALUES ($1, TRUE) ON CONFLICT (tag_id) DO NOTHING RETURNING {TAG_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("provisioning tag {id}"))?;
    match row {
        Some(row) => Ok(tag_from_row(&row, base_url)?),
        None => Ok(get_tag(&mut *conn, id, base_url)
            .await?
            .ok_or_else(|| anyhow::anyhow!("tag {id} vanished right after a provisioning race"))?),
    }
}

/// Fire-and-forget view counter bump. Deliberately not part of any claim
/// transaction; returns the new count when the tag still exists.
pub async fn increment_view_count(
    conn: &mut sqlx::PgConnection,
    id: &TagId,
) -> anyhow::Result<Option<i64>> {
    sqlx::query("UPDATE tags SET viewed_count = viewed_count + 1 WHERE tag_id = $1 RETURNING viewed_count")
        .bind(&id.0)
        .fetch_optional(conn)
        .await
        .with_context(|| format!("bumping view count of tag {id}"))?
        .map(|row| row.try_get(0).context("retrieving the viewed_count field"))
        .transpose()
}

/// The caller's currently claimed tag. At most one row can match; ordering
/// by claim time is purely defensive.
pub async fn current_claim_for(
    conn: &mut sqlx::PgConnection,
    user: UserId,
    base_url: &str,
) -> anyhow::Result<Option<Tag>> {
    let sql = format!(
        "SELECT {TAG_COLUMNS} FROM tags WHERE owner_id = $1 AND status = 'claimed' ORDER BY claimed_at DESC LIMIT 1"
    );
    sqlx::query(&sql)
        .bind(user.0)
        .fetch_optional(conn)
        .await
        .with_context(|| format!("fetching current claim of user {:?}", user))?
        .map(|row| tag_from_row(&row, base_url))
        .transpose()
}

/// Explicit allowlist of the owner fields a projection may embed.
pub async fn owner_summary(
    conn: &mut sqlx::PgConnection,
    user: UserId,
) -> anyhow::Result<Option<OwnerSummary>> {
    let row = sqlx::query("SELECT id, name, handle, avatar_url FROM users WHERE id = $1")
        .bind(user.0)
        .fetch_optional(conn)
        .await
        .with_context(|| format!("fetching owner summary of user {:?}", user))?;
    row.map(|row| {
        Ok(OwnerSummary {
            id: UserId(row.try_get("id").context("retrieving the id field")?),
            name: row.try_get("name").context("retrieving the name field")?,
            handle: row
                .try_get("handle")
                .context("retrieving the handle field")?,
            avatar_url: row
                .try_get("avatar_url")
                .context("retrieving the avatar_url field")?,
        })
    })
    .transpose()
}

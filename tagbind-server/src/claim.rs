use anyhow::Context;
use chrono::Utc;
use sqlx::Connection;
use tagbind_api::{Tag, TagId, TagStatus, UserId};

use crate::{db, Error};

/// The claim protocol. The availability check, the release of the caller's
/// prior claim and the claim write commit (or roll back) as one unit: the
/// target row is locked up front, so two concurrent claims of the same tag
/// serialize on the lock and the loser sees the winner's committed status.
///
/// A caller disconnecting mid-claim drops the transaction, which rolls it
/// back in full.
pub async fn claim(
    conn: &mut sqlx::PgConnection,
    id: &TagId,
    user: UserId,
    auto_provision: bool,
    base_url: &str,
) -> Result<Tag, Error> {
    let mut txn = conn.begin().await.context("starting claim transaction")?;

    let tag = lock_or_provision(&mut txn, id, auto_provision, base_url).await?;

    if tag.status == TagStatus::Claimed && tag.owner_id == Some(user) {
        // idempotent no-op signal, the transaction rolls back on drop
        return Err(Error::already_claimed_by_self(id));
    }
    if tag.status != TagStatus::Available {
        return Err(Error::not_available(id));
    }

    // Release the caller's previous tag inside the same transaction, so no
    // interleaving can observe the user owning two tags or zero tags plus a
    // half-applied claim.
    let released = sqlx::query(
        "UPDATE tags SET status = 'available', owner_id = NULL, claimed_at = NULL \
         WHERE owner_id = $1 AND status = 'claimed' AND tag_id <> $2",
    )
    .bind(user.0)
    .bind(&id.0)
    .execute(&mut *txn)
    .await
    .map_err(|e| write_error(id, e, "releasing previous claim"))?;
    if released.rows_affected() > 1 {
        tracing::warn!(
            user = ?user,
            released = released.rows_affected(),
            "user somehow had more than one claimed tag"
        );
    }

    let claimed_at = Utc::now();
    let res = sqlx::query(
        "UPDATE tags SET status = 'claimed', owner_id = $2, claimed_at = $3 \
         WHERE tag_id = $1 AND status = 'available'",
    )
    .bind(&id.0)
    .bind(user.0)
    .bind(claimed_at)
    .execute(&mut *txn)
    .await
    .map_err(|e| write_error(id, e, "claiming tag"))?;
    if res.rows_affected() != 1 {
        // compare-and-set backstop: unreachable while we hold the row lock,
        // but a zero here must never commit as a claim
        return Err(Error::not_available(id));
    }

    txn.commit()
        .await
        .map_err(|e| write_error(id, e, "committing claim transaction"))?;

    Ok(Tag {
        status: TagStatus::Claimed,
        owner_id: Some(user),
        claimed_at: Some(claimed_at),
        ..tag
    })
}

/// Releases the caller's claimed tag, if any. A single statement, so it needs
/// no explicit transaction.
pub async fn release_own(
    conn: &mut sqlx::PgConnection,
    user: UserId,
    base_url: &str,
) -> Result<Option<Tag>, Error> {
    let sql = format!(
        "UPDATE tags SET status = 'available', owner_id = NULL, claimed_at = NULL \
         WHERE owner_id = $1 AND status = 'claimed' RETURNING {}",
        db::TAG_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(user.0)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("releasing claimed tag of user {:?}", user))?;
    Ok(row.map(|row| db::tag_from_row(&row, base_url)).transpose()?)
}

/// Fetches the target row under a row lock, provisioning it first when
/// allowed. A racing provisioner makes our insert come back empty; the row
/// exists by then and the re-select picks it up.
async fn lock_or_provision(
    txn: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: &TagId,
    auto_provision: bool,
    base_url: &str,
) -> Result<Tag, Error> {
    let select = format!(
        "SELECT {} FROM tags WHERE tag_id = $1 FOR UPDATE",
        db::TAG_COLUMNS
    );
    if let Some(row) = sqlx::query(&select)
        .bind(&id.0)
        .fetch_optional(&mut **txn)
        .await
        .map_err(|e| write_error(id, e, "locking tag"))?
    {
        return Ok(db::tag_from_row(&row, base_url)?);
    }
    if !auto_provision {
        return Err(Error::not_found(id));
    }
    let insert = format!(
        "INSERT INTO tags (tag_id, is_injected) VALUES ($1, TRUE) \
         ON CONFLICT (tag_id) DO NOTHING RETURNING {}",
        db::TAG_COLUMNS
    );
    let row = sqlx::query(&insert)
        .bind(&id.0)
        .fetch_optional(&mut **txn)
        .await
        .map_err(|e| write_error(id, e, "provisioning tag"))?;
    match row {
        Some(row) => Ok(db::tag_from_row(&row, base_url)?),
        None => {
            let row = sqlx::query(&select)
                .bind(&id.0)
                .fetch_optional(&mut **txn)
                .await
                .map_err(|e| write_error(id, e, "re-locking tag after provisioning race"))?
                .ok_or_else(|| {
                    anyhow::anyhow!("tag {id} vanished right after a provisioning race")
                })?;
            Ok(db::tag_from_row(&row, base_url)?)
        }
    }
}

/// Serialization failures and deadlocks mean a concurrent writer got to the
/// tag first; the caller may safely retry, so they surface as NotAvailable
/// rather than as internal errors.
fn write_error(id: &TagId, e: sqlx::Error, doing: &'static str) -> Error {
    let concurrent = matches!(
        e.as_database_error().and_then(|db| db.code()).as_deref(),
        Some("40001") | Some("40P01")
    );
    if concurrent {
        tracing::info!(tag_id = %id, "claim lost a concurrency race while {doing}");
        return Error::not_available(id);
    }
    Error::Anyhow(anyhow::Error::new(e).context(format!("{doing} for tag {id}")))
}

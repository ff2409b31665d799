use anyhow::{anyhow, Context};
use serde_json::json;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Invalid tag identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("Tag not found {0}")]
    NotFound(String),

    #[error("Tag not available for claiming {0}")]
    NotAvailable(String),

    #[error("Tag already claimed by this user {0}")]
    AlreadyClaimedBySelf(String),

    #[error("Tag identifier already used {0}")]
    Conflict(String),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotAvailable(_) => StatusCode::CONFLICT,
            Error::AlreadyClaimedBySelf(_) => StatusCode::CONFLICT,
            Error::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "success": false,
                "message": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "success": false,
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::InvalidIdentifier(id) => json!({
                "success": false,
                "message": "malformed tag identifier",
                "type": "invalid-identifier",
                "tag_id": id,
            }),
            Error::NotFound(id) => json!({
                "success": false,
                "message": "tag not found",
                "type": "not-found",
                "tag_id": id,
            }),
            Error::NotAvailable(id) => json!({
                "success": false,
                "message": "tag is not available for claiming",
                "type": "not-available",
                "tag_id": id,
            }),
            Error::AlreadyClaimedBySelf(id) => json!({
                "success": false,
                "message": "tag is already claimed by this user",
                "type": "already-claimed-by-self",
                "tag_id": id,
            }),
            Error::Conflict(id) => json!({
                "success": false,
                "message": "tag identifier already used",
                "type": "conflict",
                "tag_id": id,
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let tag_id = || -> anyhow::Result<String> {
            Ok(String::from(
                data.get("tag_id")
                    .and_then(|id| id.as_str())
                    .ok_or_else(|| anyhow!("error refers to a tag but carries no tag_id"))?,
            ))
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                "permission-denied" => Error::PermissionDenied,
                "invalid-identifier" => Error::InvalidIdentifier(tag_id()?),
                "not-found" => Error::NotFound(tag_id()?),
                "not-available" => Error::NotAvailable(tag_id()?),
                "already-claimed-by-self" => Error::AlreadyClaimedBySelf(tag_id()?),
                "conflict" => Error::Conflict(tag_id()?),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}

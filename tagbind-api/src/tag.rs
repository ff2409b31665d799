use rand::Rng;

use crate::{Error, OwnerSummary, Time, UserId};

/// Opaque identifier burnt into the physical tag.
#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct TagId(pub String);

impl TagId {
    /// Length of server-generated identifiers.
    pub const GENERATED_LEN: usize = 16;

    /// Minimum length accepted on public-facing claim and lookup paths.
    /// Shorter identifiers are rejected before any store access.
    pub const MIN_PUBLIC_LEN: usize = 20;

    pub fn generate() -> TagId {
        let id = rand::thread_rng()
            .sample_iter(rand::distributions::Alphanumeric)
            .take(Self::GENERATED_LEN)
            .map(|c| (c as char).to_ascii_uppercase())
            .collect::<String>();
        TagId(id)
    }

    pub fn validate_public(&self) -> Result<(), Error> {
        if self.0.len() < Self::MIN_PUBLIC_LEN {
            return Err(Error::InvalidIdentifier(self.0.clone()));
        }
        Ok(())
    }

    /// Display URL for the tag, derived from the identifier and never stored.
    pub fn url(&self, base: &str) -> String {
        format!("{}/t/{}", base.trim_end_matches('/'), self.0)
    }
}

impl std::fmt::Display for TagId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagStatus {
    Available,
    Claimed,
    Disabled,
}

impl TagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagStatus::Available => "available",
            TagStatus::Claimed => "claimed",
            TagStatus::Disabled => "disabled",
        }
    }
}

impl std::str::FromStr for TagStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<TagStatus> {
        match s {
            "available" => Ok(TagStatus::Available),
            "claimed" => Ok(TagStatus::Claimed),
            "disabled" => Ok(TagStatus::Disabled),
            _ => Err(anyhow::anyhow!("unknown tag status {s:?}")),
        }
    }
}

/// Statuses an administrator may force a tag into. `claimed` is deliberately
/// absent: the claim protocol is the only path into it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminStatus {
    Available,
    Disabled,
}

impl From<AdminStatus> for TagStatus {
    fn from(s: AdminStatus) -> TagStatus {
        match s {
            AdminStatus::Available => TagStatus::Available,
            AdminStatus::Disabled => TagStatus::Disabled,
        }
    }
}

/// Canonical tag record. `status = claimed` iff `owner_id` and `claimed_at`
/// are both set.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Tag {
    pub tag_id: TagId,
    pub tag_url: String,
    pub status: TagStatus,
    pub owner_id: Option<UserId>,
    pub claimed_at: Option<Time>,
    pub is_injected: bool,
    pub viewed_count: i64,
    pub created_at: Time,
}

/// A tag record with its owner summary resolved, as returned by claim.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct TagWithOwner {
    #[serde(flatten)]
    pub tag: Tag,
    pub owner: Option<OwnerSummary>,
}

/// Redacted projection served to unauthenticated scan lookups. A disabled
/// tag exposes only identity, status and counters; everything else stays out
/// of the response body entirely.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PublicView {
    pub tag_id: TagId,
    pub status: TagStatus,
    pub viewed_count: i64,
    pub created_at: Time,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_injected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerSummary>,
}

impl PublicView {
    pub fn of(tag: &Tag, owner: Option<OwnerSummary>) -> PublicView {
        match tag.status {
            TagStatus::Disabled => PublicView::redacted(tag),
            _ => PublicView {
                tag_id: tag.tag_id.clone(),
                status: tag.status,
                viewed_count: tag.viewed_count,
                created_at: tag.created_at,
                tag_url: Some(tag.tag_url.clone()),
                claimed_at: tag.claimed_at,
                is_injected: Some(tag.is_injected),
                owner,
            },
        }
    }

    fn redacted(tag: &Tag) -> PublicView {
        PublicView {
            tag_id: tag.tag_id.clone(),
            status: tag.status,
            viewed_count: tag.viewed_count,
            created_at: tag.created_at,
            tag_url: None,
            claimed_at: None,
            is_injected: None,
            owner: None,
        }
    }
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
pub struct NewTag {
    pub tag_id: Option<TagId>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct SetInjected {
    pub is_injected: bool,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct SetStatus {
    pub status: AdminStatus,
}

/// Conjunctive filters for the administrative list operation.
#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
pub struct TagFilter {
    pub status: Option<TagStatus>,
    pub owner_id: Option<UserId>,
    pub is_injected: Option<bool>,
}

#[derive(Clone, Copy, Debug, serde::Deserialize, serde::Serialize)]
pub struct Page {
    #[serde(default = "Page::default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl Page {
    fn default_limit() -> i64 {
        1000
    }
}

impl Default for Page {
    fn default() -> Page {
        Page {
            limit: Page::default_limit(),
            offset: 0,
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct TagList {
    pub tags: Vec<Tag>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

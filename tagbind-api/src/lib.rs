use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

mod error;
mod tag;

pub use error::Error;
pub use tag::{
    AdminStatus, NewTag, Page, PublicView, SetInjected, SetStatus, Tag, TagFilter, TagId, TagList,
    TagStatus, TagWithOwner,
};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn stub() -> UserId {
        UserId(STUB_UUID)
    }
}

/// The allowlisted subset of a user record that may be embedded in a tag
/// projection. Anything not listed here (credentials, contact details beyond
/// the public handle) never crosses the wire.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct OwnerSummary {
    pub id: UserId,
    pub name: String,
    pub handle: Option<String>,
    pub avatar_url: Option<String>,
}

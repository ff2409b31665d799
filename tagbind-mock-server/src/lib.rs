//! In-memory model of the tagbind server surface, with the same state
//! machine and error vocabulary as the real thing. Backs the integration
//! tests, which replay operation sequences against it.

use std::collections::{btree_map, BTreeMap, HashMap};

use chrono::{Duration, TimeZone, Utc};
use tagbind_api::{
    AdminStatus, Error, OwnerSummary, Page, PublicView, Tag, TagFilter, TagId, TagList, TagStatus,
    Time, UserId,
};

const BASE_URL: &str = "https://tags.example.org";

pub struct MockServer {
    auto_provision: bool,
    users: HashMap<UserId, OwnerSummary>,
    tags: BTreeMap<TagId, MockTag>,
    // stands in for the wall clock so creation order is always strict
    now_seq: i64,
}

#[derive(Clone, Debug)]
struct MockTag {
    status: TagStatus,
    owner_id: Option<UserId>,
    claimed_at: Option<Time>,
    is_injected: bool,
    viewed_count: i64,
    created_at: Time,
}

impl MockTag {
    fn to_tag(&self, id: &TagId) -> Tag {
        Tag {
            tag_url: id.url(BASE_URL),
            tag_id: id.clone(),
            status: self.status,
            owner_id: self.owner_id,
            claimed_at: self.claimed_at,
            is_injected: self.is_injected,
            viewed_count: self.viewed_count,
            created_at: self.created_at,
        }
    }

    fn matches(&self, f: &TagFilter) -> bool {
        f.status.map_or(true, |s| s == self.status)
            && f.owner_id.map_or(true, |o| Some(o) == self.owner_id)
            && f.is_injected.map_or(true, |i| i == self.is_injected)
    }
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer {
            auto_provision: true,
            users: HashMap::new(),
            tags: BTreeMap::new(),
            now_seq: 0,
        }
    }

    pub fn with_auto_provision(auto_provision: bool) -> MockServer {
        MockServer {
            auto_provision,
            ..MockServer::new()
        }
    }

    pub fn add_user(&mut self, user: OwnerSummary) {
        self.users.insert(user.id, user);
    }

    fn now(&mut self) -> Time {
        self.now_seq += 1;
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(self.now_seq)
    }

    pub fn admin_create_tag(&mut self, id: Option<TagId>) -> Result<Tag, Error> {
        let id = match id {
            Some(id) => match self.tags.contains_key(&id) {
                true => return Err(Error::Conflict(id.0)),
                false => id,
            },
            None => loop {
                let id = TagId::generate();
                if !self.tags.contains_key(&id) {
                    break id;
                }
            },
        };
        // only now that the operation is sure to go through
        let created_at = self.now();
        match self.tags.entry(id.clone()) {
            btree_map::Entry::Occupied(_) => Err(Error::Conflict(id.0)),
            btree_map::Entry::Vacant(entry) => Ok(entry
                .insert(MockTag {
                    status: TagStatus::Available,
                    owner_id: None,
                    claimed_at: None,
                    is_injected: false,
                    viewed_count: 0,
                    created_at,
                })
                .to_tag(&id)),
        }
    }

    pub fn admin_list_tags(&self, f: &TagFilter, page: &Page) -> TagList {
        let mut matching = self
            .tags
            .iter()
            .filter(|(_, t)| t.matches(f))
            .collect::<Vec<_>>();
        matching.sort_by(|(aid, a), (bid, b)| {
            b.created_at.cmp(&a.created_at).then_with(|| aid.cmp(bid))
        });
        let total = matching.len() as i64;
        let tags = matching
            .into_iter()
            .skip(page.offset.max(0) as usize)
            .take(page.limit.max(0) as usize)
            .map(|(id, t)| t.to_tag(id))
            .collect();
        TagList {
            tags,
            total,
            limit: page.limit,
            offset: page.offset,
        }
    }

    pub fn admin_delete_tag(&mut self, id: &TagId) -> Result<(), Error> {
        match self.tags.remove(id) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(id.0.clone())),
        }
    }

    pub fn admin_set_injected(&mut self, id: &TagId, injected: bool) -> Result<Tag, Error> {
        let tag = self
            .tags
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.0.clone()))?;
        tag.is_injected = injected;
        Ok(tag.to_tag(id))
    }

    pub fn admin_set_status(&mut self, id: &TagId, status: AdminStatus) -> Result<Tag, Error> {
        let tag = self
            .tags
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.0.clone()))?;
        tag.status = TagStatus::from(status);
        tag.owner_id = None;
        tag.claimed_at = None;
        Ok(tag.to_tag(id))
    }

    fn ensure(&mut self, id: &TagId) -> Result<(), Error> {
        if self.tags.contains_key(id) {
            return Ok(());
        }
        if !self.auto_provision {
            return Err(Error::NotFound(id.0.clone()));
        }
        let created_at = self.now();
        self.tags.insert(
            id.clone(),
            MockTag {
                status: TagStatus::Available,
                owner_id: None,
                claimed_at: None,
                is_injected: true,
                viewed_count: 0,
                created_at,
            },
        );
        Ok(())
    }

    pub fn claim(&mut self, id: &TagId, user: UserId) -> Result<Tag, Error> {
        id.validate_public()?;
        self.ensure(id)?;

        let tag = self.tags.get(id).expect("tag was just ensured");
        if tag.status == TagStatus::Claimed && tag.owner_id == Some(user) {
            return Err(Error::AlreadyClaimedBySelf(id.0.clone()));
        }
        if tag.status != TagStatus::Available {
            return Err(Error::NotAvailable(id.0.clone()));
        }
        // a rejected claim must leave the clock alone, like a rolled-back
        // transaction would
        let claimed_at = self.now();

        // both writes or neither: the checks above already ruled out every
        // failure, mirroring the server's single transaction
        for (tid, t) in self.tags.iter_mut() {
            if t.owner_id == Some(user) && t.status == TagStatus::Claimed && tid != id {
                t.status = TagStatus::Available;
                t.owner_id = None;
                t.claimed_at = None;
            }
        }
        let tag = self.tags.get_mut(id).expect("tag was just ensured");
        tag.status = TagStatus::Claimed;
        tag.owner_id = Some(user);
        tag.claimed_at = Some(claimed_at);
        Ok(tag.to_tag(id))
    }

    pub fn release_own(&mut self, user: UserId) -> Option<Tag> {
        let id = self
            .tags
            .iter()
            .find(|(_, t)| t.owner_id == Some(user) && t.status == TagStatus::Claimed)
            .map(|(id, _)| id.clone())?;
        let tag = self.tags.get_mut(&id).expect("tag was just found");
        tag.status = TagStatus::Available;
        tag.owner_id = None;
        tag.claimed_at = None;
        Some(tag.to_tag(&id))
    }

    pub fn own_tag(&self, user: UserId) -> Option<Tag> {
        let mut claimed = self
            .tags
            .iter()
            .filter(|(_, t)| t.owner_id == Some(user) && t.status == TagStatus::Claimed)
            .collect::<Vec<_>>();
        claimed.sort_by_key(|(_, t)| std::cmp::Reverse(t.claimed_at));
        claimed.first().map(|(id, t)| t.to_tag(id))
    }

    pub fn lookup_public(&mut self, id: &TagId) -> Result<PublicView, Error> {
        id.validate_public()?;
        self.ensure(id)?;
        let tag = self.tags.get_mut(id).expect("tag was just ensured");
        tag.viewed_count += 1;
        let tag = tag.to_tag(id);
        let owner = match (tag.status, tag.owner_id) {
            (TagStatus::Disabled, _) | (_, None) => None,
            (_, Some(owner_id)) => self.users.get(&owner_id).cloned(),
        };
        Ok(PublicView::of(&tag, owner))
    }

    /// Raw record access for test assertions.
    pub fn test_tag(&self, id: &TagId) -> Option<Tag> {
        self.tags.get(id).map(|t| t.to_tag(id))
    }

    pub fn test_num_tags(&self) -> usize {
        self.tags.len()
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}

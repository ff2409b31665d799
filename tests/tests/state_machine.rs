//! Replays the tag lifecycle against the in-memory server model and checks
//! the registry's guarantees: identifier uniqueness, claim exclusivity,
//! single claim per user, ownership-field consistency, idempotent
//! provisioning and view-count accounting.

use tagbind_api::{Error, Page, TagFilter, TagId, TagStatus, UserId, Uuid};
use tagbind_mock_server::MockServer;
use tests::{assert_ownership_consistent, owner, public_id, user};

#[test]
fn generated_identifiers_never_collide() {
    let mut server = MockServer::new();
    for _ in 0..500 {
        server.admin_create_tag(None).expect("creating tag");
    }
    assert_eq!(server.test_num_tags(), 500);
}

#[test]
fn explicit_identifier_reuse_is_a_conflict() {
    let mut server = MockServer::new();
    let id = public_id(1);
    server
        .admin_create_tag(Some(id.clone()))
        .expect("creating tag");
    assert_eq!(
        server.admin_create_tag(Some(id.clone())),
        Err(Error::Conflict(id.0))
    );
    assert_eq!(server.test_num_tags(), 1);
}

#[test]
fn rebinding_moves_the_claim_and_releases_the_old_tag() {
    // scenario A
    let mut server = MockServer::new();
    let u1 = user(1);
    let t1 = public_id(1);
    let t2 = public_id(2);

    let claimed = server.claim(&t1, u1).expect("claiming t1");
    assert_eq!(claimed.status, TagStatus::Claimed);
    assert_eq!(claimed.owner_id, Some(u1));
    assert_ownership_consistent(&claimed);

    let claimed = server.claim(&t2, u1).expect("claiming t2");
    assert_eq!(claimed.owner_id, Some(u1));
    assert_ownership_consistent(&claimed);

    let t1_after = server.test_tag(&t1).expect("t1 still exists");
    assert_eq!(t1_after.status, TagStatus::Available);
    assert_eq!(t1_after.owner_id, None);
    assert_eq!(t1_after.claimed_at, None);
    assert_ownership_consistent(&t1_after);
}

#[test]
fn a_claimed_tag_rejects_other_claimers() {
    // scenario B, after the race has been serialized by the store
    let mut server = MockServer::new();
    let t3 = public_id(3);
    server.claim(&t3, user(2)).expect("first claim wins");
    assert_eq!(
        server.claim(&t3, user(3)),
        Err(Error::NotAvailable(t3.0.clone()))
    );
    let t3_after = server.test_tag(&t3).expect("t3 exists");
    assert_eq!(t3_after.owner_id, Some(user(2)));
}

#[test]
fn reclaiming_ones_own_tag_is_a_distinct_no_op() {
    let mut server = MockServer::new();
    let id = public_id(4);
    server.claim(&id, user(1)).expect("claiming");
    assert_eq!(
        server.claim(&id, user(1)),
        Err(Error::AlreadyClaimedBySelf(id.0.clone()))
    );
    // no state change
    let after = server.test_tag(&id).expect("tag exists");
    assert_eq!(after.owner_id, Some(user(1)));
    assert_eq!(after.status, TagStatus::Claimed);
}

#[test]
fn a_user_never_holds_more_than_one_claim() {
    let mut server = MockServer::new();
    let u = user(7);
    for n in 0..20 {
        server.claim(&public_id(n), u).expect("claiming");
        let claimed = server
            .admin_list_tags(
                &TagFilter {
                    status: Some(TagStatus::Claimed),
                    owner_id: Some(u),
                    is_injected: None,
                },
                &Page::default(),
            )
            .tags;
        assert_eq!(claimed.len(), 1);
        for tag in &claimed {
            assert_ownership_consistent(tag);
        }
    }
}

#[test]
fn short_identifiers_are_rejected_before_any_store_access() {
    // scenario C
    let mut server = MockServer::new();
    let short = TagId(String::from("shortid"));
    assert_eq!(
        server.lookup_public(&short),
        Err(Error::InvalidIdentifier(String::from("shortid")))
    );
    assert_eq!(
        server.claim(&short, user(1)),
        Err(Error::InvalidIdentifier(String::from("shortid")))
    );
    assert_eq!(server.test_num_tags(), 0);
}

#[test]
fn first_lookup_provisions_an_injected_tag() {
    // scenario D
    let mut server = MockServer::new();
    let id = public_id(9);
    let view = server.lookup_public(&id).expect("looking up");
    assert_eq!(view.status, TagStatus::Available);
    assert_eq!(view.is_injected, Some(true));
    assert_eq!(view.viewed_count, 1);
    assert_eq!(server.test_num_tags(), 1);
}

#[test]
fn repeated_lookups_of_one_identifier_share_a_single_row() {
    let mut server = MockServer::new();
    let id = public_id(10);
    for n in 1..=10 {
        let view = server.lookup_public(&id).expect("looking up");
        assert_eq!(view.viewed_count, n);
    }
    assert_eq!(server.test_num_tags(), 1);
}

#[test]
fn provisioning_can_be_turned_off() {
    let mut server = MockServer::with_auto_provision(false);
    let id = public_id(11);
    assert_eq!(
        server.lookup_public(&id),
        Err(Error::NotFound(id.0.clone()))
    );
    assert_eq!(server.claim(&id, user(1)), Err(Error::NotFound(id.0.clone())));
    assert_eq!(server.test_num_tags(), 0);
}

#[test]
fn view_counting_survives_interleaved_claims() {
    let mut server = MockServer::new();
    let id = public_id(12);
    server.lookup_public(&id).expect("provisioning lookup");
    server.claim(&id, user(1)).expect("claiming");
    server.lookup_public(&id).expect("looking up claimed tag");
    server.claim(&public_id(13), user(1)).expect("rebinding away");
    let view = server.lookup_public(&id).expect("looking up released tag");
    assert_eq!(view.viewed_count, 3);
}

#[test]
fn disabled_tags_are_redacted_and_unclaimable() {
    // scenario E
    let mut server = MockServer::new();
    server.add_user(owner(1, "alice"));
    let id = public_id(14);
    server.claim(&id, user(1)).expect("claiming");
    server
        .admin_set_status(&id, tagbind_api::AdminStatus::Disabled)
        .expect("disabling");

    let after = server.test_tag(&id).expect("tag exists");
    assert_eq!(after.status, TagStatus::Disabled);
    assert_eq!(after.owner_id, None);
    assert_ownership_consistent(&after);

    let view = server.lookup_public(&id).expect("looking up disabled tag");
    let json = serde_json::to_value(&view).expect("serializing view");
    let mut keys = json
        .as_object()
        .expect("view is an object")
        .keys()
        .map(String::as_str)
        .collect::<Vec<_>>();
    keys.sort();
    assert_eq!(keys, ["created_at", "status", "tag_id", "viewed_count"]);

    assert_eq!(
        server.claim(&id, user(2)),
        Err(Error::NotAvailable(id.0.clone()))
    );
}

#[test]
fn claimed_lookups_embed_the_owner_summary() {
    let mut server = MockServer::new();
    server.add_user(owner(1, "alice"));
    let id = public_id(15);
    server.claim(&id, user(1)).expect("claiming");
    let view = server.lookup_public(&id).expect("looking up");
    let summary = view.owner.expect("owner summary present");
    assert_eq!(summary.name, "alice");
    assert_eq!(summary.handle.as_deref(), Some("@alice"));
}

#[test]
fn own_tag_follows_the_current_claim() {
    let mut server = MockServer::new();
    let u = user(5);
    assert_eq!(server.own_tag(u), None);

    server.claim(&public_id(16), u).expect("claiming");
    server.claim(&public_id(17), u).expect("rebinding");
    assert_eq!(server.own_tag(u).expect("has a claim").tag_id, public_id(17));

    let released = server.release_own(u).expect("releasing");
    assert_eq!(released.tag_id, public_id(17));
    assert_eq!(released.status, TagStatus::Available);
    assert_eq!(server.own_tag(u), None);
    assert_eq!(server.release_own(u), None);
}

#[test]
fn injected_flag_is_orthogonal_to_ownership() {
    let mut server = MockServer::new();
    let id = public_id(18);
    server.claim(&id, user(1)).expect("claiming");
    let updated = server.admin_set_injected(&id, true).expect("marking injected");
    assert_eq!(updated.status, TagStatus::Claimed);
    assert_eq!(updated.owner_id, Some(user(1)));
    assert!(updated.is_injected);
}

#[test]
fn deletion_is_unconditional_and_final() {
    let mut server = MockServer::new();
    let id = public_id(19);
    server.claim(&id, user(1)).expect("claiming");
    server.admin_delete_tag(&id).expect("deleting claimed tag");
    assert_eq!(server.test_tag(&id), None);
    assert_eq!(
        server.admin_delete_tag(&id),
        Err(Error::NotFound(id.0.clone()))
    );
    // the deleted claim is gone with the row
    assert_eq!(server.own_tag(user(1)), None);
}

#[test]
fn admin_list_filters_conjunctively_and_paginates() {
    let mut server = MockServer::new();
    for _ in 0..5 {
        server.admin_create_tag(None).expect("creating tag");
    }
    let u = user(1);
    server.claim(&public_id(20), u).expect("claiming");
    server
        .admin_set_status(&public_id(21), tagbind_api::AdminStatus::Disabled)
        .unwrap_err();
    server
        .admin_create_tag(Some(public_id(21)))
        .expect("creating tag");
    server
        .admin_set_status(&public_id(21), tagbind_api::AdminStatus::Disabled)
        .expect("disabling");

    let all = server.admin_list_tags(&TagFilter::default(), &Page::default());
    assert_eq!(all.total, 7);
    assert_eq!(all.tags.len(), 7);
    // newest first
    assert_eq!(all.tags.first().expect("non-empty").tag_id, public_id(21));

    let claimed_by_u = server.admin_list_tags(
        &TagFilter {
            status: Some(TagStatus::Claimed),
            owner_id: Some(u),
            is_injected: Some(true),
        },
        &Page::default(),
    );
    assert_eq!(claimed_by_u.total, 1);
    assert_eq!(claimed_by_u.tags[0].tag_id, public_id(20));

    let page = server.admin_list_tags(&TagFilter::default(), &Page { limit: 3, offset: 5 });
    assert_eq!(page.total, 7);
    assert_eq!(page.tags.len(), 2);
}

#[test]
fn unknown_users_still_claim_but_project_no_summary() {
    let mut server = MockServer::new();
    let ghost = UserId(Uuid::new_v4());
    let id = public_id(22);
    server.claim(&id, ghost).expect("claiming without a user record");
    let view = server.lookup_public(&id).expect("looking up");
    assert_eq!(view.status, TagStatus::Claimed);
    assert_eq!(view.owner, None);
}

#[test]
fn rejected_operations_do_not_tick_the_clock() {
    let mut server = MockServer::new();
    let first = server.claim(&public_id(23), user(1)).expect("claiming");
    let tick = first.claimed_at.expect("claimed tag has a claim time") - first.created_at;

    // none of these go through, so none of them may consume a timestamp
    server.claim(&public_id(23), user(1)).unwrap_err();
    server.claim(&public_id(23), user(2)).unwrap_err();
    server.admin_create_tag(Some(public_id(23))).unwrap_err();

    let second = server.claim(&public_id(24), user(1)).expect("claiming");
    assert_eq!(
        second.created_at - first.claimed_at.expect("claimed tag has a claim time"),
        tick
    );
}

//! Prints SQL seeding a development database with users and tags in every
//! lifecycle state. Pipe into psql against a freshly migrated database.

use rand::Rng;
use tagbind_api::{TagId, Uuid};

const NUM_USERS: usize = 5;
const NUM_AVAILABLE: usize = 20;
const NUM_CLAIMED: usize = 5;
const NUM_DISABLED: usize = 3;
const NUM_PROVISIONED: usize = 10;

fn gen_n_items(table: &str, n: usize, mut f: impl FnMut(usize) -> String) {
    println!("INSERT INTO {} VALUES", table);
    for i in 0..n {
        if i != 0 {
            println!(",");
        }
        print!("    {}", f(i));
    }
    println!();
    println!("ON CONFLICT DO NOTHING;");
}

/// 24-character identifier, as a scanned-in-the-field tag would carry.
fn gen_public_id() -> String {
    let mut id = TagId::generate().0;
    id.push_str(&TagId::generate().0[..8]);
    id
}

fn gen_viewed() -> i64 {
    rand::thread_rng().gen_range(0..500)
}

fn main() {
    let users = (0..NUM_USERS).map(|_| Uuid::new_v4()).collect::<Vec<_>>();

    gen_n_items("users (id, name, handle, avatar_url)", NUM_USERS, |i| {
        format!("('{}', 'user-{i}', '@user-{i}', NULL)", users[i])
    });

    gen_n_items(
        "tags (tag_id, status, is_injected, viewed_count)",
        NUM_AVAILABLE,
        |_| {
            format!(
                "('{}', 'available', FALSE, {})",
                TagId::generate(),
                gen_viewed()
            )
        },
    );

    gen_n_items(
        "tags (tag_id, status, owner_id, claimed_at, is_injected, viewed_count)",
        NUM_CLAIMED,
        |i| {
            format!(
                "('{}', 'claimed', '{}', now(), TRUE, {})",
                gen_public_id(),
                users[i % NUM_USERS],
                gen_viewed()
            )
        },
    );

    gen_n_items(
        "tags (tag_id, status, is_injected, viewed_count)",
        NUM_DISABLED,
        |_| format!("('{}', 'disabled', TRUE, {})", gen_public_id(), gen_viewed()),
    );

    gen_n_items(
        "tags (tag_id, status, is_injected, viewed_count)",
        NUM_PROVISIONED,
        |_| format!("('{}', 'available', TRUE, {})", gen_public_id(), gen_viewed()),
    );
}

use crate::common::{column, ids_where, int, registry, seed_comments, text};
use lifeline::value::is_null;
use lifeline::{row, Context, HasMany, MemoryStore, Meta, Record, Registry};

// ============================================================================
// Membership changes
// ============================================================================

#[test]
fn test_replace_members_reconciles_and_counts() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_comments(&store);
    let ctx = Context::new(&registry, &store);

    let post = Record::find(&ctx, "post", 5i64).unwrap();
    post.set_many(&ctx, "comments", [2i64, 3, 4]).unwrap();
    post.save(&ctx).unwrap();

    assert_eq!(column(&store, "comments", 1, "post_id"), int(0));
    assert_eq!(column(&store, "comments", 4, "post_id"), int(5));
    assert_eq!(ids_where(&store, "comments", "post_id", 5), vec![2, 3, 4]);

    assert_eq!(column(&store, "posts", 5, "comments_count"), int(3));
    assert_eq!(post.get("comments_count"), Some(int(3)));
    assert!(!post.has_changes());
    assert_eq!(post.collection(&ctx, "comments").unwrap().ids(), vec![2, 3, 4]);
}

#[test]
fn test_add_and_remove() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_comments(&store);
    let ctx = Context::new(&registry, &store);

    let post = Record::find(&ctx, "post", 5i64).unwrap();
    post.remove_from(&ctx, "comments", 2).unwrap();
    post.add_to(&ctx, "comments", 4i64).unwrap();
    post.save(&ctx).unwrap();

    assert_eq!(ids_where(&store, "comments", "post_id", 5), vec![1, 3, 4]);
    assert_eq!(column(&store, "comments", 2, "post_id"), int(0));
    assert_eq!(post.get("comments_count"), Some(int(3)));
}

#[test]
fn test_removed_member_already_moved_is_left_alone() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_comments(&store);
    let ctx = Context::new(&registry, &store);

    let post = Record::find(&ctx, "post", 5i64).unwrap();
    post.remove_from(&ctx, "comments", 3).unwrap();

    // comment 3 moves to post 6 behind this owner's back
    store.put("comments", row([("id", int(3)), ("post_id", int(6)), ("body", text("nice"))]));
    post.save(&ctx).unwrap();

    assert_eq!(column(&store, "comments", 3, "post_id"), int(6));
    assert_eq!(post.get("comments_count"), Some(int(2)));
}

#[test]
fn test_custom_foreign_default() {
    let registry = Registry::builder()
        .model(Meta::new("post").has_many("comments", HasMany::new().foreign_default(-1)))
        .model(Meta::new("comment"))
        .build()
        .unwrap();
    let store = MemoryStore::new();
    seed_comments(&store);
    let ctx = Context::new(&registry, &store);

    let post = Record::find(&ctx, "post", 5i64).unwrap();
    post.remove_from(&ctx, "comments", 1).unwrap();
    post.save(&ctx).unwrap();

    assert_eq!(column(&store, "comments", 1, "post_id"), int(-1));
}

#[test]
fn test_registry_wide_foreign_default() {
    let registry = Registry::builder()
        .foreign_default(-7)
        .model(Meta::new("post").has_many("comments", HasMany::new()))
        .model(Meta::new("comment"))
        .build()
        .unwrap();
    let store = MemoryStore::new();
    seed_comments(&store);
    let ctx = Context::new(&registry, &store);

    let post = Record::find(&ctx, "post", 5i64).unwrap();
    post.set_many(&ctx, "comments", Vec::<i64>::new()).unwrap();
    post.save(&ctx).unwrap();

    for id in [1, 2, 3] {
        assert_eq!(column(&store, "comments", id, "post_id"), int(-7));
    }
    assert_eq!(column(&store, "comments", 4, "post_id"), int(6));
}

// ============================================================================
// New owners and members
// ============================================================================

#[test]
fn test_new_owner_with_new_members() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_comments(&store);
    let ctx = Context::new(&registry, &store);

    let post = Record::build(&ctx, "post").unwrap();
    post.set("title", "fresh");
    let first = Record::build(&ctx, "comment").unwrap();
    first.set("body", "one");
    let second = Record::build(&ctx, "comment").unwrap();
    second.set("body", "two");
    post.set_many(&ctx, "comments", [first.clone(), second.clone()]).unwrap();
    post.save(&ctx).unwrap();

    let post_id = post.id().unwrap();
    let mut expected = vec![first.id().unwrap(), second.id().unwrap()];
    expected.sort_unstable();
    assert_eq!(ids_where(&store, "comments", "post_id", post_id), expected);
    assert_eq!(first.get("post_id"), Some(int(post_id)));
    assert_eq!(column(&store, "posts", post_id, "comments_count"), int(2));
}

#[test]
fn test_invalid_member_blocks_save() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_comments(&store);
    let ctx = Context::new(&registry, &store);

    let post = Record::find(&ctx, "post", 5i64).unwrap();
    let blank = Record::build(&ctx, "comment").unwrap();
    post.add_to(&ctx, "comments", blank.clone()).unwrap();

    assert!(post.save(&ctx).is_err());
    assert_eq!(store.writes(), 0);
    assert_eq!(post.errors()["comments"][0].0, "association");
    assert!(blank.errors().contains("body"));
}

#[test]
fn test_unsaved_owner_collection_is_empty() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_comments(&store);
    let ctx = Context::new(&registry, &store);

    let post = Record::build(&ctx, "post").unwrap();
    assert!(post.collection(&ctx, "comments").unwrap().is_empty());
    assert_eq!(store.statements(), 0);
}

#[test]
fn test_fetch_requires_persisted_owner() {
    let registry = registry();
    let store = MemoryStore::new();
    let ctx = Context::new(&registry, &store);

    let post = Record::build(&ctx, "post").unwrap();
    let comments = registry.has_many("post", "comments").unwrap();
    let err = comments.fetch(&ctx, &post).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("post->comments"));
}

#[test]
fn test_unloaded_owner_with_explicit_id_is_not_persisted() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_comments(&store);
    let ctx = Context::new(&registry, &store);

    let post = Record::build(&ctx, "post").unwrap();
    post.set("id", 5i64);
    assert!(!post.loaded());

    let comments = registry.has_many("post", "comments").unwrap();
    assert!(comments.fetch(&ctx, &post).unwrap_err().is_configuration());
    assert!(post.collection(&ctx, "comments").unwrap().is_empty());
    assert_eq!(store.statements(), 0);
}

#[test]
fn test_members_fetches_keys() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_comments(&store);
    let ctx = Context::new(&registry, &store);

    let post = Record::find(&ctx, "post", 5i64).unwrap();
    post.add_to(&ctx, "comments", 4i64).unwrap();
    let members = post.members(&ctx, "comments").unwrap();
    let ids: Vec<i64> = members.iter().filter_map(|m| m.id()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}

// ============================================================================
// Polymorphic
// ============================================================================

fn seed_notes(store: &MemoryStore) {
    store.put("posts", row([("id", int(5)), ("title", text("hello"))]));
    store.put(
        "comments",
        row([("id", int(10)), ("commentable_id", int(5)), ("commentable_model", text("post")), ("body", text("a"))]),
    );
    store.put(
        "comments",
        row([("id", int(11)), ("commentable_id", int(5)), ("commentable_model", text("user")), ("body", text("b"))]),
    );
    store.put("comments", row([("id", int(12)), ("body", text("c"))]));
}

#[test]
fn test_polymorphic_collection() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_notes(&store);
    let ctx = Context::new(&registry, &store);

    let post = Record::find(&ctx, "post", 5i64).unwrap();
    assert_eq!(post.collection(&ctx, "notes").unwrap().ids(), vec![10]);

    post.set_many(&ctx, "notes", [12i64]).unwrap();
    post.save(&ctx).unwrap();

    assert_eq!(column(&store, "comments", 10, "commentable_id"), int(0));
    assert!(is_null(&column(&store, "comments", 10, "commentable_model")));
    assert_eq!(column(&store, "comments", 11, "commentable_model"), text("user"));
    assert_eq!(column(&store, "comments", 12, "commentable_id"), int(5));
    assert_eq!(column(&store, "comments", 12, "commentable_model"), text("post"));
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_unchanged_collection_writes_nothing() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_comments(&store);
    let ctx = Context::new(&registry, &store);

    let post = Record::find(&ctx, "post", 5i64).unwrap();
    post.save(&ctx).unwrap();
    assert_eq!(store.writes(), 0);

    post.add_to(&ctx, "comments", 4i64).unwrap();
    post.save(&ctx).unwrap();
    let writes = store.writes();
    post.save(&ctx).unwrap();
    assert_eq!(store.writes(), writes);
}

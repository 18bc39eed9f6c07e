use crate::common::{column, ids_where, int, registry, seed_profiles, text};
use lifeline::value::is_null;
use lifeline::{row, Context, HasOne, MemoryStore, Meta, One, OrmError, Record, Registry};
use sea_query::Value;
use std::rc::Rc;

// ============================================================================
// Reassignment
// ============================================================================

#[test]
fn test_reassign_by_key_clears_previous_row() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_profiles(&store);
    let ctx = Context::new(&registry, &store);

    let user = Record::find(&ctx, "user", 5i64).unwrap();
    user.set_one("profile", 9i64);
    user.save(&ctx).unwrap();

    assert!(is_null(&column(&store, "profiles", 1, "user_id")));
    assert_eq!(column(&store, "profiles", 9, "user_id"), int(5));
    assert_eq!(ids_where(&store, "profiles", "user_id", 5), vec![9]);
}

#[test]
fn test_reassign_by_record() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_profiles(&store);
    let ctx = Context::new(&registry, &store);

    let user = Record::find(&ctx, "user", 5i64).unwrap();
    let profile = Record::find(&ctx, "profile", 9i64).unwrap();
    user.set_one("profile", &profile);
    user.save(&ctx).unwrap();

    assert_eq!(profile.get("user_id"), Some(int(5)));
    assert!(profile.saved());
    assert_eq!(ids_where(&store, "profiles", "user_id", 5), vec![9]);

    let current = user.one(&ctx, "profile").unwrap().unwrap();
    assert!(Rc::ptr_eq(&current, &profile));
}

#[test]
fn test_new_record_is_inserted_with_owner_key() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_profiles(&store);
    let ctx = Context::new(&registry, &store);

    let user = Record::find(&ctx, "user", 5i64).unwrap();
    let profile = Record::build(&ctx, "profile").unwrap();
    profile.set("bio", "fresh");
    user.set_one("profile", &profile);
    user.save(&ctx).unwrap();

    let id = profile.id().unwrap();
    assert_eq!(ids_where(&store, "profiles", "user_id", 5), vec![id]);
    assert_eq!(column(&store, "profiles", id, "bio"), text("fresh"));
}

#[test]
fn test_assign_empty_detaches() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_profiles(&store);
    let ctx = Context::new(&registry, &store);

    let user = Record::find(&ctx, "user", 5i64).unwrap();
    user.set_one("profile", One::Empty);
    user.save(&ctx).unwrap();

    assert!(ids_where(&store, "profiles", "user_id", 5).is_empty());
    assert!(user.one(&ctx, "profile").unwrap().is_none());
}

#[test]
fn test_unknown_key_resolves_to_nothing() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_profiles(&store);
    let ctx = Context::new(&registry, &store);

    let user = Record::find(&ctx, "user", 5i64).unwrap();
    user.set_one("profile", 404i64);
    assert!(user.one(&ctx, "profile").unwrap().is_none());
}

#[test]
fn test_saving_unsaved_owner_fails() {
    let registry = registry();
    let store = MemoryStore::new();
    let ctx = Context::new(&registry, &store);

    let user = Record::build(&ctx, "user").unwrap();
    let association = registry.association("user", "profile").unwrap();
    let err = association.after_save(&ctx, &user, true).unwrap_err();
    assert!(matches!(err, OrmError::NotLoaded { .. }));
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_loaded_item_points_back_at_owner() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_profiles(&store);
    let ctx = Context::new(&registry, &store);

    let user = Record::find(&ctx, "user", 5i64).unwrap();
    let profile = user.one(&ctx, "profile").unwrap().unwrap();
    assert_eq!(profile.id(), Some(1));

    let parent = profile.parent("user").unwrap();
    assert!(Rc::ptr_eq(&parent, &user));
}

#[test]
fn test_unsaved_owner_has_no_item() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_profiles(&store);
    let ctx = Context::new(&registry, &store);

    let user = Record::build(&ctx, "user").unwrap();
    assert!(user.one(&ctx, "profile").unwrap().is_none());
}

#[test]
fn test_unloaded_owner_with_explicit_id_has_no_item() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_profiles(&store);
    let ctx = Context::new(&registry, &store);

    let user = Record::build(&ctx, "user").unwrap();
    user.set("id", 5i64);
    assert!(user.one(&ctx, "profile").unwrap().is_none());
    assert_eq!(store.statements(), 0);
}

// ============================================================================
// Polymorphic
// ============================================================================

fn seed_images(store: &MemoryStore) {
    store.put("users", row([("id", int(5)), ("name", text("olga"))]));
    store.put(
        "images",
        row([("id", int(3)), ("imageable_id", int(5)), ("imageable_model", text("user")), ("url", text("old.png"))]),
    );
    store.put(
        "images",
        row([("id", int(4)), ("imageable_id", int(5)), ("imageable_model", text("post")), ("url", text("post.png"))]),
    );
    store.put("images", row([("id", int(7)), ("url", text("spare.png"))]));
}

#[test]
fn test_polymorphic_key_assignment_stamps_discriminator() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_images(&store);
    let ctx = Context::new(&registry, &store);

    let user = Record::find(&ctx, "user", 5i64).unwrap();
    user.set_one("avatar", 7i64);
    user.save(&ctx).unwrap();

    assert!(is_null(&column(&store, "images", 3, "imageable_id")));
    assert!(is_null(&column(&store, "images", 3, "imageable_model")));
    // rows of another owner type sharing the id are left alone
    assert_eq!(column(&store, "images", 4, "imageable_id"), int(5));
    assert_eq!(column(&store, "images", 4, "imageable_model"), text("post"));

    assert_eq!(column(&store, "images", 7, "imageable_id"), int(5));
    assert_eq!(column(&store, "images", 7, "imageable_model"), text("user"));
}

#[test]
fn test_polymorphic_key_with_values() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_images(&store);
    let ctx = Context::new(&registry, &store);

    let user = Record::find(&ctx, "user", 5i64).unwrap();
    user.set_one("avatar", One::KeyWith(int(7), row([("url", "new.png")])));
    user.save(&ctx).unwrap();

    assert_eq!(column(&store, "images", 7, "url"), text("new.png"));
    assert_eq!(column(&store, "images", 7, "imageable_id"), int(5));
    assert_eq!(column(&store, "images", 7, "imageable_model"), text("user"));
    assert!(is_null(&column(&store, "images", 3, "imageable_id")));
}

#[test]
fn test_polymorphic_load_filters_by_owner_model() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_images(&store);
    store.put("images", row([("id", int(2)), ("imageable_id", int(5)), ("imageable_model", text("post")), ("url", text("x.png"))]));
    let ctx = Context::new(&registry, &store);

    let user = Record::find(&ctx, "user", 5i64).unwrap();
    let avatar = user.one(&ctx, "avatar").unwrap().unwrap();
    assert_eq!(avatar.id(), Some(3));
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_invalid_item_blocks_owner_save() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_profiles(&store);
    let ctx = Context::new(&registry, &store);

    let user = Record::find(&ctx, "user", 5i64).unwrap();
    let profile = Record::build(&ctx, "profile").unwrap();
    profile.set("bio", "x".repeat(30));
    user.set_one("profile", &profile);

    let err = user.save(&ctx).unwrap_err();
    assert!(matches!(err, OrmError::Validation { .. }));
    assert_eq!(store.writes(), 0);

    assert_eq!(user.errors()["profile"][0].0, "association");
    assert!(user.errors()["profile"][0].1.errors().is_some());
    assert_eq!(
        user.messages_all(&ctx),
        vec!["Profile: profile:bio.max_length".to_string()]
    );
}

#[test]
fn test_key_assignment_skips_validation_of_the_row() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_profiles(&store);
    store.put(
        "profiles",
        row([("id", int(10)), ("user_id", Value::BigInt(None)), ("bio", text("x".repeat(30).as_str()))]),
    );
    let ctx = Context::new(&registry, &store);

    let user = Record::find(&ctx, "user", 5i64).unwrap();
    user.set_one("profile", 10i64);
    user.save(&ctx).unwrap();

    assert!(user.errors().is_empty());
    assert_eq!(column(&store, "profiles", 10, "user_id"), int(5));
    assert!(is_null(&column(&store, "profiles", 1, "user_id")));
}

#[test]
fn test_unchanged_association_is_not_checked() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_profiles(&store);
    store.put("profiles", row([("id", int(2)), ("user_id", int(6)), ("bio", text("x".repeat(30).as_str()))]));
    store.put("users", row([("id", int(6)), ("name", text("petr"))]));
    let ctx = Context::new(&registry, &store);

    let user = Record::find(&ctx, "user", 6i64).unwrap();
    assert!(user.check(&ctx).unwrap());
}

// ============================================================================
// Idempotence and cycles
// ============================================================================

#[test]
fn test_second_save_writes_nothing() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_profiles(&store);
    let ctx = Context::new(&registry, &store);

    let user = Record::find(&ctx, "user", 5i64).unwrap();
    user.set_one("profile", 9i64);
    user.save(&ctx).unwrap();
    let writes = store.writes();

    user.save(&ctx).unwrap();
    assert_eq!(store.writes(), writes);

    let association = registry.association("user", "profile").unwrap();
    association.after_save(&ctx, &user, false).unwrap();
    assert_eq!(store.writes(), writes);
}

#[test]
fn test_mutual_has_one_terminates() {
    let registry = Registry::builder()
        .model(Meta::new("husband").has_one("wife", HasOne::new()))
        .model(
            Meta::new("wife")
                .with_table("wives")
                .has_one("husband", HasOne::new()),
        )
        .build()
        .unwrap();
    let store = MemoryStore::new();
    let ctx = Context::new(&registry, &store);

    let husband = Record::build(&ctx, "husband").unwrap();
    let wife = Record::build(&ctx, "wife").unwrap();
    husband.set_one("wife", &wife);
    wife.set_one("husband", &husband);

    husband.save(&ctx).unwrap();

    let husband_id = husband.id().unwrap();
    let wife_id = wife.id().unwrap();
    assert_eq!(column(&store, "wives", wife_id, "husband_id"), int(husband_id));
    assert!(!husband.is_saving() && !wife.is_saving());
}

use crate::common::{registry, seed_comments, seed_profiles};
use lifeline::{Context, Errors, MemoryStore, MessageCatalog, ModelRef, Params, Record};
use serde_json::json;

fn invalid_post(ctx: &Context<'_>) -> ModelRef {
    let post = Record::find(ctx, "post", 5i64).unwrap();
    let members = post.members(ctx, "comments").unwrap();
    members[1].set("body", "");
    post.set_many(ctx, "comments", members).unwrap();
    post.set("title", "");
    post
}

// ============================================================================
// Flattened messages
// ============================================================================

#[test]
fn test_messages_all_without_templates() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_comments(&store);
    let ctx = Context::new(&registry, &store);

    let post = invalid_post(&ctx);
    assert!(!post.check(&ctx).unwrap());
    assert_eq!(
        post.messages_all(&ctx),
        vec![
            "post:title.present".to_string(),
            "Comments [1]: comment:body.present".to_string(),
        ]
    );
}

#[test]
fn test_messages_all_with_catalog() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_comments(&store);
    let catalog = MessageCatalog::new().with("validators", "present", ":attribute must not be empty");
    let ctx = Context::new(&registry, &store).with_messages(&catalog);

    let post = invalid_post(&ctx);
    let err = post.save(&ctx).unwrap_err();
    assert_eq!(
        post.messages_all(&ctx),
        vec![
            "Title must not be empty".to_string(),
            "Comments [1]: Body must not be empty".to_string(),
        ]
    );
    assert!(err.to_string().contains("Comments [1]: Body must not be empty"));
}

#[test]
fn test_model_specific_template_wins() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_profiles(&store);
    let catalog = MessageCatalog::new()
        .with("validators", "max_length", ":attribute is too long")
        .with("profile", "bio.max_length", ":model :attribute allows :maximum characters");
    let ctx = Context::new(&registry, &store).with_messages(&catalog);

    let profile = Record::find(&ctx, "profile", 1i64).unwrap();
    profile.set("bio", "x".repeat(21));
    assert!(!profile.check(&ctx).unwrap());
    assert_eq!(
        profile.messages_all(&ctx),
        vec!["profile Bio allows 20 characters".to_string()]
    );
}

// ============================================================================
// Structured export
// ============================================================================

#[test]
fn test_nested_errors_to_json() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_profiles(&store);
    let ctx = Context::new(&registry, &store);

    let user = Record::find(&ctx, "user", 5i64).unwrap();
    let profile = Record::find(&ctx, "profile", 9i64).unwrap();
    profile.set("bio", "x".repeat(21));
    user.set_one("profile", &profile);
    assert!(!user.check(&ctx).unwrap());

    assert_eq!(
        user.errors().to_json(),
        json!({
            "profile": {
                "association": {
                    "errors": { "bio": { "max_length": { "maximum": "20" } } }
                }
            }
        })
    );
}

#[test]
fn test_check_clears_previous_errors() {
    let registry = registry();
    let store = MemoryStore::new();
    seed_profiles(&store);
    let ctx = Context::new(&registry, &store);

    let profile = Record::find(&ctx, "profile", 1i64).unwrap();
    profile.set("bio", "x".repeat(21));
    assert!(!profile.check(&ctx).unwrap());
    profile.set("bio", "short");
    assert!(profile.check(&ctx).unwrap());
    assert!(profile.errors().is_empty());
}

#[test]
#[should_panic(expected = "must use add() method")]
fn test_direct_assignment_panics() {
    let mut errors = Errors::new("post", "post");
    errors.add("title", "present", Params::new());
    let _ = &mut errors["title"];
}

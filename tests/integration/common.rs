//! Shared fixtures

use lifeline::{
    row, Field, HasMany, HasOne, Length, MemoryStore, Meta, Present, Registry, Row,
};
use sea_query::Value;

/// Blog schema used across the tests
///
/// - user has_one profile (inverse `user`) and a polymorphic `avatar` image
/// - post has_many comments (count cache) and polymorphic `notes` comments
pub fn registry() -> Registry {
    Registry::builder()
        .model(
            Meta::new("user")
                .field(Field::string("name"))
                .has_one("profile", HasOne::new().inverse_of("user"))
                .has_one(
                    "avatar",
                    HasOne::new().foreign_model("image").polymorphic_as("imageable"),
                ),
        )
        .model(
            Meta::new("profile")
                .field(Field::integer("user_id"))
                .field(Field::string("bio"))
                .rule("bio", Length::maximum(20)),
        )
        .model(
            Meta::new("image")
                .field(Field::string("url"))
                .rule("url", Present),
        )
        .model(
            Meta::new("post")
                .field(Field::string("title"))
                .rule("title", Present)
                .has_many("comments", HasMany::new().count_cache())
                .has_many(
                    "notes",
                    HasMany::new().foreign("comment").polymorphic_as("commentable"),
                ),
        )
        .model(
            Meta::new("comment")
                .field(Field::string("body"))
                .rule("body", Present),
        )
        .build()
        .expect("fixture registry is valid")
}

/// User 5 owning profile 1; profile 9 is unattached
pub fn seed_profiles(store: &MemoryStore) {
    store.put("users", row([("id", int(5)), ("name", text("olga"))]));
    store.put("profiles", row([("id", int(1)), ("user_id", int(5)), ("bio", text("first"))]));
    store.put("profiles", row([("id", int(9)), ("user_id", Value::BigInt(None)), ("bio", text("second"))]));
}

/// Post 5 with comments 1, 2, 3; comment 4 belongs to post 6
pub fn seed_comments(store: &MemoryStore) {
    store.put("posts", row([("id", int(5)), ("title", text("hello")), ("comments_count", int(3))]));
    store.put("posts", row([("id", int(6)), ("title", text("other")), ("comments_count", int(1))]));
    for (id, post) in [(1, 5), (2, 5), (3, 5), (4, 6)] {
        store.put(
            "comments",
            row([("id", int(id)), ("post_id", int(post)), ("body", text("nice"))]),
        );
    }
}

pub fn int(v: i64) -> Value {
    Value::BigInt(Some(v))
}

pub fn text(v: &str) -> Value {
    Value::String(Some(v.to_string()))
}

/// Column of a stored row, NULL when the row or column is missing
pub fn column(store: &MemoryStore, table: &str, id: i64, column: &str) -> Value {
    store
        .row(table, id)
        .and_then(|row: Row| row.get(column).cloned())
        .unwrap_or(Value::BigInt(None))
}

/// Ids of rows whose `column` equals `value`
pub fn ids_where(store: &MemoryStore, table: &str, column: &str, value: i64) -> Vec<i64> {
    store
        .rows(table)
        .into_iter()
        .filter(|row| row.get(column).and_then(lifeline::value::as_id) == Some(value))
        .filter_map(|row| row.get("id").and_then(lifeline::value::as_id))
        .collect()
}

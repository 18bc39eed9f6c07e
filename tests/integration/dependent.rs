use crate::common::{column, ids_where, int, text};
use lifeline::value::is_null;
use lifeline::{row, Context, Dependent, HasMany, HasOne, MemoryStore, Meta, Record, Registry};

fn registry(one: Dependent, many: Dependent) -> Registry {
    Registry::builder()
        .model(
            Meta::new("author")
                .has_one("biography", HasOne::new().dependent(one))
                .has_many("articles", HasMany::new().dependent(many)),
        )
        .model(Meta::new("biography"))
        .model(Meta::new("article").has_many("remarks", HasMany::new().dependent(Dependent::Erase)))
        .model(Meta::new("remark"))
        .build()
        .unwrap()
}

fn seed(store: &MemoryStore) {
    for id in [1, 2] {
        store.put("authors", row([("id", int(id)), ("name", text("writer"))]));
        store.put("biographies", row([("id", int(id)), ("author_id", int(id))]));
    }
    for (id, author) in [(1, 1), (2, 1), (3, 2)] {
        store.put("articles", row([("id", int(id)), ("author_id", int(author))]));
    }
    for (id, article) in [(1, 1), (2, 3)] {
        store.put("remarks", row([("id", int(id)), ("article_id", int(article))]));
    }
}

fn delete_author(registry: &Registry, store: &MemoryStore) {
    let ctx = Context::new(registry, store);
    let author = Record::find(&ctx, "author", 1i64).unwrap();
    author.delete(&ctx).unwrap();
    assert!(store.row("authors", 1).is_none());
    assert!(!author.loaded());
}

#[test]
fn test_delete_runs_item_lifecycle() {
    let registry = registry(Dependent::Delete, Dependent::Delete);
    let store = MemoryStore::new();
    seed(&store);
    delete_author(&registry, &store);

    assert!(store.row("biographies", 1).is_none());
    assert!(store.row("biographies", 2).is_some());
    assert_eq!(ids_where(&store, "articles", "author_id", 1), Vec::<i64>::new());
    assert_eq!(store.rows("articles").len(), 1);
    // remarks of deleted articles go through the article's own policy
    assert!(store.row("remarks", 1).is_none());
    assert!(store.row("remarks", 2).is_some());
}

#[test]
fn test_erase_skips_item_lifecycle() {
    let registry = registry(Dependent::Erase, Dependent::Erase);
    let store = MemoryStore::new();
    seed(&store);
    delete_author(&registry, &store);

    assert!(store.row("biographies", 1).is_none());
    assert_eq!(store.rows("articles").len(), 1);
    assert!(store.row("remarks", 1).is_some());
}

#[test]
fn test_nullify_detaches() {
    let registry = registry(Dependent::Nullify, Dependent::Nullify);
    let store = MemoryStore::new();
    seed(&store);
    delete_author(&registry, &store);

    assert!(is_null(&column(&store, "biographies", 1, "author_id")));
    assert_eq!(column(&store, "biographies", 2, "author_id"), int(2));
    assert_eq!(column(&store, "articles", 1, "author_id"), int(0));
    assert_eq!(column(&store, "articles", 2, "author_id"), int(0));
    assert_eq!(column(&store, "articles", 3, "author_id"), int(2));
}

#[test]
fn test_none_leaves_rows() {
    let registry = registry(Dependent::None, Dependent::None);
    let store = MemoryStore::new();
    seed(&store);
    delete_author(&registry, &store);

    assert_eq!(column(&store, "biographies", 1, "author_id"), int(1));
    assert_eq!(ids_where(&store, "articles", "author_id", 1), vec![1, 2]);
    assert_eq!(store.writes(), 1);
}

#[test]
fn test_unsaved_owner_delete_is_a_no_op() {
    let registry = registry(Dependent::Erase, Dependent::Erase);
    let store = MemoryStore::new();
    seed(&store);
    let ctx = Context::new(&registry, &store);

    let author = Record::build(&ctx, "author").unwrap();
    author.delete(&ctx).unwrap();
    assert_eq!(store.writes(), 0);
    assert_eq!(store.rows("articles").len(), 3);
}

//! Store transactions, in-memory persistence and the SQL store.

use std::sync::Arc;

use ranklist::{
    Error, Lifecycle, ListConfig, Scope, Value,
    backend::{BackendError, PositionRange, database::InMemory},
    item::ItemRow,
};

use crate::helpers::*;

fn row(id: &str, position: i64, list_id: i64) -> ItemRow {
    let mut row = ItemRow::new(id);
    row.position = Some(position);
    row.attributes
        .insert("todo_list_id".to_string(), Value::Int(list_id));
    row
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let store = test_store().await;

    let mut tx = store.begin().await.unwrap();
    tx.insert(&row("dropped", 1, 1)).await.unwrap();
    assert_eq!(tx.count(&todo_list(1), &PositionRange::all()).await.unwrap(), 1);
    drop(tx);

    let mut tx = store.begin().await.unwrap();
    tx.insert(&row("rolled-back", 1, 1)).await.unwrap();
    tx.rollback().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.count(&todo_list(1), &PositionRange::all()).await.unwrap(), 0);
    assert!(tx.fetch(&"dropped".into()).await.unwrap_err().is_not_found());
    tx.insert(&row("kept", 1, 1)).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(positions(store.as_ref(), &todo_list(1)).await, [("kept".to_string(), 1)]);
}

#[tokio::test]
async fn test_shifts_are_scoped() {
    let store = test_store().await;

    let mut tx = store.begin().await.unwrap();
    for n in 1..=3 {
        tx.insert(&row(&item_id(1, n), n as i64, 1)).await.unwrap();
        tx.insert(&row(&item_id(2, n), n as i64, 2)).await.unwrap();
    }
    let shifted = tx
        .increment_where(&todo_list(1), &PositionRange::at_least(2))
        .await
        .unwrap();
    assert_eq!(shifted, 2);
    tx.commit().await.unwrap();

    let first: Vec<i64> = positions(store.as_ref(), &todo_list(1))
        .await
        .into_iter()
        .map(|(_, position)| position)
        .collect();
    let second: Vec<i64> = positions(store.as_ref(), &todo_list(2))
        .await
        .into_iter()
        .map(|(_, position)| position)
        .collect();
    assert_eq!(first, [1, 3, 4]);
    assert_eq!(second, [1, 2, 3]);
}

#[tokio::test]
async fn test_in_memory_rejects_raw_predicates() {
    let config = ListConfig::new().with_scope(Scope::raw("company = 'A'"));
    let lifecycle = Lifecycle::new(Arc::new(InMemory::new()), config).unwrap();
    let mut item = ranklist::ListItem::new("item", lifecycle.manager().config())
        .with_attribute("company", "A");

    let err = lifecycle.create(&mut item).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Backend(BackendError::UnsupportedPredicate { .. })
    ));
}

#[tokio::test]
async fn test_in_memory_default_scope_is_one_list() {
    let lifecycle = Lifecycle::new(Arc::new(InMemory::new()), ListConfig::new()).unwrap();
    for n in 1..=3 {
        let mut item = ranklist::ListItem::new(format!("item-{n}"), lifecycle.manager().config());
        lifecycle.create(&mut item).await.unwrap();
    }
    let mut last = lifecycle.fetch(&"item-3".into()).await.unwrap();

    lifecycle.manager().move_to_top(&mut last).await.unwrap();

    assert_eq!(lifecycle.manager().list_len(&last).await.unwrap(), 3);
    assert!(lifecycle.manager().is_first(&last).await.unwrap());
}

#[tokio::test]
async fn test_in_memory_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lists.json");

    let store = Arc::new(InMemory::new());
    let lifecycle = Lifecycle::new(store.clone(), list_config()).unwrap();
    let mut items = seed(&lifecycle, 1, 4).await;
    lifecycle.manager().move_to_top(&mut items[3]).await.unwrap();
    let before = ids_in_order(&lifecycle, 1).await;
    store.save_to_file(&path).await.unwrap();

    let loaded = InMemory::load_from_file(&path).await.unwrap();
    assert_eq!(loaded.len().await, 4);
    let lifecycle = Lifecycle::new(Arc::new(loaded), list_config()).unwrap();
    assert_eq!(ids_in_order(&lifecycle, 1).await, before);

    let missing = InMemory::load_from_file(dir.path().join("missing.json"))
        .await
        .unwrap();
    assert!(missing.is_empty().await);
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use std::sync::Arc;

    use ranklist::{
        Error, Lifecycle, ListConfig, ListItem, ResolvedScope, Scope, ValueKind,
        backend::{
            BackendError,
            database::{SqlxStore, TableSpec},
        },
    };

    use crate::helpers::*;

    async fn raw_lifecycle() -> Lifecycle {
        let store = SqlxStore::sqlite_in_memory(table_spec()).await.unwrap();
        let config = ListConfig::new().with_scope(Scope::raw("company = 'A'"));
        Lifecycle::new(Arc::new(store), config).unwrap()
    }

    fn company(name: &str) -> ResolvedScope {
        ResolvedScope::Raw(format!("company = '{name}'"))
    }

    async fn order(lifecycle: &Lifecycle, name: &str) -> Vec<(String, i64)> {
        positions(lifecycle.manager().store().as_ref(), &company(name)).await
    }

    #[tokio::test]
    async fn test_raw_scope_lists() {
        let lifecycle = raw_lifecycle().await;
        let mut items = Vec::new();
        for n in 1..=3 {
            let mut item = ListItem::new(format!("a-{n}"), lifecycle.manager().config())
                .with_attribute("company", "A");
            lifecycle.create(&mut item).await.unwrap();
            items.push(item);
        }

        lifecycle.manager().move_to_top(&mut items[2]).await.unwrap();

        assert_eq!(
            order(&lifecycle, "A").await,
            [
                ("a-3".to_string(), 1),
                ("a-1".to_string(), 2),
                ("a-2".to_string(), 3)
            ]
        );
    }

    #[tokio::test]
    async fn test_raw_scope_change_moves_between_lists() {
        let lifecycle = raw_lifecycle().await;
        let mut items = Vec::new();
        for n in 1..=3 {
            let mut item = ListItem::new(format!("a-{n}"), lifecycle.manager().config())
                .with_attribute("company", "A");
            lifecycle.create(&mut item).await.unwrap();
            items.push(item);
        }

        let mut moved = lifecycle.fetch(items[0].id()).await.unwrap();
        moved.set_attribute("company", "B");
        moved.set_scope(Some(Scope::raw("company = 'B'")));
        lifecycle.save(&mut moved).await.unwrap();

        assert_eq!(moved.position(), Some(1));
        assert_eq!(
            order(&lifecycle, "A").await,
            [("a-2".to_string(), 1), ("a-3".to_string(), 2)]
        );
        assert_eq!(order(&lifecycle, "B").await, [("a-1".to_string(), 1)]);

        // Later operations address the new list
        lifecycle.manager().move_to_bottom(&mut moved).await.unwrap();
        assert_eq!(lifecycle.manager().list_len(&moved).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rows_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.db");

        let before = {
            let store = SqlxStore::open_sqlite(&path, table_spec()).await.unwrap();
            let lifecycle = Lifecycle::new(Arc::new(store), list_config()).unwrap();
            let mut items = seed(&lifecycle, 1, 3).await;
            items[0].set_attribute("company", "Acme");
            lifecycle.save(&mut items[0]).await.unwrap();
            lifecycle.manager().move_to_bottom(&mut items[0]).await.unwrap();
            ids_in_order(&lifecycle, 1).await
        };

        let store = SqlxStore::open_sqlite(&path, table_spec()).await.unwrap();
        let lifecycle = Lifecycle::new(Arc::new(store), list_config()).unwrap();
        assert_eq!(ids_in_order(&lifecycle, 1).await, before);

        let item = lifecycle.fetch(&item_id(1, 1).into()).await.unwrap();
        assert_eq!(item.position(), Some(3));
        assert_eq!(item.attribute("company").as_text(), Some("Acme"));
        assert_eq!(item.attribute("todo_list_id").as_int(), Some(1));
    }

    #[tokio::test]
    async fn test_position_column_must_match_the_table() {
        let store = SqlxStore::sqlite_in_memory(table_spec()).await.unwrap();
        let config = list_config().with_position_column("rank");

        let err = match Lifecycle::new(Arc::new(store), config) {
            Ok(_) => panic!("a mismatched position column was accepted"),
            Err(err) => err,
        };
        assert!(matches!(
            err,
            Error::Backend(BackendError::InvalidTable { .. })
        ));

        let spec = TableSpec::for_list(TABLE, &list_config().with_position_column("rank"))
            .with_column("todo_list_id", ValueKind::Int);
        let store = SqlxStore::sqlite_in_memory(spec).await.unwrap();
        let lifecycle =
            Lifecycle::new(Arc::new(store), list_config().with_position_column("rank")).unwrap();
        seed(&lifecycle, 1, 2).await;
        assert_contiguous(&lifecycle, 1).await;
    }

    #[tokio::test]
    async fn test_attribute_type_mismatch() {
        let store = SqlxStore::sqlite_in_memory(table_spec()).await.unwrap();
        let lifecycle = Lifecycle::new(Arc::new(store), list_config()).unwrap();
        let mut item = ListItem::new("typed", lifecycle.manager().config())
            .with_attribute("todo_list_id", 1)
            .with_attribute("company", 42);

        let err = lifecycle.create(&mut item).await.unwrap_err();
        match err {
            Error::Backend(BackendError::TypeMismatch { ref column, .. }) => {
                assert_eq!(column, "company")
            }
            other => panic!("expected a type mismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_attribute_is_rejected() {
        let store = SqlxStore::sqlite_in_memory(table_spec()).await.unwrap();
        let lifecycle = Lifecycle::new(Arc::new(store), list_config()).unwrap();
        let mut item = new_item(&lifecycle, "extra", 1).with_attribute("colour", "red");

        let err = lifecycle.create(&mut item).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Backend(BackendError::InvalidTable { .. })
        ));
    }
}

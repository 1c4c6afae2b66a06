//! Create, save and delete through the lifecycle hooks.

use ranklist::{Filter, Lifecycle, ListConfig, ListItem, Placement, Scope, scope::ScopeError};

use crate::helpers::*;

async fn lifecycle_with(config: ListConfig) -> Lifecycle {
    Lifecycle::new(test_store().await, config).unwrap()
}

#[tokio::test]
async fn test_create_places_at_bottom_by_default() {
    let lifecycle = test_lifecycle().await;
    seed(&lifecycle, 1, 3).await;

    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[1, 2, 3]));
    assert_contiguous(&lifecycle, 1).await;
}

#[tokio::test]
async fn test_create_places_at_top() {
    let lifecycle = lifecycle_with(list_config().with_placement(Placement::Top)).await;
    let items = seed(&lifecycle, 1, 3).await;

    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[3, 2, 1]));
    assert_eq!(items[2].position(), Some(1));
    assert_contiguous(&lifecycle, 1).await;
}

#[tokio::test]
async fn test_create_without_placement_leaves_items_out() {
    let lifecycle = lifecycle_with(list_config().with_placement(Placement::None)).await;
    let items = seed(&lifecycle, 1, 2).await;

    assert!(items.iter().all(|item| item.is_not_in_list()));
    assert!(ids_in_order(&lifecycle, 1).await.is_empty());
    assert_eq!(reload(&lifecycle, &items[0]).await.position(), None);
}

#[tokio::test]
async fn test_create_without_placement_allows_a_null_foreign_key() {
    let lifecycle = lifecycle_with(list_config().with_placement(Placement::None)).await;
    let mut item = ListItem::new("no-list", lifecycle.manager().config());

    lifecycle.create(&mut item).await.unwrap();
    assert!(item.is_persisted());
    assert!(item.is_not_in_list());

    // Entering a list needs the key
    let mut copy = item.clone();
    let err = lifecycle
        .set_list_position(&mut copy, Some(1))
        .await
        .unwrap_err();
    assert!(err.as_scope_error().is_some_and(ScopeError::is_null_error));

    item.set_attribute("todo_list_id", 1);
    lifecycle.save(&mut item).await.unwrap();
    lifecycle
        .set_list_position(&mut item, Some(1))
        .await
        .unwrap();
    assert_eq!(ids_in_order(&lifecycle, 1).await, vec!["no-list".to_string()]);
}

#[tokio::test]
async fn test_create_at_explicit_position_makes_room() {
    let lifecycle = test_lifecycle().await;
    seed(&lifecycle, 1, 4).await;

    let mut item = new_item(&lifecycle, "list1-new", 1);
    item.set_position(Some(2));
    lifecycle.create(&mut item).await.unwrap();

    let mut expected = ids(1, &[1]);
    expected.push("list1-new".to_string());
    expected.extend(ids(1, &[2, 3, 4]));
    assert_eq!(ids_in_order(&lifecycle, 1).await, expected);
    assert_contiguous(&lifecycle, 1).await;
}

#[tokio::test]
async fn test_lists_are_independent() {
    let lifecycle = test_lifecycle().await;
    seed(&lifecycle, 1, 3).await;
    let second = seed(&lifecycle, 2, 2).await;

    assert_eq!(second[0].position(), Some(1));
    assert_contiguous(&lifecycle, 1).await;
    assert_contiguous(&lifecycle, 2).await;
}

#[tokio::test]
async fn test_delete_closes_gap() {
    let lifecycle = test_lifecycle().await;
    let mut items = seed(&lifecycle, 1, 5).await;

    lifecycle.delete(&mut items[1]).await.unwrap();

    assert!(!items[1].is_persisted());
    assert!(lifecycle.fetch(items[1].id()).await.unwrap_err().is_not_found());
    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[1, 3, 4, 5]));
    assert_contiguous(&lifecycle, 1).await;
}

#[tokio::test]
async fn test_delete_uses_the_persisted_position() {
    let lifecycle = test_lifecycle().await;
    let mut items = seed(&lifecycle, 1, 4).await;

    // A pending, unsaved position must not decide which gap is closed
    items[0].set_position(Some(4));
    lifecycle.delete(&mut items[0]).await.unwrap();

    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[2, 3, 4]));
    assert_contiguous(&lifecycle, 1).await;
}

#[tokio::test]
async fn test_delete_with_a_stale_handle() {
    let lifecycle = test_lifecycle().await;
    let mut items = seed(&lifecycle, 1, 4).await;
    let mut stale = items[0].clone();

    lifecycle
        .manager()
        .move_to_bottom(&mut items[0])
        .await
        .unwrap();
    lifecycle.delete(&mut stale).await.unwrap();

    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[2, 3, 4]));
    assert_contiguous(&lifecycle, 1).await;
}

#[tokio::test]
async fn test_delete_item_out_of_list() {
    let lifecycle = test_lifecycle().await;
    let mut items = seed(&lifecycle, 1, 3).await;

    lifecycle
        .manager()
        .remove_from_list(&mut items[0])
        .await
        .unwrap();
    lifecycle.delete(&mut items[0]).await.unwrap();

    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[2, 3]));
    assert_contiguous(&lifecycle, 1).await;
}

#[tokio::test]
async fn test_set_list_position_moves_up() {
    let lifecycle = test_lifecycle().await;
    let mut items = seed(&lifecycle, 1, 5).await;

    lifecycle
        .set_list_position(&mut items[4], Some(1))
        .await
        .unwrap();

    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[5, 1, 2, 3, 4]));
    assert_contiguous(&lifecycle, 1).await;
    assert!(!items[4].is_dirty());
}

#[tokio::test]
async fn test_set_list_position_moves_down() {
    let lifecycle = test_lifecycle().await;
    let mut items = seed(&lifecycle, 1, 5).await;

    lifecycle
        .set_list_position(&mut items[1], Some(4))
        .await
        .unwrap();

    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[1, 3, 4, 2, 5]));
    assert_contiguous(&lifecycle, 1).await;
}

#[tokio::test]
async fn test_set_list_position_to_none_leaves_the_list() {
    let lifecycle = test_lifecycle().await;
    let mut items = seed(&lifecycle, 1, 4).await;

    lifecycle
        .set_list_position(&mut items[1], None)
        .await
        .unwrap();

    assert!(items[1].is_not_in_list());
    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[1, 3, 4]));
    assert_contiguous(&lifecycle, 1).await;
}

#[tokio::test]
async fn test_increment_position_is_reconciled_on_save() {
    let lifecycle = test_lifecycle().await;
    let mut items = seed(&lifecycle, 1, 4).await;

    lifecycle.manager().increment_position(&mut items[1]);
    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[1, 2, 3, 4]));

    lifecycle.save(&mut items[1]).await.unwrap();
    assert_eq!(items[1].position(), Some(3));
    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[1, 3, 2, 4]));
    assert_contiguous(&lifecycle, 1).await;
}

#[tokio::test]
async fn test_decrement_position_is_reconciled_on_save() {
    let lifecycle = test_lifecycle().await;
    let mut items = seed(&lifecycle, 1, 3).await;

    lifecycle.manager().decrement_position(&mut items[2]);
    lifecycle.save(&mut items[2]).await.unwrap();

    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[1, 3, 2]));
    assert_contiguous(&lifecycle, 1).await;
}

#[tokio::test]
async fn test_save_without_changes_keeps_the_list() {
    let lifecycle = test_lifecycle().await;
    let mut items = seed(&lifecycle, 1, 3).await;

    items[1].set_attribute("company", "Acme");
    lifecycle.save(&mut items[1]).await.unwrap();
    lifecycle.save(&mut items[2]).await.unwrap();

    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[1, 2, 3]));
    assert_eq!(
        reload(&lifecycle, &items[1])
            .await
            .attribute("company")
            .as_text(),
        Some("Acme")
    );
}

#[tokio::test]
async fn test_saving_a_stale_handle_keeps_the_stored_position() {
    let lifecycle = test_lifecycle().await;
    let mut items = seed(&lifecycle, 1, 3).await;
    let mut stale = items[2].clone();

    lifecycle.manager().move_to_top(&mut items[2]).await.unwrap();
    stale.set_attribute("company", "Acme");
    lifecycle.save(&mut stale).await.unwrap();

    assert_eq!(stale.position(), Some(1));
    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[3, 1, 2]));
    assert_contiguous(&lifecycle, 1).await;
}

#[tokio::test]
async fn test_save_creates_new_items() {
    let lifecycle = test_lifecycle().await;
    seed(&lifecycle, 1, 2).await;

    let mut item = new_item(&lifecycle, "list1-late", 1);
    lifecycle.save(&mut item).await.unwrap();

    assert!(item.is_persisted());
    assert_eq!(item.position(), Some(3));
}

#[tokio::test]
async fn test_foreign_key_change_moves_between_lists() {
    let lifecycle = test_lifecycle().await;
    let mut first = seed(&lifecycle, 1, 3).await;
    seed(&lifecycle, 2, 2).await;

    first[0].set_attribute("todo_list_id", 2);
    lifecycle.save(&mut first[0]).await.unwrap();

    assert_eq!(first[0].position(), Some(3));
    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[2, 3]));

    let mut second = ids(2, &[1, 2]);
    second.push(item_id(1, 1));
    assert_eq!(ids_in_order(&lifecycle, 2).await, second);

    assert_contiguous(&lifecycle, 1).await;
    assert_contiguous(&lifecycle, 2).await;
}

#[tokio::test]
async fn test_foreign_key_change_into_empty_list_with_top_placement() {
    let lifecycle = lifecycle_with(list_config().with_placement(Placement::Top)).await;
    let mut first = seed(&lifecycle, 1, 3).await;
    let mut moved = reload(&lifecycle, &first[1]).await;

    moved.set_attribute("todo_list_id", 7);
    lifecycle.save(&mut moved).await.unwrap();

    assert_eq!(moved.position(), Some(1));
    assert_eq!(ids_in_order(&lifecycle, 7).await, vec![item_id(1, 2)]);
    assert_contiguous(&lifecycle, 1).await;

    // The moved item lives in list 7 now; later moves address that list
    lifecycle.manager().move_to_bottom(&mut moved).await.unwrap();
    lifecycle
        .manager()
        .move_to_bottom(&mut first[2])
        .await
        .unwrap();
    assert_contiguous(&lifecycle, 1).await;
    assert_contiguous(&lifecycle, 7).await;
}

#[tokio::test]
async fn test_stale_handle_changing_list_closes_the_stored_gap() {
    let lifecycle = test_lifecycle().await;
    let mut items = seed(&lifecycle, 1, 4).await;
    seed(&lifecycle, 2, 1).await;
    let mut stale = items[0].clone();

    lifecycle
        .manager()
        .move_to_bottom(&mut items[0])
        .await
        .unwrap();
    stale.set_attribute("todo_list_id", 2);
    lifecycle.save(&mut stale).await.unwrap();

    assert_eq!(stale.position(), Some(2));
    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[2, 3, 4]));
    assert_contiguous(&lifecycle, 1).await;
    assert_contiguous(&lifecycle, 2).await;
}

#[tokio::test]
async fn test_moving_back_and_forth_keeps_both_lists_dense() {
    let lifecycle = test_lifecycle().await;
    let mut first = seed(&lifecycle, 1, 4).await;
    seed(&lifecycle, 2, 4).await;

    for target in [2, 1, 2] {
        first[2].set_attribute("todo_list_id", target);
        lifecycle.save(&mut first[2]).await.unwrap();
        assert_contiguous(&lifecycle, 1).await;
        assert_contiguous(&lifecycle, 2).await;
    }
    assert_eq!(first[2].position(), Some(5));
}

#[tokio::test]
async fn test_derived_scope_change() {
    let config = ListConfig::new().with_scope(Scope::derived(Filter::new().equals("todo_list_id", 1)));
    let lifecycle = lifecycle_with(config).await;
    let mut items = seed(&lifecycle, 1, 3).await;

    items[0].set_attribute("todo_list_id", 2);
    items[0].set_scope(Some(Scope::derived(Filter::new().equals("todo_list_id", 2))));
    lifecycle.save(&mut items[0]).await.unwrap();

    assert_eq!(items[0].position(), Some(1));
    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[2, 3]));
    assert_eq!(ids_in_order(&lifecycle, 2).await, vec![item_id(1, 1)]);
    assert_contiguous(&lifecycle, 1).await;
}

#[tokio::test]
async fn test_scope_change_on_reloaded_item() {
    let config = ListConfig::new().with_scope(Scope::derived(Filter::new().equals("todo_list_id", 1)));
    let lifecycle = lifecycle_with(config).await;
    let items = seed(&lifecycle, 1, 3).await;

    let mut item = reload(&lifecycle, &items[2]).await;
    item.set_attribute("todo_list_id", 2);
    item.set_scope(Some(Scope::derived(Filter::new().equals("todo_list_id", 2))));
    lifecycle.save(&mut item).await.unwrap();

    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[1, 2]));
    assert_eq!(ids_in_order(&lifecycle, 2).await, vec![item_id(1, 3)]);
}

#[tokio::test]
async fn test_config_from_json() {
    let config = ListConfig::from_json(
        r#"{"scope": {"foreign_key": "todo_list_id"}, "placement": "top", "top_of_list": 0}"#,
    )
    .unwrap();
    let lifecycle = lifecycle_with(config).await;
    seed(&lifecycle, 1, 3).await;

    assert_eq!(ids_in_order(&lifecycle, 1).await, ids(1, &[3, 2, 1]));
    assert_contiguous(&lifecycle, 1).await;
}

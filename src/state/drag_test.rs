use std::sync::Arc;

use super::*;
use crate::test_support::{MockStore, MockUpdate, item};

async fn reconciler(snapshot: Vec<crate::model::Item>) -> (DragReconciler<MockStore>, Arc<MockStore>) {
    let store = MockStore::new(snapshot);
    let refresher = Refresher::new(Arc::clone(&store), SharedBoard::default());
    refresher.refresh().await.expect("initial snapshot");
    (DragReconciler::new(refresher), store)
}

fn column_of(drag: &DragReconciler<MockStore>, id: i64) -> Option<Status> {
    drag.board().read(|b| b.locate(&ItemId::from(id)).map(|(status, _)| status))
}

fn expect_moved(outcome: DropOutcome) -> PendingMove {
    match outcome {
        DropOutcome::Moved(pending) => pending,
        other => panic!("expected a move, got {other:?}"),
    }
}

// =============================================================
// Discarded drops
// =============================================================

#[tokio::test]
async fn drop_on_origin_column_changes_nothing() {
    let (mut drag, store) = reconciler(vec![item(1, Status::Open), item(2, Status::Open)]).await;
    let before = drag.board().snapshot();

    drag.begin_drag(ItemId::from(1));
    let outcome = drag.drop_on("OPEN");

    assert!(matches!(outcome, DropOutcome::Discarded(DiscardReason::SameColumn)));
    assert_eq!(drag.board().snapshot(), before);
    assert!(store.updates().is_empty());
    assert!(drag.session().is_none());
}

#[tokio::test]
async fn drop_on_unknown_target_is_discarded() {
    let (mut drag, store) = reconciler(vec![item(1, Status::Open)]).await;

    drag.begin_drag(ItemId::from(1));
    let outcome = drag.drop_on("2");

    assert!(matches!(outcome, DropOutcome::Discarded(DiscardReason::UnknownTarget(t)) if t == "2"));
    assert_eq!(column_of(&drag, 1), Some(Status::Open));
    assert!(store.updates().is_empty());
}

#[tokio::test]
async fn column_ids_are_matched_exactly() {
    let (mut drag, store) = reconciler(vec![item(1, Status::Open)]).await;

    drag.begin_drag(ItemId::from(1));
    drag.drag_over("closed");
    assert_eq!(drag.session().and_then(|s| s.hovering), None);

    let outcome = drag.drop_on("closed");
    assert!(matches!(outcome, DropOutcome::Discarded(DiscardReason::UnknownTarget(t)) if t == "closed"));
    assert_eq!(column_of(&drag, 1), Some(Status::Open));
    assert!(store.updates().is_empty());
}

#[tokio::test]
async fn drop_of_item_missing_from_board_is_discarded() {
    let (mut drag, store) = reconciler(vec![item(1, Status::Open)]).await;

    drag.begin_drag(ItemId::from(9));
    let outcome = drag.drop_on("CLOSED");

    assert!(matches!(outcome, DropOutcome::Discarded(DiscardReason::OriginMissing)));
    assert!(store.updates().is_empty());
}

#[tokio::test]
async fn drop_without_session_does_nothing() {
    let (mut drag, _store) = reconciler(vec![item(1, Status::Open)]).await;
    assert!(matches!(drag.drop_on("CLOSED"), DropOutcome::NoSession));
    assert!(matches!(drag.drag_end(&ItemId::from(1), Some("CLOSED")), DropOutcome::NoSession));
}

#[tokio::test]
async fn drag_end_outside_columns_or_for_other_item_is_discarded() {
    let (mut drag, store) = reconciler(vec![item(1, Status::Open), item(2, Status::Open)]).await;

    drag.begin_drag(ItemId::from(1));
    let outcome = drag.drag_end(&ItemId::from(1), None);
    assert!(matches!(outcome, DropOutcome::Discarded(DiscardReason::NoTarget)));

    drag.begin_drag(ItemId::from(1));
    let outcome = drag.drag_end(&ItemId::from(2), Some("CLOSED"));
    assert!(matches!(outcome, DropOutcome::Discarded(DiscardReason::ItemMismatch)));

    assert!(drag.session().is_none());
    assert!(store.updates().is_empty());
    assert_eq!(column_of(&drag, 1), Some(Status::Open));
}

#[tokio::test]
async fn cancel_abandons_session() {
    let (mut drag, store) = reconciler(vec![item(1, Status::Open)]).await;

    drag.begin_drag(ItemId::from(1));
    drag.drag_over("CLOSED");
    let session = drag.cancel().expect("session");

    assert_eq!(session.origin, Some(Status::Open));
    assert_eq!(session.hovering, Some(Status::Closed));
    assert!(matches!(drag.drop_on("CLOSED"), DropOutcome::NoSession));
    assert!(store.updates().is_empty());
}

// =============================================================
// Moves
// =============================================================

#[tokio::test]
async fn board_changes_before_remote_call_resolves() {
    let (mut drag, store) = reconciler(vec![item(1, Status::Open), item(2, Status::InProgress)]).await;
    let gate = store.gate_updates();

    drag.begin_drag(ItemId::from(1));
    let pending = expect_moved(drag.drag_end(&ItemId::from(1), Some("IN_PROGRESS")));

    assert_eq!(column_of(&drag, 1), Some(Status::InProgress));
    let order: Vec<String> = drag
        .board()
        .read(|b| b.column(Status::InProgress).items.iter().map(|i| i.id.to_string()).collect());
    assert_eq!(order, vec!["2", "1"]);

    gate.notify_one();
    assert_eq!(pending.settled().await, Settlement::Confirmed);
    assert_eq!(store.updates(), vec![(ItemId::from(1), Status::InProgress)]);
}

#[tokio::test]
async fn confirmed_move_does_not_refetch() {
    let (mut drag, store) = reconciler(vec![item(1, Status::Open)]).await;

    drag.begin_drag(ItemId::from(1));
    let pending = expect_moved(drag.drop_on("CLOSED"));
    assert_eq!((pending.from, pending.to), (Status::Open, Status::Closed));

    assert_eq!(pending.settled().await, Settlement::Confirmed);
    assert_eq!(store.fetches(), 1);
    assert_eq!(column_of(&drag, 1), Some(Status::Closed));
}

#[tokio::test]
async fn rejected_move_is_undone_by_refetch() {
    let (mut drag, store) = reconciler(vec![item(42, Status::Open)]).await;
    store.set_update(MockUpdate::Reject("Not allowed".to_owned()));

    drag.begin_drag(ItemId::from(42));
    let pending = expect_moved(drag.drag_end(&ItemId::from(42), Some("IN_PROGRESS")));
    assert_eq!(column_of(&drag, 42), Some(Status::InProgress));

    let settlement = pending.settled().await;

    assert_eq!(settlement, Settlement::Reconciled { reason: "Not allowed".to_owned() });
    assert_eq!(column_of(&drag, 42), Some(Status::Open));
    assert_eq!(store.fetches(), 2);
}

#[tokio::test]
async fn transport_failure_is_undone_by_refetch() {
    let (mut drag, store) = reconciler(vec![item(1, Status::InProgress)]).await;
    store.set_update(MockUpdate::Fail);

    drag.begin_drag(ItemId::from(1));
    let settlement = expect_moved(drag.drop_on("CLOSED")).settled().await;

    assert!(matches!(settlement, Settlement::Reconciled { .. }));
    assert_eq!(column_of(&drag, 1), Some(Status::InProgress));
}

#[tokio::test]
async fn failed_refetch_leaves_optimistic_state() {
    let (mut drag, store) = reconciler(vec![item(1, Status::Open)]).await;
    store.set_update(MockUpdate::Fail);
    store.set_fail_fetch(true);

    drag.begin_drag(ItemId::from(1));
    let settlement = expect_moved(drag.drop_on("CLOSED")).settled().await;

    assert!(matches!(settlement, Settlement::Unreconciled { .. }));
    assert_eq!(column_of(&drag, 1), Some(Status::Closed));
}

#[tokio::test]
async fn gestures_stay_possible_while_move_is_outstanding() {
    let (mut drag, _store) = reconciler(vec![item(1, Status::Open), item(2, Status::Open)]).await;

    // Nothing has been awaited yet, so the first remote call cannot have run.
    drag.begin_drag(ItemId::from(1));
    let first = expect_moved(drag.drop_on("CLOSED"));
    drag.begin_drag(ItemId::from(2));
    let second = expect_moved(drag.drop_on("IN_PROGRESS"));

    assert_eq!(column_of(&drag, 1), Some(Status::Closed));
    assert_eq!(column_of(&drag, 2), Some(Status::InProgress));
    assert_eq!(first.settled().await, Settlement::Confirmed);
    assert_eq!(second.settled().await, Settlement::Confirmed);
}

#[tokio::test]
async fn reorder_is_local_only() {
    let (drag, store) = reconciler(vec![item(1, Status::Open), item(2, Status::Open)]).await;

    assert!(drag.reorder(Status::Open, 1, 0));
    let order: Vec<String> =
        drag.board().read(|b| b.column(Status::Open).items.iter().map(|i| i.id.to_string()).collect());
    assert_eq!(order, vec!["2", "1"]);
    assert!(store.updates().is_empty());
    assert_eq!(store.fetches(), 1);
}

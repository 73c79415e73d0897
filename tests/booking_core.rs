mod common;

use std::collections::BTreeSet;
use std::time::Duration;

use cinema_booking::config::BookingConfig;
use cinema_booking::error::{BookingError, ValidationError};
use cinema_booking::models::BookingOutcome;
use cinema_booking::services::BookingService;
use cinema_booking::store::{BookingStore, BookingTx};

use common::{service, OTHER_ROOM_SHOW, SHOW};

fn set(ids: &[i64]) -> BTreeSet<i64> {
    ids.iter().copied().collect()
}

#[tokio::test]
async fn four_seat_showroom_scenario() {
    let (_store, svc) = service().await;

    let first = svc.book_seats(SHOW, &[1, 2], 100).await.unwrap();
    assert!(first.is_booked());

    match svc.book_seats(SHOW, &[2, 3], 200).await.unwrap() {
        BookingOutcome::Conflict { unavailable } => assert_eq!(unavailable, vec![2]),
        other => panic!("expected conflict, got {:?}", other),
    }

    assert_eq!(svc.get_available_seats(SHOW).await.unwrap(), set(&[3, 4]));
    assert!(!svc.is_sold_out(SHOW).await.unwrap());

    let last = svc.book_seats(SHOW, &[3, 4], 200).await.unwrap();
    assert!(last.is_booked());
    assert!(svc.is_sold_out(SHOW).await.unwrap());
    assert!(svc.get_available_seats(SHOW).await.unwrap().is_empty());
}

#[tokio::test]
async fn conflict_books_nothing() {
    let (store, svc) = service().await;
    svc.book_seats(SHOW, &[3], 100).await.unwrap();

    let outcome = svc.book_seats(SHOW, &[1, 2, 3], 200).await.unwrap();
    assert!(matches!(outcome, BookingOutcome::Conflict { ref unavailable } if unavailable == &vec![3]));

    let bookings = store.active_bookings(SHOW).await;
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].seat_id, 3);
    assert_eq!(bookings[0].user_id, 100);
}

#[tokio::test]
async fn successful_booking_shares_one_reference_and_prices_seats() {
    let (store, svc) = service().await;

    let booking = match svc.book_seats(SHOW, &[4, 1], 7).await.unwrap() {
        BookingOutcome::Booked(b) => b,
        other => panic!("expected booking, got {:?}", other),
    };

    let prices: Vec<(i64, i64)> = booking.tickets.iter().map(|t| (t.seat_id, t.price_cents)).collect();
    assert_eq!(prices, vec![(1, 1000), (4, 1500)]);
    assert_eq!(booking.total_cents, 2500);
    assert_eq!(booking.tickets[1].seat_number, 4);
    assert!(!booking.sold_out);

    let rows = store.active_bookings(SHOW).await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.booking_ref == booking.booking_ref && r.user_id == 7));
}

#[tokio::test]
async fn same_seat_on_different_shows_is_independent() {
    let (store, svc) = service().await;
    store
        .insert_show(cinema_booking::models::Show {
            id: 3,
            movie_id: 1,
            showroom_id: 10,
            show_time: (chrono::Utc::now() + chrono::Duration::days(2)).naive_utc(),
            base_price_cents: 1200,
            is_booked_out: false,
        })
        .await;

    assert!(svc.book_seats(SHOW, &[1], 1).await.unwrap().is_booked());
    assert!(svc.book_seats(3, &[1], 2).await.unwrap().is_booked());
}

#[tokio::test]
async fn empty_seat_set_is_rejected_without_touching_storage() {
    let (store, svc) = service().await;
    let err = svc.book_seats(SHOW, &[], 1).await.unwrap_err();
    assert!(matches!(err, BookingError::Validation(ValidationError::EmptySeatSet)));
    assert_eq!(store.layout_loads(), 0);
}

#[tokio::test]
async fn duplicate_seat_is_rejected() {
    let (_store, svc) = service().await;
    let err = svc.book_seats(SHOW, &[1, 1], 1).await.unwrap_err();
    assert!(matches!(err, BookingError::Validation(ValidationError::DuplicateSeat(1))));
}

#[tokio::test]
async fn seat_from_another_showroom_is_rejected() {
    let (store, svc) = service().await;
    let err = svc.book_seats(SHOW, &[1, 5], 1).await.unwrap_err();
    match err {
        BookingError::Validation(ValidationError::SeatsNotInShowroom { show_id, seat_ids }) => {
            assert_eq!(show_id, SHOW);
            assert_eq!(seat_ids, vec![5]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(store.active_bookings(SHOW).await.is_empty());
}

#[tokio::test]
async fn unknown_show_is_a_validation_error() {
    let (_store, svc) = service().await;
    let err = svc.book_seats(999, &[1], 1).await.unwrap_err();
    assert!(matches!(err, BookingError::Validation(ValidationError::UnknownShow(999))));
    let err = svc.is_sold_out(999).await.unwrap_err();
    assert!(matches!(err, BookingError::Validation(ValidationError::UnknownShow(999))));
}

#[tokio::test]
async fn non_positive_user_is_rejected() {
    let (_store, svc) = service().await;
    let err = svc.book_seats(SHOW, &[1], 0).await.unwrap_err();
    assert!(matches!(err, BookingError::Validation(ValidationError::InvalidUser(0))));
}

#[tokio::test]
async fn sold_out_flag_is_written_with_last_booking() {
    let (store, svc) = service().await;
    svc.book_seats(OTHER_ROOM_SHOW, &[5], 1).await.unwrap();
    assert_eq!(store.stored_booked_out(OTHER_ROOM_SHOW).await, Some(false));

    match svc.book_seats(OTHER_ROOM_SHOW, &[6], 2).await.unwrap() {
        BookingOutcome::Booked(b) => assert!(b.sold_out),
        other => panic!("expected booking, got {:?}", other),
    }
    assert_eq!(store.stored_booked_out(OTHER_ROOM_SHOW).await, Some(true));
}

#[tokio::test]
async fn is_sold_out_ignores_stale_stored_flag() {
    let (store, svc) = service().await;
    store.overwrite_booked_out(SHOW, true).await;
    assert!(!svc.is_sold_out(SHOW).await.unwrap());
}

#[tokio::test]
async fn listing_hides_sold_out_shows_on_request() {
    let (_store, svc) = service().await;
    svc.book_seats(OTHER_ROOM_SHOW, &[5, 6], 1).await.unwrap();

    let all = svc.list_shows(false).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.iter().find(|s| s.show_id == OTHER_ROOM_SHOW).unwrap().booked_seats, 2);

    let available: Vec<i64> = svc.list_shows(true).await.unwrap().iter().map(|s| s.show_id).collect();
    assert_eq!(available, vec![SHOW]);
}

#[tokio::test]
async fn seat_details_exclude_booked_seats_and_carry_prices() {
    let (_store, svc) = service().await;
    svc.book_seats(SHOW, &[1], 1).await.unwrap();

    let offers = svc.available_seat_details(SHOW).await.unwrap();
    let ids: Vec<i64> = offers.iter().map(|o| o.seat_id).collect();
    assert_eq!(ids, vec![2, 3, 4]);
    let vip = offers.iter().find(|o| o.seat_id == 4).unwrap();
    assert_eq!(vip.category.as_deref(), Some("vip"));
    assert_eq!(vip.price_cents, 1500);
}

#[tokio::test]
async fn quote_validates_like_booking() {
    let (store, svc) = service().await;
    let quotes = svc.quote(SHOW, &[4, 2]).await.unwrap();
    assert_eq!(quotes.iter().map(|q| q.price_cents).sum::<i64>(), 2500);

    assert!(matches!(
        svc.quote(SHOW, &[6]).await.unwrap_err(),
        BookingError::Validation(ValidationError::SeatsNotInShowroom { .. })
    ));
    assert!(store.active_bookings(SHOW).await.is_empty());
}

#[tokio::test]
async fn transient_read_failures_are_retried() {
    let (store, svc) = service().await;
    store.fail_next_reads(3);
    assert!(svc.book_seats(SHOW, &[1], 1).await.unwrap().is_booked());
    assert_eq!(store.active_bookings(SHOW).await.len(), 1);
}

#[tokio::test]
async fn read_failures_surface_after_retry_bound() {
    let (store, svc) = service().await;
    store.fail_next_reads(100);
    match svc.book_seats(SHOW, &[1], 1).await.unwrap_err() {
        BookingError::Transient { attempts, .. } => assert_eq!(attempts, 4),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn commit_failure_is_ambiguous_and_not_retried() {
    let (store, svc) = service().await;
    store.fail_next_commit();

    let err = svc.book_seats(SHOW, &[1, 2], 1).await.unwrap_err();
    assert!(matches!(err, BookingError::CommitAmbiguous { show_id: SHOW, .. }));

    // Повтор закоммитил бы бронь со второй попытки
    assert!(store.active_bookings(SHOW).await.is_empty());
    assert!(svc.book_seats(SHOW, &[1, 2], 2).await.unwrap().is_booked());
}

#[tokio::test]
async fn unique_index_rejection_is_a_conflict_not_an_ambiguous_commit() {
    let (store, svc) = service().await;
    store.fail_next_insert_unique();

    match svc.book_seats(SHOW, &[1, 2], 1).await.unwrap() {
        BookingOutcome::Conflict { unavailable } => assert_eq!(unavailable, vec![1, 2]),
        other => panic!("expected conflict, got {:?}", other),
    }
    assert!(store.active_bookings(SHOW).await.is_empty());
    assert_eq!(store.stored_booked_out(SHOW).await, Some(false));

    assert!(svc.book_seats(SHOW, &[1, 2], 1).await.unwrap().is_booked());
}

#[tokio::test]
async fn default_config_runs_scenario_with_retry() {
    let store = common::cinema().await;
    let svc = BookingService::new(store.clone(), BookingConfig::default());
    store.fail_next_reads(1);

    assert!(svc.book_seats(SHOW, &[1, 2], 100).await.unwrap().is_booked());
    assert!(matches!(
        svc.book_seats(SHOW, &[2, 3], 200).await.unwrap(),
        BookingOutcome::Conflict { ref unavailable } if unavailable == &vec![2]
    ));
    assert_eq!(svc.get_available_seats(SHOW).await.unwrap(), set(&[3, 4]));
    assert_eq!(svc.quote(SHOW, &[4]).await.unwrap()[0].price_cents, 1500);
    assert!(svc.book_seats(SHOW, &[3, 4], 200).await.unwrap().is_booked());
    assert!(svc.is_sold_out(SHOW).await.unwrap());
    assert!(svc.list_shows(true).await.unwrap().iter().all(|s| s.show_id != SHOW));
}

#[tokio::test]
async fn booking_gives_up_when_show_stays_locked() {
    let store = common::cinema().await;
    let svc = BookingService::new(
        store.clone(),
        BookingConfig { tx_timeout_ms: 30, read_retries: 1, retry_backoff_ms: 1, reconcile_interval_secs: 60 },
    );

    let held = store.begin(SHOW, Duration::from_secs(1)).await.unwrap();
    match svc.book_seats(SHOW, &[1], 1).await.unwrap_err() {
        BookingError::Transient { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("unexpected error: {:?}", other),
    }
    drop(held);

    assert!(svc.book_seats(SHOW, &[1], 1).await.unwrap().is_booked());
}

#[tokio::test]
async fn availability_waits_for_in_flight_booking() {
    let store = common::cinema().await;
    let svc = BookingService::new(store.clone(), common::config());

    let mut tx = store.begin(SHOW, Duration::from_secs(1)).await.unwrap();
    tx.insert_bookings(&cinema_booking::store::BookingDraft {
        booking_ref: uuid::Uuid::new_v4(),
        show_id: SHOW,
        user_id: 1,
        booking_time: chrono::Utc::now(),
        lines: vec![cinema_booking::store::DraftLine { seat_id: 2, price_cents: 1000 }],
    })
    .await
    .unwrap();

    let reader = {
        let svc = svc.clone();
        tokio::spawn(async move { svc.get_available_seats(SHOW).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!reader.is_finished());

    tx.commit().await.unwrap();
    let available = reader.await.unwrap().unwrap();
    assert_eq!(available, set(&[1, 3, 4]));
}

#[tokio::test]
async fn caller_can_abandon_booking_before_commit() {
    let store = common::cinema().await;
    let svc = BookingService::new(store.clone(), common::config());

    let held = store.begin(SHOW, Duration::from_secs(1)).await.unwrap();
    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), svc.book_seats(SHOW, &[1], 1)).await;
    assert!(abandoned.is_err());
    drop(held);

    assert!(store.active_bookings(SHOW).await.is_empty());
}

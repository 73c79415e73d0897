mod common;

use std::collections::HashSet;

use cinema_booking::models::BookingOutcome;

use common::{service, SHOW};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_requests_yield_one_winner() {
    for _ in 0..20 {
        let (store, svc) = service().await;

        let a = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.book_seats(SHOW, &[1, 2], 1).await })
        };
        let b = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.book_seats(SHOW, &[2, 3], 2).await })
        };

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        let (winner, loser) = match (&a, &b) {
            (BookingOutcome::Booked(w), BookingOutcome::Conflict { unavailable }) => (w, unavailable),
            (BookingOutcome::Conflict { unavailable }, BookingOutcome::Booked(w)) => (w, unavailable),
            other => panic!("expected exactly one winner, got {:?}", other),
        };
        assert_eq!(loser, &vec![2]);

        let rows = store.active_bookings(SHOW).await;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.booking_ref == winner.booking_ref));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_buyers_for_the_same_seat() {
    let (store, svc) = service().await;

    let handles: Vec<_> = (1..=32)
        .map(|user| {
            let svc = svc.clone();
            tokio::spawn(async move { svc.book_seats(SHOW, &[4], user).await })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            BookingOutcome::Booked(_) => winners += 1,
            BookingOutcome::Conflict { unavailable } => assert_eq!(unavailable, vec![4]),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(store.active_bookings(SHOW).await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_seats_race_still_marks_show_sold_out() {
    // Два покупателя берут два последних разных места - классический write skew
    for _ in 0..20 {
        let (store, svc) = service().await;
        svc.book_seats(SHOW, &[1, 2], 9).await.unwrap();

        let a = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.book_seats(SHOW, &[3], 1).await })
        };
        let b = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.book_seats(SHOW, &[4], 2).await })
        };
        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();
        assert!(a.is_booked() && b.is_booked());

        let sold_out_reported = [&a, &b]
            .iter()
            .filter(|o| matches!(o, BookingOutcome::Booked(bk) if bk.sold_out))
            .count();
        assert_eq!(sold_out_reported, 1);
        assert_eq!(store.stored_booked_out(SHOW).await, Some(true));
        assert!(svc.is_sold_out(SHOW).await.unwrap());

        let seats: HashSet<i64> = store.active_bookings(SHOW).await.iter().map(|r| r.seat_id).collect();
        assert_eq!(seats.len(), 4);
    }
}

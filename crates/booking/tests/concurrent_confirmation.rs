use booking::{BookingError, Cart, LessonUpdate, OrderDraft, Reconciler};
use rust_decimal::Decimal;
use shared::{
    domain::{CartItem, LessonChanges, LessonId, NewLesson, OrderStatus},
    protocol::{CartItemPayload, CreateOrderRequest},
};
use storage::Storage;

async fn file_backed_reconciler(dir: &tempfile::TempDir, space: u32) -> Reconciler {
    let db_path = dir.path().join("booking.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));
    let storage = Storage::with_max_connections(&database_url, 8)
        .await
        .expect("db");
    storage
        .insert_lesson(&NewLesson {
            id: LessonId::new("SN01"),
            topic: "Snowboarding".into(),
            location: "Hendon".into(),
            price: Decimal::from(10),
            space,
            image: None,
            description: None,
        })
        .await
        .expect("lesson");
    Reconciler::new(storage)
}

fn order_for(seats: i64) -> OrderDraft {
    OrderDraft::parse(&CreateOrderRequest {
        name: "Racer".into(),
        phone: "07700900123".into(),
        cart_items: vec![CartItemPayload::new("SN01", seats)],
    })
    .expect("draft")
}

fn cart_for(seats: u32) -> Cart {
    Cart::new(vec![CartItem {
        lesson_id: LessonId::new("SN01"),
        count: seats,
    }])
    .expect("cart")
}

async fn space_left(reconciler: &Reconciler) -> u32 {
    reconciler
        .storage()
        .lesson_by_id(&LessonId::new("SN01"))
        .await
        .expect("lookup")
        .expect("lesson")
        .space
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_confirmations_never_oversell() {
    let dir = tempfile::tempdir().expect("tempdir");
    let reconciler = file_backed_reconciler(&dir, 5).await;

    // Both pass the creation check; together they want 6 of 5 seats.
    let first = reconciler.create_order(order_for(3)).await.expect("create").id;
    let second = reconciler.create_order(order_for(3)).await.expect("create").id;

    let a = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.confirm_order(first, &cart_for(3)).await })
    };
    let b = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.confirm_order(second, &cart_for(3)).await })
    };
    let results = [a.await.expect("join"), b.await.expect("join")];

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let rejections = results
        .iter()
        .filter(|r| {
            matches!(
                r,
                Err(BookingError::InsufficientCapacity {
                    available: 2,
                    requested: 3,
                    ..
                })
            )
        })
        .count();
    assert_eq!(successes, 1, "results: {results:?}");
    assert_eq!(rejections, 1, "results: {results:?}");
    assert_eq!(space_left(&reconciler).await, 2);

    let statuses = [
        reconciler.order(first).await.expect("order").status,
        reconciler.order(second).await.expect("order").status,
    ];
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == OrderStatus::Confirmed)
            .count(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_single_seat_confirmations_fill_exactly_to_capacity() {
    let dir = tempfile::tempdir().expect("tempdir");
    let reconciler = file_backed_reconciler(&dir, 4).await;

    let mut orders = Vec::new();
    for _ in 0..10 {
        orders.push(reconciler.create_order(order_for(1)).await.expect("create"));
    }

    let confirmations = orders.iter().map(|order| {
        let reconciler = reconciler.clone();
        let order_id = order.id;
        async move { reconciler.confirm_order(order_id, &cart_for(1)).await }
    });
    let results = futures::future::join_all(confirmations).await;

    let confirmed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(confirmed, 4, "results: {results:?}");
    assert!(results.iter().all(|r| matches!(
        r,
        Ok(_) | Err(BookingError::InsufficientCapacity { .. })
    )));
    assert_eq!(space_left(&reconciler).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn field_patch_and_confirmation_on_one_lesson_both_land() {
    let dir = tempfile::tempdir().expect("tempdir");
    let reconciler = file_backed_reconciler(&dir, 5).await;
    let order = reconciler.create_order(order_for(2)).await.expect("create").id;
    let reprice = LessonUpdate::new(
        LessonId::new("SN01"),
        LessonChanges {
            price: Some(Decimal::new(1250, 2)),
            description: Some("Now with rentals".into()),
            ..LessonChanges::default()
        },
    )
    .expect("update");

    let confirm = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.confirm_order(order, &cart_for(2)).await })
    };
    let patch = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.patch_lessons(&[reprice]).await })
    };
    confirm.await.expect("join").expect("confirm");
    patch.await.expect("join").expect("patch");

    let lesson = reconciler
        .storage()
        .lesson_by_id(&LessonId::new("SN01"))
        .await
        .expect("lookup")
        .expect("lesson");
    assert_eq!(lesson.space, 3);
    assert_eq!(lesson.price, Decimal::new(1250, 2));
    assert_eq!(lesson.description.as_deref(), Some("Now with rentals"));
    assert_eq!(
        reconciler.order(order).await.expect("order").status,
        OrderStatus::Confirmed
    );
}

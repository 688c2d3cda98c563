//! Writes that match no row after every check has passed surface as
//! `UpdateFailed` and roll back the whole transaction. A `RAISE(IGNORE)`
//! trigger stands in for the lost write.

use booking::{BookingError, Cart, LessonUpdate, OrderDraft, Reconciler};
use rust_decimal::Decimal;
use shared::{
    domain::{CartItem, LessonChanges, LessonId, NewLesson, OrderStatus},
    protocol::{CartItemPayload, CreateOrderRequest},
};
use storage::Storage;

async fn reconciler_with_trigger(dir: &tempfile::TempDir, trigger: &str) -> Reconciler {
    let db_path = dir.path().join("booking.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));
    let storage = Storage::new(&database_url).await.expect("db");
    for id in ["SN01", "SN02"] {
        storage
            .insert_lesson(&NewLesson {
                id: LessonId::new(id),
                topic: "Snowboarding".into(),
                location: "Hendon".into(),
                price: Decimal::from(10),
                space: 5,
                image: None,
                description: Some("Beginners".into()),
            })
            .await
            .expect("lesson");
    }

    let admin = sqlx::SqlitePool::connect(&database_url)
        .await
        .expect("admin connection");
    sqlx::query(trigger).execute(&admin).await.expect("trigger");
    admin.close().await;

    Reconciler::new(storage)
}

async fn lesson(reconciler: &Reconciler, id: &str) -> shared::domain::Lesson {
    reconciler
        .storage()
        .lesson_by_id(&LessonId::new(id))
        .await
        .expect("lookup")
        .expect("lesson")
}

#[tokio::test]
async fn unapplied_decrement_fails_confirmation_and_keeps_order_pending() {
    let dir = tempfile::tempdir().expect("tempdir");
    let reconciler = reconciler_with_trigger(
        &dir,
        "CREATE TRIGGER freeze_sn02_space BEFORE UPDATE OF space ON lessons
         WHEN old.id = 'SN02'
         BEGIN SELECT RAISE(IGNORE); END",
    )
    .await;
    let draft = OrderDraft::parse(&CreateOrderRequest {
        name: "Ada".into(),
        phone: "07700900123".into(),
        cart_items: vec![
            CartItemPayload::new("SN01", 2),
            CartItemPayload::new("SN02", 1),
        ],
    })
    .expect("draft");
    let order = reconciler.create_order(draft).await.expect("create");
    let cart = Cart::new(vec![
        CartItem {
            lesson_id: LessonId::new("SN01"),
            count: 2,
        },
        CartItem {
            lesson_id: LessonId::new("SN02"),
            count: 1,
        },
    ])
    .expect("cart");

    let err = reconciler
        .confirm_order(order.id, &cart)
        .await
        .expect_err("SN02 decrement is dropped");
    assert!(matches!(err, BookingError::UpdateFailed(ref m) if m.contains("SN02")));

    assert_eq!(lesson(&reconciler, "SN01").await.space, 5);
    assert_eq!(lesson(&reconciler, "SN02").await.space, 5);
    assert_eq!(
        reconciler.order(order.id).await.expect("order").status,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn unapplied_field_change_fails_the_whole_batch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let reconciler = reconciler_with_trigger(
        &dir,
        "CREATE TRIGGER freeze_sn02_description BEFORE UPDATE OF description ON lessons
         WHEN old.id = 'SN02'
         BEGIN SELECT RAISE(IGNORE); END",
    )
    .await;
    let updates = [
        LessonUpdate::new(
            LessonId::new("SN01"),
            LessonChanges {
                price: Some(Decimal::from(12)),
                ..LessonChanges::default()
            },
        )
        .expect("update"),
        LessonUpdate::new(
            LessonId::new("SN02"),
            LessonChanges {
                description: Some("Advanced".into()),
                ..LessonChanges::default()
            },
        )
        .expect("update"),
    ];

    let err = reconciler
        .patch_lessons(&updates)
        .await
        .expect_err("SN02 change is dropped");
    assert!(matches!(err, BookingError::UpdateFailed(ref m) if m.contains("SN02")));

    assert_eq!(lesson(&reconciler, "SN01").await.price, Decimal::from(10));
    assert_eq!(
        lesson(&reconciler, "SN02").await.description.as_deref(),
        Some("Beginners")
    );
}

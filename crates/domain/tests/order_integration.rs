//! Integration tests for order creation and update.
//!
//! These tests drive the order service end to end against the in-memory
//! store and check stock conservation, atomicity, the closed update policy
//! and price integrity.

use std::sync::Arc;

use common::{Money, OrderId, ProductId};
use domain::{
    CreateOrder, DomainError, OrderService, OrderStatus, OrderType, UpdateOrder, Violation,
    ViolationReason,
};
use order_store::{InMemoryOrderStore, OrderStore};

/// Helper to create a service with one product per `(stock, price_cents)`.
async fn create_service(
    stock: &[(i64, i64)],
) -> (OrderService<InMemoryOrderStore>, Vec<ProductId>) {
    let store = InMemoryOrderStore::new();
    let mut ids = Vec::new();
    for (i, &(quantity, cents)) in stock.iter().enumerate() {
        let product = store
            .insert_product(&format!("SKU-{i:03}"), quantity, Money::from_cents(cents))
            .await
            .unwrap();
        ids.push(product.id);
    }
    (OrderService::new(store), ids)
}

fn new_order(code: &str) -> CreateOrder {
    CreateOrder::new(code, OrderType::Online, OrderStatus::Pending)
}

mod scenarios {
    use super::*;

    /// A: P1 quantity=10, price=5. Create [P1x3].
    /// B: update to [P1x5].
    /// C: update to [P1x5, P2x1] with P2 never on the order.
    #[tokio::test]
    async fn create_then_grow_then_ignore_foreign_product() {
        let (service, ids) = create_service(&[(10, 5), (10, 7)]).await;
        let (p1, p2) = (ids[0], ids[1]);

        // A
        let created = service
            .create_order(new_order("ORD-A").with_line(p1, 3))
            .await
            .unwrap();
        assert_eq!(created.order.total_price, Money::from_cents(15));
        assert_eq!(service.store().stock_of(p1).await, Some(7));
        let order_id = created.order.id;

        // B
        let updated = service
            .update_order(UpdateOrder::new(order_id).with_line(p1, 5))
            .await
            .unwrap();
        assert_eq!(updated.order.total_price, Money::from_cents(25));
        assert_eq!(service.store().stock_of(p1).await, Some(5));

        // C
        let updated_c = service
            .update_order(UpdateOrder::new(order_id).with_line(p1, 5).with_line(p2, 1))
            .await
            .unwrap();
        assert_eq!(updated_c.lines, updated.lines);
        assert_eq!(updated_c.order.total_price, Money::from_cents(25));
        assert_eq!(service.store().stock_of(p1).await, Some(5));
        assert_eq!(service.store().stock_of(p2).await, Some(10));
        assert!(updated_c.line_for(p2).is_none());
    }

    /// D: P1 quantity=2. Create [P1x5].
    #[tokio::test]
    async fn insufficient_stock_is_rejected_without_change() {
        let (service, ids) = create_service(&[(2, 5)]).await;

        let err = service
            .create_order(new_order("ORD-D").with_line(ids[0], 5))
            .await
            .unwrap_err();

        match err {
            DomainError::ValidationFailed(violations) => {
                assert_eq!(violations, vec![Violation::insufficient_stock(ids[0], 2)]);
            }
            other => panic!("expected ValidationFailed, got {other:?}"),
        }
        assert_eq!(service.store().stock_of(ids[0]).await, Some(2));
        assert_eq!(service.store().order_count().await, 0);
    }
}

mod conservation {
    use super::*;

    #[tokio::test]
    async fn stock_after_equals_stock_before_minus_delta() {
        let (service, ids) = create_service(&[(20, 1), (20, 1), (20, 1)]).await;

        let created = service
            .create_order(
                new_order("ORD-1")
                    .with_line(ids[0], 4)
                    .with_line(ids[1], 6)
                    .with_line(ids[2], 1),
            )
            .await
            .unwrap();
        assert_eq!(service.store().stock_of(ids[0]).await, Some(16));
        assert_eq!(service.store().stock_of(ids[1]).await, Some(14));
        assert_eq!(service.store().stock_of(ids[2]).await, Some(19));

        // +3, -5, 0
        service
            .update_order(
                UpdateOrder::new(created.order.id)
                    .with_line(ids[0], 7)
                    .with_line(ids[1], 1)
                    .with_line(ids[2], 1),
            )
            .await
            .unwrap();
        assert_eq!(service.store().stock_of(ids[0]).await, Some(13));
        assert_eq!(service.store().stock_of(ids[1]).await, Some(19));
        assert_eq!(service.store().stock_of(ids[2]).await, Some(19));
    }

    #[tokio::test]
    async fn update_may_use_stock_it_already_holds() {
        let (service, ids) = create_service(&[(5, 1)]).await;
        let created = service
            .create_order(new_order("ORD-1").with_line(ids[0], 5))
            .await
            .unwrap();
        assert_eq!(service.store().stock_of(ids[0]).await, Some(0));

        // Same quantity: zero delta, no stock needed.
        service
            .update_order(UpdateOrder::new(created.order.id).with_line(ids[0], 5))
            .await
            .unwrap();

        // One more than held: one unit needed, none left.
        let err = service
            .update_order(UpdateOrder::new(created.order.id).with_line(ids[0], 6))
            .await
            .unwrap_err();
        assert_eq!(err.violations(), &[Violation::insufficient_stock(ids[0], 0)]);
    }
}

mod atomicity {
    use super::*;

    #[tokio::test]
    async fn one_bad_line_rejects_the_whole_order() {
        let (service, ids) = create_service(&[(10, 1), (1, 1)]).await;

        let err = service
            .create_order(new_order("ORD-1").with_line(ids[0], 2).with_line(ids[1], 2))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::ValidationFailed(_)));
        assert_eq!(service.store().stock_of(ids[0]).await, Some(10));
        assert_eq!(service.store().stock_of(ids[1]).await, Some(1));
        assert_eq!(service.store().line_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_product_rejects_the_whole_order() {
        let (service, ids) = create_service(&[(10, 1)]).await;

        let err = service
            .create_order(
                new_order("ORD-1")
                    .with_line(ids[0], 2)
                    .with_line(ProductId::new(404), 1),
            )
            .await
            .unwrap_err();

        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.violations()[0].reason, ViolationReason::NotFound);
        assert_eq!(err.violations()[0].available_quantity, None);
        assert_eq!(service.store().stock_of(ids[0]).await, Some(10));
    }

    #[tokio::test]
    async fn failed_update_leaves_lines_and_stock_untouched() {
        let (service, ids) = create_service(&[(10, 3), (10, 4)]).await;
        let created = service
            .create_order(new_order("ORD-1").with_line(ids[0], 2).with_line(ids[1], 2))
            .await
            .unwrap();

        service.store().set_fail_line_writes(true);
        let result = service
            .update_order(
                UpdateOrder::new(created.order.id)
                    .with_line(ids[0], 1)
                    .with_line(ids[1], 5),
            )
            .await;
        assert!(matches!(result, Err(DomainError::Store(_))));

        service.store().set_fail_line_writes(false);
        let stored = service.get_order(created.order.id).await.unwrap();
        assert_eq!(stored, created);
        assert_eq!(service.store().stock_of(ids[0]).await, Some(8));
        assert_eq!(service.store().stock_of(ids[1]).await, Some(8));
    }
}

mod closed_update_policy {
    use super::*;

    #[tokio::test]
    async fn foreign_products_never_gain_a_line_or_lose_stock() {
        let (service, ids) = create_service(&[(10, 1), (3, 1)]).await;
        let created = service
            .create_order(new_order("ORD-1").with_line(ids[0], 1))
            .await
            .unwrap();

        let updated = service
            .update_order(UpdateOrder::new(created.order.id).with_line(ids[1], 3))
            .await
            .unwrap();

        assert_eq!(updated.lines.len(), 1);
        assert_eq!(updated.lines[0].product_id, ids[0]);
        assert_eq!(service.store().stock_of(ids[1]).await, Some(3));
    }

    #[tokio::test]
    async fn foreign_unknown_product_is_dropped_not_rejected() {
        let (service, ids) = create_service(&[(10, 1)]).await;
        let created = service
            .create_order(new_order("ORD-1").with_line(ids[0], 1))
            .await
            .unwrap();

        let result = service
            .update_order(UpdateOrder::new(created.order.id).with_line(ProductId::new(77), 1))
            .await;

        assert!(result.is_ok());
    }
}

mod price_integrity {
    use super::*;

    #[tokio::test]
    async fn total_is_sum_of_line_quantity_times_price() {
        let (service, ids) = create_service(&[(50, 199), (50, 1250), (50, 1)]).await;

        let created = service
            .create_order(
                new_order("ORD-1")
                    .with_line(ids[0], 3)
                    .with_line(ids[1], 2)
                    .with_line(ids[2], 10),
            )
            .await
            .unwrap();

        let products = service.store().find_products(&ids).await.unwrap();
        let expected: Money = created
            .lines
            .iter()
            .map(|l| {
                let product = products.iter().find(|p| p.id == l.product_id).unwrap();
                product.price.checked_mul(l.quantity).unwrap()
            })
            .sum();
        assert_eq!(created.order.total_price, expected);
        assert_eq!(expected.cents(), 3 * 199 + 2 * 1250 + 10);
    }

    #[tokio::test]
    async fn update_total_covers_every_line() {
        let (service, ids) = create_service(&[(50, 100), (50, 10)]).await;
        let created = service
            .create_order(new_order("ORD-1").with_line(ids[0], 1).with_line(ids[1], 1))
            .await
            .unwrap();

        let updated = service
            .update_order(UpdateOrder::new(created.order.id).with_line(ids[1], 4))
            .await
            .unwrap();

        assert_eq!(updated.order.total_price, Money::from_cents(100 + 40));
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_never_oversell() {
        let (service, ids) = create_service(&[(5, 10)]).await;
        let service = Arc::new(service);
        let product = ids[0];

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .create_order(new_order(&format!("ORD-{i}")).with_line(product, 2))
                        .await
                })
            })
            .collect();

        let results: Vec<_> = futures_util::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let committed = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(committed, 2);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                matches!(
                    err,
                    DomainError::ValidationFailed(_) | DomainError::Conflict(_)
                ),
                "unexpected error: {err:?}"
            );
        }
        assert_eq!(service.store().stock_of(product).await, Some(1));
        assert_eq!(service.store().order_count().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_of_one_order_stay_consistent() {
        let (service, ids) = create_service(&[(100, 1)]).await;
        let service = Arc::new(service);
        let product = ids[0];
        let order_id: OrderId = service
            .create_order(new_order("ORD-1").with_line(product, 10))
            .await
            .unwrap()
            .order
            .id;

        let handles: Vec<_> = (1..=10)
            .map(|q| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .update_order(UpdateOrder::new(order_id).with_line(product, q))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let order = service.get_order(order_id).await.unwrap();
        let held = order.lines[0].quantity;
        assert_eq!(service.store().stock_of(product).await, Some(100 - held));
        assert_eq!(order.order.total_price, Money::from_cents(held));
    }
}

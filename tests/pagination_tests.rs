//! Cursor pagination over twenty products priced 0, 10, .., 190

mod common;

use common::{counting_database, CountingDriver, Product};
use firestore_odm::{atomic, Database, Manager, OdmError, Page};
use futures::TryStreamExt;
use serde_json::json;

async fn priced() -> (Database, Manager<Product>, CountingDriver) {
    let (db, driver) = counting_database();
    let products = db.manager::<Product>().unwrap();
    atomic::batch(&db, || async {
        for i in 0..20i32 {
            products
                .create(&Product::new(&format!("item-{:02}", i), f64::from(i * 10)), None)
                .await?;
        }
        Ok::<_, OdmError>(())
    })
    .await
    .unwrap();
    (db, products, driver)
}

fn prices(products: &[Product]) -> Vec<f64> {
    products.iter().map(|p| p.price).collect()
}

#[tokio::test]
async fn test_manual_cursor_pagination() {
    let (_db, products, _) = priced().await;
    let by_price = products.all().order_by(["price"]).limit(5);

    let mut seen = Vec::new();
    let mut page = by_price.fetch().await.unwrap();
    while !page.is_empty() {
        seen.extend(prices(&page));
        let last = page.last().cloned().unwrap();
        page = by_price.start_after(&last).fetch().await.unwrap();
    }

    let expected: Vec<f64> = (0..20i32).map(|i| f64::from(i * 10)).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_start_after_excludes_and_start_at_includes() {
    let (_db, products, _) = priced().await;
    let by_price = products.all().order_by(["price"]).limit(3);

    let after = by_price.start_after(&json!({"price": 50})).fetch().await.unwrap();
    assert_eq!(prices(&after), vec![60.0, 70.0, 80.0]);

    let at = by_price.start_at(&json!({"price": 50})).fetch().await.unwrap();
    assert_eq!(prices(&at), vec![50.0, 60.0, 70.0]);

    let descending = products
        .all()
        .order_by(["-price"])
        .limit(2)
        .start_after(&json!({"price": 50}))
        .fetch()
        .await
        .unwrap();
    assert_eq!(prices(&descending), vec![40.0, 30.0]);
}

#[tokio::test]
async fn test_paginator_pages() {
    let (_db, products, _) = priced().await;
    let paginator = products
        .all()
        .filter("price__gte", 30)
        .order_by(["price"])
        .paginate(5);

    assert_eq!(paginator.count().await.unwrap(), 17);
    assert_eq!(paginator.num_pages().await.unwrap(), 4);

    let pages: Vec<Page<'_, Product>> = paginator.pages().try_collect().await.unwrap();
    let numbers: Vec<usize> = pages.iter().map(Page::number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    assert_eq!(prices(pages[0].object_list()), vec![30.0, 40.0, 50.0, 60.0, 70.0]);
    assert_eq!(prices(pages[3].object_list()), vec![180.0, 190.0]);
    assert_eq!(pages[1].describe().await.unwrap(), "<Page 2 of 4>");
    assert!(pages[2].has_next().await.unwrap());
    assert!(!pages[3].has_next().await.unwrap());

    let last = &pages[3];
    assert_eq!(last.len(), 2);
    assert!(!last.is_empty());
    assert_eq!(prices(&last.iter().cloned().collect::<Vec<_>>()), vec![180.0, 190.0]);
    assert!(last.has_previous());
    assert!(!pages[0].has_previous());
    assert!(pages[0].has_other_pages().await.unwrap());
    assert_eq!(pages[0].next_page_number(), 2);
    assert_eq!(pages[0].previous_page_number(), None);
    assert_eq!(last.previous_page_number(), Some(3));
}

#[tokio::test]
async fn test_paginator_count_is_memoized() {
    let (_db, products, driver) = priced().await;
    let paginator = products.paginate(8);

    let before = driver.query_count();
    assert_eq!(paginator.num_pages().await.unwrap(), 3);
    assert_eq!(paginator.count().await.unwrap(), 20);
    assert_eq!(paginator.num_pages().await.unwrap(), 3);
    assert_eq!(driver.query_count(), before + 1);
}

#[tokio::test]
async fn test_pages_restart_on_each_call() {
    let (_db, products, _) = priced().await;
    let paginator = products.all().order_by(["-price"]).paginate(15);

    for _ in 0..2 {
        let pages: Vec<_> = paginator.pages().try_collect().await.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0][0].price, 190.0);
        assert_eq!(pages[1].len(), 5);
    }
}

//! Atomic batch scopes

mod common;

use common::{counting_database, Product};
use firestore_odm::firestore::UpdateData;
use firestore_odm::{atomic, Database, DocumentExt, Manager, OdmError};

#[tokio::test]
async fn test_writes_visible_only_after_scope() {
    let (db, driver) = counting_database();
    let products = db.manager::<Product>().unwrap();

    let saved = atomic::batch(&db, || async {
        let mut laptop = Product::new("Laptop", 1000.0);
        let mut mouse = Product::new("Mouse", 20.0);
        laptop.save(&products).await?;
        mouse.save(&products).await?;

        // pks are allocated up front, the writes are only staged
        assert!(laptop.id.is_some() && mouse.id.is_some());
        assert!(atomic::in_batch());
        assert_eq!(products.count().await?, 0);
        Ok::<_, OdmError>(vec![laptop, mouse])
    })
    .await
    .unwrap();

    assert!(!atomic::in_batch());
    assert_eq!(driver.commit_count(), 1);
    assert_eq!(products.count().await.unwrap(), 2);
    for product in &saved {
        let loaded = products.get_pk(product.id.as_deref().unwrap()).await.unwrap();
        assert_eq!(&loaded, product);
    }
}

#[tokio::test]
async fn test_error_discards_staged_writes() {
    let (db, driver) = counting_database();
    let products = db.manager::<Product>().unwrap();

    let result: Result<(), OdmError> = atomic::batch(&db, || async {
        products.create(&Product::new("Laptop", 1000.0), None).await?;
        products.create(&Product::new("Mouse", 20.0), None).await?;
        Err(OdmError::InvalidDocument("abort".into()))
    })
    .await;

    assert!(matches!(result, Err(OdmError::InvalidDocument(_))));
    assert_eq!(driver.commit_count(), 0);
    assert_eq!(products.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_nested_batch_fails_and_outer_commits() {
    let (db, _) = counting_database();
    let products = db.manager::<Product>().unwrap();

    atomic::batch(&db, || async {
        products.create(&Product::new("Outer", 1.0), None).await?;
        let nested = atomic::batch(&db, || async { Ok::<_, OdmError>(()) }).await;
        assert!(matches!(nested, Err(OdmError::NestedBatch)));
        Ok::<_, OdmError>(())
    })
    .await
    .unwrap();

    assert_eq!(products.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_commit_applies_nothing() {
    let (db, _) = counting_database();
    let products = db.manager::<Product>().unwrap();

    let err = atomic::batch(&db, || async {
        products.create(&Product::new("Kept?", 1.0), None).await?;
        products
            .update("missing", UpdateData::new().set("price", 2.0))
            .await?;
        Ok::<_, OdmError>(())
    })
    .await
    .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(products.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_spawned_tasks_write_directly() {
    let (db, _) = counting_database();
    let products = db.manager::<Product>().unwrap();

    atomic::batch(&db, || async {
        let spawned = products.clone();
        tokio::spawn(async move {
            assert!(!atomic::in_batch());
            spawned.create(&Product::new("Direct", 5.0), None).await
        })
        .await
        .expect("task panicked")?;

        assert_eq!(products.count().await?, 1);
        products.create(&Product::new("Staged", 6.0), None).await?;
        assert_eq!(products.count().await?, 1);
        Ok::<_, OdmError>(())
    })
    .await
    .unwrap();

    assert_eq!(products.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_empty_batch_commits_nothing() {
    let (db, driver) = counting_database();
    let value = atomic::batch(&db, || async { Ok::<_, OdmError>(42) })
        .await
        .unwrap();
    assert_eq!(value, 42);
    assert_eq!(driver.commit_count(), 0);
}

#[tokio::test]
async fn test_delete_is_staged() {
    let (db, _) = counting_database();
    let products = db.manager::<Product>().unwrap();
    let created = products.create(&Product::new("Doomed", 1.0), None).await.unwrap();
    let pk = created.id.clone().unwrap();

    atomic::batch(&db, || async {
        created.delete(&products).await?;
        assert!(products.get_pk(&pk).await.is_ok());
        Ok::<_, OdmError>(())
    })
    .await
    .unwrap();

    assert!(products.get_pk(&pk).await.unwrap_err().is_not_found());
}

/// Stage three products with pks `<prefix>-0..3`, yielding between writes
async fn staged_run(db: Database, products: Manager<Product>, prefix: &'static str) -> Result<(), OdmError> {
    atomic::batch(&db, || async {
        for i in 0..3 {
            assert!(atomic::in_batch());
            products
                .create(&Product::new(prefix, i as f64), Some(&format!("{}-{}", prefix, i)))
                .await?;
            tokio::task::yield_now().await;
        }
        Ok::<_, OdmError>(())
    })
    .await
}

fn expected_paths(prefix: &str) -> Vec<String> {
    (0..3).map(|i| format!("products/{}-{}", prefix, i)).collect()
}

#[tokio::test]
async fn test_interleaved_batches_in_one_task_stay_separate() {
    let (db, driver) = counting_database();
    let products = db.manager::<Product>().unwrap();

    let (left, right) = tokio::join!(
        staged_run(db.clone(), products.clone(), "left"),
        staged_run(db.clone(), products.clone(), "right"),
    );
    left.unwrap();
    right.unwrap();
    assert!(!atomic::in_batch());

    let mut commits = driver.committed_paths();
    commits.sort();
    assert_eq!(commits, vec![expected_paths("left"), expected_paths("right")]);
    assert_eq!(products.count().await.unwrap(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batches_in_spawned_tasks_stay_separate() {
    let (db, driver) = counting_database();
    let products = db.manager::<Product>().unwrap();

    let handles: Vec<_> = ["a", "b", "c", "d"]
        .into_iter()
        .map(|prefix| tokio::spawn(staged_run(db.clone(), products.clone(), prefix)))
        .collect();
    for handle in handles {
        handle.await.expect("task panicked").unwrap();
    }
    assert!(!atomic::in_batch());

    let mut commits = driver.committed_paths();
    commits.sort();
    assert_eq!(
        commits,
        vec![
            expected_paths("a"),
            expected_paths("b"),
            expected_paths("c"),
            expected_paths("d"),
        ]
    );
}

#[tokio::test]
async fn test_manager_of_other_database_cannot_join_batch() {
    let (owner, owner_driver) = counting_database();
    let (other, other_driver) = counting_database();
    let products = owner.manager::<Product>().unwrap();

    let err = atomic::batch(&other, || async {
        products.create(&Product::new("Stray", 1.0), None).await?;
        Ok::<_, OdmError>(())
    })
    .await
    .unwrap_err();

    assert!(matches!(err, OdmError::ForeignBatch { document_type: "Product" }));
    assert!(err.is_usage_error());
    assert_eq!(owner_driver.commit_count(), 0);
    assert_eq!(other_driver.commit_count(), 0);
    assert_eq!(products.count().await.unwrap(), 0);
    assert_eq!(other.manager::<Product>().unwrap().count().await.unwrap(), 0);

    // a clone of the owning database shares its client
    atomic::batch(&owner.clone(), || async {
        products.create(&Product::new("Owned", 1.0), None).await?;
        Ok::<_, OdmError>(())
    })
    .await
    .unwrap();
    assert_eq!(products.count().await.unwrap(), 1);
}

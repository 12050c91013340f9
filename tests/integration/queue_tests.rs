//! Durability tests for the on-disk frontier queue

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use webscour::queue::{publish_seeds, Broker, Consumer, SqliteBroker};

const QUEUE: &str = "url_queue";

#[test]
fn test_messages_survive_reopen() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("frontier.db");

    {
        let broker = SqliteBroker::open(&db_path).unwrap();
        let seeds = ["https://a.example/", "https://b.example/"];
        assert_eq!(publish_seeds(&broker, QUEUE, &seeds).unwrap(), 2);
    }

    let broker = SqliteBroker::open(&db_path).unwrap();
    let first = broker.try_consume(QUEUE, "w1", 1).unwrap().unwrap();
    assert_eq!(first.url().unwrap(), "https://a.example/");
    assert!(!first.redelivered);
    assert_eq!(broker.stats(QUEUE).unwrap().ready, 1);
}

#[test]
fn test_unacked_delivery_returns_after_crash() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("frontier.db");

    {
        let broker = SqliteBroker::open(&db_path).unwrap();
        publish_seeds(&broker, QUEUE, &["https://a.example/"]).unwrap();
        // Taken but never acknowledged, as if the worker process died
        broker.try_consume(QUEUE, "w1", 1).unwrap().unwrap();
    }

    let broker = SqliteBroker::open(&db_path).unwrap();
    assert_eq!(broker.stats(QUEUE).unwrap().unacked, 1);
    assert_eq!(broker.recover_all(QUEUE).unwrap(), 1);

    let again = broker.try_consume(QUEUE, "w2", 1).unwrap().unwrap();
    assert_eq!(again.url().unwrap(), "https://a.example/");
    assert!(again.redelivered);
}

#[test]
fn test_reopen_keeps_transient_queue_until_purged() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("frontier.db");

    {
        let broker = SqliteBroker::open(&db_path).unwrap();
        broker.declare("scratch", false).unwrap();
        broker.publish("scratch", b"https://a.example/").unwrap();
        broker.declare(QUEUE, true).unwrap();
        broker.publish(QUEUE, b"https://b.example/").unwrap();
    }

    // A second open, like `--stats` next to a live crawl, touches nothing
    let broker = SqliteBroker::open(&db_path).unwrap();
    assert_eq!(broker.stats("scratch").unwrap().ready, 1);

    assert_eq!(broker.purge_transient().unwrap(), 1);
    assert!(broker.stats("scratch").is_err());
    assert_eq!(broker.stats(QUEUE).unwrap().ready, 1);
}

#[tokio::test]
async fn test_consumer_sees_publish_from_other_connection() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("frontier.db");

    let worker_side: Arc<dyn Broker> = Arc::new(SqliteBroker::open(&db_path).unwrap());
    worker_side.declare(QUEUE, true).unwrap();
    let seeder_side = SqliteBroker::open(&db_path).unwrap();

    let mut consumer = Consumer::new(
        Arc::clone(&worker_side),
        QUEUE,
        "w1",
        1,
        Duration::from_millis(20),
    );
    let (_tx, mut shutdown) = tokio::sync::watch::channel(false);

    let seeder = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        publish_seeds(&seeder_side, QUEUE, &["https://late.example/"]).unwrap();
    });

    let delivery = tokio::time::timeout(Duration::from_secs(5), consumer.next(&mut shutdown))
        .await
        .expect("consumer never woke up")
        .unwrap()
        .unwrap();

    assert_eq!(delivery.url().unwrap(), "https://late.example/");
    consumer.ack(delivery.tag).unwrap();
    seeder.await.unwrap();
}

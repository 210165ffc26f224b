//! Topic Routing Tests
//!
//! Publish/subscribe through live sessions: membership, fan-out, topic
//! closure and resubscription.

mod common;

use bytes::Bytes;
use common::*;
use relay_hub::Frame;
use tokio_test::assert_ok;

#[tokio::test]
async fn test_publish_reaches_only_subscribers() {
    let mut test = TestHub::new(test_config());
    let mut c1 = test.connect().await;
    let mut c2 = test.connect().await;

    assert_ok!(c1.session.add_sub(["room1"]).await);
    assert_ok!(test.hub.pub_msg("hello", false, ["room1"]).await);

    assert_eq!(c1.peer.recv_timeout(WAIT).await, Some(text("hello")));
    assert_eq!(c2.peer.recv_timeout(QUIET).await, None);
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let mut test = TestHub::new(test_config());
    let mut client = test.connect().await;

    assert_ok!(client.session.add_sub(["a", "b"]).await);
    assert_ok!(client.session.un_sub(["a"]).await);

    assert_ok!(test.hub.pub_text_msg("A", false, ["a"]).await);
    assert_ok!(test.hub.pub_binary_msg(vec![9u8], true, ["b"]).await);

    assert_eq!(
        client.peer.recv_timeout(WAIT).await,
        Some(Frame::Binary(Bytes::from_static(&[9])))
    );
    assert_eq!(client.peer.recv_timeout(QUIET).await, None);

    // No topics means all of them
    assert_ok!(client.session.un_sub(Vec::<String>::new()).await);
    let stats = assert_ok!(test.hub.topic_stats().await);
    assert_eq!(stats.total_subscribers, 0);
}

#[tokio::test]
async fn test_closed_topic_allows_resubscribe() {
    let mut test = TestHub::new(test_config());
    let mut client = test.connect().await;

    assert_ok!(client.session.add_sub(["news"]).await);
    assert_ok!(test.hub.close_topic(["news"]).await);
    assert_ok!(test.hub.pub_msg("missed", false, ["news"]).await);
    assert_eq!(client.peer.recv_timeout(QUIET).await, None);

    // Losing the last topic does not end the session
    assert!(!client.session.is_closed());

    assert_ok!(client.session.add_sub(["news"]).await);
    assert_ok!(test.hub.pub_msg("back", false, ["news"]).await);
    assert_eq!(client.peer.recv_timeout(WAIT).await, Some(text("back")));
}

#[tokio::test]
async fn test_disconnect_releases_memberships() {
    let mut test = TestHub::new(test_config());
    let mut client = test.connect().await;

    assert_ok!(client.session.add_sub(["x", "y"]).await);
    let stats = assert_ok!(test.hub.topic_stats().await);
    assert_eq!(stats.total_subscriptions, 2);

    client.peer.hang_up();
    finished(client.task).await;

    let stats = assert_ok!(test.hub.topic_stats().await);
    assert_eq!(stats.total_topics, 0);
    assert_eq!(stats.total_subscribers, 0);
}

#[tokio::test]
async fn test_subscribe_from_message_handler() {
    let mut test = TestHub::new(test_config());
    let hub = test.hub.clone();
    test.hub.on_message(move |session, payload| {
        let hub = hub.clone();
        async move {
            let topic = String::from_utf8_lossy(&payload).into_owned();
            if session.add_sub([topic.clone()]).await.is_ok() {
                let _ = hub.pub_msg(format!("joined {}", topic), false, [topic]).await;
            }
        }
    });

    let mut client = test.connect().await;
    client.peer.send(text("lobby")).await.unwrap();
    assert_eq!(client.peer.recv_timeout(WAIT).await, Some(text("joined lobby")));
}

//! WebSocket Round-Trip Tests
//!
//! Runs a real broker on an ephemeral port and talks to it with
//! `SyncClient`, covering the full path from socket frame to dispatcher and
//! back out to subscribers.

use std::sync::Arc;
use std::time::Duration;

use pubmarine::client::{ClientError, SyncClient};
use pubmarine::http_server::{BrokerConfig, BrokerServer};
use pubmarine::realtime::Dispatcher;
use pubmarine::subscription::SubscriptionKey;
use pubmarine::schema::{FieldType, FieldValue, Schema};
use serde_json::{json, Map, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

// =============================================================================
// Helper Functions
// =============================================================================

struct Running {
    url: String,
    dispatcher: Arc<Dispatcher>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

async fn start_broker() -> Running {
    let config = BrokerConfig::with_addr("127.0.0.1:0").unwrap();
    let server = BrokerServer::bind(config).await.unwrap();
    let url = server.ws_url();
    let dispatcher = server.dispatcher();

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        server
            .serve(async {
                let _ = stopped.await;
            })
            .await
            .unwrap();
    });

    Running {
        url,
        dispatcher,
        stop,
        task,
    }
}

async fn shutdown(running: Running) {
    let _ = running.stop.send(());
    let _ = timeout(Duration::from_secs(5), running.task).await;
}

fn change(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn point_schema() -> Schema {
    Schema::default()
        .with_field("label", FieldType::String)
        .with_field("x", FieldType::Int)
        .with_field("y", FieldType::Float)
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_schema_and_instance_round_trip() {
    let broker = start_broker().await;
    let client = SyncClient::connect(&broker.url).await.unwrap();

    client.auth("tester").await.unwrap();
    client.set_schema("point", point_schema()).await.unwrap();
    client.set_schema("empty", Schema::default()).await.unwrap();

    // requests on one connection are handled in order
    assert_eq!(client.list().await.unwrap(), vec!["empty", "point"]);
    assert_eq!(client.get_schema("point").await.unwrap(), point_schema());
    assert!(client.get_schema("missing").await.unwrap().is_empty());

    let (id, instance) = client.instantiate("point").await.unwrap();
    assert!(!id.is_empty());
    assert_eq!(instance.schema_id, "point");
    assert_eq!(instance.data["label"], FieldValue::Text(String::new()));
    assert_eq!(instance.data["x"], FieldValue::Int(0));
    assert_eq!(instance.data["y"], FieldValue::Float(0.0));

    client.close().await;
    shutdown(broker).await;
}

#[tokio::test]
async fn test_instantiate_unknown_schema_is_server_error() {
    let broker = start_broker().await;
    let client = SyncClient::connect(&broker.url).await.unwrap();

    let err = client.instantiate("ghost").await.unwrap_err();
    match err {
        ClientError::Server(msg) => assert_eq!(msg, "unknown schema, cannot instance"),
        other => panic!("unexpected error: {other}"),
    }

    client.close().await;
    shutdown(broker).await;
}

#[tokio::test]
async fn test_mutation_fans_out_to_subscribers() {
    let broker = start_broker().await;
    let owner = SyncClient::connect(&broker.url).await.unwrap();
    let mut watcher = SyncClient::connect(&broker.url).await.unwrap();

    owner.set_schema("point", point_schema()).await.unwrap();
    let (id, _) = owner.instantiate("point").await.unwrap();

    watcher.subscribe(&id, false).await.unwrap();
    // the list reply proves the sub ahead of it was handled
    watcher.list().await.unwrap();

    let request_id = owner
        .mutate(&id, change(&[("x", json!(7)), ("label", json!(3)), ("z", json!(1))]))
        .await
        .unwrap();

    let event = timeout(Duration::from_secs(5), watcher.next_event())
        .await
        .expect("broadcast in time")
        .expect("connection open");

    assert_eq!(event.kind, "mut");
    assert_eq!(event.id, request_id);
    assert_eq!(event.msg, json!({"Id": id, "Change": {"x": 7}}));

    owner.close().await;
    watcher.close().await;
    shutdown(broker).await;
}

#[tokio::test]
async fn test_unsubscribed_client_hears_nothing() {
    let broker = start_broker().await;
    let owner = SyncClient::connect(&broker.url).await.unwrap();
    let mut watcher = SyncClient::connect(&broker.url).await.unwrap();

    owner.set_schema("point", point_schema()).await.unwrap();
    let (id, _) = owner.instantiate("point").await.unwrap();

    watcher.subscribe(&id, false).await.unwrap();
    watcher.unsubscribe(&id, false).await.unwrap();
    watcher.list().await.unwrap();

    owner.mutate(&id, change(&[("x", json!(1))])).await.unwrap();
    // a round trip on the owner proves the mutation was handled
    owner.list().await.unwrap();

    let quiet = timeout(Duration::from_millis(200), watcher.next_event()).await;
    assert!(quiet.is_err(), "unexpected broadcast: {:?}", quiet);

    owner.close().await;
    watcher.close().await;
    shutdown(broker).await;
}

#[tokio::test]
async fn test_malformed_frames_leave_connection_usable() {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::{connect_async, tungstenite::Message};

    let broker = start_broker().await;
    let (mut ws, _) = connect_async(&broker.url).await.unwrap();

    ws.send(Message::Text("not json".into())).await.unwrap();
    ws.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    ws.send(Message::Text(r#"{"Id":"1","Type":"publish","Msg":{}}"#.into()))
        .await
        .unwrap();
    ws.send(Message::Text(r#"{"Id":"2","Type":"list","Msg":null}"#.into()))
        .await
        .unwrap();

    let reply = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("reply in time")
        .expect("stream open")
        .unwrap();
    let reply: Value = serde_json::from_str(reply.to_text().unwrap()).unwrap();
    assert_eq!(reply["Id"], "2");
    assert_eq!(reply["Msg"], json!({"Topics": []}));

    ws.close(None).await.unwrap();
    shutdown(broker).await;
}

#[tokio::test]
async fn test_disconnect_evicts_subscriptions() {
    let broker = start_broker().await;
    let owner = SyncClient::connect(&broker.url).await.unwrap();

    owner.set_schema("point", point_schema()).await.unwrap();
    let (id, _) = owner.instantiate("point").await.unwrap();

    let leaver = SyncClient::connect(&broker.url).await.unwrap();
    leaver.subscribe(&id, false).await.unwrap();
    leaver.subscribe("point", true).await.unwrap();
    leaver.list().await.unwrap();

    let instance_key = SubscriptionKey::Instance(id.clone());
    let topic_key = SubscriptionKey::Topic("point".into());
    assert_eq!(broker.dispatcher.subscribers_for(&instance_key).unwrap().len(), 1);
    assert_eq!(broker.dispatcher.subscribers_for(&topic_key).unwrap().len(), 1);

    leaver.close().await;

    // eviction runs once the server side notices the close
    let evicted = timeout(Duration::from_secs(5), async {
        while broker.dispatcher.connection_count() > 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(evicted.is_ok());
    assert!(broker.dispatcher.subscribers_for(&instance_key).unwrap().is_empty());
    assert!(broker.dispatcher.subscribers_for(&topic_key).unwrap().is_empty());

    let mut stayer = SyncClient::connect(&broker.url).await.unwrap();
    stayer.subscribe(&id, false).await.unwrap();
    stayer.list().await.unwrap();

    owner.mutate(&id, change(&[("y", json!(1.5))])).await.unwrap();
    let event = timeout(Duration::from_secs(5), stayer.next_event())
        .await
        .expect("broadcast in time")
        .expect("connection open");
    assert_eq!(event.msg["Change"], json!({"y": 1.5}));

    owner.close().await;
    stayer.close().await;
    shutdown(broker).await;
}

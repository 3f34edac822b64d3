//! End-to-end scenarios driving the HTTP webhook surface against a fake
//! RouterOS device speaking the real wire protocol over a loopback TCP
//! socket. Mirrors the style of the teacher's own `tests/resolver.rs`: an
//! in-process stand-in for the remote peer, exercised through the public
//! API rather than internals.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use routeros_edns_webhook::client::Client;
use routeros_edns_webhook::codec::{read_word, write_sentence};
use routeros_edns_webhook::connection::ConnectionConfig;
use routeros_edns_webhook::endpoint::{Changes, DomainFilter, Endpoint, ProviderSpecificItem, RecordType};
use routeros_edns_webhook::provider::Provider;
use routeros_edns_webhook::webhook;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex as AsyncMutex;
use tower::ServiceExt;

/// A row the fake device serves from `/ip/dns/static/print`: its `.id`
/// api-attribute plus its `=key=value` attributes.
struct FakeRow {
    id: &'static str,
    attrs: Vec<(&'static str, &'static str)>,
}

/// Reads words until the real empty terminator (an empty word read while a
/// sentence is already in progress); an empty word read before any word has
/// arrived is [`read_word`]'s idle-poll timeout, not a terminator, so it is
/// skipped. Mirrors the accumulation loop in [`routeros_edns_webhook::codec::read_sentence`],
/// generalized to sentences whose first word isn't `!`-prefixed (i.e.
/// requests, as opposed to responses).
async fn read_request_words<R: AsyncRead + Unpin>(reader: &mut R) -> Vec<String> {
    let mut words = Vec::new();
    loop {
        let word = read_word(reader).await.expect("read_word");
        if word.is_empty() {
            if words.is_empty() {
                continue;
            }
            return words;
        }
        words.push(word);
    }
}

/// Spawns a single-connection fake RouterOS device: answers `/login` and
/// `/ip/dns/static/{add,remove}` with a bare `!done`, and `/ip/dns/static/print`
/// with `rows` followed by `!done`. Every request sentence it receives is
/// recorded, in order, in the returned buffer.
async fn spawn_fake_device(rows: Vec<FakeRow>) -> (SocketAddr, Arc<AsyncMutex<Vec<Vec<String>>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(AsyncMutex::new(Vec::new()));
    let received_for_task = received.clone();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half);
        let mut writer = write_half;

        loop {
            let words = read_request_words(&mut reader).await;
            let tag = words
                .iter()
                .find_map(|w| w.strip_prefix(".tag="))
                .unwrap_or_default()
                .to_string();
            let command = words[0].clone();
            received_for_task.lock().await.push(words);

            let mut reply_sentences: Vec<Vec<String>> = Vec::new();
            if command == "/ip/dns/static/print" {
                for row in &rows {
                    let mut sentence = vec!["!re".to_string()];
                    for (key, value) in &row.attrs {
                        sentence.push(format!("={}={}", key, value));
                    }
                    sentence.push(format!(".id={}", row.id));
                    sentence.push(format!(".tag={}", tag));
                    reply_sentences.push(sentence);
                }
            }
            reply_sentences.push(vec!["!done".to_string(), format!(".tag={}", tag)]);

            for sentence in reply_sentences {
                if write_sentence(&mut writer, &sentence).await.is_err() {
                    return;
                }
            }
        }
    });

    (addr, received)
}

fn provider_for(addr: SocketAddr) -> Arc<Provider> {
    let mut config = ConnectionConfig::new(addr.ip().to_string(), "admin", "hunter2");
    config.port = addr.port();
    let client = Client::new(config);
    Arc::new(Provider::new(client, DomainFilter::default()))
}

fn endpoint(dns_name: &str, targets: Vec<&str>, record_type: RecordType, ttl: Option<u64>) -> Endpoint {
    Endpoint {
        dns_name: dns_name.to_string(),
        targets: targets.into_iter().map(String::from).collect(),
        record_type,
        set_identifier: None,
        record_ttl: ttl,
        labels: None,
        provider_specific: None,
    }
}

async fn post_records(provider: Arc<Provider>, changes: &Changes) -> axum::http::Response<Body> {
    let body = serde_json::to_vec(changes).unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/records")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    webhook::router(provider).oneshot(request).await.unwrap()
}

async fn last_device_request(received: &Arc<AsyncMutex<Vec<Vec<String>>>>) -> Vec<String> {
    received.lock().await.last().cloned().expect("no device requests recorded")
}

/// S1 - single A record create: device sees exactly one
/// `/ip/dns/static/add` with the expected attribute words, HTTP responds 204.
#[tokio::test]
async fn s1_single_a_record_create() {
    let (addr, received) = spawn_fake_device(vec![]).await;
    let provider = provider_for(addr);

    let changes = Changes {
        create: Some(vec![endpoint("svc.lan", vec!["10.0.0.5"], RecordType::A, Some(3600))]),
        ..Default::default()
    };
    let response = post_records(provider, &changes).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let add = last_device_request(&received).await;
    assert_eq!(add[0], "/ip/dns/static/add");
    for expected in [
        "=name=svc.lan",
        "=address=10.0.0.5",
        "=type=A",
        "=ttl=0w0d1h0m0s",
        "=disabled=false",
        "=match-subdomain=false",
    ] {
        assert!(add.contains(&expected.to_string()), "missing {} in {:?}", expected, add);
    }
}

/// S2 - wildcard subdomain target: `match-subdomain=true` and the literal
/// wildcard target carried as `cname`.
#[tokio::test]
async fn s2_wildcard_subdomain_cname() {
    let (addr, received) = spawn_fake_device(vec![]).await;
    let provider = provider_for(addr);

    let changes = Changes {
        create: Some(vec![endpoint("apps.lan", vec!["*.apps.lan"], RecordType::Cname, None)]),
        ..Default::default()
    };
    let response = post_records(provider, &changes).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let add = last_device_request(&received).await;
    assert!(add.contains(&"=match-subdomain=true".to_string()));
    assert!(add.contains(&"=cname=*.apps.lan".to_string()));
}

/// S3 - update changing one of two targets: only the changed target
/// produces device calls - one remove for the dropped address, one add for
/// the new one - the shared target is left untouched.
#[tokio::test]
async fn s3_update_changes_only_the_differing_target() {
    let rows = vec![
        FakeRow { id: "*1", attrs: vec![("name", "svc.lan"), ("address", "10.0.0.5"), ("type", "A")] },
        FakeRow { id: "*2", attrs: vec![("name", "svc.lan"), ("address", "10.0.0.6"), ("type", "A")] },
    ];
    let (addr, received) = spawn_fake_device(rows).await;
    let provider = provider_for(addr);

    let old = endpoint("svc.lan", vec!["10.0.0.5", "10.0.0.6"], RecordType::A, None);
    let new = endpoint("svc.lan", vec!["10.0.0.5", "10.0.0.7"], RecordType::A, None);
    let changes = Changes {
        update_old: Some(vec![old]),
        update_new: Some(vec![new]),
        ..Default::default()
    };
    let response = post_records(provider, &changes).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let requests = received.lock().await.clone();
    // /login, /ip/dns/static/print, then exactly one remove and one add.
    let removes: Vec<&Vec<String>> = requests.iter().filter(|r| r[0] == "/ip/dns/static/remove").collect();
    let adds: Vec<&Vec<String>> = requests.iter().filter(|r| r[0] == "/ip/dns/static/add").collect();
    assert_eq!(removes.len(), 1);
    assert_eq!(adds.len(), 1);
    assert!(removes[0].contains(&"=numbers=*2".to_string()));
    assert!(adds[0].contains(&"=address=10.0.0.7".to_string()));
}

/// S4 - deleting a target absent from the device listing produces no device
/// call and does not fail the batch.
#[tokio::test]
async fn s4_delete_of_missing_record_is_a_noop() {
    let (addr, received) = spawn_fake_device(vec![]).await;
    let provider = provider_for(addr);

    let changes = Changes {
        delete: Some(vec![endpoint("svc.lan", vec!["10.0.0.9"], RecordType::A, None)]),
        ..Default::default()
    };
    let response = post_records(provider, &changes).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let requests = received.lock().await.clone();
    assert!(requests.iter().all(|r| r[0] != "/ip/dns/static/remove"));
}

/// Property 7 - a batch carrying creates, deletes, and updates together
/// issues device calls in the order creates, then deletes, then
/// update-removals followed by update-additions, regardless of how the
/// batch groups were populated.
#[tokio::test]
async fn apply_changes_orders_creates_before_deletes_before_updates() {
    let rows = vec![
        FakeRow { id: "*1", attrs: vec![("name", "to-delete.lan"), ("address", "10.0.0.1"), ("type", "A")] },
        FakeRow { id: "*2", attrs: vec![("name", "to-update.lan"), ("address", "10.0.0.2"), ("type", "A")] },
    ];
    let (addr, received) = spawn_fake_device(rows).await;
    let provider = provider_for(addr);

    let changes = Changes {
        create: Some(vec![endpoint("to-create.lan", vec!["10.0.0.9"], RecordType::A, None)]),
        delete: Some(vec![endpoint("to-delete.lan", vec!["10.0.0.1"], RecordType::A, None)]),
        update_old: Some(vec![endpoint("to-update.lan", vec!["10.0.0.2"], RecordType::A, None)]),
        update_new: Some(vec![endpoint("to-update.lan", vec!["10.0.0.3"], RecordType::A, None)]),
    };
    let response = post_records(provider, &changes).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let requests = received.lock().await.clone();
    let commands: Vec<&str> = requests
        .iter()
        .map(|r| r[0].as_str())
        .filter(|c| *c != "/login" && *c != "/ip/dns/static/print")
        .collect();
    assert_eq!(commands, vec!["/ip/dns/static/add", "/ip/dns/static/remove", "/ip/dns/static/add"]);

    let first_add = requests.iter().find(|r| r[0] == "/ip/dns/static/add").unwrap();
    assert!(first_add.contains(&"=name=to-create.lan".to_string()));
}

/// S6 - media type negotiation: the webhook-specific `Accept` value is
/// honored with a matching `Content-Type`; an unsupported one is rejected.
#[tokio::test]
async fn s6_negotiates_or_rejects_accept_header() {
    let (addr, _received) = spawn_fake_device(vec![]).await;
    let provider = provider_for(addr);

    let request = Request::builder()
        .uri("/")
        .header("accept", webhook::CONTENT_TYPE_WEBHOOK)
        .body(Body::empty())
        .unwrap();
    let response = webhook::router(provider.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        webhook::CONTENT_TYPE_WEBHOOK
    );

    let request = Request::builder()
        .uri("/")
        .header("accept", "application/xml")
        .body(Body::empty())
        .unwrap();
    let response = webhook::router(provider).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Round-trips a full `Endpoint` (including `providerSpecific`) through
/// `GET /records` to confirm the listing path and the HTTP JSON shape agree.
#[tokio::test]
async fn list_records_returns_translated_endpoints() {
    let rows = vec![FakeRow { id: "*1", attrs: vec![("name", "svc.lan"), ("address", "10.0.0.5"), ("type", "A")] }];
    let (addr, _received) = spawn_fake_device(rows).await;
    let provider = provider_for(addr);

    let request = Request::builder().uri("/records").body(Body::empty()).unwrap();
    let response = webhook::router(provider).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let endpoints: Vec<Endpoint> = serde_json::from_slice(&body).unwrap();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].dns_name, "svc.lan");
    assert_eq!(endpoints[0].targets, vec!["10.0.0.5".to_string()]);
    assert_eq!(endpoints[0].record_type, RecordType::A);
}

/// `providerSpecific` entries round-trip through the `adjustendpoints`
/// identity pass-through unchanged.
#[tokio::test]
async fn adjust_endpoints_preserves_provider_specific() {
    let (addr, _received) = spawn_fake_device(vec![]).await;
    let provider = provider_for(addr);

    let mut ep = endpoint("svc.lan", vec!["10.0.0.5"], RecordType::A, None);
    ep.provider_specific = Some(vec![ProviderSpecificItem { name: "foo".to_string(), value: "bar".to_string() }]);

    let body = serde_json::to_vec(&vec![ep]).unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/adjustendpoints")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = webhook::router(provider).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let endpoints: Vec<Endpoint> = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        endpoints[0].provider_specific,
        Some(vec![ProviderSpecificItem { name: "foo".to_string(), value: "bar".to_string() }])
    );
}

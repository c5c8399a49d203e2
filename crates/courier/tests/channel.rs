//! Channel behavior against a scripted in-memory peer: correlation,
//! timeouts, dispatch, middleware, and read-loop resilience.

use std::sync::Arc;
use std::time::Duration;

use courier::{Channel, Envelope, Error, Json, Kind, Transport};
use courier_transport_mem::MemTransport;
use parking_lot::Mutex;

/// Route read-loop logs through the test writer; `RUST_LOG` adjusts the
/// filter when a failure needs more detail.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn open_channel(timeout_ms: u64) -> (Channel<MemTransport>, MemTransport) {
    init_tracing();
    let (local, peer) = MemTransport::pair();
    let channel = Channel::new("user", Duration::from_millis(timeout_ms));
    channel.open(local);
    (channel, peer)
}

async fn recv_envelope(peer: &MemTransport) -> Envelope {
    let data = peer.recv().await.unwrap().expect("peer stream ended");
    Envelope::decode(&data).unwrap()
}

async fn send_envelope(peer: &MemTransport, env: &Envelope) {
    peer.send(env.encode().unwrap()).await.unwrap();
}

#[tokio::test]
async fn call_resolves_and_removes_pending_entry() {
    let (channel, peer) = open_channel(1000);

    let peer_task = tokio::spawn(async move {
        let req = recv_envelope(&peer).await;
        assert_eq!(req.kind, Kind::Request);
        assert_eq!(req.route, "/echo");
        send_envelope(&peer, &Envelope::reply(&req.id, true, req.data)).await;
    });

    let out: String = channel.call("/echo", "hi").await.unwrap();
    assert_eq!(out, "hi");
    assert_eq!(channel.in_flight(), 0);
    peer_task.await.unwrap();
}

#[tokio::test]
async fn call_times_out_without_leaking_its_entry() {
    let (channel, peer) = open_channel(80);

    let err = channel.call::<_, String>("/slow", "x").await.unwrap_err();
    assert!(matches!(err, Error::Timeout { route } if route == "/slow"));
    assert_eq!(channel.in_flight(), 0);
    drop(peer);
}

#[tokio::test]
async fn late_reply_is_dropped_without_crosstalk() {
    let (channel, peer) = open_channel(80);

    let peer_task = tokio::spawn(async move {
        let first = recv_envelope(&peer).await;
        // The second request only arrives after the first call timed out.
        let second = recv_envelope(&peer).await;
        send_envelope(&peer, &Envelope::reply(&first.id, true, "too late".into())).await;
        send_envelope(&peer, &Envelope::reply(&second.id, true, "ok".into())).await;
    });

    let err = channel.call::<_, String>("/slow", "").await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));

    let out: String = channel.call("/fast", "").await.unwrap();
    assert_eq!(out, "ok");
    assert_eq!(channel.in_flight(), 0);
    peer_task.await.unwrap();
}

#[tokio::test]
async fn concurrent_calls_complete_independently_out_of_order() {
    let (channel, peer) = open_channel(1000);

    let peer_task = tokio::spawn(async move {
        let first = recv_envelope(&peer).await;
        let second = recv_envelope(&peer).await;
        // Reply in reverse arrival order.
        send_envelope(
            &peer,
            &Envelope::reply(&second.id, true, format!("reply:{}", second.route)),
        )
        .await;
        send_envelope(
            &peer,
            &Envelope::reply(&first.id, true, format!("reply:{}", first.route)),
        )
        .await;
    });

    let (a, b) = tokio::join!(
        channel.call::<_, String>("/a", ""),
        channel.call::<_, String>("/b", "")
    );
    assert_eq!(a.unwrap(), "reply:/a");
    assert_eq!(b.unwrap(), "reply:/b");
    assert_eq!(channel.in_flight(), 0);
    peer_task.await.unwrap();
}

#[tokio::test]
async fn push_registers_nothing_and_its_ack_is_discarded() {
    let (channel, peer) = open_channel(1000);

    channel.push("/presence", "online").await.unwrap();
    assert_eq!(channel.in_flight(), 0);

    let env = recv_envelope(&peer).await;
    assert_eq!(env.kind, Kind::Push);
    assert_eq!(env.route, "/presence");
    assert_eq!(env.data, "online");

    // A PushBack for it is silently dropped by the read loop.
    send_envelope(
        &peer,
        &Envelope {
            route: String::new(),
            id: env.id.clone(),
            kind: Kind::PushBack,
            data: String::new(),
            success: true,
        },
    )
    .await;

    // The loop is still alive for ordinary calls.
    let peer_task = tokio::spawn(async move {
        let req = recv_envelope(&peer).await;
        send_envelope(&peer, &Envelope::reply(&req.id, true, req.data)).await;
    });
    let out: String = channel.call("/echo", "still here").await.unwrap();
    assert_eq!(out, "still here");
    peer_task.await.unwrap();
}

#[tokio::test]
async fn unknown_route_yields_failure_reply_and_loop_survives() {
    let (channel, peer) = open_channel(1000);
    channel
        .register_handler("/known", |_, data| Ok(Some(data.to_uppercase())))
        .unwrap();

    send_envelope(&peer, &Envelope::originate("/nope", "r1", Kind::Request, String::new())).await;
    let reply = recv_envelope(&peer).await;
    assert_eq!(reply.id, "r1");
    assert_eq!(reply.kind, Kind::RequestBack);
    assert!(!reply.success);
    assert!(reply.data.contains("/nope"));

    send_envelope(&peer, &Envelope::originate("/known", "r2", Kind::Request, "hi".into())).await;
    let reply = recv_envelope(&peer).await;
    assert!(reply.success);
    assert_eq!(reply.data, "HI");
}

#[tokio::test]
async fn middleware_runs_in_order_with_string_prefix_matching() {
    let (channel, peer) = open_channel(1000);

    channel.register_middleware("/a", |ctx, _| {
        ctx.set("trail", "first".to_string());
        Ok(())
    });
    channel.register_middleware("/a", |ctx, _| {
        let trail: String = ctx.get::<String>("trail").unwrap_or_default();
        ctx.set("trail", format!("{trail},second"));
        Ok(())
    });
    channel.register_middleware("/b", |ctx, _| {
        ctx.set("trail", "wrong".to_string());
        Ok(())
    });
    // "/ab" is matched by prefix "/a": plain string prefix, not segments.
    channel
        .register_handler("/ab", |ctx, _| Ok(ctx.get::<String>("trail")))
        .unwrap();

    send_envelope(&peer, &Envelope::originate("/ab", "r1", Kind::Request, String::new())).await;
    let reply = recv_envelope(&peer).await;
    assert!(reply.success);
    assert_eq!(reply.data, "first,second");
}

#[tokio::test]
async fn middleware_failure_becomes_failure_reply_and_skips_handler() {
    let (channel, peer) = open_channel(1000);
    let handled = Arc::new(Mutex::new(false));

    channel.register_middleware("/", |_, _| Err(Error::handler("denied")));
    let handled_flag = handled.clone();
    channel
        .register_handler("/guarded", move |_, _| {
            *handled_flag.lock() = true;
            Ok(None)
        })
        .unwrap();

    send_envelope(&peer, &Envelope::originate("/guarded", "r1", Kind::Request, String::new())).await;
    let reply = recv_envelope(&peer).await;
    assert!(!reply.success);
    assert!(reply.data.contains("denied"));
    assert!(!*handled.lock());
}

#[tokio::test]
async fn handler_error_becomes_failure_reply_and_loop_survives() {
    let (channel, peer) = open_channel(1000);
    channel
        .register_handler("/explode", |_, _| Err(Error::handler("boom")))
        .unwrap();
    channel
        .register_handler("/echo", |_, data| Ok(Some(data.to_string())))
        .unwrap();

    send_envelope(&peer, &Envelope::originate("/explode", "r1", Kind::Request, String::new())).await;
    let reply = recv_envelope(&peer).await;
    assert!(!reply.success);
    assert!(reply.data.contains("boom"));

    send_envelope(&peer, &Envelope::originate("/echo", "r2", Kind::Request, "alive".into())).await;
    let reply = recv_envelope(&peer).await;
    assert!(reply.success);
    assert_eq!(reply.data, "alive");
}

#[tokio::test]
async fn inbound_push_dispatches_but_gets_no_reply() {
    let (channel, peer) = open_channel(1000);
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));

    let seen_by_handler = seen.clone();
    channel
        .register_handler("/note", move |_, data| {
            seen_by_handler.lock().push(data.to_string());
            Ok(Some("acked".to_string()))
        })
        .unwrap();

    send_envelope(&peer, &Envelope::originate("/note", "p1", Kind::Push, "one".into())).await;
    send_envelope(&peer, &Envelope::originate("/note", "r1", Kind::Request, "two".into())).await;

    // Exactly one reply arrives: the one for the Request. If the Push had
    // produced a reply it would have arrived first.
    let reply = recv_envelope(&peer).await;
    assert_eq!(reply.id, "r1");
    assert!(reply.success);
    assert_eq!(*seen.lock(), vec!["one".to_string(), "two".to_string()]);
}

#[tokio::test]
async fn remote_failure_surfaces_as_remote_error() {
    let (channel, peer) = open_channel(1000);

    let peer_task = tokio::spawn(async move {
        let req = recv_envelope(&peer).await;
        send_envelope(&peer, &Envelope::reply(&req.id, false, "boom".into())).await;
    });

    let err = channel.call::<_, String>("/fails", "").await.unwrap_err();
    assert!(matches!(err, Error::Remote { message } if message == "boom"));
    assert_eq!(channel.in_flight(), 0);
    peer_task.await.unwrap();
}

#[tokio::test]
async fn malformed_frame_is_dropped_and_loop_continues() {
    let (channel, peer) = open_channel(1000);

    let peer_task = tokio::spawn(async move {
        let req = recv_envelope(&peer).await;
        peer.send(b"not an envelope".to_vec()).await.unwrap();
        send_envelope(&peer, &Envelope::reply(&req.id, true, "fine".into())).await;
    });

    let out: String = channel.call("/echo", "").await.unwrap();
    assert_eq!(out, "fine");
    peer_task.await.unwrap();
}

#[tokio::test]
async fn connection_close_wakes_pending_callers() {
    let (channel, peer) = open_channel(5000);

    let peer_task = tokio::spawn(async move {
        let _req = recv_envelope(&peer).await;
        peer.close().await.unwrap();
    });

    let err = channel.call::<_, String>("/never", "").await.unwrap_err();
    assert!(matches!(err, Error::Closed));
    assert_eq!(channel.in_flight(), 0);
    peer_task.await.unwrap();
}

#[tokio::test]
async fn structured_payloads_roundtrip_through_json() {
    let (channel, peer) = open_channel(1000);

    let peer_task = tokio::spawn(async move {
        let req = recv_envelope(&peer).await;
        assert_eq!(req.data, "[1,2,3]");
        send_envelope(&peer, &Envelope::reply(&req.id, true, "[4,5]".into())).await;
    });

    let Json(out): Json<Vec<u32>> = channel.call("/sum", Json(vec![1u32, 2, 3])).await.unwrap();
    assert_eq!(out, vec![4, 5]);
    peer_task.await.unwrap();
}

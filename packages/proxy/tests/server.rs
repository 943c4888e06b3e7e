mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use marvin_proxy::tls::TlsServerConfig;
use marvin_proxy::{
    BufferChain, ChannelCollector, Collector, Connection, Exchange, HandlerContext, OverloadPolicy,
    RequestHandler, Scheme, Server, ServerConfig, ServerStatsSnapshot,
};
use support::{echo_factory, loopback_listener, self_signed, wait_until};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn config(max_connections: usize) -> ServerConfig {
    ServerConfig::default()
        .with_max_connections(max_connections)
        .with_heartbeat_interval_ms(20)
        .with_shutdown_grace(Duration::from_secs(2))
}

async fn roundtrip(stream: &mut TcpStream, payload: &[u8]) -> Vec<u8> {
    stream.write_all(payload).await.unwrap();
    let mut reply = vec![0u8; payload.len()];
    stream.read_exact(&mut reply).await.unwrap();
    reply
}

#[tokio::test]
async fn test_echo_and_clean_shutdown() {
    let (listener, addr) = loopback_listener().await;
    let server = Server::new(config(4), echo_factory)
        .unwrap()
        .with_signal_handling(false);
    let manager = server.manager().clone();
    let shutdown = server.shutdown_handle();
    let serving = tokio::spawn(server.serve(listener));

    let mut client = TcpStream::connect(addr).await.unwrap();
    assert_eq!(roundtrip(&mut client, b"ping").await, b"ping");
    assert_eq!(roundtrip(&mut client, b"again").await, b"again");
    assert_eq!(manager.active_count(), 1);

    shutdown.shutdown();
    serving.await.unwrap().unwrap();

    assert_eq!(manager.active_count(), 0);
    assert!(manager.verify());
    let mut rest = Vec::new();
    assert_eq!(client.read_to_end(&mut rest).await.unwrap_or(0), 0);
}

#[tokio::test]
async fn test_rejects_when_at_capacity() {
    let (listener, addr) = loopback_listener().await;
    let latest: Arc<Mutex<Option<ServerStatsSnapshot>>> = Arc::default();
    let sink = latest.clone();
    let server = Server::new(config(1), echo_factory)
        .unwrap()
        .with_signal_handling(false)
        .with_heartbeat(Arc::new(move |stats: &ServerStatsSnapshot| {
            *sink.lock().unwrap() = Some(stats.clone());
        }));
    let manager = server.manager().clone();
    let shutdown = server.shutdown_handle();
    let serving = tokio::spawn(server.serve(listener));

    let mut first = TcpStream::connect(addr).await.unwrap();
    assert_eq!(roundtrip(&mut first, b"one").await, b"one");

    let mut second = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 8];
    let outcome = tokio::time::timeout(Duration::from_secs(2), second.read(&mut buf))
        .await
        .expect("rejected socket is closed promptly");
    assert!(matches!(outcome, Ok(0) | Err(_)));
    assert_eq!(manager.active_count(), 1);

    assert!(
        wait_until(|| {
            latest
                .lock()
                .unwrap()
                .as_ref()
                .is_some_and(|s| s.rejected == 1 && s.admitted == 1)
        })
        .await
    );

    drop(first);
    assert!(wait_until(|| manager.active_count() == 0).await);
    let mut third = TcpStream::connect(addr).await.unwrap();
    assert_eq!(roundtrip(&mut third, b"three").await, b"three");

    shutdown.shutdown();
    serving.await.unwrap().unwrap();
    assert!(manager.verify());
}

#[tokio::test]
async fn test_defer_waits_for_free_slot() {
    let (listener, addr) = loopback_listener().await;
    let server = Server::new(
        config(1).with_overload_policy(OverloadPolicy::Defer),
        echo_factory,
    )
    .unwrap()
    .with_signal_handling(false);
    let shutdown = server.shutdown_handle();
    let serving = tokio::spawn(server.serve(listener));

    let mut first = TcpStream::connect(addr).await.unwrap();
    assert_eq!(roundtrip(&mut first, b"one").await, b"one");

    let mut second = TcpStream::connect(addr).await.unwrap();
    second.write_all(b"two").await.unwrap();
    let mut reply = [0u8; 3];
    let waiting =
        tokio::time::timeout(Duration::from_millis(200), second.read_exact(&mut reply)).await;
    assert!(waiting.is_err(), "second client must wait while the slot is taken");

    drop(first);
    tokio::time::timeout(Duration::from_secs(2), second.read_exact(&mut reply))
        .await
        .expect("served once the slot frees")
        .unwrap();
    assert_eq!(&reply, b"two");

    shutdown.shutdown();
    serving.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_cancels_idle_sessions() {
    let (listener, addr) = loopback_listener().await;
    let server = Server::new(config(8), echo_factory)
        .unwrap()
        .with_signal_handling(false);
    let manager = server.manager().clone();
    let shutdown = server.shutdown_handle();
    let serving = tokio::spawn(server.serve(listener));

    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(TcpStream::connect(addr).await.unwrap());
    }
    assert!(wait_until(|| manager.active_count() == 3).await);

    shutdown.shutdown();
    tokio::time::timeout(Duration::from_secs(1), serving)
        .await
        .expect("shutdown does not wait for idle clients")
        .unwrap()
        .unwrap();

    assert_eq!(manager.active_count(), 0);
    assert!(manager.verify());
    assert!(!manager.admit());
}

#[tokio::test]
async fn test_collector_receives_exchanges() {
    let (listener, addr) = loopback_listener().await;
    let (collector, mut records) = ChannelCollector::channel();
    let server = Server::new(config(2), echo_factory)
        .unwrap()
        .with_signal_handling(false)
        .with_collector(Arc::new(collector));
    let shutdown = server.shutdown_handle();
    let serving = tokio::spawn(server.serve(listener));

    let mut client = TcpStream::connect(addr).await.unwrap();
    roundtrip(&mut client, b"GET / HTTP/1.1\r\n\r\n").await;

    let record = records.recv().await.expect("one record");
    assert_eq!(record.scheme, Scheme::Http);
    assert_eq!(record.host, "127.0.0.1");
    assert_eq!(record.request, BufferChain::from("GET / HTTP/1.1\r\n\r\n"));
    assert_eq!(record.response, record.request);

    shutdown.shutdown();
    serving.await.unwrap().unwrap();
}

struct PanickingCollector {
    calls: AtomicUsize,
}

impl Collector for PanickingCollector {
    fn collect(&self, _: Scheme, _: &str, _: &BufferChain, _: &BufferChain) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("collector failure");
    }
}

#[tokio::test]
async fn test_collector_panic_does_not_end_session() {
    let (listener, addr) = loopback_listener().await;
    let collector = Arc::new(PanickingCollector {
        calls: AtomicUsize::new(0),
    });
    let server = Server::new(config(2), echo_factory)
        .unwrap()
        .with_signal_handling(false)
        .with_collector(collector.clone());
    let shutdown = server.shutdown_handle();
    let serving = tokio::spawn(server.serve(listener));

    let mut client = TcpStream::connect(addr).await.unwrap();
    assert_eq!(roundtrip(&mut client, b"a").await, b"a");
    assert_eq!(roundtrip(&mut client, b"b").await, b"b");
    assert!(wait_until(|| collector.calls.load(Ordering::SeqCst) == 2).await);

    shutdown.shutdown();
    serving.await.unwrap().unwrap();
}

struct FailingHandler;

impl RequestHandler for FailingHandler {
    fn exchange<'a>(
        &'a mut self,
        _connection: &'a mut dyn Connection,
        _context: &'a HandlerContext,
    ) -> BoxFuture<'a, marvin_proxy::Result<Exchange>> {
        Box::pin(async { Err(marvin_proxy::error::transport("upstream unreachable")) })
    }
}

#[tokio::test]
async fn test_failed_session_releases_slot() {
    let (listener, addr) = loopback_listener().await;
    let factory = |_: &dyn Connection| Box::new(FailingHandler) as Box<dyn RequestHandler>;
    let server = Server::new(config(1), factory)
        .unwrap()
        .with_signal_handling(false);
    let manager = server.manager().clone();
    let shutdown = server.shutdown_handle();
    let serving = tokio::spawn(server.serve(listener));

    let mut client = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 1];
    let outcome = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
        .await
        .unwrap();
    assert!(matches!(outcome, Ok(0) | Err(_)));
    assert!(wait_until(|| manager.active_count() == 0).await);
    assert!(manager.admit());

    shutdown.shutdown();
    serving.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_tls_listener_terminates_tls() {
    let identity = self_signed("localhost");
    let (listener, addr) = loopback_listener().await;
    let (collector, mut records) = ChannelCollector::channel();
    let server = Server::new(config(2), echo_factory)
        .unwrap()
        .with_signal_handling(false)
        .with_collector(Arc::new(collector))
        .with_tls(TlsServerConfig::from_pem(&identity.cert_pem, &identity.key_pem).unwrap());
    let shutdown = server.shutdown_handle();
    let serving = tokio::spawn(server.serve(listener));

    let connector = marvin_proxy::Connector::default()
        .with_resolver(Arc::new(
            marvin_proxy::dns::StaticResolver::new().with_override("localhost", vec![addr]),
        ))
        .with_tls(&marvin_proxy::tls::TlsClientConfig::with_only_roots(identity.cert_pem))
        .unwrap();
    let mut client = connector
        .connect(Scheme::Https, "localhost", addr.port())
        .await
        .unwrap();
    client.write(&BufferChain::from("secret")).await.unwrap();

    let record = records.recv().await.expect("one record");
    assert_eq!(record.scheme, Scheme::Https);
    assert_eq!(record.host, "localhost");
    assert_eq!(record.request.to_string(), "secret");

    client.close();
    shutdown.shutdown();
    serving.await.unwrap().unwrap();
}

#[test]
fn test_invalid_config_is_rejected() {
    let err = Server::new(ServerConfig::default().with_max_connections(0), echo_factory).unwrap_err();
    assert!(err.is_config());

    let err = Server::new(ServerConfig::default().with_worker_threads(0), echo_factory).unwrap_err();
    assert!(err.is_config());
}

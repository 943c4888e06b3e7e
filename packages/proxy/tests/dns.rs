use std::net::SocketAddr;
use std::sync::Arc;

use marvin_proxy::dns::{GaiResolver, Name, Resolve, StaticResolver, ip_literal};

#[test]
fn test_ip_literal_parsing() {
    assert_eq!(
        ip_literal("127.0.0.1", 80),
        Some(SocketAddr::from(([127, 0, 0, 1], 80)))
    );
    assert_eq!(ip_literal("[::1]", 443).map(|a| a.is_ipv6()), Some(true));
    assert_eq!(ip_literal("example.com", 80), None);
}

#[tokio::test]
async fn test_gai_ip_literal_skips_lookup() {
    let addrs = GaiResolver::new()
        .resolve(Name::from("10.1.2.3"), 8080)
        .await
        .unwrap();
    assert_eq!(addrs, vec![SocketAddr::from(([10, 1, 2, 3], 8080))]);
}

#[tokio::test]
async fn test_gai_empty_host_is_resolve_error() {
    let err = GaiResolver::new()
        .resolve(Name::from(""), 80)
        .await
        .unwrap_err();
    assert!(err.is_resolve());
}

#[tokio::test]
async fn test_gai_resolves_localhost() {
    let addrs = GaiResolver::new()
        .resolve(Name::from("localhost"), 9991)
        .await
        .unwrap();
    assert!(!addrs.is_empty());
    assert!(addrs.iter().all(|a| a.port() == 9991 && a.ip().is_loopback()));
}

#[tokio::test]
async fn test_static_override_keeps_order_and_fills_port() {
    let first: SocketAddr = "127.0.0.2:0".parse().unwrap();
    let second: SocketAddr = "127.0.0.3:7000".parse().unwrap();
    let resolver = StaticResolver::new().with_override("pinned.test", vec![first, second]);

    let addrs = resolver.resolve(Name::from("pinned.test"), 8443).await.unwrap();
    assert_eq!(
        addrs,
        vec!["127.0.0.2:8443".parse().unwrap(), second]
    );
}

#[tokio::test]
async fn test_static_empty_override_has_no_candidates() {
    let resolver = StaticResolver::new().with_override("empty.test", Vec::new());
    let err = resolver.resolve(Name::from("empty.test"), 80).await.unwrap_err();
    assert!(err.is_resolve());
    assert_eq!(err.target(), Some("empty.test:80"));
}

#[tokio::test]
async fn test_static_falls_back_for_unknown_hosts() {
    let resolver = StaticResolver::new()
        .with_override("pinned.test", vec!["127.0.0.9:1".parse().unwrap()])
        .with_fallback(Arc::new(GaiResolver::new()));

    let addrs = resolver.resolve(Name::from("127.0.0.1"), 5).await.unwrap();
    assert_eq!(addrs, vec![SocketAddr::from(([127, 0, 0, 1], 5))]);

    let err = StaticResolver::new()
        .resolve(Name::from("unknown.test"), 80)
        .await
        .unwrap_err();
    assert!(err.is_resolve());
}

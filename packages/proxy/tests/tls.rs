mod support;

use std::sync::Arc;

use marvin_proxy::buffer::read_segment;
use marvin_proxy::dns::StaticResolver;
use marvin_proxy::tls::{TlsClientConfig, TlsServerConfig};
use marvin_proxy::{
    BufferChain, ConnectConfig, Connection, ConnectionState, Connector, Scheme, TlsConnection,
};
use support::{loopback_listener, self_signed};

#[tokio::test]
async fn test_handshake_then_echo_over_tls() {
    let identity = self_signed("localhost");
    let server_tls = TlsServerConfig::from_pem(&identity.cert_pem, &identity.key_pem).unwrap();
    let (listener, addr) = loopback_listener().await;

    let server = tokio::spawn(async move {
        let (stream, peer) = listener.accept().await.unwrap();
        let mut connection =
            TlsConnection::accepted(stream, peer, ConnectConfig::default(), server_tls.acceptor());
        assert_eq!(connection.state(), ConnectionState::Unconnected);
        connection.connect().await.unwrap();
        assert_eq!(connection.host(), "localhost");

        let mut segment = read_segment();
        let n = connection.read(&mut segment).await.unwrap();
        let request = BufferChain::from(segment);
        connection.write(&request).await.unwrap();
        connection.close();
        n
    });

    let connector = Connector::new(ConnectConfig::default())
        .with_resolver(Arc::new(
            StaticResolver::new().with_override("localhost", vec![addr]),
        ))
        .with_tls(&TlsClientConfig::with_only_roots(identity.cert_pem.clone()))
        .unwrap();

    let mut client = connector
        .connect(Scheme::Https, "localhost", addr.port())
        .await
        .unwrap();
    assert_eq!(client.scheme(), Scheme::Https);
    assert_eq!(client.state(), ConnectionState::Open);

    client.write(&BufferChain::from("hello tls")).await.unwrap();
    let mut segment = read_segment();
    let mut echoed = Vec::new();
    while echoed.len() < 9 {
        let n = client.read(&mut segment).await.unwrap();
        assert!(n > 0);
        echoed.extend_from_slice(&segment.take());
    }
    assert_eq!(echoed, b"hello tls");
    assert_eq!(server.await.unwrap(), 9);

    client.close();
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_untrusted_certificate_fails_handshake() {
    let served = self_signed("localhost");
    let trusted = self_signed("localhost");
    let server_tls = TlsServerConfig::from_pem(&served.cert_pem, &served.key_pem).unwrap();
    let (listener, addr) = loopback_listener().await;

    let server = tokio::spawn(async move {
        let (stream, peer) = listener.accept().await.unwrap();
        let mut connection =
            TlsConnection::accepted(stream, peer, ConnectConfig::default(), server_tls.acceptor());
        connection.connect().await
    });

    let connector = Connector::new(ConnectConfig::default())
        .with_resolver(Arc::new(
            StaticResolver::new().with_override("localhost", vec![addr]),
        ))
        .with_tls(&TlsClientConfig::with_only_roots(trusted.cert_pem))
        .unwrap();

    let mut client = connector
        .connection(Scheme::Https, "localhost", addr.port())
        .unwrap();
    let err = client.connect().await.unwrap_err();
    assert!(err.is_handshake());
    assert_eq!(client.state(), ConnectionState::Closed);

    assert!(server.await.unwrap().unwrap_err().is_handshake());
}

#[test]
fn test_malformed_pem_is_rejected() {
    let err = TlsServerConfig::from_pem("not a certificate", "not a key").unwrap_err();
    assert!(matches!(err, marvin_proxy::tls::TlsError::CertificateParsing(_)));

    let config = TlsClientConfig::with_only_roots("garbage");
    assert!(config.build().is_err());
}

#[test]
fn test_early_data_setting_reaches_client_config() {
    let cert = self_signed("localhost");

    let config = TlsClientConfig::with_only_roots(cert.cert_pem.clone())
        .with_early_data(true)
        .build()
        .unwrap();
    assert!(config.enable_early_data);

    let config = TlsClientConfig::with_only_roots(cert.cert_pem).build().unwrap();
    assert!(!config.enable_early_data);
}

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::future::BoxFuture;
use marvin_proxy::buffer::read_segment;
use marvin_proxy::{BufferChain, Connection, Exchange, HandlerContext, RequestHandler, Transcript};
use tokio::net::TcpListener;

/// Echoes every read back to the client, one exchange per read.
pub struct EchoHandler;

impl RequestHandler for EchoHandler {
    fn exchange<'a>(
        &'a mut self,
        connection: &'a mut dyn Connection,
        _context: &'a HandlerContext,
    ) -> BoxFuture<'a, marvin_proxy::Result<Exchange>> {
        Box::pin(async move {
            let mut segment = read_segment();
            if connection.read(&mut segment).await? == 0 {
                return Ok(Exchange::end_of_session());
            }
            let request = BufferChain::from(segment);
            connection.write(&request).await?;
            Ok(Exchange::completed(
                Transcript::new(request.clone(), request),
                true,
            ))
        })
    }
}

pub fn echo_factory(_: &dyn Connection) -> Box<dyn RequestHandler> {
    Box::new(EchoHandler)
}

pub async fn loopback_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    (listener, addr)
}

/// An address on loopback with nothing listening.
pub async fn refused_addr() -> SocketAddr {
    let (listener, addr) = loopback_listener().await;
    drop(listener);
    addr
}

pub struct SelfSigned {
    pub cert_pem: String,
    pub key_pem: String,
}

pub fn self_signed(host: &str) -> SelfSigned {
    let key_pair = rcgen::KeyPair::generate().expect("generate key");
    let params = rcgen::CertificateParams::new(vec![host.to_string()]).expect("certificate params");
    let cert = params.self_signed(&key_pair).expect("self-sign");
    SelfSigned {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
    }
}

/// Polls `condition` until it holds or two seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

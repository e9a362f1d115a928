//! Transport failures produced by real sockets rather than mock responses
//!
//! Each listener here misbehaves in one specific way (closing mid-response,
//! presenting a self-signed certificate) so the error mapping is checked
//! against the text hyper and the TLS stack actually produce.

use std::sync::Arc;

use broker_core::http::RequestOptions;
use broker_core::{ClientConfig, ErrorKind, RestClient, RetryPolicy};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::rustls::{self, ServerConfig};
use tokio_rustls::TlsAcceptor;

fn client(server: &str, insecure: bool) -> RestClient {
    let mut config = ClientConfig::new(server);
    config.retry = RetryPolicy::immediate(1);
    config.connect_timeout_secs = 5;
    config.receive_timeout_secs = 5;
    config.insecure = insecure;
    RestClient::new(config).unwrap()
}

async fn read_request<S: AsyncRead + Unpin>(stream: &mut S) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// Plain HTTP listener that answers every request with `reply`, then closes
async fn serve_plain(reply: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            read_request(&mut stream).await;
            let _ = stream.write_all(reply).await;
            let _ = stream.shutdown().await;
        }
    });
    format!("http://{}", addr)
}

/// HTTPS listener with a freshly generated self-signed certificate
async fn serve_self_signed() -> String {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string(), "localhost".to_string()]).unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
    let config = ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], key)
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let Ok(mut tls) = acceptor.accept(stream).await else {
                continue;
            };
            read_request(&mut tls).await;
            let _ = tls
                .write_all(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await;
            let _ = tls.shutdown().await;
        }
    });
    format!("https://{}", addr)
}

#[tokio::test]
async fn test_truncated_body_is_interrupted() {
    let server = serve_plain(
        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"type\"",
    )
    .await;
    let client = client(&server, false);

    let err = client
        .request(RequestOptions::get(client.url().clone()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.to_string().starts_with("Connection to server got interrupted"), "{}", err);
}

#[tokio::test]
async fn test_close_before_response_is_interrupted() {
    let server = serve_plain(b"").await;
    let client = client(&server, false);

    let err = client
        .request(RequestOptions::get(client.url().clone()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.to_string().starts_with("Connection to server got interrupted"), "{}", err);
}

#[tokio::test]
async fn test_refused_connection_ignores_words_in_path() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = client(&format!("http://127.0.0.1:{}", port), false);

    let err = client
        .request(RequestOptions::get(client.resolve("ssl_keys").unwrap()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.is_recoverable());
    assert!(err.to_string().starts_with("Unable to connect to the server"), "{}", err);
    assert!(!err.to_string().contains("insecure"));
}

#[tokio::test]
async fn test_self_signed_certificate_is_reported() {
    let server = serve_self_signed().await;
    let client = client(&server, false);

    let err = client
        .request(RequestOptions::get(client.url().clone()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SelfSignedCertificate, "{}", err);
    assert!(!err.is_recoverable());
    assert!(err.to_string().contains("insecure = true"));
}

#[tokio::test]
async fn test_insecure_accepts_self_signed_certificate() {
    let server = serve_self_signed().await;
    let client = client(&server, true);

    let payload = client
        .request(RequestOptions::get(client.url().clone()))
        .await
        .unwrap();
    assert!(payload.is_none());
}

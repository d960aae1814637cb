//! Response bodies that break off mid-transfer surface as transport errors.

use std::sync::Arc;
use std::time::Duration;

use dashgate_core::auth::MemoryCredentialStore;
use dashgate_core::navigation::{RecordingNavigator, RecordingNotifier};
use dashgate_core::{ApiClient, ApiError, ClientSettings, Credential, CredentialStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const HOUR: Duration = Duration::from_secs(3600);

/// Body that promises more bytes than it sends
const CUT_OFF: &str = "Content-Type: application/json\r\nContent-Length: 200\r\n\r\n\"/auth/for";

fn complete(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}

fn cut_off(status: &str) -> String {
    format!("HTTP/1.1 {}\r\n{}", status, CUT_OFF)
}

/// Read one request, headers and body, so closing the socket never resets it
async fn read_request(socket: &mut TcpStream) {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let Ok(n) = socket.read(&mut buf).await else {
            return;
        };
        if n == 0 {
            return;
        }
        data.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&data).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
            let content_length = text[..end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if data.len() >= end + 4 + content_length {
                return;
            }
        }
    }
}

/// Serve the canned responses in order, one connection each
async fn serve(responses: Vec<String>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        for response in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            read_request(&mut socket).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{}", addr)
}

fn client(base_url: String) -> (ApiClient, Arc<MemoryCredentialStore>, Arc<RecordingNavigator>) {
    let store = Arc::new(MemoryCredentialStore::with_credential(Credential::new("stale"), HOUR));
    let navigator = Arc::new(RecordingNavigator::new());
    let settings = ClientSettings::default()
        .with_base_url(base_url)
        .with_redirect_delay(Duration::ZERO);
    let client = ApiClient::new(
        settings,
        store.clone(),
        navigator.clone(),
        Arc::new(RecordingNotifier::new()),
    )
    .unwrap();
    (client, store, navigator)
}

#[tokio::test]
async fn redirect_body_cut_off_is_a_transport_error() {
    let base_url = serve(vec![cut_off("302 Found")]).await;
    let (client, store, navigator) = client(base_url);

    let err = client.fetch_profile().await.unwrap_err();
    assert!(err.is_transport(), "unexpected error: {:?}", err);

    client.flush_navigation().await;
    assert!(navigator.visited().is_empty());
    assert_eq!(store.get(), Some(Credential::new("stale")));
}

#[tokio::test]
async fn second_401_body_cut_off_is_a_transport_error() {
    let base_url = serve(vec![
        complete("401 Unauthorized", r#"{"message":"Expired"}"#),
        complete("200 OK", r#"{"status":true,"data":{"access_token":"fresh"}}"#),
        cut_off("401 Unauthorized"),
    ])
    .await;
    let (client, store, navigator) = client(base_url);

    let err = client.fetch_profile().await.unwrap_err();
    assert!(matches!(err, ApiError::NetworkError(_)), "unexpected error: {:?}", err);
    assert_eq!(client.refresh_count(), 1);
    assert_eq!(store.get(), Some(Credential::new("fresh")));
    assert!(navigator.visited().is_empty());
}

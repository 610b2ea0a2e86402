use std::sync::Arc;
use std::time::Duration;

use hyper::{Body, Client, Method, Request, StatusCode};
use tokio::time::sleep;

use crate::error::Error;
use crate::p2p::http::{serve_signaling, SignalHandlerFn};

async fn post(port: u16, body: &'static str) -> (StatusCode, String) {
    let client = Client::new();
    for _ in 0..50 {
        let req = Request::builder()
            .method(Method::POST)
            .uri(format!("http://127.0.0.1:{port}/"))
            .body(Body::from(body))
            .unwrap();
        match client.request(req).await {
            Ok(resp) => {
                let status = resp.status();
                let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
                return (status, String::from_utf8_lossy(&bytes).into_owned());
            }
            Err(_) => sleep(Duration::from_millis(20)).await,
        }
    }
    panic!("signaling server never came up on port {port}");
}

#[tokio::test]
async fn handler_reply_becomes_response_body() {
    let handler: SignalHandlerFn = Arc::new(|body| {
        Box::pin(async move {
            let mut reply = b"ack: ".to_vec();
            reply.extend_from_slice(&body);
            Ok(reply)
        })
    });
    tokio::spawn(serve_signaling(13201, handler));

    let (status, body) = post(13201, "hello").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ack: hello");
}

#[tokio::test]
async fn handler_error_becomes_500_with_message() {
    let handler: SignalHandlerFn = Arc::new(|_| Box::pin(async { Err(Error::ErrSessionHeld) }));
    tokio::spawn(serve_signaling(13202, handler));

    let (status, body) = post(13202, "{}").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("already have source peer"));
}

//! Signaling HTTP endpoint.
//!
//! One handler at every path: the full request body goes to the application
//! callback, whose bytes become the 200 response. A callback error becomes a
//! 500 with the error string as the body, which is how the exit's admission
//! denial reaches the source. No body limit is imposed here; SDP bundles are
//! small but may carry many candidates.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};

use crate::error::Result;

/// Application callback: request body in, response body out.
pub type SignalHandlerFn =
    Arc<dyn (Fn(Vec<u8>) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send>>) + Send + Sync>;

/// Runs the signaling server on `127.0.0.1:port` until it fails. There is no
/// graceful-shutdown contract.
pub async fn serve_signaling(port: u16, handler: SignalHandlerFn) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let make_service = make_service_fn(move |_conn| {
        let handler = Arc::clone(&handler);
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let handler = Arc::clone(&handler);
                async move {
                    let body = match hyper::body::to_bytes(req.into_body()).await {
                        Ok(body) => body,
                        Err(err) => {
                            log::error!("signaling request body: {err}");
                            return Response::builder()
                                .status(StatusCode::INTERNAL_SERVER_ERROR)
                                .body(Body::from(err.to_string()));
                        }
                    };
                    log::debug!("signaling request, {} bytes", body.len());

                    match handler.as_ref()(body.to_vec()).await {
                        Ok(resp) => Response::builder()
                            .status(StatusCode::OK)
                            .body(Body::from(resp)),
                        Err(err) => {
                            log::error!("signaling handler: {err}");
                            Response::builder()
                                .status(StatusCode::INTERNAL_SERVER_ERROR)
                                .body(Body::from(err.to_string()))
                        }
                    }
                }
            }))
        }
    });

    Server::try_bind(&addr)?.serve(make_service).await?;
    Ok(())
}

//! Websocket plumbing for the snaptrack channel.
//!
//! Connects to the agent, owns the socket as a lifeline resource, and carries
//! text frames between the socket and an attached bus.
use async_tungstenite::{
    tokio::{connect_async, ConnectStream},
    WebSocketStream,
};
use log::debug;
use tungstenite::{
    client::IntoClientRequest,
    http::{
        header::{AUTHORIZATION, ORIGIN},
        HeaderValue,
    },
};

pub mod bus;
pub mod message;
pub mod resource;
pub mod service;

/// An established client connection to the agent.
pub type WebsocketConnection = WebSocketStream<ConnectStream>;

/// Connects to the url.
///
/// The handshake carries `Origin: <origin>` and `Authorization: Bearer <token>`, when they are given.
/// The agent rejects handshakes from an unexpected origin.
pub async fn connect_authorized(
    url: impl AsRef<str>,
    origin: Option<String>,
    token: Option<String>,
) -> anyhow::Result<WebsocketConnection> {
    let mut request = url.as_ref().into_client_request()?;

    if let Some(origin) = origin {
        let header = HeaderValue::from_str(origin.as_str())?;
        request.headers_mut().insert(ORIGIN, header);
    }

    if let Some(token) = token {
        let header = HeaderValue::from_str(format!("Bearer {}", token).as_str())?;
        request.headers_mut().insert(AUTHORIZATION, header);
    }

    let (websocket, response) = connect_async(request).await?;
    debug!(
        "websocket handshake complete with status {}",
        response.status()
    );

    Ok(websocket)
}

#[cfg(test)]
mod tests {
    use super::connect_authorized;
    use async_tungstenite::tokio::accept_hdr_async;
    use tokio::net::TcpListener;
    use tungstenite::handshake::server::{ErrorResponse, Request, Response};

    #[derive(Debug, Default, PartialEq)]
    struct Handshake {
        origin: Option<String>,
        authorization: Option<String>,
    }

    async fn accept_handshake(listener: TcpListener) -> Handshake {
        let (stream, _) = listener.accept().await.expect("accept failed");
        let mut handshake = Handshake::default();

        let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let header = |name: &str| {
                request
                    .headers()
                    .get(name)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            };

            handshake.origin = header("Origin");
            handshake.authorization = header("Authorization");

            Ok(response)
        };

        let _websocket = accept_hdr_async(stream, callback)
            .await
            .expect("handshake failed");

        handshake
    }

    #[tokio::test]
    async fn sends_origin_and_bearer_token() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("ws://{}/ws", listener.local_addr()?);

        let server = tokio::spawn(accept_handshake(listener));
        let _websocket = connect_authorized(
            url,
            Some("http://localhost:3000".to_string()),
            Some("secret".to_string()),
        )
        .await?;

        let expected = Handshake {
            origin: Some("http://localhost:3000".to_string()),
            authorization: Some("Bearer secret".to_string()),
        };
        assert_eq!(expected, server.await?);
        Ok(())
    }

    #[tokio::test]
    async fn omits_unset_headers() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("ws://{}/ws", listener.local_addr()?);

        let server = tokio::spawn(accept_handshake(listener));
        let _websocket = connect_authorized(url, None, None).await?;

        assert_eq!(Handshake::default(), server.await?);
        Ok(())
    }
}

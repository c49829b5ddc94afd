//! The inbound HTTP endpoint Twitch delivers EventSub webhooks to.
use crate::eventsub::data::{
    MessageType, NotificationMessage, RevocationMessage, VerificationMessage, MESSAGE_ID,
    MESSAGE_TYPE, STREAM_ONLINE,
};
use crate::eventsub::event::LiveEvent;
use crate::eventsub::verify::{self, SignedMessage};
use crate::notify::Notifier;
use chrono::{DateTime, Utc};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use tiny_http::{Header, Method, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const CALLBACK_PATH: &str = "/webhooks/callback";

const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// The data needed to start a [Server].
#[derive(Debug)]
pub struct ServerData {
    pub address: String,
    /// The EventSub signing secret. Without one, every callback is refused.
    pub secret: Option<String>,
    pub notifier: Notifier,
    /// Runtime the notifications are spawned on.
    pub runtime: tokio::runtime::Handle,
}

pub struct Server {
    server: Arc<tiny_http::Server>,
    stopping: CancellationToken,
    thread: std::thread::JoinHandle<()>,
}

#[derive(Debug)]
pub struct ServerError(Box<dyn std::error::Error + Send + Sync>);

/// Routes requests. Kept apart from the socket so it can be driven directly.
#[derive(Debug)]
pub struct App {
    secret: Option<String>,
    notifier: Notifier,
}

/// A request whose body was already read.
#[derive(Debug, Clone, Copy)]
pub struct Incoming<'a> {
    pub method: &'a Method,
    pub url: &'a str,
    pub headers: &'a [Header],
    pub body: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    fn text<S: Into<String>>(status: u16, body: S) -> Self {
        Reply {
            status,
            body: body.into(),
        }
    }
    fn empty(status: u16) -> Self {
        Reply::text(status, String::new())
    }
}

impl Incoming<'_> {
    pub fn header(&self, name: &'static str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.field.equiv(name))
            .map(|header| header.value.as_str())
    }
    fn path(&self) -> &str {
        self.url.split_once('?').map_or(self.url, |(path, _)| path)
    }
}

impl App {
    pub fn new(secret: Option<String>, notifier: Notifier) -> Self {
        App { secret, notifier }
    }

    /// Must be called from within a tokio runtime: live notifications are
    /// spawned on it.
    pub fn handle(&self, request: &Incoming<'_>, now: DateTime<Utc>) -> Reply {
        match (request.method, request.path()) {
            (Method::Get, "/") => Reply::text(200, "Hello World!"),
            (Method::Post, CALLBACK_PATH) => self.callback(request, now),
            (_, "/" | CALLBACK_PATH) => Reply::text(405, "Method not allowed."),
            _ => Reply::text(404, "Not found."),
        }
    }

    fn callback(&self, request: &Incoming<'_>, now: DateTime<Utc>) -> Reply {
        let verified = SignedMessage::from_headers(move |name| request.header(name)).and_then(
            |message| verify::verify(&message, request.body, self.secret.as_deref(), now),
        );
        let message_id = request.header(MESSAGE_ID).unwrap_or_default();
        if let Err(err) = verified {
            warn!(message_id, "{err}");
            return Reply::text(403, "Forbidden.");
        }
        debug!(message_id, "Verification successful");

        let Some(message_type) = request.header(MESSAGE_TYPE).and_then(MessageType::from_header)
        else {
            warn!(message_id, "Missing or unknown message type");
            return Reply::text(400, "Unknown message type.");
        };

        match message_type {
            MessageType::Verification => {
                match serde_json::from_slice::<VerificationMessage>(request.body) {
                    Ok(message) => {
                        info!(message_id, "Verifying webhook");
                        Reply::text(200, message.challenge)
                    }
                    Err(err) => bad_payload(message_id, &err),
                }
            }
            MessageType::Notification => {
                let message = match serde_json::from_slice::<NotificationMessage>(request.body) {
                    Ok(message) => message,
                    Err(err) => return bad_payload(message_id, &err),
                };
                if message.subscription.kind != STREAM_ONLINE {
                    info!(
                        message_id,
                        subscription = message.subscription.kind.as_str(),
                        "Ignoring notification"
                    );
                    return Reply::empty(200);
                }
                let event = match serde_json::from_value::<LiveEvent>(message.event) {
                    Ok(event) => event,
                    Err(err) => return bad_payload(message_id, &err),
                };
                info!(
                    message_id,
                    broadcaster = event.broadcaster_user_name.as_str(),
                    started_at = event.started_at.as_str(),
                    "Receiving {} request",
                    message.subscription.kind
                );
                self.notifier.spawn(event);
                Reply::empty(200)
            }
            MessageType::Revocation => {
                match serde_json::from_slice::<RevocationMessage>(request.body) {
                    Ok(message) => {
                        warn!(
                            message_id,
                            subscription = message.subscription.kind.as_str(),
                            subscription_id = message.subscription.id.as_deref().unwrap_or_default(),
                            status = message.subscription.status.as_deref().unwrap_or("unknown"),
                            "Subscription revoked by Twitch"
                        );
                        Reply::empty(200)
                    }
                    Err(err) => bad_payload(message_id, &err),
                }
            }
        }
    }
}

fn bad_payload(message_id: &str, err: &serde_json::Error) -> Reply {
    warn!(message_id, "Malformed payload: {err}");
    Reply::text(400, "Malformed payload.")
}

impl Server {
    /// Binds `data.address` and serves requests on a dedicated thread.
    pub fn start(data: ServerData) -> Result<Self, ServerError> {
        let server = Arc::new(tiny_http::Server::http(&data.address).map_err(ServerError)?);
        let stopping = CancellationToken::new();
        let app = App::new(data.secret, data.notifier);

        let thread = {
            let server = server.clone();
            let stopping = stopping.clone();
            let runtime = data.runtime;
            std::thread::spawn(move || {
                let _runtime = runtime.enter();
                loop {
                    match server.recv() {
                        Ok(request) => Server::respond(&app, request),
                        Err(_) if stopping.is_cancelled() => break,
                        Err(err) => warn!("Error receiving a request: {err}"),
                    }
                }
                debug!("Server stopped");
            })
        };

        Ok(Server {
            server,
            stopping,
            thread,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Stops accepting requests and waits for the server thread.
    pub fn shutdown(self) {
        self.stopping.cancel();
        self.server.unblock();
        if self.thread.join().is_err() {
            warn!("Server thread panicked");
        }
    }

    fn respond(app: &App, mut request: tiny_http::Request) {
        let mut body = Vec::new();
        if let Err(err) = request
            .as_reader()
            .take(MAX_BODY_BYTES + 1)
            .read_to_end(&mut body)
        {
            warn!("Error reading a request body: {err}");
            if let Err(err) = request.respond(Response::empty(400)) {
                warn!("Error sending a response: {err}");
            }
            return;
        }
        if body.len() as u64 > MAX_BODY_BYTES {
            warn!(limit = MAX_BODY_BYTES, "Request body too large");
            // Drain the rest before answering.
            let _ = std::io::copy(request.as_reader(), &mut std::io::sink());
            let response = Response::from_string("Payload too large.").with_status_code(413);
            if let Err(err) = request.respond(response) {
                warn!("Error sending a response: {err}");
            }
            return;
        }

        let reply = app.handle(
            &Incoming {
                method: request.method(),
                url: request.url(),
                headers: request.headers(),
                body: &body,
            },
            Utc::now(),
        );
        let response = Response::from_string(reply.body).with_status_code(reply.status);
        if let Err(err) = request.respond(response) {
            warn!("Error sending a response: {err}");
        }
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("Error while creating the server: {}", self.0))
    }
}
impl std::error::Error for ServerError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::access::AccessTokenManager;
    use crate::auth::AccessTokenManagerData;
    use crate::discord::data::DiscordWebhookData;
    use crate::discord::DiscordWebhook;
    use crate::eventsub::data::{MESSAGE_SIGNATURE, MESSAGE_TIMESTAMP};
    use crate::notify::NotifierData;
    use crate::options::{Announcement, Notify};
    use crate::testing::{self, MockServer};
    use crate::twitch::HelixClient;
    use std::time::Duration;

    const SECRET: &str = "s3cr3t-s3cr3t";

    async fn notifier(server: &MockServer) -> Notifier {
        let endpoints = server.endpoints();
        let access = AccessTokenManager::new(AccessTokenManagerData {
            client_id: String::from("app-id"),
            client_secret: String::from("app-secret"),
            token_url: endpoints.oauth_token,
        });
        access.acquire().await.unwrap();
        Notifier::new(NotifierData {
            helix: HelixClient::new(access, endpoints.helix),
            webhook: DiscordWebhook::new(DiscordWebhookData {
                base_url: endpoints.discord,
                hook_id: String::from("816"),
                token: String::from("hook-token"),
            }),
            announcement: Announcement::default(),
            policy: Notify {
                retry_delay_secs: 0,
                max_attempts: 2,
            },
            cancel: CancellationToken::new(),
        })
    }

    fn signed_headers(message_type: &str, body: &str, timestamp: &str) -> Vec<Header> {
        let id = "e76c6bd4-55c9-4987-8304-da1588d8988b";
        let signature = verify::compute_signature(SECRET, id, timestamp, body.as_bytes());
        [
            (MESSAGE_ID, id),
            (MESSAGE_TIMESTAMP, timestamp),
            (MESSAGE_SIGNATURE, signature.as_str()),
            (MESSAGE_TYPE, message_type),
        ]
        .into_iter()
        .map(|(name, value)| Header::from_bytes(name, value).unwrap())
        .collect()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn notification(subscription: &str) -> String {
        serde_json::json!({
            "subscription": { "id": "f1c2", "type": subscription, "status": "enabled" },
            "event": {
                "id": "41261025260",
                "broadcaster_user_id": "109322347",
                "broadcaster_user_login": "legonzaur",
                "broadcaster_user_name": "Legonzaur",
                "type": "live",
                "started_at": "2021-03-01T19:21:58Z"
            }
        })
        .to_string()
    }

    fn post<'a>(method: &'a Method, headers: &'a [Header], body: &'a str) -> Incoming<'a> {
        Incoming {
            method,
            url: CALLBACK_PATH,
            headers,
            body: body.as_bytes(),
        }
    }

    #[tokio::test]
    async fn routes() {
        let mock = testing::twitch_and_discord(true, true);
        let app = App::new(Some(String::from(SECRET)), notifier(&mock).await);
        let method = Method::Get;
        let get = |url: &'static str| Incoming {
            method: &method,
            url,
            headers: &[],
            body: &[],
        };

        assert_eq!(app.handle(&get("/"), now()), Reply::text(200, "Hello World!"));
        assert_eq!(app.handle(&get("/nope"), now()).status, 404);
        assert_eq!(app.handle(&get(CALLBACK_PATH), now()).status, 405);
    }

    #[tokio::test]
    async fn handshake_echoes_the_challenge() {
        let mock = testing::twitch_and_discord(true, true);
        let app = App::new(Some(String::from(SECRET)), notifier(&mock).await);
        let body = r#"{"challenge":"pogchamp-kappa-360noscope-vohiyo","subscription":{"type":"stream.online"}}"#;
        let timestamp = now().to_rfc3339();
        let headers = signed_headers("webhook_callback_verification", body, &timestamp);

        assert_eq!(
            app.handle(&post(&Method::Post, &headers, body), now()),
            Reply::text(200, "pogchamp-kappa-360noscope-vohiyo")
        );
        assert!(mock.requests_to("/helix").is_empty());
    }

    #[tokio::test]
    async fn unsigned_or_stale_callbacks_are_forbidden() {
        let mock = testing::twitch_and_discord(true, true);
        let app = App::new(Some(String::from(SECRET)), notifier(&mock).await);
        let body = notification(STREAM_ONLINE);

        let stale = (now() - chrono::Duration::seconds(601)).to_rfc3339();
        let headers = signed_headers("notification", &body, &stale);
        assert_eq!(app.handle(&post(&Method::Post, &headers, &body), now()).status, 403);

        let mut headers = signed_headers("notification", &body, &now().to_rfc3339());
        headers.retain(|header| !header.field.equiv(MESSAGE_SIGNATURE));
        assert_eq!(app.handle(&post(&Method::Post, &headers, &body), now()).status, 403);

        let headers = signed_headers("notification", &body, &now().to_rfc3339());
        let tampered = body.replace("109322347", "109322348");
        assert_eq!(app.handle(&post(&Method::Post, &headers, &tampered), now()).status, 403);
    }

    #[tokio::test]
    async fn missing_secret_refuses_valid_signatures() {
        let mock = testing::twitch_and_discord(true, true);
        let app = App::new(None, notifier(&mock).await);
        let body = notification(STREAM_ONLINE);
        let headers = signed_headers("notification", &body, &now().to_rfc3339());
        assert_eq!(app.handle(&post(&Method::Post, &headers, &body), now()).status, 403);
    }

    #[tokio::test]
    async fn bad_message_type_or_payload_is_rejected() {
        let mock = testing::twitch_and_discord(true, true);
        let app = App::new(Some(String::from(SECRET)), notifier(&mock).await);
        let timestamp = now().to_rfc3339();

        let body = notification(STREAM_ONLINE);
        let headers = signed_headers("webhook_bogus", &body, &timestamp);
        assert_eq!(app.handle(&post(&Method::Post, &headers, &body), now()).status, 400);

        let body = r#"{"subscription":{"type":"stream.online"}}"#;
        let headers = signed_headers("notification", body, &timestamp);
        assert_eq!(app.handle(&post(&Method::Post, &headers, body), now()).status, 400);

        let body = r#"{"subscription":{"type":"stream.online"},"event":{"broadcaster_user_id":"1"}}"#;
        let headers = signed_headers("notification", body, &timestamp);
        assert_eq!(app.handle(&post(&Method::Post, &headers, body), now()).status, 400);
    }

    #[tokio::test]
    async fn other_subscriptions_and_revocations_are_acknowledged() {
        let mock = testing::twitch_and_discord(true, true);
        let app = App::new(Some(String::from(SECRET)), notifier(&mock).await);
        let timestamp = now().to_rfc3339();

        let body = notification("stream.offline");
        let headers = signed_headers("notification", &body, &timestamp);
        assert_eq!(app.handle(&post(&Method::Post, &headers, &body), now()), Reply::empty(200));

        let body = r#"{"subscription":{"type":"stream.online","status":"authorization_revoked"}}"#;
        let headers = signed_headers("revocation", body, &timestamp);
        assert_eq!(app.handle(&post(&Method::Post, &headers, body), now()), Reply::empty(200));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(mock.requests_to("/helix").is_empty());
    }

    async fn wait_for_posts(mock: &MockServer, count: usize) -> Vec<testing::Recorded> {
        for _ in 0..500 {
            let posts = mock.requests_to("/discord/webhooks");
            if posts.len() >= count {
                return posts;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        mock.requests_to("/discord/webhooks")
    }

    async fn start(mock: &MockServer) -> (Server, String) {
        let server = Server::start(ServerData {
            address: String::from("127.0.0.1:0"),
            secret: Some(String::from(SECRET)),
            notifier: notifier(mock).await,
            runtime: tokio::runtime::Handle::current(),
        })
        .unwrap();
        let url = format!("http://{}", server.local_addr().unwrap());
        (server, url)
    }

    fn signed_request(
        client: &reqwest::Client,
        url: &str,
        message_type: &str,
        body: &str,
    ) -> reqwest::RequestBuilder {
        let mut request = client.post(format!("{url}{CALLBACK_PATH}"));
        for header in signed_headers(message_type, body, &now().to_rfc3339()) {
            request = request.header(header.field.to_string(), header.value.to_string());
        }
        request
            .header("Content-Type", "application/json")
            .body(body.to_owned())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn end_to_end_handshake() {
        let mock = testing::twitch_and_discord(true, true);
        let (server, url) = start(&mock).await;
        let client = reqwest::Client::new();

        let response = signed_request(
            &client,
            &url,
            "webhook_callback_verification",
            r#"{"challenge":"abc123"}"#,
        )
        .send()
        .await
        .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.text().await.unwrap(), "abc123");

        let response = client.get(format!("{url}/")).send().await.unwrap();
        assert_eq!(response.text().await.unwrap(), "Hello World!");

        server.shutdown();
        assert!(mock.requests_to("/helix").is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn end_to_end_live_notification() {
        let mock = testing::twitch_and_discord(true, true);
        let (server, url) = start(&mock).await;
        let client = reqwest::Client::new();

        let body = notification(STREAM_ONLINE);
        let response = signed_request(&client, &url, "notification", &body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.text().await.unwrap(), "");

        let posts = wait_for_posts(&mock, 1).await;
        assert_eq!(posts.len(), 1);
        assert!(posts[0].body.contains("Legonzaur"));
        assert!(posts[0].body.contains("https://www.twitch.tv/legonzaur"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(mock.requests_to("/discord/webhooks").len(), 1);
        server.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn end_to_end_forged_notification() {
        let mock = testing::twitch_and_discord(true, true);
        let (server, url) = start(&mock).await;
        let client = reqwest::Client::new();

        let body = notification(STREAM_ONLINE);
        let response = signed_request(&client, &url, "notification", &body)
            .body(body.replace("Legonzaur", "Impostor"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 403);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(mock.requests_to("/helix").is_empty());
        assert!(mock.requests_to("/discord").is_empty());
        server.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn end_to_end_oversized_body() {
        let mock = testing::twitch_and_discord(true, true);
        let (server, url) = start(&mock).await;
        let client = reqwest::Client::new();

        let body = "x".repeat(MAX_BODY_BYTES as usize + 1);
        let response = signed_request(&client, &url, "notification", &body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 413);

        let body = notification(STREAM_ONLINE);
        let response = signed_request(&client, &url, "notification", &body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        server.shutdown();
    }
}

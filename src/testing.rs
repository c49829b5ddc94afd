//! Local stand-ins for the Twitch and Discord APIs, served with `tiny_http`.
use crate::options::Endpoints;
use std::io::Read;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub struct MockServer {
    server: Arc<tiny_http::Server>,
    requests: Arc<Mutex<Vec<Recorded>>>,
    pub url: String,
}

impl MockServer {
    /// Answers every request with `route(request)`, recording it first.
    pub fn start(route: impl Fn(&Recorded) -> (u16, String) + Send + 'static) -> Self {
        let server = Arc::new(tiny_http::Server::http("127.0.0.1:0").unwrap());
        let address = server.server_addr().to_ip().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let thread_server = server.clone();
        let thread_requests = requests.clone();
        std::thread::spawn(move || {
            for mut request in thread_server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let recorded = Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_owned(),
                    headers: request
                        .headers()
                        .iter()
                        .map(|header| (header.field.to_string(), header.value.to_string()))
                        .collect(),
                    body,
                };
                let (status, reply) = route(&recorded);
                thread_requests.lock().unwrap().push(recorded);
                let _ = request
                    .respond(tiny_http::Response::from_string(reply).with_status_code(status));
            }
        });

        MockServer {
            server,
            requests,
            url: format!("http://{address}"),
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
    pub fn requests_to(&self, path_prefix: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|request| request.url.starts_with(path_prefix))
            .collect()
    }

    /// Endpoints that send every service to this server.
    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            oauth_token: format!("{}/oauth2/token", self.url),
            helix: format!("{}/helix", self.url),
            discord: format!("{}/discord", self.url),
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

pub fn helix_data(items: serde_json::Value) -> (u16, String) {
    (200, serde_json::json!({ "data": items }).to_string())
}

pub fn token_response() -> (u16, String) {
    (
        200,
        serde_json::json!({
            "access_token": "mock-token",
            "expires_in": 5011271,
            "token_type": "bearer",
        })
        .to_string(),
    )
}

pub fn live_stream() -> serde_json::Value {
    serde_json::json!({
        "id": "41375541868",
        "user_id": "109322347",
        "user_login": "legonzaur",
        "user_name": "Legonzaur",
        "game_id": "509658",
        "game_name": "Just Chatting",
        "type": "live",
        "title": "Chill stream",
        "viewer_count": 78365,
        "started_at": "2021-03-01T19:21:58Z",
        "thumbnail_url": "https://static-cdn.jtvnw.net/previews-ttv/live_user_legonzaur-{width}x{height}.jpg",
    })
}

pub fn user() -> serde_json::Value {
    serde_json::json!({
        "id": "109322347",
        "login": "legonzaur",
        "display_name": "Legonzaur",
        "profile_image_url": "https://static-cdn.jtvnw.net/user-default-pictures/profile.png",
    })
}

pub fn game() -> serde_json::Value {
    serde_json::json!({
        "id": "509658",
        "name": "Just Chatting",
        "box_art_url": "https://static-cdn.jtvnw.net/ttv-boxart/509658-{width}x{height}.jpg",
    })
}

/// A Twitch + Discord stand-in. `live` decides whether `/helix/streams`
/// returns a stream, `with_game` whether `/helix/games` finds the game.
pub fn twitch_and_discord(live: bool, with_game: bool) -> MockServer {
    MockServer::start(move |request| {
        let path = request.url.as_str();
        if path.starts_with("/oauth2/token") {
            token_response()
        } else if path.starts_with("/helix/streams") {
            if live {
                helix_data(serde_json::json!([live_stream()]))
            } else {
                helix_data(serde_json::json!([]))
            }
        } else if path.starts_with("/helix/users") {
            helix_data(serde_json::json!([user()]))
        } else if path.starts_with("/helix/games") {
            if with_game {
                helix_data(serde_json::json!([game()]))
            } else {
                helix_data(serde_json::json!([]))
            }
        } else if path.starts_with("/discord/webhooks") {
            (204, String::new())
        } else {
            (404, String::from("{\"status\":404,\"message\":\"not found\"}"))
        }
    })
}

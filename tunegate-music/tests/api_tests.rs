//! Integration tests for the tunegate-music HTTP API
//!
//! Upstreams are simulated by a local axum server speaking the vkeys, netease
//! and meting dialects. The netease and meting routes echo the parameters they
//! received into the URL or lyric they return. Network failures are forced by
//! pointing a provider at a closed local port.

use axum::{
    body::Body,
    extract::Query,
    http::{header, HeaderMap, Request, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::net::TcpListener;
use tower::util::ServiceExt; // for `oneshot` method
use tunegate_common::config::TomlConfig;
use tunegate_music::{build_router, AppState, Resolver};

// =============================================================================
// Mock upstream
// =============================================================================

async fn vkeys_song_or_url(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    if params.contains_key("word") {
        return Json(json!({
            "code": 200,
            "message": "请求成功！",
            "data": [
                {
                    "id": 97773,
                    "mid": "0039MnYb0qxYhV",
                    "song": "晴天",
                    "singer": "周杰伦",
                    "album": "叶惠美",
                    "cover": "https://y.qq.com/cover.jpg",
                    "interval": "4分29秒",
                    "pay": "付费"
                },
                {
                    "id": 12345,
                    "mid": "",
                    "song": "免费歌",
                    "singer": "某人",
                    "album": "专辑",
                    "cover": "",
                    "interval": "bogus",
                    "pay": "免费"
                }
            ]
        }));
    }

    match params.get("id").map(String::as_str) {
        Some("nourl") => Json(json!({"code": 200, "data": {"url": ""}})),
        Some(id) => Json(json!({"code": 200, "data": {"url": format!("http://cdn.test/{}.m4a", id)}})),
        None => Json(json!({"code": 400, "message": "missing parameter"})),
    }
}

async fn vkeys_lyric(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    match params.get("id").map(String::as_str) {
        Some("nolrc") => Json(json!({"code": 200, "data": {}})),
        _ => Json(json!({"code": 200, "data": {"lrc": "[00:00.00]晴天"}})),
    }
}

fn param<'a>(params: &'a HashMap<String, String>, name: &str) -> &'a str {
    params.get(name).map(String::as_str).unwrap_or("-")
}

async fn netease_search(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({
        "code": 200,
        "result": {
            "songCount": 1,
            "songs": [{
                "id": 186016,
                "name": param(&params, "s"),
                "artists": [{"name": "周杰伦"}],
                "album": {"name": "叶惠美", "picUrl": "http://p1.music.126.net/a.jpg"},
                "duration": 269000.4,
                "fee": 8
            }]
        }
    }))
}

async fn netease_url(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let referer = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    match param(&params, "id") {
        "nourl" => Json(json!({"code": 200, "data": [{"id": 0, "url": null}]})),
        id => Json(json!({"code": 200, "data": [{
            "url": format!(
                "http://n.test/{}.mp3?ids={}&br={}&referer={}",
                id,
                param(&params, "ids"),
                param(&params, "br"),
                referer
            )
        }]})),
    }
}

async fn netease_lyric(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    match param(&params, "id") {
        "nolrc" => Json(json!({"code": 200, "nolyric": true})),
        id => Json(json!({"code": 200, "lrc": {"lyric": format!(
            "[00:00.00]{} lv={} tv={}",
            id,
            param(&params, "lv"),
            param(&params, "tv")
        )}})),
    }
}

async fn meting(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let server = param(&params, "server");
    let id = param(&params, "id");
    match param(&params, "type") {
        "search" => Json(json!([
            {"id": "186016", "name": id, "artist": server, "album": "叶惠美", "pic": "", "time": 269},
            {"name": "No id", "time": 1}
        ])),
        "url" if id == "nourl" => Json(json!([{"url": ""}])),
        "url" => Json(json!([{"url": format!("http://m.test/{}/{}.mp3", server, id)}])),
        "lyric" if id == "nolrc" => Json(json!({"lyric": ""})),
        "lyric" => Json(json!({"lyric": format!("[00:00.00]{} {}", server, id)})),
        other => Json(json!({"error": format!("unknown type {}", other)})),
    }
}

async fn not_json() -> &'static str {
    "<html>maintenance</html>"
}

/// Test helper: Start the mock upstream, returning its base URL
async fn spawn_upstream() -> String {
    let app = Router::new()
        .route("/vkeys", get(vkeys_song_or_url))
        .route("/vkeys/lyric", get(vkeys_lyric))
        .route("/netease/search/get/web", get(netease_search))
        .route("/netease/song/enhance/player/url", get(netease_url))
        .route("/netease/song/lyric", get(netease_lyric))
        .route("/meting", get(meting))
        .route("/broken", get(not_json));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Test helper: Base URL of a port nothing listens on
async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

// =============================================================================
// App setup
// =============================================================================

fn provider_toml(name: &str, dialect: &str, base_url: &str) -> String {
    format!(
        "[[providers]]\nname = \"{}\"\ndialect = \"{}\"\nbase_url = \"{}\"\n",
        name, dialect, base_url
    )
}

/// Test helper: Router over the given `[resolver]` table and provider blocks
fn setup_app(resolver_table: &str, providers: &[String]) -> Router {
    let toml = format!("[resolver]\n{}\n\n{}", resolver_table, providers.join("\n"));
    let config = TomlConfig::from_toml_str(&toml).expect("Should parse test config");
    config.validate().expect("Test config should be valid");
    let resolver = Resolver::from_config(&config).expect("Should build resolver");
    build_router(AppState::new(resolver))
}

async fn working_app() -> Router {
    let upstream = spawn_upstream().await;
    setup_app("", &[provider_toml("mock", "vkeys", &format!("{}/vkeys", upstream))])
}

async fn unreachable_app(resolver_table: &str) -> Router {
    let closed = closed_port_url().await;
    setup_app(resolver_table, &[provider_toml("down", "vkeys", &closed)])
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app.oneshot(test_request("GET", uri)).await.unwrap();
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test]
async fn test_search_returns_canonical_songs() {
    let app = working_app().await;
    let (status, body) = get_json(app, "/api/music/search?keyword=%E6%99%B4%E5%A4%A9").await;

    assert_eq!(status, StatusCode::OK);
    let songs = body["result"]["songs"].as_array().unwrap();
    assert_eq!(songs.len(), 2);
    assert_eq!(body["result"]["songCount"], 2);

    assert_eq!(songs[0]["id"], "0039MnYb0qxYhV");
    assert_eq!(songs[0]["name"], "晴天");
    assert_eq!(songs[0]["artists"][0]["name"], "周杰伦");
    assert_eq!(songs[0]["album"]["name"], "叶惠美");
    assert_eq!(songs[0]["album"]["picUrl"], "https://y.qq.com/cover.jpg");
    assert_eq!(songs[0]["duration"], 269_000);
    assert_eq!(songs[0]["fee"], 1);

    // Blank mid falls back to the numeric id; unparseable duration is 0
    assert_eq!(songs[1]["id"], "12345");
    assert_eq!(songs[1]["duration"], 0);
    assert_eq!(songs[1]["fee"], 0);
    assert!(songs[1].get("source").is_none());
}

#[tokio::test]
async fn test_search_requires_keyword() {
    let app = working_app().await;

    let (status, body) = get_json(app.clone(), "/api/music/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");

    let (status, _) = get_json(app, "/api/music/search?keyword=%20%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_upstream_down_is_empty() {
    let app = unreachable_app("").await;
    let (status, body) = get_json(app, "/api/music/search?keyword=x").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": {"songs": [], "songCount": 0}}));
}

#[tokio::test]
async fn test_search_repeated_keyword_uses_first() {
    let app = working_app().await;
    let (status, body) = get_json(app, "/api/music/search?keyword=%E6%99%B4%E5%A4%A9&keyword=b").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["songCount"], 2);
}

#[tokio::test]
async fn test_search_malformed_upstream_is_empty() {
    let upstream = spawn_upstream().await;
    let app = setup_app("", &[provider_toml("broken", "vkeys", &format!("{}/broken", upstream))]);
    let (status, body) = get_json(app, "/api/music/search?keyword=x").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["songCount"], 0);
}

#[tokio::test]
async fn test_aggregate_search_skips_failed_provider() {
    let upstream = spawn_upstream().await;
    let closed = closed_port_url().await;
    let app = setup_app(
        "search_mode = \"aggregate\"",
        &[
            provider_toml("down", "vkeys", &closed),
            provider_toml("mock", "vkeys", &format!("{}/vkeys", upstream)),
        ],
    );

    let (status, body) = get_json(app, "/api/music/search?keyword=%E6%99%B4%E5%A4%A9").await;
    assert_eq!(status, StatusCode::OK);
    let songs = body["result"]["songs"].as_array().unwrap();
    assert_eq!(songs.len(), 2);
    // Free tracks rank first; every track names its provider
    assert_eq!(songs[0]["name"], "免费歌");
    assert!(songs.iter().all(|s| s["source"] == "mock"));
}

// =============================================================================
// Playback URL
// =============================================================================

#[tokio::test]
async fn test_url_from_upstream_is_https() {
    let app = working_app().await;
    let (status, body) = get_json(app, "/api/music/url?id=0039MnYb0qxYhV").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["url"], "https://cdn.test/0039MnYb0qxYhV.m4a");
    assert_eq!(body["data"][0]["br"], 320_000);
    // Leading digits of the identifier
    assert_eq!(body["data"][0]["id"], 39);
}

#[tokio::test]
async fn test_url_falls_back_when_upstream_down() {
    let app = unreachable_app("").await;
    let (status, body) = get_json(app, "/api/music/url?id=12345").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"data": [{
            "id": 12345,
            "url": "https://ws.stream.qqmusic.qq.com/C40012345.m4a?guid=0&vkey=&uin=0&fromtag=120032",
            "br": 320000
        }]})
    );
}

#[tokio::test]
async fn test_url_falls_back_when_upstream_has_none() {
    let app = working_app().await;
    let (status, body) = get_json(app, "/api/music/url?id=nourl").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"][0]["url"],
        "https://ws.stream.qqmusic.qq.com/C400nourl.m4a?guid=0&vkey=&uin=0&fromtag=120032"
    );
    assert_eq!(body["data"][0]["id"], 0);
}

#[tokio::test]
async fn test_url_repeated_id_uses_first() {
    let app = working_app().await;
    let (status, body) = get_json(app, "/api/music/url?id=12345&id=2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], 12345);
    assert_eq!(body["data"][0]["url"], "https://cdn.test/12345.m4a");
}

#[tokio::test]
async fn test_url_requires_id() {
    let app = working_app().await;
    let (status, body) = get_json(app, "/api/music/url").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");
}

// =============================================================================
// Lyrics
// =============================================================================

#[tokio::test]
async fn test_lyric_found() {
    let app = working_app().await;
    let (status, body) = get_json(app, "/api/music/lyric?id=0039MnYb0qxYhV").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"lrc": {"lyric": "[00:00.00]晴天"}}));
}

#[tokio::test]
async fn test_lyric_missing_is_empty() {
    let app = working_app().await;
    let (status, body) = get_json(app, "/api/music/lyric?id=nolrc").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"lrc": {"lyric": ""}}));
}

#[tokio::test]
async fn test_lyric_upstream_down_is_empty() {
    let app = unreachable_app("").await;
    let (status, body) = get_json(app, "/api/music/lyric?id=1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lrc"]["lyric"], "");
}

#[tokio::test]
async fn test_lyric_requires_id() {
    let app = working_app().await;
    let (status, _) = get_json(app, "/api/music/lyric?id=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Netease and meting dialects
// =============================================================================

async fn dialect_app(dialect: &str, path: &str) -> Router {
    let upstream = spawn_upstream().await;
    setup_app("", &[provider_toml(dialect, dialect, &format!("{}{}", upstream, path))])
}

#[tokio::test]
async fn test_netease_search() {
    let app = dialect_app("netease", "/netease").await;
    let (status, body) = get_json(app, "/api/music/search?keyword=%E6%99%B4%E5%A4%A9").await;

    assert_eq!(status, StatusCode::OK);
    let song = &body["result"]["songs"][0];
    assert_eq!(song["id"], "186016");
    assert_eq!(song["name"], "晴天");
    assert_eq!(song["album"]["picUrl"], "https://p1.music.126.net/a.jpg");
    assert_eq!(song["duration"], 269_000);
    assert_eq!(song["fee"], 1);
}

#[tokio::test]
async fn test_netease_url_sends_ids_bitrate_and_referer() {
    let app = dialect_app("netease", "/netease").await;
    let (status, body) = get_json(app, "/api/music/url?id=186016").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"][0]["url"],
        "https://n.test/186016.mp3?ids=[186016]&br=320000&referer=https://music.163.com"
    );
    assert_eq!(body["data"][0]["id"], 186016);
}

#[tokio::test]
async fn test_netease_null_url_falls_back() {
    let app = dialect_app("netease", "/netease").await;
    let (status, body) = get_json(app, "/api/music/url?id=nourl").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"][0]["url"],
        "https://ws.stream.qqmusic.qq.com/C400nourl.m4a?guid=0&vkey=&uin=0&fromtag=120032"
    );
}

#[tokio::test]
async fn test_netease_lyric_sends_versions() {
    let app = dialect_app("netease", "/netease").await;

    let (status, body) = get_json(app.clone(), "/api/music/lyric?id=186016").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lrc"]["lyric"], "[00:00.00]186016 lv=-1 tv=-1");

    let (status, body) = get_json(app, "/api/music/lyric?id=nolrc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"lrc": {"lyric": ""}}));
}

#[tokio::test]
async fn test_meting_search_skips_records_without_id() {
    let app = dialect_app("meting", "/meting").await;
    let (status, body) = get_json(app, "/api/music/search?keyword=abc").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["songCount"], 1);
    let song = &body["result"]["songs"][0];
    // The mock echoes the keyword as name and the server as artist
    assert_eq!(song["name"], "abc");
    assert_eq!(song["artists"][0]["name"], "netease");
    assert_eq!(song["duration"], 269_000);
}

#[tokio::test]
async fn test_meting_url_uses_server_and_type() {
    let upstream = spawn_upstream().await;
    let provider = format!(
        "{}server = \"tencent\"\n",
        provider_toml("meting", "meting", &format!("{}/meting", upstream))
    );
    let app = setup_app("", &[provider]);

    let (status, body) = get_json(app.clone(), "/api/music/url?id=42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["url"], "https://m.test/tencent/42.mp3");

    let (status, body) = get_json(app, "/api/music/url?id=nourl").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"][0]["url"],
        "https://ws.stream.qqmusic.qq.com/C400nourl.m4a?guid=0&vkey=&uin=0&fromtag=120032"
    );
}

#[tokio::test]
async fn test_meting_lyric() {
    let app = dialect_app("meting", "/meting").await;

    let (status, body) = get_json(app.clone(), "/api/music/lyric?id=42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lrc"]["lyric"], "[00:00.00]netease 42");

    let (status, body) = get_json(app, "/api/music/lyric?id=nolrc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"lrc": {"lyric": ""}}));
}

// =============================================================================
// Strict failure policy
// =============================================================================

#[tokio::test]
async fn test_strict_policy_reports_upstream_failure() {
    let app = unreachable_app("failure_policy = \"strict\"").await;

    let (status, body) = get_json(app.clone(), "/api/music/search?keyword=x").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPSTREAM_UNAVAILABLE");

    let (status, body) = get_json(app.clone(), "/api/music/url?id=12345").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "NO_PLAYABLE_SOURCE");

    let (status, _) = get_json(app, "/api/music/lyric?id=12345").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

// =============================================================================
// CORS, health, fallback
// =============================================================================

#[tokio::test]
async fn test_bare_options_is_empty_204() {
    let app = working_app().await;
    let response = app
        .oneshot(test_request("OPTIONS", "/api/music/search"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, OPTIONS");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_browser_preflight_allowed() {
    let app = working_app().await;
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/music/url")
        .header(header::ORIGIN, "https://player.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = working_app().await;
    let (status, body) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "tunegate-music");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_unknown_path_answers_status() {
    let app = working_app().await;
    let (status, body) = get_json(app, "/no/such/path").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["service"].is_string());
}

#[tokio::test]
async fn test_buildinfo_endpoint() {
    let app = working_app().await;
    let (status, body) = get_json(app, "/api/buildinfo").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["git_hash"].is_string());
    assert!(body["build_profile"].is_string());
}

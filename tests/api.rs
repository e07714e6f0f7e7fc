use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::Duration;
use tickr_lib::assets::AssetPaths;
use tickr_lib::models::ChangeEvent;
use tickr_lib::routes::{router, AppState};
use tickr_lib::service::TickrCore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

struct TestApp {
    _dir: tempfile::TempDir,
    router: Router,
    core: TickrCore,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let core = TickrCore::open(&dir.path().join("tickr.db"), 16).expect("core");
        let assets = AssetPaths {
            static_dir: dir.path().join("static"),
            templates_dir: dir.path().join("templates"),
        };
        let router = router(AppState::new(core.clone(), assets));
        Self {
            _dir: dir,
            router,
            core,
        }
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    async fn history_actions(&self, list_id: i64) -> Vec<String> {
        let (status, history) = self.send("GET", &format!("/api/lists/{}/history", list_id), None).await;
        assert_eq!(status, StatusCode::OK);
        history
            .as_array()
            .expect("history array")
            .iter()
            .map(|entry| entry["action"].as_str().expect("action").to_string())
            .collect()
    }
}

#[tokio::test]
async fn list_item_lifecycle_end_to_end() {
    let app = TestApp::new();

    let (status, created) = app.send("POST", "/api/lists", Some(json!({ "name": "Groceries" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["name"], "Groceries");
    assert_eq!(created["icon"], "list");
    let list_id = created["id"].as_i64().expect("list id");

    let (_, lists) = app.send("GET", "/api/lists", None).await;
    let groceries = lists
        .as_array()
        .expect("lists")
        .iter()
        .find(|list| list["id"] == list_id)
        .expect("groceries listed")
        .clone();
    assert_eq!(groceries["total_items"], 0);
    assert_eq!(groceries["completed_items"], 0);
    assert_eq!(groceries["item_sort"], "alphabetical");

    let (status, item) = app
        .send("POST", &format!("/api/lists/{}/items", list_id), Some(json!({ "text": "Milk" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["completed"], false);
    assert_eq!(item["list_id"], list_id);
    let item_id = item["id"].as_i64().expect("item id");

    let (status, body) = app
        .send("PUT", &format!("/api/items/{}", item_id), Some(json!({ "completed": true })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
    assert_eq!(
        app.history_actions(list_id).await,
        vec!["item_completed", "item_created", "list_created"]
    );

    let (_, open_items) = app.send("GET", &format!("/api/lists/{}/items", list_id), None).await;
    assert_eq!(open_items, json!([]));
    let (_, all_items) = app
        .send("GET", &format!("/api/lists/{}/items?include_completed=true", list_id), None)
        .await;
    assert_eq!(all_items[0]["completed"], true);
    assert!(all_items[0]["completed_at"].is_string());

    let (status, _) = app.send("DELETE", &format!("/api/lists/{}", list_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, history) = app.send("GET", &format!("/api/lists/{}/history", list_id), None).await;
    assert_eq!(history, json!([]));

    let remaining: i64 = app
        .core
        .database()
        .with_connection(|conn| {
            Ok(conn.query_row(
                "SELECT (SELECT COUNT(1) FROM items WHERE list_id = ?1) + (SELECT COUNT(1) FROM history WHERE list_id = ?1)",
                [list_id],
                |row| row.get(0),
            )?)
        })
        .expect("count");
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn undo_requests_are_tagged_in_history() {
    let app = TestApp::new();
    let (_, list) = app.send("POST", "/api/lists", Some(json!({ "name": "Undo", "icon": "star" }))).await;
    let list_id = list["id"].as_i64().expect("list id");

    let (_, item) = app
        .send(
            "POST",
            &format!("/api/lists/{}/items", list_id),
            Some(json!({ "text": "Milk", "undo": true })),
        )
        .await;
    let item_id = item["id"].as_i64().expect("item id");

    app.send(
        "PUT",
        &format!("/api/items/{}", item_id),
        Some(json!({ "text": "Oat milk", "undo": true })),
    )
    .await;
    app.send(
        "PUT",
        &format!("/api/items/{}", item_id),
        Some(json!({ "completed": true, "undo": true })),
    )
    .await;
    app.send(
        "PUT",
        &format!("/api/items/{}", item_id),
        Some(json!({ "completed": false, "undo": true })),
    )
    .await;
    let (status, _) = app.send("DELETE", &format!("/api/items/{}?undo=true", item_id), None).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        app.history_actions(list_id).await,
        vec![
            "undo_created",
            "undo_completed",
            "undo_uncompleted",
            "undo_edited",
            "undo_deleted",
            "list_created",
        ]
    );

    let (_, history) = app.send("GET", &format!("/api/lists/{}/history", list_id), None).await;
    let edited = history
        .as_array()
        .expect("history")
        .iter()
        .find(|entry| entry["action"] == "undo_edited")
        .expect("edit entry");
    assert_eq!(edited["item_text"], "Milk → Oat milk");
    assert_eq!(edited["item_current_text"], Value::Null);
    assert_eq!(edited["item_id"], item_id);
}

#[tokio::test]
async fn validation_and_missing_items_report_detail() {
    let app = TestApp::new();
    let (_, list) = app.send("POST", "/api/lists", Some(json!({ "name": "Errors" }))).await;
    let list_id = list["id"].as_i64().expect("list id");

    let (status, body) = app
        .send("PUT", &format!("/api/lists/{}", list_id), Some(json!({ "item_sort": "custom" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        "Invalid sort option. Valid options: alphabetical, alphabetical_desc, created_desc, created_asc"
    );

    let (status, body) = app.send("PUT", "/api/settings", Some(json!({ "list_sort": "shuffle" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        "Invalid list sort option. Valid: alphabetical, alphabetical_desc, created_desc, created_asc, custom"
    );

    let (status, body) = app.send("PUT", "/api/items/9999", Some(json!({ "text": "ghost" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Item not found");

    let (status, body) = app.send("DELETE", "/api/items/9999", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    assert_eq!(app.history_actions(list_id).await, vec!["list_created"]);
}

#[tokio::test]
async fn settings_drive_list_order() {
    let app = TestApp::new();
    let (_, settings) = app.send("GET", "/api/settings", None).await;
    assert_eq!(settings, json!({ "list_sort": "alphabetical" }));

    let mut ids = Vec::new();
    for name in ["beta", "Alpha"] {
        let (_, list) = app.send("POST", "/api/lists", Some(json!({ "name": name }))).await;
        ids.push(list["id"].as_i64().expect("id"));
    }

    let names = |lists: &Value| -> Vec<String> {
        lists
            .as_array()
            .expect("lists")
            .iter()
            .map(|list| list["name"].as_str().expect("name").to_string())
            .collect()
    };

    let (_, lists) = app.send("GET", "/api/lists", None).await;
    assert_eq!(names(&lists), vec!["Alpha", "beta", "Todos"]);

    let mut events = app.core.subscribe();
    let (status, _) = app.send("PUT", "/api/settings", Some(json!({ "list_sort": "custom" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(events.try_recv(), None);
    let (status, _) = app
        .send("POST", "/api/lists/reorder", Some(json!({ "list_ids": [ids[1], ids[0]] })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(events.try_recv(), Some(ChangeEvent::lists_changed(None)));
    assert_eq!(events.try_recv(), None);

    let (_, lists) = app.send("GET", "/api/lists", None).await;
    assert_eq!(names(&lists), vec!["Todos", "Alpha", "beta"]);
}

#[tokio::test]
async fn item_listing_follows_list_sort() {
    let app = TestApp::new();
    let (_, list) = app.send("POST", "/api/lists", Some(json!({ "name": "Shop" }))).await;
    let list_id = list["id"].as_i64().expect("list id");
    for text in ["banana", "Cherry", "apple"] {
        app.send("POST", &format!("/api/lists/{}/items", list_id), Some(json!({ "text": text })))
            .await;
    }

    let texts = |items: &Value| -> Vec<String> {
        items
            .as_array()
            .expect("items")
            .iter()
            .map(|item| item["text"].as_str().expect("text").to_string())
            .collect()
    };

    let (_, items) = app.send("GET", &format!("/api/lists/{}/items", list_id), None).await;
    assert_eq!(texts(&items), vec!["apple", "banana", "Cherry"]);

    app.send(
        "PUT",
        &format!("/api/lists/{}", list_id),
        Some(json!({ "item_sort": "created_desc" })),
    )
    .await;
    let (_, items) = app.send("GET", &format!("/api/lists/{}/items", list_id), None).await;
    assert_eq!(texts(&items), vec!["apple", "Cherry", "banana"]);
}

#[tokio::test]
async fn event_stream_pushes_changes_and_unsubscribes_on_disconnect() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/api/events")
        .body(Body::empty())
        .expect("request");
    let response = app.router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .expect("content type")
        .starts_with("text/event-stream"));
    assert_eq!(response.headers()["x-accel-buffering"], "no");
    assert_eq!(app.core.broadcaster().subscriber_count(), 1);

    let mut body = response.into_body();
    let (_, list) = app.send("POST", "/api/lists", Some(json!({ "name": "Live" }))).await;
    let list_id = list["id"].as_i64().expect("list id");
    app.send("POST", &format!("/api/lists/{}/items", list_id), Some(json!({ "text": "Ping" })))
        .await;

    let mut received = String::new();
    let expected = format!(
        "data: {{\"type\":\"lists_changed\",\"list_id\":null}}\n\ndata: {{\"type\":\"items_changed\",\"list_id\":{}}}\n\n",
        list_id
    );
    while received.len() < expected.len() {
        let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
            .await
            .expect("frame before timeout")
            .expect("stream still open")
            .expect("frame");
        if let Ok(data) = frame.into_data() {
            received.push_str(std::str::from_utf8(&data).expect("utf8"));
        }
    }
    assert_eq!(received, expected);

    drop(body);
    assert_eq!(app.core.broadcaster().subscriber_count(), 0);
}

#[tokio::test]
async fn static_routes_serve_files_with_cache_headers() {
    let app = TestApp::new();
    let root = app.core.database().path().parent().expect("temp root").to_path_buf();
    std::fs::create_dir_all(root.join("templates")).expect("templates");
    std::fs::create_dir_all(root.join("static")).expect("static");
    std::fs::write(root.join("templates").join("index.html"), "<h1>tickr</h1>").expect("index");
    std::fs::write(root.join("static").join("app.js"), "console.log('hi');").expect("js");

    let request = Request::builder().uri("/").body(Body::empty()).expect("request");
    let response = app.router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "no-cache, no-store, must-revalidate");
    assert_eq!(response.headers()["expires"], "0");

    let request = Request::builder().uri("/static/app.js").body(Body::empty()).expect("request");
    let response = app.router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    assert_eq!(&bytes[..], b"console.log('hi');");

    let (status, body) = app.send("GET", "/manifest.json", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Not Found");
}

#[tokio::test]
async fn shutdown_completes_while_an_event_stream_is_open() {
    let dir = tempfile::tempdir().expect("tempdir");
    let core = TickrCore::open(&dir.path().join("tickr.db"), 16).expect("core");
    let assets = AssetPaths {
        static_dir: dir.path().join("static"),
        templates_dir: dir.path().join("templates"),
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(tickr_lib::serve(listener, core.clone(), assets, async move {
        let _ = stopped.await;
    }));

    let mut client = tokio::net::TcpStream::connect(addr).await.expect("connect");
    client
        .write_all(b"GET /api/events HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
        .await
        .expect("send request");
    tokio::time::timeout(Duration::from_secs(2), async {
        while core.broadcaster().subscriber_count() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("stream subscribed before timeout");

    stop.send(()).expect("signal shutdown");
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server stopped before timeout")
        .expect("server task")
        .expect("serve");
    assert_eq!(core.broadcaster().subscriber_count(), 0);

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), client.read_to_end(&mut response))
        .await
        .expect("connection closed before timeout")
        .expect("read response");
    assert!(String::from_utf8_lossy(&response).starts_with("HTTP/1.1 200 OK"));
}

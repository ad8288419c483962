//! Integration tests for the production desk backend.

use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::{Config, LogFormat};
use crate::db::{init_database, Repository};
use crate::events::EventBus;
use crate::search::SearchIndex;
use crate::{create_router, AppState};

const TEST_PSK: &str = "test-api-key";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some(TEST_PSK.to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base_url = spawn_server(&temp_dir, psk.clone()).await;

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .put(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.delete(self.url(path)).send().await.unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn create_member(&self, name: &str, role: &str, user_id: Option<&str>) -> String {
        let (status, body) = self
            .post(
                "/api/members",
                json!({ "name": name, "role": role, "userId": user_id }),
            )
            .await;
        assert_eq!(status, 200);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn create_activation(&self, name: &str) -> String {
        let (status, body) = self
            .post(
                "/api/activations",
                json!({
                    "sponsorId": "sponsor-energy",
                    "name": name,
                    "scheduledDate": "2024-06-01T15:00:00Z",
                    "location": "Main stage"
                }),
            )
            .await;
        assert_eq!(status, 200);
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

/// Start the router on an ephemeral port and return its base URL.
async fn spawn_server(temp_dir: &TempDir, psk: Option<String>) -> String {
    let db_path = temp_dir.path().join("test.sqlite");
    let index_path = temp_dir.path().join("index");

    let pool = init_database(&db_path).await.expect("Failed to init DB");
    let repo = Arc::new(Repository::new(pool));
    let search = Arc::new(SearchIndex::open(&index_path).expect("Failed to init search"));

    let config = Config {
        api_psk: psk,
        db_path,
        index_path,
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: "warn".to_string(),
        log_format: LogFormat::Pretty,
        evidence_suggest_threshold: 3,
        notification_capacity: 50,
    };

    let events = EventBus::new(config.notification_capacity);
    let app = create_router(AppState::new(repo, search, config, events));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Wait for server to start
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_psk() {
    let fixture = TestFixture::new().await;

    // Request without API key
    let resp = Client::new()
        .get(fixture.url("/api/revision"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_invalid_psk() {
    let fixture = TestFixture::new().await;

    let resp = Client::new()
        .get(fixture.url("/api/revision"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_auth_bearer_token() {
    let fixture = TestFixture::new().await;

    let resp = Client::new()
        .get(fixture.url("/api/revision"))
        .bearer_auth(TEST_PSK)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_open_access_without_psk() {
    let fixture = TestFixture::with_psk(None).await;

    let (status, body) = fixture.get("/api/members").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_revision() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get("/api/revision").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert!(body["data"]["revisionId"].is_number());
    assert!(body["data"]["generatedAt"].is_string());
}

#[tokio::test]
async fn test_member_crud() {
    let fixture = TestFixture::new().await;

    let (status, created) = fixture
        .post(
            "/api/members",
            json!({ "name": "Ana Camera", "role": "camera", "skills": "steadicam" }),
        )
        .await;
    assert_eq!(status, 200);
    let member_id = created["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["version"], 1);
    let revision_after_create = created["revisionId"].as_i64().unwrap();

    let (status, updated) = fixture
        .put(
            &format!("/api/members/{}", member_id),
            json!({ "role": "director", "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(updated["data"]["role"], "director");
    assert_eq!(updated["data"]["version"], 2);
    assert!(updated["revisionId"].as_i64().unwrap() > revision_after_create);

    // Stale version
    let (status, stale) = fixture
        .put(
            &format!("/api/members/{}", member_id),
            json!({ "name": "Ana", "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(stale["error"]["code"], "VERSION_MISMATCH");
    assert_eq!(stale["error"]["details"]["currentVersion"], 2);

    let (status, listed) = fixture.get("/api/members?role=director").await;
    assert_eq!(status, 200);
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);

    let (status, _) = fixture.delete(&format!("/api/members/{}", member_id)).await;
    assert_eq!(status, 200);

    let (status, missing) = fixture.get(&format!("/api/members/{}", member_id)).await;
    assert_eq!(status, 404);
    assert_eq!(missing["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_member_validation() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post("/api/members", json!({ "name": "  ", "role": "camera" }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_assignment_conflict_is_rejected() {
    let fixture = TestFixture::new().await;
    let member_id = fixture.create_member("Bruno", "camera", None).await;

    let (status, first) = fixture
        .post(
            "/api/assignments",
            json!({
                "memberId": member_id,
                "activityId": "opening",
                "startTime": "2024-06-01T10:00:00Z",
                "endTime": "2024-06-01T12:00:00Z"
            }),
        )
        .await;
    assert_eq!(status, 200);
    let first_id = first["data"]["id"].as_str().unwrap().to_string();
    let revision_after_first = first["revisionId"].as_i64().unwrap();

    // Starting exactly when the first booking ends still collides
    let (status, conflict) = fixture
        .post(
            "/api/assignments",
            json!({
                "memberId": member_id,
                "activityId": "interviews",
                "startTime": "2024-06-01T12:00:00Z",
                "endTime": "2024-06-01T14:00:00Z"
            }),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(conflict["success"], false);
    assert_eq!(conflict["error"]["code"], "SCHEDULE_CONFLICT");
    let conflicts = conflict["error"]["details"]["conflicts"].as_array().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["id"], first_id.as_str());
    assert_eq!(conflict["revisionId"].as_i64().unwrap(), revision_after_first);

    let (status, listed) = fixture
        .get(&format!("/api/assignments?memberId={}", member_id))
        .await;
    assert_eq!(status, 200);
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);

    let (status, later) = fixture
        .post(
            "/api/assignments",
            json!({
                "memberId": member_id,
                "activityId": "closing",
                "startTime": "2024-06-01T15:00:00Z",
                "endTime": "2024-06-01T17:00:00Z"
            }),
        )
        .await;
    assert_eq!(status, 200);

    // Moving the later booking onto the first one is refused as well
    let later_id = later["data"]["id"].as_str().unwrap();
    let (status, body) = fixture
        .put(
            &format!("/api/assignments/{}", later_id),
            json!({ "startTime": "2024-06-01T11:00:00Z" }),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "SCHEDULE_CONFLICT");
}

#[tokio::test]
async fn test_assignment_for_unknown_member() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post(
            "/api/assignments",
            json!({
                "memberId": "ghost",
                "activityId": "opening",
                "startTime": "2024-06-01T10:00:00Z",
                "endTime": "2024-06-01T12:00:00Z"
            }),
        )
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_assignment_inverted_window() {
    let fixture = TestFixture::new().await;
    let member_id = fixture.create_member("Caio", "sound", None).await;

    let (status, body) = fixture
        .post(
            "/api/assignments",
            json!({
                "memberId": member_id,
                "activityId": "opening",
                "startTime": "2024-06-01T12:00:00Z",
                "endTime": "2024-06-01T10:00:00Z"
            }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_conflict_check_schedule_and_availability() {
    let fixture = TestFixture::new().await;
    let busy = fixture.create_member("Dora", "camera", None).await;
    let free = fixture.create_member("Enzo", "camera", None).await;

    let (status, _) = fixture
        .post(
            "/api/assignments",
            json!({
                "memberId": busy,
                "activityId": "keynote",
                "startTime": "2024-06-01T09:00:00Z",
                "endTime": "2024-06-01T11:00:00Z"
            }),
        )
        .await;
    assert_eq!(status, 200);
    let revision_before = fixture.get("/api/revision").await.1["data"]["revisionId"]
        .as_i64()
        .unwrap();

    let (status, check) = fixture
        .post(
            "/api/assignments/check",
            json!({
                "memberId": busy,
                "startTime": "2024-06-01T10:30:00Z",
                "endTime": "2024-06-01T12:00:00Z"
            }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(check["data"].as_array().unwrap().len(), 1);
    // Dry run writes nothing
    assert_eq!(check["revisionId"].as_i64().unwrap(), revision_before);

    let (status, available) = fixture
        .get("/api/members/available?from=2024-06-01T10:00:00Z&to=2024-06-01T10:30:00Z&role=camera")
        .await;
    assert_eq!(status, 200);
    let ids: Vec<&str> = available["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![free.as_str()]);

    let (status, schedule) = fixture
        .get(&format!(
            "/api/assignments/schedule?from=2024-06-01T00:00:00Z&to=2024-06-01T23:59:59Z&memberIds={},{}",
            busy, free
        ))
        .await;
    assert_eq!(status, 200);
    let schedule = schedule["data"].as_array().unwrap();
    assert_eq!(schedule.len(), 2);
    let busy_entry = schedule
        .iter()
        .find(|entry| entry["memberId"] == busy.as_str())
        .unwrap();
    assert_eq!(busy_entry["assignments"].as_array().unwrap().len(), 1);

    let (status, audit) = fixture.get("/api/assignments/audit").await;
    assert_eq!(status, 200);
    assert!(audit["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_delivery_board_flow() {
    let fixture = TestFixture::new().await;
    let editor = fixture
        .create_member("Flora", "editor", Some("user-flora"))
        .await;

    let (status, created) = fixture
        .post(
            "/api/deliveries",
            json!({
                "title": "Sponsor highlight reel",
                "deadline": "2030-01-01T18:00:00Z",
                "formatSpecs": "1080x1920 vertical",
                "responsibleId": editor,
                "priority": 4,
                "createdBy": "user-producer"
            }),
        )
        .await;
    assert_eq!(status, 200);
    let delivery_id = created["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["status"], "pending");
    assert_eq!(created["data"]["progress"], 0.0);
    assert_eq!(created["data"]["column"], "pending");
    assert_eq!(created["data"]["isOverdue"], false);
    assert!(created["data"]["daysRemaining"].as_f64().unwrap() > 0.0);

    let (status, moved) = fixture
        .post(
            &format!("/api/deliveries/{}/move", delivery_id),
            json!({ "column": "in_review", "actorId": "user-flora" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(moved["data"]["changed"], true);
    assert_eq!(moved["data"]["delivery"]["status"], "review");
    assert_eq!(moved["data"]["delivery"]["column"], "in_review");
    assert_eq!(moved["data"]["delivery"]["progress"], 0.7);
    assert_eq!(
        moved["data"]["comment"]["text"],
        "Status changed from 'Pending' to 'In Review'"
    );
    assert_eq!(moved["data"]["comment"]["isSystem"], true);
    // The actor is not notified about their own move
    assert_eq!(
        moved["data"]["notification"]["recipients"],
        json!(["user-producer"])
    );

    let (status, pending) = fixture.get("/api/deliveries/pending-approvals").await;
    assert_eq!(status, 200);
    assert_eq!(pending["data"].as_array().unwrap().len(), 1);

    // Same column again changes nothing
    let (status, unchanged) = fixture
        .post(
            &format!("/api/deliveries/{}/move", delivery_id),
            json!({ "column": "in_review", "actorId": "user-flora" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(unchanged["data"]["changed"], false);
    assert!(unchanged["data"].get("comment").is_none());

    let (status, published) = fixture
        .post(
            &format!("/api/deliveries/{}/move", delivery_id),
            json!({ "column": "published", "actorId": "user-producer" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(published["data"]["delivery"]["progress"], 1.0);
    assert!(published["data"]["delivery"]["publishedAt"].is_string());

    // The stamp read back is the one the move returned
    let (status, fetched) = fixture
        .get(&format!("/api/deliveries/{}", delivery_id))
        .await;
    assert_eq!(status, 200);
    assert_eq!(
        fetched["data"]["publishedAt"],
        published["data"]["delivery"]["publishedAt"]
    );
    assert_eq!(
        fetched["data"]["updatedAt"],
        published["data"]["delivery"]["updatedAt"]
    );

    let (status, refused) = fixture
        .post(
            &format!("/api/deliveries/{}/move", delivery_id),
            json!({ "column": "pending", "actorId": "user-producer" }),
        )
        .await;
    assert_eq!(status, 422);
    assert_eq!(refused["error"]["code"], "TRANSITION_REFUSED");

    let (status, comments) = fixture
        .get(&format!("/api/deliveries/{}/comments", delivery_id))
        .await;
    assert_eq!(status, 200);
    let comments = comments["data"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(
        comments[1]["text"],
        "Status changed from 'In Review' to 'Published'"
    );

    let (status, stats) = fixture.get("/api/deliveries/stats").await;
    assert_eq!(status, 200);
    assert_eq!(stats["data"]["total"], 1);
    assert_eq!(stats["data"]["completionRate"], 100.0);
}

#[tokio::test]
async fn test_delivery_move_validation() {
    let fixture = TestFixture::new().await;

    let (status, created) = fixture
        .post(
            "/api/deliveries",
            json!({ "title": "Recap", "deadline": "2030-01-01T18:00:00Z" }),
        )
        .await;
    assert_eq!(status, 200);
    let delivery_id = created["data"]["id"].as_str().unwrap();

    let (status, body) = fixture
        .post(
            &format!("/api/deliveries/{}/move", delivery_id),
            json!({ "column": "archived", "actorId": "user-1" }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = fixture
        .post(
            "/api/deliveries/missing/move",
            json!({ "column": "approved", "actorId": "user-1" }),
        )
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = fixture
        .post(
            "/api/deliveries",
            json!({ "title": "Bad", "deadline": "2030-01-01T18:00:00Z", "priority": 9 }),
        )
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_late_and_upcoming_deliveries() {
    let fixture = TestFixture::new().await;

    for (title, deadline) in [
        ("Overdue teaser", "2020-01-01T00:00:00Z"),
        ("Far future recap", "2099-01-01T00:00:00Z"),
    ] {
        let (status, _) = fixture
            .post(
                "/api/deliveries",
                json!({ "title": title, "deadline": deadline }),
            )
            .await;
        assert_eq!(status, 200);
    }

    let (status, late) = fixture.get("/api/deliveries/late").await;
    assert_eq!(status, 200);
    let late = late["data"].as_array().unwrap();
    assert_eq!(late.len(), 1);
    assert_eq!(late[0]["title"], "Overdue teaser");
    assert_eq!(late[0]["isOverdue"], true);
    assert!(late[0]["daysRemaining"].as_f64().unwrap() < 0.0);
    let late_id = late[0]["id"].as_str().unwrap().to_string();

    // A rejected delivery is no longer overdue
    let (status, rejected) = fixture
        .post(
            &format!("/api/deliveries/{}/move", late_id),
            json!({ "column": "rejected", "actorId": "user-producer" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(rejected["data"]["delivery"]["isOverdue"], false);
    let (_, late) = fixture.get("/api/deliveries/late").await;
    assert!(late["data"].as_array().unwrap().is_empty());
    let (_, stats) = fixture.get("/api/deliveries/stats").await;
    assert_eq!(stats["data"]["late"], 0);

    let (status, upcoming) = fixture.get("/api/deliveries/upcoming?days=7").await;
    assert_eq!(status, 200);
    assert!(upcoming["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_evidence_drives_activation() {
    let fixture = TestFixture::new().await;
    let activation_id = fixture.create_activation("Energy drink sampling").await;

    let (status, first) = fixture
        .post(
            &format!("/api/activations/{}/evidence", activation_id),
            json!({ "fileReference": "booth_wide.JPG", "uploadedBy": "user-ana" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(first["data"]["evidence"]["kind"], "photo");
    assert_eq!(first["data"]["check"]["autoStarted"], true);
    assert_eq!(first["data"]["check"]["status"], "in_progress");
    assert_eq!(first["data"]["check"]["completionSuggested"], false);

    let (status, second) = fixture
        .post(
            &format!("/api/activations/{}/evidence", activation_id),
            json!({ "fileReference": "crowd.mp4" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(second["data"]["evidence"]["kind"], "video");
    assert_eq!(second["data"]["check"]["autoStarted"], false);
    assert_eq!(second["data"]["check"]["completionSuggested"], false);

    let (status, third) = fixture
        .post(
            &format!("/api/activations/{}/evidence", activation_id),
            json!({ "fileReference": "notes.pdf" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(third["data"]["evidence"]["kind"], "document");
    assert_eq!(third["data"]["check"]["evidenceCount"], 3);
    assert_eq!(third["data"]["check"]["completionSuggested"], true);

    let (status, notifications) = fixture.get("/api/notifications").await;
    assert_eq!(status, 200);
    let items = notifications["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Activation ready for completion");
    assert_eq!(items[0]["level"], "warning");
    assert_eq!(notifications["data"]["unreadCount"], 1);

    // Removing evidence never demotes the activation
    let evidence_id = first["data"]["evidence"]["id"].as_str().unwrap();
    let (status, _) = fixture
        .delete(&format!("/api/evidence/{}", evidence_id))
        .await;
    assert_eq!(status, 200);
    let (_, activation) = fixture
        .get(&format!("/api/activations/{}", activation_id))
        .await;
    assert_eq!(activation["data"]["status"], "in_progress");

    let (status, counts) = fixture
        .get(&format!(
            "/api/activations/evidence-counts?ids={},unknown",
            activation_id
        ))
        .await;
    assert_eq!(status, 200);
    assert_eq!(counts["data"][activation_id.as_str()], 2);
    assert_eq!(counts["data"]["unknown"], 0);
}

#[tokio::test]
async fn test_evidence_for_unknown_activation() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post(
            "/api/activations/missing/evidence",
            json!({ "fileReference": "photo.png" }),
        )
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = fixture.delete("/api/evidence/missing").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_activation_status_and_approval() {
    let fixture = TestFixture::new().await;
    let activation_id = fixture.create_activation("Logo wall").await;

    let (status, filmed) = fixture
        .put(
            &format!("/api/activations/{}/status", activation_id),
            json!({ "status": "completed", "actorId": "user-lead" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(filmed["data"]["status"], "filmed");
    assert!(filmed["data"]["completedAt"].is_string());

    let (status, approved) = fixture
        .put(
            &format!("/api/activations/{}/status", activation_id),
            json!({ "status": "approved", "actorId": "user-lead" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(approved["data"]["approvedBy"], "user-lead");

    let (_, evidence) = fixture
        .post(
            &format!("/api/activations/{}/evidence", activation_id),
            json!({ "fileReference": "wall.png" }),
        )
        .await;
    let evidence_id = evidence["data"]["evidence"]["id"].as_str().unwrap();
    // Evidence on an approved activation leaves the status alone
    assert_eq!(evidence["data"]["check"]["status"], "approved");

    let (status, reviewed) = fixture
        .put(
            &format!("/api/evidence/{}/approval", evidence_id),
            json!({ "approved": true, "actorId": "user-lead" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(reviewed["data"]["approved"], true);
    assert_eq!(reviewed["data"]["approvedBy"], "user-lead");

    let (status, stats) = fixture.get("/api/activations/stats").await;
    assert_eq!(status, 200);
    assert_eq!(stats["data"]["totalActivations"], 1);
    assert_eq!(stats["data"]["totalEvidence"], 1);
    assert_eq!(stats["data"]["completionRate"], 1.0);
}

#[tokio::test]
async fn test_notification_read_flow() {
    let fixture = TestFixture::new().await;
    let activation_id = fixture.create_activation("Photo booth").await;

    for file in ["a.jpg", "b.jpg", "c.jpg", "d.jpg"] {
        let (status, _) = fixture
            .post(
                &format!("/api/activations/{}/evidence", activation_id),
                json!({ "fileReference": file }),
            )
            .await;
        assert_eq!(status, 200);
    }

    let (_, count) = fixture.get("/api/notifications/unread-count").await;
    assert_eq!(count["data"]["unreadCount"], 2);

    let (_, list) = fixture.get("/api/notifications").await;
    let first_id = list["data"]["items"][0]["id"].as_str().unwrap().to_string();

    let (status, read) = fixture
        .post(&format!("/api/notifications/{}/read", first_id), json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(read["data"]["read"], true);

    let (status, marked) = fixture
        .post("/api/notifications/read-all", json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(marked["data"]["marked"], 1);

    let (status, _) = fixture
        .delete(&format!("/api/notifications/{}", first_id))
        .await;
    assert_eq!(status, 200);
    let (status, _) = fixture
        .delete(&format!("/api/notifications/{}", first_id))
        .await;
    assert_eq!(status, 404);

    let (_, list) = fixture.get("/api/notifications").await;
    assert_eq!(list["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(list["data"]["unreadCount"], 0);
}

#[tokio::test]
async fn test_search_deliveries_and_activations() {
    let fixture = TestFixture::new().await;

    let (status, _) = fixture
        .post(
            "/api/deliveries",
            json!({
                "title": "Backstage interview cut",
                "deadline": "2030-01-01T18:00:00Z",
                "formatSpecs": "vertical"
            }),
        )
        .await;
    assert_eq!(status, 200);
    fixture.create_activation("Backstage lounge").await;

    let (status, all) = fixture.get("/api/search?q=backstage").await;
    assert_eq!(status, 200);
    assert_eq!(all["data"]["total"], 2);

    let (status, only) = fixture
        .get("/api/search?q=backstage&kind=activation")
        .await;
    assert_eq!(status, 200);
    let results = only["data"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["kind"], "activation");
    assert_eq!(results[0]["record"]["name"], "Backstage lounge");

    let (status, none) = fixture.get("/api/search?q=").await;
    assert_eq!(status, 200);
    assert_eq!(none["data"]["total"], 0);
}

#[tokio::test]
async fn test_search_offset_out_of_range() {
    let fixture = TestFixture::new().await;
    fixture.create_activation("Backstage lounge").await;

    let (status, body) = fixture
        .get("/api/search?q=backstage&offset=18446744073709551615")
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["total"], 0);
    assert_eq!(body["data"]["offset"], 10_000);

    let (status, body) = fixture.get("/api/search?q=backstage&limit=0").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["total"], 0);

    let (status, body) = fixture.get("/api/search?q=backstage&limit=1000").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["limit"], 100);
}

#[tokio::test]
async fn test_deleted_delivery_leaves_search() {
    let fixture = TestFixture::new().await;

    let (_, created) = fixture
        .post(
            "/api/deliveries",
            json!({ "title": "Drone flyover", "deadline": "2030-01-01T18:00:00Z" }),
        )
        .await;
    let delivery_id = created["data"]["id"].as_str().unwrap();

    let (status, _) = fixture
        .delete(&format!("/api/deliveries/{}", delivery_id))
        .await;
    assert_eq!(status, 200);

    let (_, results) = fixture.get("/api/search?q=drone").await;
    assert_eq!(results["data"]["total"], 0);

    let (status, _) = fixture
        .get(&format!("/api/deliveries/{}", delivery_id))
        .await;
    assert_eq!(status, 404);
}

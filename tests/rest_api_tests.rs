//! End-to-end tests of the REST exposure over the in-memory store
//!
//! Every test builds a fresh server through `ServerBuilder` and drives it with
//! `axum_test::TestServer`.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use invite::config::InviteConfig;
use invite::server::ServerBuilder;
use serde_json::{Value, json};

const API_KEY: &str = "anon-test-key";

fn apikey() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("apikey"),
        HeaderValue::from_static(API_KEY),
    )
}

async fn create_test_server() -> TestServer {
    let mut config = InviteConfig::local(API_KEY);
    config.client.site_url = "https://nikah.example.com".to_string();

    let app = ServerBuilder::new()
        .with_config(config)
        .build()
        .expect("Failed to build app");

    TestServer::new(app).expect("Failed to create test server")
}

async fn create_message(server: &TestServer, body: Value) -> Value {
    let (name, value) = apikey();
    let response = server
        .post("/rest/v1/rsvp_messages")
        .add_header(name, value)
        .json(&body)
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

async fn create_invitation(server: &TestServer, guest_name: &str) -> Value {
    let (name, value) = apikey();
    let response = server
        .post("/rest/v1/guest_invitations")
        .add_header(name, value)
        .json(&json!({ "guest_name": guest_name }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

// =============================================================================
// Health
// =============================================================================

mod health_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_needs_no_key() {
        let server = create_test_server().await;

        for path in ["/health", "/healthz"] {
            let response = server.get(path).await;
            response.assert_status_ok();
            let body: Value = response.json();
            assert_eq!(body["status"], "ok");
            assert_eq!(body["service"], "wedding-invite");
        }
    }
}

// =============================================================================
// API key guard
// =============================================================================

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_401() {
        let server = create_test_server().await;

        let response = server.get("/rest/v1/guest_invitations").await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let body: Value = response.json();
        assert_eq!(body["code"], "UNAUTHORIZED");
        assert!(body["message"].as_str().unwrap().contains("No API key"));
    }

    #[tokio::test]
    async fn test_wrong_key_is_401() {
        let server = create_test_server().await;

        let response = server
            .get("/rest/v1/rsvp_messages")
            .add_header(
                HeaderName::from_static("apikey"),
                HeaderValue::from_static("wrong"),
            )
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let body: Value = response.json();
        assert!(body["message"].as_str().unwrap().contains("Invalid API key"));
    }

    #[tokio::test]
    async fn test_bearer_and_query_key_accepted() {
        let server = create_test_server().await;

        let response = server
            .get("/rest/v1/rsvp_messages")
            .add_header(
                HeaderName::from_static("authorization"),
                HeaderValue::from_str(&format!("Bearer {}", API_KEY)).unwrap(),
            )
            .await;
        response.assert_status_ok();

        let response = server
            .get("/rest/v1/rsvp_messages")
            .add_query_param("apikey", API_KEY)
            .await;
        response.assert_status_ok();
    }
}

// =============================================================================
// guest_invitations
// =============================================================================

mod invitation_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_builds_link_from_site_url() {
        let server = create_test_server().await;

        let body = create_invitation(&server, "  Budi & Keluarga ").await;
        assert_eq!(body["guest_name"], "Budi & Keluarga");
        assert_eq!(
            body["link"],
            "https://nikah.example.com?guest=Budi%20%26%20Keluarga"
        );
        assert!(body["id"].as_i64().unwrap() > 0);
        assert!(body["created_at"].is_string());
    }

    #[tokio::test]
    async fn test_create_with_blank_name_is_400() {
        let server = create_test_server().await;
        let (name, value) = apikey();

        let response = server
            .post("/rest/v1/guest_invitations")
            .add_header(name, value)
            .json(&json!({ "guest_name": "   " }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let server = create_test_server().await;
        let (name, value) = apikey();

        let response = server
            .post("/rest/v1/guest_invitations")
            .add_header(name, value)
            .json(&json!({ "name": "Sari" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(body["code"], "INVALID_BODY");
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_limited() {
        let server = create_test_server().await;
        for guest in ["Ani", "Budi", "Citra"] {
            create_invitation(&server, guest).await;
        }
        let (name, value) = apikey();

        let response = server
            .get("/rest/v1/guest_invitations")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let rows: Vec<Value> = response.json();
        let names: Vec<_> = rows.iter().map(|r| r["guest_name"].clone()).collect();
        assert_eq!(names, vec![json!("Citra"), json!("Budi"), json!("Ani")]);

        let response = server
            .get("/rest/v1/guest_invitations")
            .add_header(name, value)
            .add_query_param("limit", 2)
            .await;
        let rows: Vec<Value> = response.json();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let server = create_test_server().await;
        let created = create_invitation(&server, "Sari").await;
        let id = created["id"].as_i64().unwrap();
        let (name, value) = apikey();

        let response = server
            .delete(&format!("/rest/v1/guest_invitations/{}", id))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        // Deleting again is not an error
        let response = server
            .delete(&format!("/rest/v1/guest_invitations/{}", id))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        let response = server
            .delete("/rest/v1/guest_invitations/not-a-number")
            .add_header(name, value)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_bulk_delete_requires_filter() {
        let server = create_test_server().await;
        create_invitation(&server, "Ani").await;
        create_invitation(&server, "Budi").await;
        let (name, value) = apikey();

        let response = server
            .delete("/rest/v1/guest_invitations")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .delete("/rest/v1/guest_invitations")
            .add_header(name.clone(), value.clone())
            .add_query_param("id", "neq.0")
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["deleted"], 2);

        let response = server
            .get("/rest/v1/guest_invitations")
            .add_header(name, value)
            .await;
        let rows: Vec<Value> = response.json();
        assert!(rows.is_empty());
    }
}

// =============================================================================
// rsvp_messages
// =============================================================================

mod message_tests {
    use super::*;

    #[tokio::test]
    async fn test_guest_count_zeroed_unless_attending() {
        let server = create_test_server().await;

        let body = create_message(
            &server,
            json!({
                "guest_name": "Ani",
                "attendance": "tidak-hadir",
                "guest_count": 4,
                "message": "Mohon maaf tidak bisa hadir"
            }),
        )
        .await;
        assert_eq!(body["guest_count"], 0);
        assert_eq!(body["attendance"], "tidak-hadir");
        assert!(uuid::Uuid::parse_str(body["id"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_unknown_attendance_is_400() {
        let server = create_test_server().await;
        let (name, value) = apikey();

        let response = server
            .post("/rest/v1/rsvp_messages")
            .add_header(name, value)
            .json(&json!({
                "guest_name": "Ani",
                "attendance": "maybe",
                "message": "?"
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_blank_message_is_400() {
        let server = create_test_server().await;
        let (name, value) = apikey();

        let response = server
            .post("/rest/v1/rsvp_messages")
            .add_header(name, value)
            .json(&json!({
                "guest_name": "Ani",
                "attendance": "hadir",
                "guest_count": 1,
                "message": "   "
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(body["details"]["fields"][0]["field"], "message");
    }

    #[tokio::test]
    async fn test_default_limit_is_twenty() {
        let server = create_test_server().await;
        for i in 0..25 {
            create_message(
                &server,
                json!({
                    "guest_name": format!("Tamu {}", i),
                    "attendance": "ragu-ragu",
                    "message": "Insya Allah"
                }),
            )
            .await;
        }
        let (name, value) = apikey();

        let response = server
            .get("/rest/v1/rsvp_messages")
            .add_header(name, value)
            .await;
        let rows: Vec<Value> = response.json();
        assert_eq!(rows.len(), 20);
        assert_eq!(rows[0]["guest_name"], "Tamu 24");
    }

    #[tokio::test]
    async fn test_stats() {
        let server = create_test_server().await;
        for (attendance, guests) in [("hadir", 3), ("tidak-hadir", 0), ("hadir", 2)] {
            create_message(
                &server,
                json!({
                    "guest_name": "Tamu",
                    "attendance": attendance,
                    "guest_count": guests,
                    "message": "Selamat!"
                }),
            )
            .await;
        }
        let (name, value) = apikey();

        let response = server
            .get("/rest/v1/rsvp_messages/stats")
            .add_header(name, value)
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["attending"], 2);
        assert_eq!(body["not_attending"], 1);
        assert_eq!(body["unsure"], 0);
        assert_eq!(body["total_guests"], 5);
    }

    #[tokio::test]
    async fn test_bulk_delete_with_nil_uuid() {
        let server = create_test_server().await;
        create_message(
            &server,
            json!({
                "guest_name": "Ani",
                "attendance": "hadir",
                "guest_count": 2,
                "message": "Barakallah"
            }),
        )
        .await;
        let (name, value) = apikey();

        let response = server
            .delete("/rest/v1/rsvp_messages")
            .add_header(name, value)
            .add_query_param("id", "neq.00000000-0000-0000-0000-000000000000")
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["deleted"], 1);
    }
}

//! End-to-end tests over the HTTP router with an in-memory store

use axum::http::{header, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use sase_forms::infrastructure::persistence::InMemoryFormStore;
use sase_forms::Identity;
use sase_forms_api::middleware::auth::issue_token;
use sase_forms_api::{build_router, AppState, ServerConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

const SECRET: &str = "test-secret";

struct Harness {
    server: TestServer,
    store: Arc<InMemoryFormStore>,
}

fn harness() -> Harness {
    let mut config = ServerConfig::default();
    config.auth.jwt_secret = SECRET.into();
    let store = Arc::new(InMemoryFormStore::new());
    let app = build_router(Arc::new(AppState::new(config, store.clone())));
    Harness { server: TestServer::new(app).unwrap(), store }
}

fn owner(email: &str) -> Identity {
    Identity { user_id: Uuid::new_v4(), email: email.into(), name: Some("Owner".into()) }
}

fn bearer(request: TestRequest, who: &Identity) -> TestRequest {
    let token = issue_token(SECRET, 1, who).unwrap();
    request.add_header(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    )
}

/// Creates a form and returns its id and question ids in order.
async fn create_form(h: &Harness, who: &Identity, body: Value) -> (String, Vec<String>) {
    let created = bearer(h.server.post("/api/forms/create"), who).json(&body).await;
    assert_eq!(created.status_code(), StatusCode::CREATED);
    let id = created.json::<Value>()["id"].as_str().unwrap().to_string();

    let loaded = bearer(h.server.get(&format!("/api/forms/{}", id)), who).await;
    assert_eq!(loaded.status_code(), StatusCode::OK);
    let questions = loaded.json::<Value>()["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["id"].as_str().unwrap().to_string())
        .collect();
    (id, questions)
}

async fn publish(h: &Harness, who: &Identity, form_id: &str) -> String {
    let res = bearer(h.server.post("/api/forms/publish"), who)
        .json(&json!({"formId": form_id, "isPublished": true}))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    res.json::<Value>()["slug"].as_str().unwrap().to_string()
}

fn name_and_color() -> Value {
    json!({
        "title": "Favourite colour",
        "questions": [
            {"type": "short_text", "label": "Name"},
            {"type": "single_choice", "label": "Color", "options": ["Red", "Blue"]}
        ]
    })
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let res = h.server.get("/health").await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_submit_then_export_scenario() {
    let h = harness();
    let alice = owner("alice@example.com");
    let (form_id, questions) = create_form(&h, &alice, name_and_color()).await;
    let slug = publish(&h, &alice, &form_id).await;

    let public = h.server.get(&format!("/api/forms/by-slug/{}", slug)).await;
    assert_eq!(public.status_code(), StatusCode::OK);
    let labels: Vec<String> = public.json::<Value>()["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["label"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(labels, vec!["Name", "Color"]);

    let res = h
        .server
        .post("/api/submit")
        .json(&json!({
            "formId": form_id,
            "answers": [
                {"questionId": questions[0], "value": "Ann"},
                {"questionId": questions[1], "value": "Red"}
            ]
        }))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.json::<Value>()["ok"], true);

    let listing = bearer(h.server.get("/api/forms"), &alice).await.json::<Value>();
    assert_eq!(listing["response_counts"][&form_id], 1);

    let export = bearer(h.server.get(&format!("/api/forms/{}/export", form_id)), &alice).await;
    assert_eq!(export.status_code(), StatusCode::OK);
    assert_eq!(export.header(header::CONTENT_TYPE), "text/csv; charset=utf-8");
    let disposition = export.header(header::CONTENT_DISPOSITION);
    assert!(disposition.to_str().unwrap().starts_with("attachment; filename=\"Favourite_colour_responses_"));

    let csv = export.text();
    let lines: Vec<&str> = csv.split('\n').collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "Submitted at,Name,Color");
    assert!(lines[1].ends_with(",Ann,Red"), "row was {}", lines[1]);
}

#[tokio::test]
async fn test_submit_to_unpublished_form_is_rejected() {
    let h = harness();
    let alice = owner("alice@example.com");
    let (form_id, questions) = create_form(&h, &alice, name_and_color()).await;

    let res = h
        .server
        .post("/api/submit")
        .json(&json!({
            "formId": form_id,
            "answers": [{"questionId": questions[0], "value": "Ann"}]
        }))
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>()["error"], "Form unavailable");
    assert_eq!(h.store.response_count(), 0);
}

#[tokio::test]
async fn test_owner_endpoints_require_owner() {
    let h = harness();
    let alice = owner("alice@example.com");
    let mallory = owner("mallory@example.com");
    let (form_id, _) = create_form(&h, &alice, json!({})).await;

    assert_eq!(h.server.get("/api/forms").expect_failure().await.status_code(), StatusCode::UNAUTHORIZED);

    let bad_token = h
        .server
        .get("/api/forms")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer not-a-token"))
        .expect_failure();
    assert_eq!(bad_token.await.status_code(), StatusCode::UNAUTHORIZED);

    for path in [
        format!("/api/forms/{}", form_id),
        format!("/api/forms/{}/responses", form_id),
        format!("/api/forms/{}/export", form_id),
    ] {
        let res = bearer(h.server.get(&path), &mallory).expect_failure().await;
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN, "{}", path);
    }

    let res = bearer(h.server.post("/api/forms/publish"), &mallory)
        .json(&json!({"formId": form_id, "isPublished": true}))
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);

    let res = bearer(h.server.get(&format!("/api/forms/{}", Uuid::new_v4())), &alice)
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_publish_twice_keeps_slug_and_unpublish_hides() {
    let h = harness();
    let alice = owner("alice@example.com");
    let (form_id, _) = create_form(&h, &alice, json!({"title": "Poll"})).await;

    let first = publish(&h, &alice, &form_id).await;
    let second = publish(&h, &alice, &form_id).await;
    assert_eq!(first, second);
    assert_eq!(first.len(), 8);

    let res = bearer(h.server.post("/api/forms/publish"), &alice)
        .json(&json!({"formId": form_id, "isPublished": false}))
        .await;
    assert_eq!(res.json::<Value>()["slug"], first.as_str());

    let public = h.server.get(&format!("/api/forms/by-slug/{}", first)).expect_failure().await;
    assert_eq!(public.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_form_encoded_submission_with_checkboxes() {
    let h = harness();
    let alice = owner("alice@example.com");
    let (form_id, questions) = create_form(
        &h,
        &alice,
        json!({
            "questions": [
                {"type": "short_text", "label": "Q1"},
                {"type": "multiple_choice", "label": "Q2", "options": ["X", "Y", "Z"]}
            ]
        }),
    )
    .await;
    publish(&h, &alice, &form_id).await;

    let q1 = format!("q_{}", questions[0]);
    let q2 = format!("q_{}", questions[1]);
    let fields = [
        ("formId", form_id.as_str()),
        (q1.as_str(), "A"),
        (q2.as_str(), "X"),
        (q2.as_str(), "Y"),
    ];
    let res = h.server.post("/api/submit").form(&fields.to_vec()).await;
    assert_eq!(res.status_code(), StatusCode::OK);

    let page = bearer(h.server.get(&format!("/api/forms/{}/responses", form_id)), &alice)
        .await
        .json::<Value>();
    assert_eq!(page["total"], 1);
    let answers = page["responses"][0]["answers"].as_array().unwrap();
    let q2_answer = answers.iter().find(|a| a["question_id"] == questions[1].as_str()).unwrap();
    assert_eq!(q2_answer["value"], json!(["X", "Y"]));

    let csv = bearer(h.server.get(&format!("/api/forms/{}/export", form_id)), &alice).await.text();
    assert!(csv.lines().nth(1).unwrap().ends_with(",A,X; Y"));
}

#[tokio::test]
async fn test_required_and_typed_answers_are_validated() {
    let h = harness();
    let alice = owner("alice@example.com");
    let (form_id, questions) = create_form(
        &h,
        &alice,
        json!({
            "questions": [
                {"type": "short_text", "label": "Name", "is_required": true},
                {"type": "number", "label": "Age"}
            ]
        }),
    )
    .await;
    publish(&h, &alice, &form_id).await;

    let res = h
        .server
        .post("/api/submit")
        .json(&json!({
            "formId": form_id,
            "answers": [{"questionId": questions[1], "value": "old"}]
        }))
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>();
    assert_eq!(body["error"], "Invalid payload");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&format!("q_{}", questions[0]).as_str()));
    assert!(fields.contains(&format!("q_{}", questions[1]).as_str()));
    assert_eq!(h.store.response_count(), 0);

    let res = h.server.post("/api/submit").json(&json!({"formId": "nope"})).expect_failure().await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_authenticated_form_takes_identity_from_session() {
    let h = harness();
    let alice = owner("alice@example.com");
    let (form_id, questions) = create_form(
        &h,
        &alice,
        json!({
            "access_mode": "authenticated",
            "questions": [{"type": "long_text", "label": "Feedback"}]
        }),
    )
    .await;
    publish(&h, &alice, &form_id).await;

    let body = json!({
        "formId": form_id,
        "responder_email": "spoof@example.com",
        "answers": [{"questionId": questions[0], "value": "Great"}]
    });
    let anonymous = h.server.post("/api/submit").json(&body).expect_failure().await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);

    let bob = owner("bob@example.com");
    let res = bearer(h.server.post("/api/submit"), &bob).json(&body).await;
    assert_eq!(res.status_code(), StatusCode::OK);

    let page = bearer(h.server.get(&format!("/api/forms/{}/responses", form_id)), &alice)
        .await
        .json::<Value>();
    assert_eq!(page["responses"][0]["responder_email"], "bob@example.com");
}

#[tokio::test]
async fn test_save_replaces_questions_and_pages_responses() {
    let h = harness();
    let alice = owner("alice@example.com");
    let (form_id, questions) = create_form(&h, &alice, name_and_color()).await;

    let res = bearer(h.server.post(&format!("/api/forms/{}/save", form_id)), &alice)
        .json(&json!({
            "form": {"title": "Renamed"},
            "questions": [
                {"id": questions[1], "type": "single_choice", "label": "Color", "options": ["Red", "Blue"]},
                {"type": "date", "label": "When"}
            ]
        }))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let report = res.json::<Value>();
    assert_eq!(report["questions"]["inserted"], 1);
    assert_eq!(report["questions"]["removed"], 1);

    let loaded = bearer(h.server.get(&format!("/api/forms/{}", form_id)), &alice).await.json::<Value>();
    assert_eq!(loaded["form"]["title"], "Renamed");
    assert_eq!(loaded["questions"][0]["id"], questions[1].as_str());
    assert_eq!(loaded["questions"][1]["index"], 1);

    let res = bearer(h.server.post(&format!("/api/forms/{}/save", form_id)), &alice)
        .json(&json!({"questions": [{"type": "single_choice", "label": "Empty", "options": []}]}))
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);

    let page = bearer(
        h.server.get(&format!("/api/forms/{}/responses?page=0&limit=1000", form_id)),
        &alice,
    )
    .await
    .json::<Value>();
    assert_eq!(page["page"], 1);
    assert_eq!(page["limit"], 100);
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_malformed_form_id_is_json_not_found() {
    let h = harness();
    let alice = owner("alice@example.com");

    for path in ["/api/forms/not-a-uuid", "/api/forms/not-a-uuid/responses", "/api/forms/not-a-uuid/export"] {
        let res = bearer(h.server.get(path), &alice).expect_failure().await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND, "{}", path);
        assert_eq!(res.header(header::CONTENT_TYPE), "application/json", "{}", path);
        assert_eq!(res.json::<Value>()["error"], "Form not found", "{}", path);
    }
}

#[tokio::test]
async fn test_json_content_type_is_case_insensitive() {
    let h = harness();
    let alice = owner("alice@example.com");
    let (form_id, questions) = create_form(&h, &alice, name_and_color()).await;
    publish(&h, &alice, &form_id).await;

    let body = json!({
        "formId": form_id,
        "answers": [{"questionId": questions[0], "value": "Ann"}]
    });
    let res = h
        .server
        .post("/api/submit")
        .text(body.to_string())
        .content_type("Application/JSON; charset=utf-8")
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.json::<Value>()["ok"], true);
}

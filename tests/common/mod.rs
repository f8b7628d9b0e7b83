#![allow(dead_code)]

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use college_api_rust::app::{router, AppState};
use college_api_rust::auth::{generate_jwt, Claims};
use college_api_rust::config::AppConfig;
use college_api_rust::database::Fixture;
use college_api_rust::types::Role;

pub const SECRET: &str = "integration-test-secret";

/// In-process server over a freshly seeded memory store.
///
/// The seeded student is in year 2, so semester 4 is current. `subjects[0]`
/// is a semester-4 subject, the rest are semester 1.
pub struct TestServer {
    pub base_url: String,
    pub student_id: Uuid,
    pub subjects: Vec<Uuid>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(configure: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        let mut config = AppConfig::development();
        config.security.jwt_secret = SECRET.to_string();
        config.api.enable_request_logging = false;
        configure(&mut config);

        let student_id = Uuid::new_v4();
        let subjects: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
        let fixture = Fixture::from_json(&seed(student_id, &subjects).to_string())?;
        let store = fixture.into_store().await?;

        let app = router(AppState::new(std::sync::Arc::new(store), &config), &config);

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            student_id,
            subjects,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token(&self, role: Role, id: Uuid) -> Result<String> {
        Ok(generate_jwt(&Claims::new(id, role, 1), SECRET)?)
    }

    pub fn teacher(&self) -> Result<String> {
        self.token(Role::Teacher, Uuid::new_v4())
    }

    pub fn own_student_token(&self) -> Result<String> {
        self.token(Role::Student, self.student_id)
    }

    pub fn mark_body(&self, subject: usize, internal: f64, external: f64) -> Value {
        json!({
            "studentId": self.student_id,
            "subjectId": self.subjects[subject],
            "internalMarks": internal,
            "externalMarks": external,
            "semester": if subject == 0 { 4 } else { 1 },
            "academicYear": "2024-25"
        })
    }

    pub fn attendance_body(&self, subject: usize, attended: u32, total: u32) -> Value {
        json!({
            "studentId": self.student_id,
            "subjectId": self.subjects[subject],
            "attendedClasses": attended,
            "totalClasses": total,
            "semester": if subject == 0 { 4 } else { 1 },
            "academicYear": "2024-25"
        })
    }

    pub async fn post(&self, token: &str, path: &str, body: &Value) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn put(&self, token: &str, path: &str, body: &Value) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn get(&self, token: &str, path: &str) -> Result<(StatusCode, Value)> {
        let res = self.client.get(self.url(path)).bearer_auth(token).send().await?;
        Ok((res.status(), res.json().await?))
    }
}

fn seed(student_id: Uuid, subjects: &[Uuid]) -> Value {
    let subjects: Vec<Value> = subjects
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let semester = if i == 0 { 4 } else { 1 };
            json!({
                "id": id,
                "name": format!("Subject {}", i),
                "code": format!("CS{}{:02}", semester, i),
                "department": "CSE",
                "semester": semester,
                "year": (semester + 1) / 2
            })
        })
        .collect();

    json!({
        "subjects": subjects,
        "students": [{
            "id": student_id,
            "name": "Meera Iyer",
            "rollNo": "CSE-2023-042",
            "email": "meera@college.test",
            "department": "CSE",
            "year": 2,
            "section": "A",
            "subjects": [subjects[0]["id"], subjects[1]["id"]]
        }]
    })
}

/// Assert the `{"success": true, "data": ...}` envelope and return `data`
pub fn data(body: &Value) -> &Value {
    assert_eq!(body["success"], true, "expected success envelope: {}", body);
    &body["data"]
}

/// Assert the `{"error": true, "code": ...}` envelope
pub fn assert_error(body: &Value, code: &str) {
    assert_eq!(body["error"], true, "expected error envelope: {}", body);
    assert_eq!(body["code"], code, "unexpected error code: {}", body);
}

mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use common::{assert_error, data, TestServer};

#[tokio::test]
async fn create_derives_percentage_and_overall_attendance() -> Result<()> {
    let server = TestServer::spawn().await?;
    let teacher = server.teacher()?;

    let (status, created) = server
        .post(&teacher, "/api/attendance", &server.attendance_body(0, 8, 10))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(data(&created)["percentage"], 80.0);
    assert_eq!(data(&created)["status"], "Present");

    let (status, _) = server
        .post(&teacher, "/api/attendance", &server.attendance_body(1, 2, 10))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    // Pooled over classes: 10 of 20
    let (_, summary) = server
        .get(&teacher, &format!("/api/students/{}/summary", server.student_id))
        .await?;
    let summary = data(&summary);
    assert_eq!(summary["student"]["overallAttendance"], 50.0);
    assert_eq!(summary["allAttendance"].as_array().map(Vec::len), Some(2));
    assert_eq!(summary["currentAttendance"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn zero_classes_is_zero_percent() -> Result<()> {
    let server = TestServer::spawn().await?;
    let teacher = server.teacher()?;

    let (status, created) = server
        .post(&teacher, "/api/attendance", &server.attendance_body(0, 0, 0))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(data(&created)["percentage"], 0.0);
    Ok(())
}

#[tokio::test]
async fn attended_above_total_is_rejected() -> Result<()> {
    let server = TestServer::spawn().await?;
    let teacher = server.teacher()?;

    let (status, body) = server
        .post(&teacher, "/api/attendance", &server.attendance_body(0, 11, 10))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "VALIDATION_ERROR");
    assert!(body["field_errors"]["attendedClasses"].is_string());

    let (_, listed) = server.get(&teacher, "/api/attendance").await?;
    assert_eq!(data(&listed).as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn duplicate_and_forbidden_writes() -> Result<()> {
    let server = TestServer::spawn().await?;
    let teacher = server.teacher()?;

    server.post(&teacher, "/api/attendance", &server.attendance_body(1, 5, 10)).await?;
    let (status, body) = server
        .post(&teacher, "/api/attendance", &server.attendance_body(1, 6, 10))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_error(&body, "CONFLICT");

    let (status, _) = server
        .post(&server.own_student_token()?, "/api/attendance", &server.attendance_body(2, 6, 10))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Rejected on role even when the path id would not parse
    let (status, body) = server
        .put(&server.own_student_token()?, "/api/attendance/not-a-uuid", &json!({ "attendedClasses": 3 }))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error(&body, "FORBIDDEN");

    let (status, _) = server
        .put(&teacher, "/api/attendance/not-a-uuid", &json!({ "attendedClasses": 3 }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn update_recomputes_percentage_and_aggregate() -> Result<()> {
    let server = TestServer::spawn().await?;
    let teacher = server.teacher()?;

    let (_, created) = server
        .post(&teacher, "/api/attendance", &server.attendance_body(0, 5, 10))
        .await?;
    let id = data(&created)["id"].as_str().unwrap_or_default().to_string();

    let (status, updated) = server
        .put(
            &teacher,
            &format!("/api/attendance/{}", id),
            &json!({ "attendedClasses": 15, "totalClasses": 20 }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&updated)["percentage"], 75.0);

    // Merged values are validated, not just the patch
    let (status, _) = server
        .put(&teacher, &format!("/api/attendance/{}", id), &json!({ "totalClasses": 10 }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, summary) = server
        .get(&teacher, &format!("/api/students/{}/summary", server.student_id))
        .await?;
    let summary = data(&summary);
    assert_eq!(summary["student"]["overallAttendance"], 75.0);
    assert_eq!(summary["allAttendance"][0]["attendedClasses"], 15);
    Ok(())
}

mod common;

use anyhow::Result;
use futures::future::join_all;
use reqwest::StatusCode;

use common::{data, TestServer};

async fn post_all_subjects(server: &TestServer) -> Result<Vec<StatusCode>> {
    let teacher = server.teacher()?;
    let requests = (0..server.subjects.len()).map(|i| {
        let body = server.mark_body(i, 40.0, 40.0);
        let teacher = teacher.clone();
        async move { server.post(&teacher, "/api/marks", &body).await }
    });

    join_all(requests)
        .await
        .into_iter()
        .map(|r| r.map(|(status, _)| status))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_writes_for_one_student_all_land() -> Result<()> {
    let server = TestServer::spawn().await?;

    let statuses = post_all_subjects(&server).await?;
    assert!(statuses.iter().all(|s| *s == StatusCode::CREATED), "{:?}", statuses);

    let (_, summary) = server
        .get(&server.teacher()?, &format!("/api/students/{}/summary", server.student_id))
        .await?;
    let summary = data(&summary);
    assert_eq!(
        summary["allMarks"].as_array().map(Vec::len),
        Some(server.subjects.len())
    );
    assert_eq!(summary["student"]["cgpa"], 9.0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unserialized_writes_never_half_commit() -> Result<()> {
    let server = TestServer::spawn_with(|config| config.writes.serialize_per_student = false).await?;

    // Losers get 409; every row that exists must be mirrored on the student
    let statuses = post_all_subjects(&server).await?;
    assert!(
        statuses
            .iter()
            .all(|s| *s == StatusCode::CREATED || *s == StatusCode::CONFLICT),
        "{:?}",
        statuses
    );
    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    assert!(created >= 1);

    let teacher = server.teacher()?;
    let (_, rows) = server.get(&teacher, "/api/marks").await?;
    let (_, summary) = server
        .get(&teacher, &format!("/api/students/{}/summary", server.student_id))
        .await?;
    assert_eq!(data(&rows).as_array().map(Vec::len), Some(created));
    assert_eq!(data(&summary)["allMarks"].as_array().map(Vec::len), Some(created));
    Ok(())
}

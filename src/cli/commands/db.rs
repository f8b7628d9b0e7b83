use clap::Subcommand;
use serde_json::json;
use std::path::PathBuf;
use uuid::Uuid;

use crate::cli::{utils::output_success, OutputFormat};
use crate::config;
use crate::database::{open_store, Fixture, PgStore};
use crate::grading::AggregationEngine;
use crate::services::{ConsistencyChecker, DriftReport, WriteCoordinator};
use crate::types::{Identity, Role};

#[derive(Subcommand)]
pub enum DbCommands {
    #[command(about = "Create tables and constraints in the Postgres database")]
    Migrate,

    #[command(about = "Insert subjects and students from a JSON or YAML fixture")]
    Seed {
        #[arg(help = "Fixture file (.json, .yaml or .yml)")]
        file: PathBuf,
    },

    #[command(about = "Compare student aggregates with the mark and attendance tables")]
    Verify {
        #[arg(long, help = "Only check this student")]
        student: Option<Uuid>,
    },

    #[command(about = "Rebuild a student's aggregate from the record tables")]
    Rebuild {
        #[arg(long, help = "Student to rebuild")]
        student: Uuid,
    },
}

pub async fn handle(cmd: DbCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();

    match cmd {
        DbCommands::Migrate => {
            let store = PgStore::connect(&config.database).await?;
            store.migrate().await?;
            output_success(
                &output_format,
                json!({ "migrated": true }),
                &["✓ Schema is up to date".to_string()],
            )
        }
        DbCommands::Seed { file } => {
            let fixture = Fixture::load(&file)?;
            let store = open_store(&config.database).await?;
            let report = fixture.apply(store.as_ref()).await?;
            output_success(
                &output_format,
                json!(report),
                &[format!(
                    "✓ Seeded {}: {} subjects, {} students ({} subjects, {} students already present)",
                    file.display(),
                    report.subjects_inserted,
                    report.students_inserted,
                    report.subjects_skipped,
                    report.students_skipped
                )],
            )
        }
        DbCommands::Verify { student } => {
            let store = open_store(&config.database).await?;
            let checker = ConsistencyChecker::new(store, AggregationEngine::from_config(&config.grading));
            let reports = match student {
                Some(id) => vec![checker.verify_aggregate(id).await?],
                None => checker.verify_all().await?,
            };
            let drifted: Vec<&DriftReport> = reports.iter().filter(|r| !r.is_consistent()).collect();

            let mut lines = vec![format!(
                "Checked {} students, {} drifted",
                reports.len(),
                drifted.len()
            )];
            for report in &drifted {
                lines.push(format!(
                    "  {} ({}): marks {:?}, attendance {:?}, cgpa {:.2} -> {:.2}, attendance {:.2}% -> {:.2}%",
                    report.roll_no,
                    report.student_id,
                    report.mark_subjects,
                    report.attendance_subjects,
                    report.stored_cgpa,
                    report.expected_cgpa,
                    report.stored_overall_attendance,
                    report.expected_overall_attendance
                ));
            }

            output_success(
                &output_format,
                json!({ "checked": reports.len(), "drifted": drifted }),
                &lines,
            )?;
            if !drifted.is_empty() {
                anyhow::bail!("{} student aggregates are out of date", drifted.len());
            }
            Ok(())
        }
        DbCommands::Rebuild { student } => {
            let store = open_store(&config.database).await?;
            let coordinator = WriteCoordinator::from_config(store, config);
            // Operator action runs with admin rights
            let operator = Identity::new(Uuid::nil(), Role::Admin);
            let rebuilt = coordinator.rebuild_aggregate(&operator, student).await?;
            output_success(
                &output_format,
                json!({
                    "studentId": rebuilt.id,
                    "cgpa": rebuilt.cgpa,
                    "overallAttendance": rebuilt.overall_attendance,
                    "version": rebuilt.version
                }),
                &[format!(
                    "✓ Rebuilt {}: cgpa {:.2}, attendance {:.2}%",
                    rebuilt.roll_no, rebuilt.cgpa, rebuilt.overall_attendance
                )],
            )
        }
    }
}

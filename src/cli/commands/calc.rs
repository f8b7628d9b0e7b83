use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::{utils::output_success, OutputFormat};
use crate::config;
use crate::database::models::MarkEntry;
use crate::grading::{grade_of, percentage_of, AggregationEngine, CreditPolicy, Grade};

#[derive(Subcommand)]
pub enum CalcCommands {
    #[command(about = "Total and letter grade for internal/external marks")]
    Grade {
        #[arg(help = "Internal marks (0-50)")]
        internal: f64,
        #[arg(help = "External marks (0-50)")]
        external: f64,
    },

    #[command(about = "Attendance percentage")]
    Attendance {
        #[arg(help = "Classes attended")]
        attended: u32,
        #[arg(help = "Classes held")]
        total: u32,
    },

    #[command(about = "CGPA for a list of letter grades")]
    Cgpa {
        #[arg(required = true, help = "Letter grades, e.g. A+ B C+")]
        grades: Vec<Grade>,
        #[arg(long, help = "Credit weight per subject (defaults to configuration)")]
        weight: Option<f64>,
    },
}

pub async fn handle(cmd: CalcCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        CalcCommands::Grade { internal, external } => {
            let (total, grade) = grade_of(internal, external);
            output_success(
                &output_format,
                json!({ "internal": internal, "external": external, "total": total, "grade": grade }),
                &[format!("Total: {}  Grade: {}  Points: {}", total, grade, grade.points())],
            )
        }
        CalcCommands::Attendance { attended, total } => {
            if attended > total {
                anyhow::bail!("attended ({}) cannot exceed total ({})", attended, total);
            }
            let percentage = percentage_of(attended, total);
            output_success(
                &output_format,
                json!({ "attended": attended, "total": total, "percentage": percentage }),
                &[format!("Attendance: {:.2}%", percentage)],
            )
        }
        CalcCommands::Cgpa { grades, weight } => {
            let weight = weight.unwrap_or(config::config().grading.credit_weight);
            let engine = AggregationEngine::new(CreditPolicy::Uniform { weight });
            let entries: Vec<MarkEntry> = grades
                .iter()
                .map(|grade| MarkEntry {
                    subject_id: Uuid::new_v4(),
                    internal_marks: 0.0,
                    external_marks: 0.0,
                    total: 0.0,
                    grade: *grade,
                })
                .collect();
            let cgpa = engine.recompute_cgpa(&entries);
            output_success(
                &output_format,
                json!({ "grades": grades, "weight": weight, "cgpa": cgpa }),
                &[format!("CGPA: {:.2}", cgpa)],
            )
        }
    }
}

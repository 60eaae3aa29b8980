use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod advisor;
mod artifact;
mod config;
mod db;
mod error;
mod features;
mod ledger;
mod models;
mod report;
mod risk;
mod students;

use advisor::{LogAnalysisRequest, RecommendationRequest};
use artifact::ModelArtifact;
use config::Settings;
use models::{
    ActionType, GuardianOccupation, NewInterventionEntry, ScholarshipStatus, StudentRecord,
};

#[derive(Parser)]
#[command(name = "student-early-warning")]
#[command(
    about = "Dropout risk scoring and intervention log for school counselors",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed students
    Seed,
    /// Import students from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
        /// Replace the whole student table with the file contents
        #[arg(long)]
        replace: bool,
    },
    /// Write every student to a CSV file
    Export {
        #[arg(long, default_value = "students.csv")]
        out: PathBuf,
    },
    /// Add a single student
    AddStudent {
        #[arg(long)]
        name: String,
        #[arg(long)]
        student_id: String,
        #[arg(long)]
        class_label: String,
        #[arg(long)]
        average_grade: f64,
        #[arg(long, default_value_t = 0)]
        absence_count: u32,
        #[arg(long, default_value = "No")]
        scholarship: String,
        #[arg(long, default_value = "Other")]
        occupation: String,
        #[arg(long, default_value_t = 0)]
        violation_points: u32,
    },
    /// Remove students by id; their intervention history is kept
    RemoveStudents {
        #[arg(required = true)]
        student_ids: Vec<String>,
    },
    /// Rank students by predicted dropout risk
    Score {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Score a hypothetical student without storing it
    Simulate {
        #[arg(long, default_value_t = 75.5)]
        average_grade: f64,
        #[arg(long, default_value_t = 5)]
        absence_count: u32,
        #[arg(long, default_value = "No")]
        scholarship: String,
        #[arg(long, default_value = "Other")]
        occupation: String,
        #[arg(long, default_value_t = 10)]
        violation_points: u32,
    },
    /// Show one student's risk, key factors and intervention history
    Show {
        student_id: String,
        /// Ask the advisory service for intervention recommendations
        #[arg(long)]
        advise: bool,
        /// Ask the advisory service to analyze the intervention history
        #[arg(long)]
        analyze: bool,
    },
    /// Record an intervention for a student
    Log {
        student_id: String,
        #[arg(long, value_enum)]
        action: ActionType,
        #[arg(long)]
        notes: String,
        #[arg(long)]
        recorded_by: String,
    },
    /// Delete an intervention log entry by id
    Unlog { id: i64 },
    /// Generate a markdown school report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::InitDb => "init-db",
            Commands::Seed => "seed",
            Commands::Import { .. } => "import",
            Commands::Export { .. } => "export",
            Commands::AddStudent { .. } => "add-student",
            Commands::RemoveStudents { .. } => "remove-students",
            Commands::Score { .. } => "score",
            Commands::Simulate { .. } => "simulate",
            Commands::Show { .. } => "show",
            Commands::Log { .. } => "log",
            Commands::Unlog { .. } => "unlog",
            Commands::Report { .. } => "report",
        }
    }
}

fn load_artifact(settings: &Settings) -> anyhow::Result<ModelArtifact> {
    ModelArtifact::load(&settings.model_dir).context("risk scoring is unavailable")
}

async fn run(command: Commands, pool: &SqlitePool, settings: &Settings) -> anyhow::Result<()> {
    match command {
        Commands::InitDb => {
            db::init_db(pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(pool).await?;
            println!("Inserted {inserted} seed students.");
        }
        Commands::Import { csv, replace } => {
            if replace {
                let stored = db::replace_from_csv(pool, &csv).await?;
                println!("Student table replaced with {stored} records from {}.", csv.display());
            } else {
                let inserted = db::import_csv(pool, &csv).await?;
                println!("Inserted {inserted} students from {}.", csv.display());
            }
        }
        Commands::Export { out } => {
            let written = db::export_csv(pool, &out).await?;
            println!("Wrote {written} students to {}.", out.display());
        }
        Commands::AddStudent {
            name,
            student_id,
            class_label,
            average_grade,
            absence_count,
            scholarship,
            occupation,
            violation_points,
        } => {
            let record = StudentRecord {
                name,
                student_id,
                class_label,
                average_grade,
                absence_count,
                scholarship_status: ScholarshipStatus::from(scholarship),
                guardian_occupation: GuardianOccupation::from(occupation),
                violation_points,
            };
            students::insert(pool, &record).await?;
            println!("Added {} ({}).", record.name, record.student_id);
        }
        Commands::RemoveStudents { student_ids } => {
            let removed = students::delete(pool, &student_ids).await?;
            println!("Removed {removed} of {} requested students.", student_ids.len());
        }
        Commands::Score { limit } => {
            let artifact = load_artifact(settings)?;
            let records = students::list_all(pool).await?;
            let assessments = risk::assess_all(&artifact, &records)?;

            if assessments.is_empty() {
                println!("No students recorded. Add some with seed, import or add-student.");
                return Ok(());
            }

            println!("Students by predicted dropout risk:");
            for (rank, assessment) in assessments.iter().take(limit).enumerate() {
                println!(
                    "{:>3}. {} ({}, {}) {:.2}% [{}]",
                    rank + 1,
                    assessment.student_name,
                    assessment.student_id,
                    assessment.class_label,
                    assessment.percentage(),
                    assessment.tier
                );
            }
        }
        Commands::Simulate {
            average_grade,
            absence_count,
            scholarship,
            occupation,
            violation_points,
        } => {
            let artifact = load_artifact(settings)?;
            let record = StudentRecord::simulated(
                average_grade,
                absence_count,
                ScholarshipStatus::from(scholarship),
                GuardianOccupation::from(occupation),
                violation_points,
            );
            let assessment = risk::simulate(&artifact, &record)?;
            println!("Simulated risk: {:.2}% [{}]", assessment.percentage(), assessment.tier);
            for factor in risk::identify_key_factors(&record) {
                println!("- {factor}");
            }
        }
        Commands::Show {
            student_id,
            advise,
            analyze,
        } => {
            let record = students::find(pool, &student_id)
                .await?
                .with_context(|| format!("student {student_id} not found"))?;
            let entries = ledger::list_for(pool, &student_id).await?;

            let assessment = match load_artifact(settings) {
                Ok(artifact) => Some(risk::assess(&artifact, &record)?),
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "showing student without a risk score");
                    None
                }
            };
            print!("{}", report::render_student(&record, assessment.as_ref(), &entries));

            if advise || analyze {
                let desk = settings.advisory_desk();
                if !desk.is_enabled() {
                    warn!("advisory service is not configured");
                }
                if advise {
                    let factors = risk::identify_key_factors(&record);
                    let text = match &assessment {
                        Some(assessment) => {
                            desk.recommend(&RecommendationRequest {
                                student: &record,
                                risk_percentage: assessment.percentage(),
                                factors: &factors,
                            })
                            .await
                        }
                        None => "Recommendations need a risk score; the model is unavailable."
                            .to_string(),
                    };
                    println!();
                    println!("## Recommendations");
                    println!("{text}");
                }
                if analyze {
                    let text = desk
                        .analyze_logs(&LogAnalysisRequest {
                            student_name: &record.name,
                            entries: &entries,
                        })
                        .await;
                    println!();
                    println!("## Intervention Analysis");
                    println!("{text}");
                }
            }
        }
        Commands::Log {
            student_id,
            action,
            notes,
            recorded_by,
        } => {
            if students::find(pool, &student_id).await?.is_none() {
                warn!(%student_id, "logging intervention for a student that is not on record");
            }
            let entry = NewInterventionEntry {
                student_id,
                timestamp: chrono::Local::now().format(ledger::TIMESTAMP_FORMAT).to_string(),
                action_type: action,
                notes,
                recorded_by,
            };
            let id = ledger::append(pool, &entry).await?;
            println!("Logged intervention #{id} for {}.", entry.student_id);
        }
        Commands::Unlog { id } => {
            if ledger::delete(pool, id).await? {
                println!("Deleted intervention #{id}.");
            } else {
                println!("No intervention #{id}; nothing deleted.");
            }
        }
        Commands::Report { out } => {
            let artifact = load_artifact(settings)?;
            let records = students::list_all(pool).await?;
            let assessments = risk::assess_all(&artifact, &records)?;
            let generated_on = chrono::Local::now().format("%Y-%m-%d").to_string();
            let report = report::build_report(&records, &assessments, &generated_on);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

const DEFAULT_LOG_FILTER: &str = "student_early_warning=info";

fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let pool = db::connect(&cli.settings.database_url)
        .await
        .context("failed to open the student database")?;

    info!(command = cli.command.name(), "running command");
    let result = run(cli.command, &pool, &cli.settings).await;
    db::close(pool).await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_overrides_default_filter() {
        let filter = log_filter(Some("student_early_warning=debug"));
        assert_eq!(filter.to_string(), "student_early_warning=debug");
    }

    #[test]
    fn default_filter_applies_without_rust_log() {
        assert_eq!(log_filter(None).to_string(), DEFAULT_LOG_FILTER);
        assert_eq!(log_filter(Some("")).to_string(), DEFAULT_LOG_FILTER);
        assert_eq!(log_filter(Some("student_early_warning=loud")).to_string(), DEFAULT_LOG_FILTER);
    }
}

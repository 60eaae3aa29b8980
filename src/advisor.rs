use std::fmt::Write;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{InterventionLogEntry, KeyFactor, StudentRecord};

#[async_trait]
pub trait Advisor: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

pub struct RecommendationRequest<'a> {
    pub student: &'a StudentRecord,
    pub risk_percentage: f64,
    pub factors: &'a [KeyFactor],
}

impl RecommendationRequest<'_> {
    pub fn prompt(&self) -> String {
        let factors = self
            .factors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let student = self.student;

        let mut prompt = String::new();
        let _ = writeln!(
            prompt,
            "TASK: Based on the student data below, give concrete, personal and actionable \
             intervention recommendations. Separate recommendations for the homeroom teacher \
             and for the guidance counselor."
        );
        let _ = writeln!(prompt, "STUDENT DATA:");
        let _ = writeln!(prompt, "- Name: {}", student.name);
        let _ = writeln!(prompt, "- Class: {}", student.class_label);
        let _ = writeln!(prompt, "- Predicted dropout risk: {:.2}%", self.risk_percentage);
        let _ = writeln!(prompt, "- Key risk factors: {factors}");
        let _ = writeln!(
            prompt,
            "- Details: average grade {}, absences {} days, violation points {}, \
             guardian occupation {}",
            student.average_grade,
            student.absence_count,
            student.violation_points,
            student.guardian_occupation
        );
        let _ = writeln!(
            prompt,
            "ROLE: You are an experienced school counselor and educational psychologist. \
             Use empathetic, professional and positive language. Answer as markdown bullet points."
        );
        prompt
    }
}

pub struct LogAnalysisRequest<'a> {
    pub student_name: &'a str,
    pub entries: &'a [InterventionLogEntry],
}

impl LogAnalysisRequest<'_> {
    pub fn prompt(&self) -> String {
        let mut prompt = String::new();
        let _ = writeln!(
            prompt,
            "TASK: Based on the intervention history below, give a short analysis in three parts: \
             1. Summary of the student's situation, 2. Recurring themes or patterns, \
             3. Suggested focus for the next intervention."
        );
        let _ = writeln!(prompt, "INTERVENTION HISTORY FOR {}:", self.student_name);
        for entry in self.entries {
            let _ = writeln!(
                prompt,
                "{} | {} | {} | {}",
                entry.timestamp, entry.action_type, entry.notes, entry.recorded_by
            );
        }
        let _ = writeln!(
            prompt,
            "ROLE: You are a senior educational psychologist. Be professional and to the point, \
             and answer in markdown."
        );
        prompt
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

pub struct GenerativeAdvisor {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GenerativeAdvisor {
    pub fn new(endpoint: &str, model: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl Advisor for GenerativeAdvisor {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model);
        debug!(model = %self.model, "sending advisory request");

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("failed to reach advisory service")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("advisory service returned {status}: {body}");
        }

        let data: GenerateResponse = response
            .json()
            .await
            .context("failed to parse advisory response")?;

        let text = data
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.trim().is_empty())
            .context("advisory service returned no text")?;
        Ok(text)
    }
}

pub struct AdvisoryDesk {
    advisor: Option<Box<dyn Advisor>>,
    timeout: Duration,
}

impl AdvisoryDesk {
    pub fn new(advisor: Box<dyn Advisor>, timeout: Duration) -> Self {
        Self {
            advisor: Some(advisor),
            timeout,
        }
    }

    pub fn disabled() -> Self {
        Self {
            advisor: None,
            timeout: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.advisor.is_some()
    }

    pub async fn recommend(&self, request: &RecommendationRequest<'_>) -> String {
        self.ask(&request.prompt()).await
    }

    pub async fn analyze_logs(&self, request: &LogAnalysisRequest<'_>) -> String {
        if request.entries.is_empty() {
            return "No intervention history to analyze.".to_string();
        }
        self.ask(&request.prompt()).await
    }

    async fn ask(&self, prompt: &str) -> String {
        let Some(advisor) = &self.advisor else {
            return "Advisory service is disabled; set ADVISOR_API_KEY to enable it.".to_string();
        };

        match tokio::time::timeout(self.timeout, advisor.complete(prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                warn!(error = %format!("{err:#}"), "advisory request failed");
                format!("Advisory service error: {err:#}")
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs_f64(), "advisory request timed out");
                format!(
                    "Advisory service did not answer within {} seconds.",
                    self.timeout.as_secs()
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionType, GuardianOccupation, ScholarshipStatus};

    struct EchoAdvisor;

    #[async_trait]
    impl Advisor for EchoAdvisor {
        async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
            Ok(format!("advice for prompt of {} chars", prompt.len()))
        }
    }

    struct FailingAdvisor;

    #[async_trait]
    impl Advisor for FailingAdvisor {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            anyhow::bail!("quota exceeded")
        }
    }

    struct SlowAdvisor;

    #[async_trait]
    impl Advisor for SlowAdvisor {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    fn student() -> StudentRecord {
        StudentRecord {
            name: "Budi Santoso".to_string(),
            student_id: "0061234502".to_string(),
            class_label: "X IPA 1".to_string(),
            average_grade: 64.0,
            absence_count: 16,
            scholarship_status: ScholarshipStatus::No,
            guardian_occupation: GuardianOccupation::Farmer,
            violation_points: 40,
        }
    }

    #[test]
    fn recommendation_prompt_carries_profile_and_factors() {
        let student = student();
        let factors = [KeyFactor::AbsenceHigh, KeyFactor::DisciplineIssue];
        let prompt = RecommendationRequest {
            student: &student,
            risk_percentage: 81.234,
            factors: &factors,
        }
        .prompt();

        assert!(prompt.contains("Budi Santoso"));
        assert!(prompt.contains("81.23%"));
        assert!(prompt.contains("High absence, Discipline issue"));
        assert!(prompt.contains("guardian occupation Farmer"));
    }

    #[test]
    fn log_prompt_lists_entries_in_given_order() {
        let entries = vec![
            InterventionLogEntry {
                id: 2,
                student_id: "100".to_string(),
                timestamp: "2026-02-01 10:00".to_string(),
                action_type: ActionType::HomeVisit,
                notes: "met grandmother".to_string(),
                recorded_by: "Pak Rudi".to_string(),
            },
            InterventionLogEntry {
                id: 1,
                student_id: "100".to_string(),
                timestamp: "2026-01-01 10:00".to_string(),
                action_type: ActionType::ParentMeeting,
                notes: "parents unaware of absences".to_string(),
                recorded_by: "Ibu Nur".to_string(),
            },
        ];
        let prompt = LogAnalysisRequest {
            student_name: "Andi",
            entries: &entries,
        }
        .prompt();

        let home_visit = prompt.find("Home visit").unwrap();
        let parent_meeting = prompt.find("Parent meeting").unwrap();
        assert!(home_visit < parent_meeting);
        assert!(prompt.contains("FOR Andi"));
    }

    #[tokio::test]
    async fn disabled_desk_returns_message() {
        let student = student();
        let desk = AdvisoryDesk::disabled();
        let text = desk
            .recommend(&RecommendationRequest {
                student: &student,
                risk_percentage: 10.0,
                factors: &[KeyFactor::NoSalientFactor],
            })
            .await;
        assert!(!desk.is_enabled());
        assert!(text.contains("disabled"));
    }

    #[tokio::test]
    async fn successful_advice_is_returned_verbatim() {
        let student = student();
        let desk = AdvisoryDesk::new(Box::new(EchoAdvisor), Duration::from_secs(1));
        let text = desk
            .recommend(&RecommendationRequest {
                student: &student,
                risk_percentage: 10.0,
                factors: &[KeyFactor::NoSalientFactor],
            })
            .await;
        assert!(text.starts_with("advice for prompt of"));
    }

    #[tokio::test]
    async fn failures_become_messages() {
        let desk = AdvisoryDesk::new(Box::new(FailingAdvisor), Duration::from_secs(1));
        let entries = vec![InterventionLogEntry {
            id: 1,
            student_id: "100".to_string(),
            timestamp: "2026-01-01 10:00".to_string(),
            action_type: ActionType::Tutoring,
            notes: "math".to_string(),
            recorded_by: "Ibu Nur".to_string(),
        }];
        let text = desk
            .analyze_logs(&LogAnalysisRequest {
                student_name: "Andi",
                entries: &entries,
            })
            .await;
        assert!(text.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let student = student();
        let desk = AdvisoryDesk::new(Box::new(SlowAdvisor), Duration::from_millis(20));
        let text = desk
            .recommend(&RecommendationRequest {
                student: &student,
                risk_percentage: 90.0,
                factors: &[KeyFactor::AbsenceHigh],
            })
            .await;
        assert!(text.contains("did not answer"));
    }

    #[tokio::test]
    async fn empty_history_is_not_sent() {
        let desk = AdvisoryDesk::new(Box::new(FailingAdvisor), Duration::from_secs(1));
        let text = desk
            .analyze_logs(&LogAnalysisRequest {
                student_name: "Andi",
                entries: &[],
            })
            .await;
        assert_eq!(text, "No intervention history to analyze.");
    }
}

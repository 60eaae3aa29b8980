use std::collections::HashMap;
use std::fmt::Write;

use crate::models::{InterventionLogEntry, KeyFactor, RiskAssessment, RiskTier, StudentRecord};
use crate::risk;

pub const AT_RISK_PERCENT: f64 = 70.0;

#[derive(Debug, Clone)]
pub struct ClassSummary {
    pub class_label: String,
    pub student_count: usize,
    pub avg_risk_percent: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FactorDistribution {
    pub absence_high: usize,
    pub academic_low: usize,
    pub discipline_issue: usize,
}

pub fn summarize_by_class(assessments: &[RiskAssessment]) -> Vec<ClassSummary> {
    let mut map: HashMap<String, (usize, f64)> = HashMap::new();

    for assessment in assessments {
        let entry = map.entry(assessment.class_label.clone()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += assessment.percentage();
    }

    let mut summaries: Vec<ClassSummary> = map
        .into_iter()
        .map(|(class_label, (student_count, total))| ClassSummary {
            class_label,
            student_count,
            avg_risk_percent: total / student_count as f64,
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.avg_risk_percent
            .partial_cmp(&a.avg_risk_percent)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.class_label.cmp(&b.class_label))
    });
    summaries
}

pub fn factor_distribution(
    records: &[StudentRecord],
    assessments: &[RiskAssessment],
) -> FactorDistribution {
    let mut distribution = FactorDistribution::default();

    for assessment in assessments.iter().filter(|a| a.percentage() >= AT_RISK_PERCENT) {
        let Some(record) = records.iter().find(|r| r.student_id == assessment.student_id) else {
            continue;
        };
        for factor in risk::identify_key_factors(record) {
            match factor {
                KeyFactor::AbsenceHigh => distribution.absence_high += 1,
                KeyFactor::AcademicLow => distribution.academic_low += 1,
                KeyFactor::DisciplineIssue => distribution.discipline_issue += 1,
                KeyFactor::NoSalientFactor => {}
            }
        }
    }

    distribution
}

pub fn build_report(
    records: &[StudentRecord],
    assessments: &[RiskAssessment],
    generated_on: &str,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Student Dropout Risk Report");
    let _ = writeln!(output, "Generated on {generated_on}");
    let _ = writeln!(output);

    if assessments.is_empty() {
        let _ = writeln!(output, "No students recorded.");
        return output;
    }

    let at_risk = assessments
        .iter()
        .filter(|a| a.percentage() >= AT_RISK_PERCENT)
        .count();
    let mean = assessments
        .iter()
        .map(RiskAssessment::percentage)
        .sum::<f64>()
        / assessments.len() as f64;

    let _ = writeln!(output, "## School Overview");
    let _ = writeln!(output, "- Total students: {}", assessments.len());
    let _ = writeln!(
        output,
        "- Students at or above {:.0}% risk: {} ({:.1}%)",
        AT_RISK_PERCENT,
        at_risk,
        at_risk as f64 / assessments.len() as f64 * 100.0
    );
    let _ = writeln!(output, "- Mean risk: {mean:.2}%");
    for tier in [RiskTier::High, RiskTier::Elevated, RiskTier::Watch, RiskTier::Safe] {
        let count = assessments.iter().filter(|a| a.tier == tier).count();
        let _ = writeln!(output, "- {tier}: {count}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Mean Risk by Class");
    for summary in summarize_by_class(assessments) {
        let _ = writeln!(
            output,
            "- {}: {:.2}% across {} students",
            summary.class_label, summary.avg_risk_percent, summary.student_count
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Factors Among At-Risk Students");
    if at_risk == 0 {
        let _ = writeln!(output, "No students at or above {AT_RISK_PERCENT:.0}% risk.");
    } else {
        let distribution = factor_distribution(records, assessments);
        let _ = writeln!(output, "- {}: {}", KeyFactor::AbsenceHigh, distribution.absence_high);
        let _ = writeln!(output, "- {}: {}", KeyFactor::AcademicLow, distribution.academic_low);
        let _ = writeln!(
            output,
            "- {}: {}",
            KeyFactor::DisciplineIssue,
            distribution.discipline_issue
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Students");
    for (rank, assessment) in assessments.iter().take(10).enumerate() {
        let _ = writeln!(
            output,
            "{}. {} ({}, {}) {:.2}% [{}]",
            rank + 1,
            assessment.student_name,
            assessment.student_id,
            assessment.class_label,
            assessment.percentage(),
            assessment.tier
        );
    }

    output
}

pub fn render_student(
    record: &StudentRecord,
    assessment: Option<&RiskAssessment>,
    entries: &[InterventionLogEntry],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {}", record.name);
    let _ = writeln!(output, "Student ID: {} | Class: {}", record.student_id, record.class_label);
    let _ = writeln!(output);

    match assessment {
        Some(assessment) => {
            let _ = writeln!(
                output,
                "Predicted risk: {:.2}% [{}]",
                assessment.percentage(),
                assessment.tier
            );
        }
        None => {
            let _ = writeln!(output, "Predicted risk: unavailable (model artifact not loaded)");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Source Data");
    let _ = writeln!(output, "- Average grade: {}", record.average_grade);
    let _ = writeln!(output, "- Absences: {} days", record.absence_count);
    let _ = writeln!(output, "- Violation points: {}", record.violation_points);
    let _ = writeln!(output, "- Scholarship: {}", record.scholarship_status);
    let _ = writeln!(output, "- Guardian occupation: {}", record.guardian_occupation);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Risk Factors");
    for factor in risk::identify_key_factors(record) {
        let _ = writeln!(output, "- {factor}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Intervention History");
    if entries.is_empty() {
        let _ = writeln!(output, "No interventions recorded yet.");
    } else {
        for entry in entries {
            let _ = writeln!(
                output,
                "- #{} {} {} by {}: {}",
                entry.id, entry.timestamp, entry.action_type, entry.recorded_by, entry.notes
            );
        }
    }

    output
}

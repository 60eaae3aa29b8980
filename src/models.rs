use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub name: String,
    pub student_id: String,
    pub class_label: String,
    pub average_grade: f64,
    pub absence_count: u32,
    pub scholarship_status: ScholarshipStatus,
    pub guardian_occupation: GuardianOccupation,
    pub violation_points: u32,
}

impl StudentRecord {
    pub fn simulated(
        average_grade: f64,
        absence_count: u32,
        scholarship_status: ScholarshipStatus,
        guardian_occupation: GuardianOccupation,
        violation_points: u32,
    ) -> Self {
        Self {
            name: "Simulation".to_string(),
            student_id: "simulation".to_string(),
            class_label: String::new(),
            average_grade,
            absence_count,
            scholarship_status,
            guardian_occupation,
            violation_points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScholarshipStatus {
    Yes,
    No,
    Unrecognized(String),
}

impl ScholarshipStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ScholarshipStatus::Yes => "Yes",
            ScholarshipStatus::No => "No",
            ScholarshipStatus::Unrecognized(value) => value,
        }
    }
}

impl From<String> for ScholarshipStatus {
    fn from(value: String) -> Self {
        match value.trim() {
            "Yes" => ScholarshipStatus::Yes,
            "No" => ScholarshipStatus::No,
            _ => ScholarshipStatus::Unrecognized(value),
        }
    }
}

impl From<ScholarshipStatus> for String {
    fn from(value: ScholarshipStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ScholarshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GuardianOccupation {
    CivilServant,
    Entrepreneur,
    Laborer,
    Farmer,
    Other,
    Unrecognized(String),
}

impl GuardianOccupation {
    pub const KNOWN: [&'static str; 5] =
        ["CivilServant", "Entrepreneur", "Laborer", "Farmer", "Other"];

    pub fn as_str(&self) -> &str {
        match self {
            GuardianOccupation::CivilServant => "CivilServant",
            GuardianOccupation::Entrepreneur => "Entrepreneur",
            GuardianOccupation::Laborer => "Laborer",
            GuardianOccupation::Farmer => "Farmer",
            GuardianOccupation::Other => "Other",
            GuardianOccupation::Unrecognized(value) => value,
        }
    }
}

impl From<String> for GuardianOccupation {
    fn from(value: String) -> Self {
        match value.trim() {
            "CivilServant" => GuardianOccupation::CivilServant,
            "Entrepreneur" => GuardianOccupation::Entrepreneur,
            "Laborer" => GuardianOccupation::Laborer,
            "Farmer" => GuardianOccupation::Farmer,
            "Other" => GuardianOccupation::Other,
            _ => GuardianOccupation::Unrecognized(value),
        }
    }
}

impl From<GuardianOccupation> for String {
    fn from(value: GuardianOccupation) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for GuardianOccupation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ActionType {
    IndividualCounseling,
    ParentMeeting,
    Tutoring,
    HomeVisit,
    Other,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::IndividualCounseling => "IndividualCounseling",
            ActionType::ParentMeeting => "ParentMeeting",
            ActionType::Tutoring => "Tutoring",
            ActionType::HomeVisit => "HomeVisit",
            ActionType::Other => "Other",
        }
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "IndividualCounseling" => Ok(ActionType::IndividualCounseling),
            "ParentMeeting" => Ok(ActionType::ParentMeeting),
            "Tutoring" => Ok(ActionType::Tutoring),
            "HomeVisit" => Ok(ActionType::HomeVisit),
            "Other" => Ok(ActionType::Other),
            other => Err(format!("unknown action type {other:?}")),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionType::IndividualCounseling => "Individual counseling",
            ActionType::ParentMeeting => "Parent meeting",
            ActionType::Tutoring => "Tutoring",
            ActionType::HomeVisit => "Home visit",
            ActionType::Other => "Other",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct NewInterventionEntry {
    pub student_id: String,
    pub timestamp: String,
    pub action_type: ActionType,
    pub notes: String,
    pub recorded_by: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterventionLogEntry {
    pub id: i64,
    pub student_id: String,
    pub timestamp: String,
    pub action_type: ActionType,
    pub notes: String,
    pub recorded_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskTier {
    Safe,
    Watch,
    Elevated,
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskTier::Safe => "Safe",
            RiskTier::Watch => "Watch",
            RiskTier::Elevated => "Elevated",
            RiskTier::High => "High / Priority",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFactor {
    AbsenceHigh,
    AcademicLow,
    DisciplineIssue,
    NoSalientFactor,
}

impl fmt::Display for KeyFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            KeyFactor::AbsenceHigh => "High absence",
            KeyFactor::AcademicLow => "Low academic performance",
            KeyFactor::DisciplineIssue => "Discipline issue",
            KeyFactor::NoSalientFactor => "No salient risk factor",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct RiskAssessment {
    pub student_id: String,
    pub student_name: String,
    pub class_label: String,
    pub probability: f64,
    pub tier: RiskTier,
}

impl RiskAssessment {
    pub fn percentage(&self) -> f64 {
        self.probability * 100.0
    }
}

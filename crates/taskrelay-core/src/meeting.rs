use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::datetime::wall_clock_serde;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttendeeStatus {
    Pending,
    Accepted,
    Declined,
    Tentative,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRef {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,
}

impl UserRef {
    /// Name, then email, then id.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attendee {
    pub status: AttendeeStatus,
    pub user: UserRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Completed,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub status: ProjectStatus,

    #[serde(default)]
    pub members: Vec<UserRef>,
}

impl Project {
    pub fn to_ref(&self) -> ProjectRef {
        ProjectRef {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,

    pub title: String,

    #[serde(with = "wall_clock_serde")]
    pub datetime: NaiveDateTime,

    /// Minutes.
    #[serde(default)]
    pub duration: u32,

    #[serde(default)]
    pub attendees: Vec<Attendee>,

    #[serde(default)]
    pub project: Option<ProjectRef>,

    pub creator: UserRef,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub location: Option<String>,
}

/// Attendee counts per RSVP status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub pending: usize,
    pub accepted: usize,
    pub declined: usize,
    pub tentative: usize,
}

impl AttendanceSummary {
    pub fn total(&self) -> usize {
        self.pending + self.accepted + self.declined + self.tentative
    }

    fn push(&mut self, status: AttendeeStatus) {
        match status {
            AttendeeStatus::Pending => self.pending += 1,
            AttendeeStatus::Accepted => self.accepted += 1,
            AttendeeStatus::Declined => self.declined += 1,
            AttendeeStatus::Tentative => self.tentative += 1,
        }
    }
}

impl Meeting {
    /// Start plus duration. Never before the start.
    pub fn end(&self) -> NaiveDateTime {
        self.datetime
            .checked_add_signed(Duration::minutes(i64::from(self.duration)))
            .unwrap_or(NaiveDateTime::MAX)
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project.as_ref().map(|project| project.id.as_str())
    }

    pub fn attendance(&self) -> AttendanceSummary {
        let mut summary = AttendanceSummary::default();
        for attendee in &self.attendees {
            summary.push(attendee.status);
        }
        summary
    }

    pub fn duration_display(&self) -> String {
        let hours = self.duration / 60;
        let minutes = self.duration % 60;
        match (hours, minutes) {
            (0, m) => format!("{m}m"),
            (h, 0) => format!("{h}h"),
            (h, m) => format!("{h}h {m}m"),
        }
    }
}

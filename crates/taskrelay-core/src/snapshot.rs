use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::meeting::{Meeting, Project, ProjectRef};

/// Read-only view of the meetings and projects exported by the API layer.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub source: Option<PathBuf>,
    pub meetings: Vec<Meeting>,
    pub projects: Vec<Project>,
}

#[derive(Debug, Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    meetings: Vec<Meeting>,
    #[serde(default)]
    projects: Vec<Project>,
}

impl Snapshot {
    #[tracing::instrument(skip(path))]
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Err(anyhow!(
                "snapshot file not found: {} (set data.location or pass --data)",
                path.display()
            ));
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        let mut snapshot = Self::parse(&raw, &path.display().to_string())?;
        snapshot.source = Some(path.to_path_buf());

        info!(
            file = %path.display(),
            meetings = snapshot.meetings.len(),
            projects = snapshot.projects.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }

    /// Accepts a JSON array of meetings, an object with `meetings` and
    /// `projects`, or one meeting per line.
    #[tracing::instrument(skip(raw))]
    pub fn parse(raw: &str, origin: &str) -> anyhow::Result<Self> {
        let trimmed = raw.trim_start();

        let (meetings, projects) = if trimmed.starts_with('[') {
            debug!("parsing snapshot as json array");
            let meetings: Vec<Meeting> = serde_json::from_str(trimmed)
                .with_context(|| format!("failed parsing {origin} as a meeting array"))?;
            (meetings, vec![])
        } else if trimmed.starts_with('{') && looks_like_document(trimmed) {
            debug!("parsing snapshot as json document");
            let doc: SnapshotDocument = serde_json::from_str(trimmed)
                .with_context(|| format!("failed parsing {origin} as a snapshot document"))?;
            (doc.meetings, doc.projects)
        } else {
            debug!("parsing snapshot as jsonl");
            (parse_jsonl(raw, origin)?, vec![])
        };

        let snapshot = Self {
            source: None,
            meetings,
            projects,
        };
        snapshot.validate(origin)?;
        Ok(snapshot)
    }

    pub fn meeting(&self, id: &str) -> Option<&Meeting> {
        self.meetings.iter().find(|m| m.id == id)
    }

    /// Declared projects, or the distinct projects meetings reference when
    /// none are declared. Sorted by name.
    pub fn project_refs(&self) -> Vec<ProjectRef> {
        let mut by_id: BTreeMap<String, ProjectRef> = BTreeMap::new();
        if self.projects.is_empty() {
            for project in self.meetings.iter().filter_map(|m| m.project.as_ref()) {
                by_id
                    .entry(project.id.clone())
                    .or_insert_with(|| project.clone());
            }
        } else {
            for project in &self.projects {
                by_id.insert(project.id.clone(), project.to_ref());
            }
        }

        let mut out: Vec<ProjectRef> = by_id.into_values().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        out
    }

    /// Last declaration wins when an id repeats.
    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().rev().find(|p| p.id == id)
    }

    fn validate(&self, origin: &str) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for (idx, meeting) in self.meetings.iter().enumerate() {
            if meeting.id.trim().is_empty() {
                return Err(anyhow!("meeting #{} in {origin} has an empty id", idx + 1));
            }
            if !seen.insert(meeting.id.as_str()) {
                return Err(anyhow!("duplicate meeting id in {origin}: {}", meeting.id));
            }
        }

        let mut project_ids = HashSet::new();
        for project in &self.projects {
            if !project_ids.insert(project.id.as_str()) {
                warn!(project = %project.id, "duplicate project id in snapshot; keeping last");
            }
        }
        Ok(())
    }
}

fn looks_like_document(trimmed: &str) -> bool {
    // A JSONL file also starts with '{'; a document spans the whole input.
    serde_json::from_str::<serde_json::Value>(trimmed)
        .map(|value| value.get("meetings").is_some() || value.get("projects").is_some())
        .unwrap_or(false)
}

fn parse_jsonl(raw: &str, origin: &str) -> anyhow::Result<Vec<Meeting>> {
    let mut out = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let meeting: Meeting = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {origin} line {}", idx + 1))?;
        out.push(meeting);
    }
    debug!(count = out.len(), "loaded meetings from jsonl");
    Ok(out)
}

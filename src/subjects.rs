//! Flat-file registry of study participants.
//!
//! One JSON file holds every subject the recorder knows about. The store is
//! loaded whole, edited in memory and written back whole; with tens of
//! subjects per study there is nothing to gain from anything heavier.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One study participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: u32,
    pub name: String,
    pub sex: String,
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub notes: String,
}

/// In-memory view of the subject file.
#[derive(Debug)]
pub struct SubjectStore {
    path: PathBuf,
    subjects: Vec<Subject>,
}

impl SubjectStore {
    /// Load the store from `path`. A missing file is an empty store, not an
    /// error; the file appears on first save.
    pub fn load(path: &Path) -> Result<Self> {
        let subjects = if path.exists() {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading subject file {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing subject file {}", path.display()))?
        } else {
            Vec::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            subjects,
        })
    }

    /// Write the store back to its file.
    pub fn save(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.subjects)?;
        fs::write(&self.path, text)
            .with_context(|| format!("writing subject file {}", self.path.display()))?;
        Ok(())
    }

    /// Register a subject and return the assigned id.
    pub fn add(
        &mut self,
        name: &str,
        sex: &str,
        height_cm: Option<f64>,
        notes: &str,
    ) -> u32 {
        let id = self.subjects.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        self.subjects.push(Subject {
            id,
            name: name.to_string(),
            sex: sex.to_string(),
            height_cm,
            notes: notes.to_string(),
        });
        id
    }

    /// Delete a subject by id; returns whether one was removed.
    pub fn remove(&mut self, id: u32) -> bool {
        let before = self.subjects.len();
        self.subjects.retain(|s| s.id != id);
        self.subjects.len() != before
    }

    pub fn get(&self, id: u32) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.name == name)
    }

    pub fn list(&self) -> &[Subject] {
        &self.subjects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_as_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SubjectStore::load(&dir.path().join("subjects.json")).unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn ids_are_assigned_monotonically() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SubjectStore::load(&dir.path().join("subjects.json")).unwrap();
        let a = store.add("P001", "f", Some(172.0), "");
        let b = store.add("P002", "m", None, "left-handed");
        assert_eq!(a, 1);
        assert_eq!(b, 2);

        store.remove(a);
        // removed ids are not reused while a higher one exists
        assert_eq!(store.add("P003", "f", None, ""), 3);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subjects.json");

        let mut store = SubjectStore::load(&path).unwrap();
        let id = store.add("P001", "f", Some(172.0), "baseline cohort");
        store.save().unwrap();

        let reloaded = SubjectStore::load(&path).unwrap();
        let subject = reloaded.get(id).unwrap();
        assert_eq!(subject.name, "P001");
        assert_eq!(subject.height_cm, Some(172.0));
        assert_eq!(subject.notes, "baseline cohort");
        assert_eq!(reloaded.find_by_name("P001").unwrap().id, id);
    }

    #[test]
    fn remove_reports_whether_anything_was_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SubjectStore::load(&dir.path().join("subjects.json")).unwrap();
        let id = store.add("P001", "f", None, "");
        assert!(store.remove(id));
        assert!(!store.remove(id));
    }
}

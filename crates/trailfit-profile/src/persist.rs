//! The on-disk preference document: one JSON object mapping normalized user
//! ids to profiles.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use trailfit_core::{normalize_user_id, UserProfile};

use crate::error::{StoreError, StoreWarning};

/// What could be recovered from the document at startup.
#[derive(Debug, Default)]
pub(crate) struct Loaded {
    pub(crate) profiles: HashMap<String, UserProfile>,
    /// Set when the document as a whole is unusable.
    pub(crate) document_warning: Option<StoreWarning>,
    /// Entries that failed to parse, keyed by normalized user id.
    pub(crate) entry_warnings: HashMap<String, StoreWarning>,
}

/// Read the document at `path`. Never fails: a missing file is an empty
/// store, a corrupt file or entry becomes a warning.
pub(crate) fn load(path: &Path) -> Loaded {
    let shown = path.display().to_string();
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Loaded::default(),
        Err(e) => {
            tracing::warn!(path = %shown, error = %e, "preference document unreadable, starting empty");
            return Loaded {
                document_warning: Some(StoreWarning::Unreadable {
                    path: shown,
                    reason: e.to_string(),
                }),
                ..Loaded::default()
            };
        }
    };

    if content.trim().is_empty() {
        return Loaded::default();
    }

    let document: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(&content)
    {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(path = %shown, error = %e, "preference document corrupt, starting empty");
            return Loaded {
                document_warning: Some(StoreWarning::CorruptDocument {
                    path: shown,
                    reason: e.to_string(),
                }),
                ..Loaded::default()
            };
        }
    };

    let mut loaded = Loaded::default();
    for (raw_id, value) in document {
        let user_id = normalize_user_id(&raw_id);
        if user_id.is_empty() {
            continue;
        }
        match serde_json::from_value::<UserProfile>(value) {
            Ok(mut profile) => {
                profile.touch(profile.last_seen);
                loaded.profiles.insert(user_id, profile);
            }
            Err(e) => {
                tracing::warn!(user = %user_id, error = %e, "corrupt preference entry, treating as empty");
                loaded.entry_warnings.insert(
                    user_id.clone(),
                    StoreWarning::CorruptEntry {
                        user_id,
                        reason: e.to_string(),
                    },
                );
            }
        }
    }
    loaded
}

/// Write `profiles` to `path` atomically: serialize, write a sibling temp
/// file, rename over the target. The parent directory is created on first
/// write.
pub(crate) fn write(path: &Path, profiles: &HashMap<String, UserProfile>) -> Result<(), StoreError> {
    let sorted: BTreeMap<&String, &UserProfile> = profiles.iter().collect();
    let bytes = serde_json::to_vec_pretty(&sorted)?;

    let io_err = |source: std::io::Error| StoreError::Persist {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let tmp = temp_path(path);
    std::fs::write(&tmp, &bytes).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// Keep a copy of a corrupt document before it is first overwritten.
pub(crate) fn back_up_corrupt(path: &Path) {
    let mut backup = path.as_os_str().to_owned();
    backup.push(".corrupt");
    let backup = PathBuf::from(backup);
    match std::fs::copy(path, &backup) {
        Ok(_) => tracing::warn!(backup = %backup.display(), "corrupt preference document backed up"),
        Err(e) => tracing::warn!(error = %e, "could not back up corrupt preference document"),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty_without_warning() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load(&dir.path().join("absent.json"));
        assert!(loaded.profiles.is_empty());
        assert!(loaded.document_warning.is_none());
    }

    #[test]
    fn corrupt_document_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{ not json").unwrap();
        let loaded = load(&path);
        assert!(loaded.profiles.is_empty());
        assert!(matches!(
            loaded.document_warning,
            Some(StoreWarning::CorruptDocument { .. })
        ));
    }

    #[test]
    fn corrupt_entry_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(
            &path,
            r#"{"Alice": {"sizing": {"fit": "slim"}}, "bob": {"sizing": "not an object"}}"#,
        )
        .unwrap();
        let loaded = load(&path);
        assert_eq!(
            loaded.profiles["alice"].sizing.fit.as_deref(),
            Some("slim")
        );
        assert!(loaded.document_warning.is_none());
        assert!(matches!(
            loaded.entry_warnings.get("bob"),
            Some(StoreWarning::CorruptEntry { .. })
        ));
    }

    #[test]
    fn write_creates_parent_directory_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("prefs.json");
        let mut profiles = HashMap::new();
        let mut profile = UserProfile::empty();
        profile.sizing.fit = Some("relaxed".into());
        profiles.insert("sam".to_owned(), profile);

        write(&path, &profiles).unwrap();
        assert!(!temp_path(&path).exists());

        let loaded = load(&path);
        assert_eq!(loaded.profiles["sam"].sizing.fit.as_deref(), Some("relaxed"));
    }
}

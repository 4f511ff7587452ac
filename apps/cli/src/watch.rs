//! Watch mode: keep the definition index and FML bindings current while files change.

use anyhow::Context;
use mapbuilder_definitions::ig_config::IG_CONFIG_FILE_NAMES;
use mapbuilder_definitions::DefinitionIndex;
use mapbuilder_fml::SourceIndexer;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecursiveMode, Watcher as _};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Quiet period before a burst of events is applied.
const DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    IgConfig,
    Upserted(PathBuf),
    Removed(PathBuf),
}

fn is_ig_config(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| IG_CONFIG_FILE_NAMES.contains(&name))
}

fn is_relevant(path: &Path) -> bool {
    path.is_dir() || path.extension().is_some_and(|ext| ext == "fml")
}

fn upserted(path: &Path) -> Option<Change> {
    if is_ig_config(path) {
        Some(Change::IgConfig)
    } else if is_relevant(path) {
        Some(Change::Upserted(path.to_path_buf()))
    } else {
        None
    }
}

fn removed(path: &Path) -> Change {
    if is_ig_config(path) {
        Change::IgConfig
    } else {
        Change::Removed(path.to_path_buf())
    }
}

/// Translate one notify event into index changes.
pub fn classify(event: &notify::Event) -> Vec<Change> {
    match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut changes = Vec::new();
            if let Some(from) = event.paths.first() {
                changes.push(removed(from));
            }
            if let Some(to) = event.paths.get(1) {
                changes.extend(upserted(to));
            }
            changes
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) | EventKind::Remove(_) => {
            event.paths.iter().map(|path| removed(path)).collect()
        }
        EventKind::Create(_) | EventKind::Modify(_) => {
            event.paths.iter().filter_map(|path| upserted(path)).collect()
        }
        _ => Vec::new(),
    }
}

async fn rebuild(project: &Path, index: &DefinitionIndex, indexer: &mut SourceIndexer) {
    match index.refresh_project(project).await {
        Ok(set) => tracing::info!(definitions = set.len(), "Definition index refreshed"),
        Err(e) => tracing::error!(error = %e, "Definition index refresh failed"),
    }
    indexer.scan_all(&[project]);
}

fn apply(changes: &[Change], indexer: &mut SourceIndexer) {
    for change in changes {
        match change {
            Change::Upserted(path) => match indexer.file_changed(path) {
                Ok(0) => {}
                Ok(reparsed) => tracing::info!(path = %path.display(), reparsed, "FML sources updated"),
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "Ignoring change"),
            },
            Change::Removed(path) => {
                indexer.file_deleted(path);
            }
            Change::IgConfig => {}
        }
    }
}

/// Absolute form of `project`, matching the paths notify reports.
fn watch_root(project: &Path) -> anyhow::Result<PathBuf> {
    std::fs::canonicalize(project)
        .with_context(|| format!("Failed to resolve project root {}", project.display()))
}

/// Index everything once, then follow file-system events under `project` until Ctrl+C.
pub async fn run(project: &Path, index: &DefinitionIndex) -> anyhow::Result<()> {
    let root = watch_root(project)?;
    let project = root.as_path();
    let mut indexer = SourceIndexer::new();
    rebuild(project, index, &mut indexer).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => tracing::warn!(error = %e, "File watcher error"),
        }
    })
    .context("Failed to create file watcher")?;
    watcher
        .watch(project, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", project.display()))?;

    tracing::info!(project = %project.display(), "Watching for changes, press Ctrl+C to stop");

    loop {
        let first = tokio::select! {
            event = rx.recv() => event,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(first) = first else {
            break;
        };

        let mut changes = classify(&first);
        while let Ok(Some(event)) = tokio::time::timeout(DEBOUNCE, rx.recv()).await {
            changes.extend(classify(&event));
        }

        if changes.contains(&Change::IgConfig) {
            tracing::info!("IG configuration changed, rebuilding");
            rebuild(project, index, &mut indexer).await;
        } else {
            apply(&changes, &mut indexer);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use notify::Event;

    #[test]
    fn test_classify_fml_and_config_events() {
        let dir = tempfile::tempdir().unwrap();
        let map = dir.path().join("map.fml");
        let notes = dir.path().join("notes.txt");

        let created = Event::new(EventKind::Create(CreateKind::File))
            .add_path(map.clone())
            .add_path(notes);
        assert_eq!(classify(&created), vec![Change::Upserted(map.clone())]);

        let config = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(dir.path().join("sushi-config.yaml"));
        assert_eq!(classify(&config), vec![Change::IgConfig]);

        let deleted = Event::new(EventKind::Remove(RemoveKind::Any)).add_path(dir.path().join("gone"));
        assert_eq!(classify(&deleted), vec![Change::Removed(dir.path().join("gone"))]);
    }

    #[test]
    fn test_classify_rename() {
        let dir = tempfile::tempdir().unwrap();
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(dir.path().join("old.fml"))
            .add_path(dir.path().join("new.fml"));
        assert_eq!(
            classify(&event),
            vec![
                Change::Removed(dir.path().join("old.fml")),
                Change::Upserted(dir.path().join("new.fml")),
            ]
        );
    }

    #[test]
    fn test_apply_updates_indexer() {
        let dir = tempfile::tempdir().unwrap();
        let map = dir.path().join("map.fml");
        std::fs::write(&map, "uses \"http://example.org/A\" alias A as source\n").unwrap();

        let mut indexer = SourceIndexer::new();
        apply(&[Change::Upserted(map.clone())], &mut indexer);
        assert_eq!(indexer.len(), 1);

        apply(&[Change::Removed(dir.path().to_path_buf())], &mut indexer);
        assert!(indexer.is_empty());
    }

    #[test]
    fn test_watch_root_keys_match_absolute_event_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("maps")).unwrap();
        std::fs::write(
            dir.path().join("maps/map.fml"),
            "uses \"http://example.org/A\" alias A as source\n",
        )
        .unwrap();

        let indirect = dir.path().join("maps").join("..");
        let root = watch_root(&indirect).unwrap();
        let mut indexer = SourceIndexer::new();
        assert_eq!(indexer.scan_all(&[&root]), 1);

        let absolute = std::fs::canonicalize(dir.path()).unwrap().join("maps/map.fml");
        assert!(indexer.entry(&absolute).is_some());
        apply(&[Change::Removed(absolute)], &mut indexer);
        assert!(indexer.is_empty());
    }

    #[test]
    fn test_watch_root_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(watch_root(&dir.path().join("absent")).is_err());
    }
}

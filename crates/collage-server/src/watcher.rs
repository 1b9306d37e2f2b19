//! File watching for live reload.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex, Weak};

use collage_static::BuildConfig;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Template document was modified
    TemplateModified(PathBuf),

    /// A fragment was modified
    FragmentModified(PathBuf),

    /// A stylesheet was modified
    StyleModified(PathBuf),

    /// An asset was modified
    AssetModified(PathBuf),

    /// File was created
    Created(PathBuf),

    /// File was deleted
    Deleted(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::TemplateModified(path)
            | WatchEvent::FragmentModified(path)
            | WatchEvent::StyleModified(path)
            | WatchEvent::AssetModified(path)
            | WatchEvent::Created(path)
            | WatchEvent::Deleted(path) => path,
        }
    }
}

/// File watcher for detecting source changes.
pub struct FileWatcher {
    _watches: Arc<Mutex<WatchSet>>,
}

impl FileWatcher {
    /// Watch every source path of `config`.
    ///
    /// The template is watched through its parent directory, so saves that
    /// replace the file keep being seen. Source directories missing at
    /// startup are picked up once they are created. Changes under the output
    /// directory are never reported.
    pub fn new(
        config: &BuildConfig,
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        let mut watches = WatchSet::new(watcher, config);
        watches.refresh().map_err(std::io::Error::other)?;
        let watches = Arc::new(Mutex::new(watches));

        let weak = Arc::downgrade(&watches);
        let config = config.clone();
        std::thread::spawn(move || {
            while let Ok(event) = sync_rx.recv() {
                if may_create_dir(&event.kind) {
                    refresh_pending(&weak);
                }

                for path in event.paths {
                    if let Some(e) = classify_event(&config, &path, &event.kind) {
                        if async_tx.blocking_send(e).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok((Self { _watches: watches }, async_rx))
    }
}

/// Watched roots plus the sources still waiting to exist.
struct WatchSet {
    watcher: RecommendedWatcher,
    watched: BTreeMap<PathBuf, RecursiveMode>,
    pending: Vec<(PathBuf, RecursiveMode)>,
}

impl WatchSet {
    fn new(watcher: RecommendedWatcher, config: &BuildConfig) -> Self {
        let mut pending = Vec::new();
        if let Some(parent) = config.template_file.parent() {
            pending.push((parent.to_path_buf(), RecursiveMode::NonRecursive));
        }
        for dir in [&config.fragments_dir, &config.styles_dir, &config.assets_dir] {
            pending.push((dir.clone(), RecursiveMode::Recursive));
        }

        Self {
            watcher,
            watched: BTreeMap::new(),
            pending,
        }
    }

    /// Watch every pending directory that exists now. For the others, watch
    /// the closest existing ancestor so their creation is reported.
    fn refresh(&mut self) -> notify::Result<()> {
        let mut first_error = None;

        for (dir, mode) in std::mem::take(&mut self.pending) {
            let target = if dir.is_dir() {
                Some((dir.clone(), mode))
            } else {
                dir.ancestors()
                    .skip(1)
                    .find(|ancestor| ancestor.is_dir())
                    .map(|ancestor| (ancestor.to_path_buf(), RecursiveMode::NonRecursive))
            };

            let result = match &target {
                Some((path, target_mode)) => self.watch(path, *target_mode),
                None => Ok(()),
            };

            match result {
                Ok(()) if target.as_ref().is_some_and(|(path, _)| *path == dir) => {
                    tracing::debug!("Watching {}", dir.display());
                }
                Ok(()) => {
                    tracing::debug!("Waiting for {} to be created", dir.display());
                    self.pending.push((dir, mode));
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                    self.pending.push((dir, mode));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn watch(&mut self, path: &Path, mode: RecursiveMode) -> notify::Result<()> {
        let covered = self
            .watched
            .iter()
            .any(|(root, m)| *m == RecursiveMode::Recursive && path.starts_with(root));
        if covered || self.watched.get(path) == Some(&mode) {
            return Ok(());
        }

        if self.watched.remove(path).is_some() {
            let _ = self.watcher.unwatch(path);
        }
        self.watcher.watch(path, mode)?;
        self.watched.insert(path.to_path_buf(), mode);
        Ok(())
    }
}

fn may_create_dir(kind: &notify::EventKind) -> bool {
    use notify::event::ModifyKind;
    use notify::EventKind;

    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
    )
}

fn refresh_pending(watches: &Weak<Mutex<WatchSet>>) {
    let Some(watches) = watches.upgrade() else {
        return;
    };
    let mut watches = watches.lock().unwrap_or_else(|e| e.into_inner());
    if watches.pending.is_empty() {
        return;
    }
    if let Err(e) = watches.refresh() {
        tracing::warn!("Failed to watch new source directory: {}", e);
    }
}

/// Source a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Template,
    Fragment,
    Style,
    Asset,
}

impl Source {
    fn of(config: &BuildConfig, path: &Path) -> Option<Self> {
        if path == config.template_file {
            Some(Source::Template)
        } else if path.starts_with(&config.fragments_dir) {
            Some(Source::Fragment)
        } else if path.starts_with(&config.styles_dir) {
            Some(Source::Style)
        } else if path.starts_with(&config.assets_dir) {
            Some(Source::Asset)
        } else {
            None
        }
    }
}

/// Classify a notify event into a WatchEvent.
///
/// Paths outside the sources, such as neighbours of the template or the
/// output directory, yield `None`.
fn classify_event(config: &BuildConfig, path: &Path, kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::EventKind;

    if path.starts_with(&config.output_dir) {
        return None;
    }

    let source = Source::of(config, path)?;
    let path = path.to_path_buf();

    match kind {
        EventKind::Create(_) => Some(WatchEvent::Created(path)),
        EventKind::Remove(_) => Some(WatchEvent::Deleted(path)),
        EventKind::Modify(_) => Some(match source {
            Source::Template => WatchEvent::TemplateModified(path),
            Source::Fragment => WatchEvent::FragmentModified(path),
            Source::Style => WatchEvent::StyleModified(path),
            Source::Asset => WatchEvent::AssetModified(path),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RenameMode};
    use notify::EventKind;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn config() -> BuildConfig {
        BuildConfig::with_defaults("/site").unwrap()
    }

    #[test]
    fn classifies_modifications_by_source() {
        let config = config();
        let modify = EventKind::Modify(ModifyKind::Any);

        assert_eq!(
            classify_event(&config, Path::new("/site/template.html"), &modify),
            Some(WatchEvent::TemplateModified(PathBuf::from("/site/template.html")))
        );
        assert_eq!(
            classify_event(&config, Path::new("/site/components/header.html"), &modify),
            Some(WatchEvent::FragmentModified(PathBuf::from("/site/components/header.html")))
        );
        assert_eq!(
            classify_event(&config, Path::new("/site/styles/main.css"), &modify),
            Some(WatchEvent::StyleModified(PathBuf::from("/site/styles/main.css")))
        );
        assert_eq!(
            classify_event(&config, Path::new("/site/assets/img/a.png"), &modify),
            Some(WatchEvent::AssetModified(PathBuf::from("/site/assets/img/a.png")))
        );
    }

    #[test]
    fn ignores_output_directory() {
        let config = config();
        let create = EventKind::Create(CreateKind::File);

        assert_eq!(
            classify_event(&config, Path::new("/site/project-dist/index.html"), &create),
            None
        );
    }

    #[test]
    fn ignores_files_next_to_template() {
        let config = config();

        assert_eq!(
            classify_event(
                &config,
                Path::new("/site/template.html.swp"),
                &EventKind::Create(CreateKind::File)
            ),
            None
        );
        assert_eq!(
            classify_event(
                &config,
                Path::new("/site/collage.toml"),
                &EventKind::Modify(ModifyKind::Any)
            ),
            None
        );
        assert_eq!(
            classify_event(
                &config,
                Path::new("/site/template.html"),
                &EventKind::Modify(ModifyKind::Name(RenameMode::To))
            ),
            Some(WatchEvent::TemplateModified(PathBuf::from("/site/template.html")))
        );
    }

    fn project() -> (tempfile::TempDir, BuildConfig) {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("components")).unwrap();
        fs::create_dir_all(root.join("assets")).unwrap();
        fs::write(root.join("template.html"), "v1").unwrap();
        let config = BuildConfig::with_defaults(&root).unwrap();
        (temp, config)
    }

    async fn next_matching(
        rx: &mut async_mpsc::Receiver<WatchEvent>,
        matches: impl Fn(&WatchEvent) -> bool,
    ) -> Option<WatchEvent> {
        tokio::time::timeout(Duration::from_secs(3), async {
            while let Some(event) = rx.recv().await {
                if matches(&event) {
                    return Some(event);
                }
            }
            None
        })
        .await
        .ok()
        .flatten()
    }

    #[tokio::test]
    async fn template_edits_seen_after_replacing_save() {
        let (_temp, config) = project();
        let template = config.template_file.clone();
        let (watcher, mut rx) = FileWatcher::new(&config).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let swap = config.root.join("template.html.tmp");
        fs::write(&swap, "v2").unwrap();
        fs::rename(&swap, &template).unwrap();

        assert!(
            next_matching(&mut rx, |e| e.path() == template).await.is_some(),
            "replacing save not reported"
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        while rx.try_recv().is_ok() {}

        fs::write(&template, "v3").unwrap();
        let event = next_matching(&mut rx, |e| e.path() == template).await;

        drop(watcher);
        assert_eq!(event, Some(WatchEvent::TemplateModified(template)));
    }

    #[tokio::test]
    async fn watches_source_dir_created_after_start() {
        let (_temp, config) = project();
        let styles = config.styles_dir.clone();
        let (watcher, mut rx) = FileWatcher::new(&config).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::create_dir(&styles).unwrap();
        assert_eq!(
            next_matching(&mut rx, |e| e.path() == styles).await,
            Some(WatchEvent::Created(styles.clone()))
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        fs::write(styles.join("main.css"), "body{}").unwrap();
        let event = next_matching(&mut rx, |e| e.path() == styles.join("main.css")).await;

        drop(watcher);
        assert!(event.is_some(), "file in new styles directory not reported");
    }

    #[tokio::test]
    async fn watches_file_changes() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("components")).unwrap();
        fs::create_dir_all(temp.path().join("styles")).unwrap();
        fs::create_dir_all(temp.path().join("assets")).unwrap();
        let config = BuildConfig::with_defaults(temp.path()).unwrap();

        let (watcher, mut rx) = FileWatcher::new(&config).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(temp.path().join("components/header.html"), "<h1>Hi</h1>").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;

        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for file watch event");
        assert!(event.unwrap().is_some(), "channel should not be closed");
    }
}

//! Installed applications from XDG desktop entries

use blockade_api::InstalledApp;
use blockade_host_api::{AppRegistry, HostResult};
use blockade_util::PackageId;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const DEFAULT_DATA_DIRS: &str = "/usr/local/share:/usr/share";

/// The launchable subset of a `.desktop` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopEntry {
    pub name: String,
    pub launchable: bool,
}

/// Parse the `[Desktop Entry]` group of a desktop file.
///
/// Launchable means `Type=Application` with an `Exec` line that is neither
/// hidden nor marked `NoDisplay`.
pub fn parse_desktop_entry(content: &str) -> Option<DesktopEntry> {
    let mut in_main_group = false;
    let mut name = None;
    let mut is_application = false;
    let mut has_exec = false;
    let mut hidden = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') {
            in_main_group = line == "[Desktop Entry]";
            continue;
        }
        if !in_main_group {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match (key.trim(), value.trim()) {
            ("Name", value) => name = Some(value.to_string()),
            ("Type", value) => is_application = value == "Application",
            ("Exec", value) => has_exec = !value.is_empty(),
            ("NoDisplay" | "Hidden", "true") => hidden = true,
            _ => {}
        }
    }

    Some(DesktopEntry {
        name: name?,
        launchable: is_application && has_exec && !hidden,
    })
}

/// Desktop file id: path below the `applications` dir, `/` replaced by `-`
fn desktop_file_id(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let id = relative.to_str()?.strip_suffix(".desktop")?;
    Some(id.replace('/', "-"))
}

fn collect_desktop_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_desktop_files(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "desktop") {
            out.push(path);
        }
    }
}

/// Application directories in precedence order: user data dir first, then
/// each entry of `$XDG_DATA_DIRS`
pub fn application_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    let data_home = std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(dirs::data_dir);
    if let Some(data_home) = data_home {
        dirs.push(data_home.join("applications"));
    }

    let data_dirs =
        std::env::var("XDG_DATA_DIRS").unwrap_or_else(|_| DEFAULT_DATA_DIRS.to_string());
    dirs.extend(
        data_dirs
            .split(':')
            .filter(|d| !d.is_empty())
            .map(|d| PathBuf::from(d).join("applications")),
    );

    dirs
}

/// App registry backed by desktop entries
#[derive(Debug, Clone)]
pub struct DesktopEntryRegistry {
    dirs: Vec<PathBuf>,
}

impl DesktopEntryRegistry {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Registry over the standard XDG application directories
    pub fn from_env() -> Self {
        Self::new(application_dirs())
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl AppRegistry for DesktopEntryRegistry {
    fn installed_apps(&self) -> HostResult<Vec<InstalledApp>> {
        // First directory to define an id wins, even if that entry is hidden
        let mut seen: BTreeMap<String, Option<String>> = BTreeMap::new();

        for dir in &self.dirs {
            let mut files = Vec::new();
            collect_desktop_files(dir, &mut files);
            trace!(dir = %dir.display(), count = files.len(), "Scanned application dir");

            for path in files {
                let Some(id) = desktop_file_id(dir, &path) else {
                    continue;
                };
                if seen.contains_key(&id) {
                    continue;
                }

                let entry = std::fs::read_to_string(&path)
                    .ok()
                    .and_then(|content| parse_desktop_entry(&content));
                let label = entry.filter(|e| e.launchable).map(|e| e.name);
                seen.insert(id, label);
            }
        }

        let mut apps: Vec<InstalledApp> = seen
            .into_iter()
            .filter_map(|(id, label)| {
                label.map(|label| InstalledApp {
                    package: PackageId::new(id),
                    label,
                })
            })
            .collect();
        apps.sort_by_key(|app| app.label.to_lowercase());

        debug!(count = apps.len(), "Enumerated installed apps");
        Ok(apps)
    }
}

//! Foreground detection through the sway IPC (`swaymsg`)

use blockade_host_api::{HostError, HostEvent, HostResult};
use blockade_util::PackageId;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const SWAYMSG: &str = "swaymsg";

/// Delay before re-subscribing after the event stream ends
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(2);

fn spawn_error(e: std::io::Error) -> HostError {
    match e.kind() {
        std::io::ErrorKind::NotFound => HostError::Unavailable(format!("{} not found", SWAYMSG)),
        std::io::ErrorKind::PermissionDenied => HostError::PermissionDenied(e.to_string()),
        _ => HostError::Io(e),
    }
}

/// Identify a window node: Wayland `app_id`, else the X11 class for XWayland
fn node_package(node: &Value) -> Option<PackageId> {
    let app_id = node.get("app_id").and_then(Value::as_str);
    let class = node
        .get("window_properties")
        .and_then(|props| props.get("class"))
        .and_then(Value::as_str);

    app_id
        .or(class)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(PackageId::new)
}

/// Find the focused window in a `get_tree` reply
pub fn focused_package(tree: &Value) -> Option<PackageId> {
    if tree.get("focused").and_then(Value::as_bool) == Some(true) {
        // A focused workspace or output has no app; nothing is in front
        return node_package(tree);
    }

    ["nodes", "floating_nodes"]
        .iter()
        .filter_map(|key| tree.get(*key).and_then(Value::as_array))
        .flatten()
        .find_map(focused_package)
}

/// Parse one line of `swaymsg -t subscribe -m '["window"]'` output.
///
/// Returns `Some(package)` for focus changes and None for any other event.
pub fn parse_window_event(line: &str) -> HostResult<Option<Option<PackageId>>> {
    let event: Value =
        serde_json::from_str(line).map_err(|e| HostError::Parse(e.to_string()))?;

    if event.get("change").and_then(Value::as_str) != Some("focus") {
        return Ok(None);
    }

    Ok(Some(event.get("container").and_then(node_package)))
}

/// Ask sway which app has focus
pub async fn query_foreground() -> HostResult<Option<PackageId>> {
    let output = Command::new(SWAYMSG)
        .args(["-t", "get_tree", "-r"])
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(spawn_error)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(HostError::Unavailable(format!(
            "swaymsg get_tree failed: {}",
            stderr.trim()
        )));
    }

    let tree: Value =
        serde_json::from_slice(&output.stdout).map_err(|e| HostError::Parse(e.to_string()))?;
    Ok(focused_package(&tree))
}

/// Whether the sway IPC socket is reachable
pub async fn is_ipc_available() -> bool {
    if std::env::var_os("SWAYSOCK").is_none() {
        return false;
    }

    match Command::new(SWAYMSG)
        .args(["-t", "get_version"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(e) => {
            debug!(error = %e, "swaymsg not runnable");
            false
        }
    }
}

/// Forward focus changes as `HostEvent::ForegroundChanged` until the receiver
/// goes away, re-subscribing whenever the stream ends.
pub async fn watch_focus(event_tx: mpsc::UnboundedSender<HostEvent>) {
    loop {
        match stream_focus_events(&event_tx).await {
            Ok(()) => debug!("sway event stream ended"),
            Err(e) => warn!(error = %e, "sway event subscription failed"),
        }

        if event_tx.is_closed() {
            break;
        }
        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
    }
}

async fn stream_focus_events(event_tx: &mpsc::UnboundedSender<HostEvent>) -> HostResult<()> {
    let mut child = Command::new(SWAYMSG)
        .args(["-t", "subscribe", "-m", r#"["window"]"#])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(spawn_error)?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| HostError::Internal("swaymsg stdout not captured".into()))?;
    let mut lines = BufReader::new(stdout).lines();

    info!("Subscribed to sway window events");

    while let Some(line) = lines.next_line().await? {
        match parse_window_event(&line) {
            Ok(Some(package)) => {
                debug!(package = ?package, "Focus changed");
                if event_tx
                    .send(HostEvent::ForegroundChanged { package })
                    .is_err()
                {
                    return Ok(());
                }
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Ignoring unparseable sway event"),
        }
    }

    let _ = child.wait().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree_with(focused_window: Value) -> Value {
        json!({
            "type": "root",
            "focused": false,
            "nodes": [{
                "type": "output",
                "focused": false,
                "nodes": [{
                    "type": "workspace",
                    "focused": false,
                    "nodes": [
                        { "type": "con", "focused": false, "app_id": "org.gnome.Nautilus" },
                    ],
                    "floating_nodes": [focused_window],
                }],
            }],
        })
    }

    #[test]
    fn finds_focused_wayland_window() {
        let tree = tree_with(json!({
            "type": "floating_con",
            "focused": true,
            "app_id": "org.mozilla.firefox",
        }));
        assert_eq!(
            focused_package(&tree),
            Some(PackageId::new("org.mozilla.firefox"))
        );
    }

    #[test]
    fn falls_back_to_x11_class() {
        let tree = tree_with(json!({
            "type": "floating_con",
            "focused": true,
            "app_id": null,
            "window_properties": { "class": "Steam", "instance": "steam" },
        }));
        assert_eq!(focused_package(&tree), Some(PackageId::new("Steam")));
    }

    #[test]
    fn focused_workspace_means_no_app() {
        let tree = json!({
            "type": "root",
            "focused": false,
            "nodes": [{ "type": "workspace", "focused": true, "nodes": [] }],
        });
        assert_eq!(focused_package(&tree), None);
    }

    #[test]
    fn window_focus_event_is_parsed() {
        let line = r#"{"change":"focus","container":{"app_id":"com.x","focused":true}}"#;
        assert_eq!(
            parse_window_event(line).unwrap(),
            Some(Some(PackageId::new("com.x")))
        );

        let line = r#"{"change":"title","container":{"app_id":"com.x"}}"#;
        assert_eq!(parse_window_event(line).unwrap(), None);

        assert!(parse_window_event("not json").is_err());
    }
}

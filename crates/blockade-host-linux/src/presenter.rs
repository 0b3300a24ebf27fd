//! Interstitial presentation by running an external command

use async_trait::async_trait;
use blockade_host_api::{AppRegistry, HostError, HostResult, InterruptionPresenter};
use blockade_util::PackageId;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Placeholder replaced by the blocked package id
pub const PACKAGE_PLACEHOLDER: &str = "{package}";

/// Placeholder replaced by the blocked app's display label
pub const LABEL_PLACEHOLDER: &str = "{label}";

/// Substitute the placeholders in every argument of the template
pub fn render_command(template: &[String], package: &PackageId, label: &str) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            arg.replace(PACKAGE_PLACEHOLDER, package.as_str())
                .replace(LABEL_PLACEHOLDER, label)
        })
        .collect()
}

/// A running interstitial, leader of its own process group
struct InterstitialProcess {
    child: Child,
    pgid: u32,
}

impl InterstitialProcess {
    fn spawn(argv: &[String]) -> HostResult<Self> {
        let Some((program, args)) = argv.split_first() else {
            return Err(HostError::PresentFailed("Empty presenter command".into()));
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // SAFETY: setsid is async-signal-safe
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid().map_err(|e| std::io::Error::other(e.to_string()))?;
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(|e| {
            HostError::PresentFailed(format!("Failed to spawn {}: {}", program, e))
        })?;

        // After setsid, pid == pgid
        let pgid = child.id();
        debug!(pgid = pgid, program = %program, "Interstitial spawned");

        Ok(Self { child, pgid })
    }

    fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    /// Send SIGTERM to the process group
    fn terminate(&self) -> HostResult<()> {
        let pgid = Pid::from_raw(-(self.pgid as i32));

        match signal::kill(pgid, Signal::SIGTERM) {
            Ok(()) => {
                debug!(pgid = self.pgid, "Sent SIGTERM to interstitial");
                Ok(())
            }
            Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(HostError::Internal(format!(
                "Failed to send SIGTERM: {}",
                e
            ))),
        }
    }

    /// Terminate if still running, then reap off the async runtime
    fn dismiss(mut self) {
        if self.has_exited() {
            return;
        }
        if let Err(e) = self.terminate() {
            warn!(pgid = self.pgid, error = %e, "Failed to dismiss interstitial");
        }
        tokio::task::spawn_blocking(move || {
            let _ = self.child.wait();
        });
    }
}

/// Presents the interstitial by running a configured argv template.
///
/// At most one interstitial is kept on screen: presenting again replaces the
/// previous one.
pub struct CommandPresenter {
    template: Vec<String>,
    registry: Option<Arc<dyn AppRegistry>>,
    current: Mutex<Option<InterstitialProcess>>,
}

impl CommandPresenter {
    pub fn new(template: Vec<String>) -> Self {
        Self {
            template,
            registry: None,
            current: Mutex::new(None),
        }
    }

    /// Resolve `{label}` through an app registry instead of the raw package id
    pub fn with_registry(mut self, registry: Arc<dyn AppRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn template(&self) -> &[String] {
        &self.template
    }

    fn label_for(&self, package: &PackageId) -> String {
        self.registry
            .as_ref()
            .and_then(|registry| registry.label_for(package))
            .unwrap_or_else(|| package.to_string())
    }

    /// Process group of the interstitial currently on screen
    pub fn current_pgid(&self) -> Option<u32> {
        let mut current = self.current.lock().ok()?;
        match current.as_mut() {
            Some(process) => {
                if !process.has_exited() {
                    Some(process.pgid)
                } else {
                    None
                }
            }
            None => None,
        }
    }

    /// Take down the interstitial, if one is showing
    pub fn dismiss(&self) {
        let previous = match self.current.lock() {
            Ok(mut current) => current.take(),
            Err(_) => return,
        };
        if let Some(process) = previous {
            process.dismiss();
        }
    }
}

#[async_trait]
impl InterruptionPresenter for CommandPresenter {
    async fn present(&self, package: &PackageId) -> HostResult<()> {
        let label = self.label_for(package);
        let argv = render_command(&self.template, package, &label);

        let mut current = self
            .current
            .lock()
            .map_err(|_| HostError::Internal("presenter state poisoned".into()))?;

        if let Some(previous) = current.take() {
            previous.dismiss();
        }

        let process = InterstitialProcess::spawn(&argv)?;
        info!(package = %package, label = %label, pgid = process.pgid, "Interstitial presented");
        *current = Some(process);

        Ok(())
    }
}

impl Drop for CommandPresenter {
    fn drop(&mut self) {
        if let Ok(current) = self.current.get_mut()
            && let Some(process) = current.as_ref()
        {
            let _ = process.terminate();
        }
    }
}

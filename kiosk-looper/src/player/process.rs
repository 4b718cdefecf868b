//! Player that runs an external decoder process per item

use super::Player;
use crate::error::{Error, Result};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use tracing::{debug, warn};

/// Spawns `<command> <args...> <item>` and tracks the child process
#[derive(Debug)]
pub struct ProcessPlayer {
    command: String,
    args: Vec<String>,
    child: Option<Child>,
}

impl ProcessPlayer {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            child: None,
        }
    }
}

impl Player for ProcessPlayer {
    fn play(&mut self, item: &Path) -> Result<()> {
        if !item.exists() {
            return Err(Error::Player(format!("{} does not exist", item.display())));
        }
        // A previous child is replaced, never left running alongside
        self.stop();

        let child = Command::new(&self.command)
            .args(&self.args)
            .arg(item)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Player(format!("failed to start {}: {}", self.command, e)))?;
        debug!("Started {} (pid {}) for {}", self.command, child.id(), item.display());
        self.child = Some(child);
        Ok(())
    }

    fn is_playing(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!("Player process exited with {}", status);
                self.child = None;
                false
            }
            Err(e) => {
                warn!("Cannot poll player process: {}", e);
                self.child = None;
                false
            }
        }
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!("Player process already gone: {}", e);
            }
            let _ = child.wait();
        }
    }
}

impl Drop for ProcessPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Process Controller and Schema Migration Runner
//!
//! Both are external commands with a success/failure signal only. Output is
//! captured for error messages, never parsed.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::errors::{LifecycleError, LifecycleResult};

/// Service fleet control
#[async_trait]
pub trait ProcessController: Send + Sync {
    async fn stop_all(&self) -> LifecycleResult<()>;
    async fn start_all(&self) -> LifecycleResult<()>;
    /// Human-readable fleet status
    async fn status(&self) -> LifecycleResult<String>;
}

/// External schema migration job
#[async_trait]
pub trait SchemaMigrator: Send + Sync {
    async fn migrate(&self) -> LifecycleResult<()>;
}

/// An external command as an argv array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            cwd: None,
        }
    }

    pub fn display(&self) -> String {
        self.argv.join(" ")
    }

    /// Run to completion, returning stdout on a zero exit status
    pub async fn run(&self) -> LifecycleResult<String> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| LifecycleError::command_failed("empty command"))?;

        let mut command = Command::new(program);
        command.args(args);
        if let Some(ref cwd) = self.cwd {
            command.current_dir(cwd);
        }

        let output = command.output().await.map_err(|e| {
            LifecycleError::command_failed(format!("'{}' failed to spawn: {}", self.display(), e))
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(LifecycleError::command_failed(format!(
                "'{}' exited with {}: {}",
                self.display(),
                output.status,
                tail(&String::from_utf8_lossy(&output.stderr), 512)
            )))
        }
    }
}

fn tail(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        trimmed.to_string()
    } else {
        trimmed.chars().skip(count - max_chars).collect()
    }
}

/// Process controller driven by configured commands (e.g. `pm2 stop all`)
#[derive(Debug, Clone)]
pub struct CommandProcessController {
    pub stop: CommandSpec,
    pub start: CommandSpec,
    pub status: CommandSpec,
}

#[async_trait]
impl ProcessController for CommandProcessController {
    async fn stop_all(&self) -> LifecycleResult<()> {
        self.stop.run().await.map(|_| ())
    }

    async fn start_all(&self) -> LifecycleResult<()> {
        self.start.run().await.map(|_| ())
    }

    async fn status(&self) -> LifecycleResult<String> {
        self.status.run().await
    }
}

/// Schema migrations run as an external batch command
#[derive(Debug, Clone)]
pub struct CommandSchemaMigrator {
    pub command: CommandSpec,
}

#[async_trait]
impl SchemaMigrator for CommandSchemaMigrator {
    async fn migrate(&self) -> LifecycleResult<()> {
        self.command
            .run()
            .await
            .map(|_| ())
            .map_err(|e| LifecycleError::migration_failed(e.message().to_string()))
    }
}

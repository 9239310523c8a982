// src/exec/task_runner.rs

//! Shell-command block runner.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::block::{Block, BlockId, TaskId};
use crate::engine::BlockOutcome;
use crate::exec::BlockWorker;
use crate::task::PreCheck;

/// Environment variable carrying the task id of the block being processed.
pub const TASK_ID_ENV: &str = "BLOCKWISE_TASK_ID";
/// Environment variable carrying the block id of the block being processed.
pub const BLOCK_ID_ENV: &str = "BLOCKWISE_BLOCK_ID";

/// Runs each task's shell command once per block.
///
/// The block's identity is passed through [`TASK_ID_ENV`] and
/// [`BLOCK_ID_ENV`]; exit status 0 means success.
#[derive(Debug, Clone, Default)]
pub struct CommandWorker {
    commands: HashMap<TaskId, String>,
}

impl CommandWorker {
    pub fn new(commands: impl IntoIterator<Item = (TaskId, String)>) -> Self {
        Self {
            commands: commands.into_iter().collect(),
        }
    }
}

impl BlockWorker for CommandWorker {
    fn process<'a>(
        &'a self,
        block: &'a Block,
    ) -> Pin<Box<dyn Future<Output = Result<BlockOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let cmd = self
                .commands
                .get(&block.task_id)
                .with_context(|| format!("no command configured for task '{}'", block.task_id))?;
            run_block_command(cmd, block).await
        })
    }
}

/// Run `cmd` for a single block, logging its output at debug level.
pub async fn run_block_command(cmd: &str, block: &Block) -> Result<BlockOutcome> {
    info!(
        task = %block.task_id,
        block = block.block_id,
        cmd = %cmd,
        "starting block process"
    );

    // Build a shell command appropriate for the platform.
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .env(TASK_ID_ENV, &block.task_id)
        .env(BLOCK_ID_ENV, block.block_id.to_string())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning process for block {block}"))?;

    // Always consume both pipes so buffers don't fill.
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(log_lines(
            stdout,
            block.task_id.clone(),
            block.block_id,
            "stdout",
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(log_lines(
            stderr,
            block.task_id.clone(),
            block.block_id,
            "stderr",
        )));
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of block {block}"))?;

    for reader in readers {
        let _ = reader.await;
    }

    let code = status.code().unwrap_or(-1);
    info!(
        task = %block.task_id,
        block = block.block_id,
        exit_code = code,
        success = status.success(),
        "block process exited"
    );

    Ok(if status.success() {
        BlockOutcome::Success
    } else {
        BlockOutcome::Failed(code)
    })
}

async fn log_lines<R>(reader: R, task: TaskId, block: BlockId, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(task = %task, block, stream, "{}", line);
    }
}

/// A [`PreCheck`] that runs `cmd` synchronously for the block; exit status 0
/// means the block is already done.
pub fn command_pre_check(cmd: String) -> impl PreCheck {
    move |block: &Block| -> Result<bool> {
        let mut command = if cfg!(windows) {
            let mut c = std::process::Command::new("cmd");
            c.arg("/C").arg(&cmd);
            c
        } else {
            let mut c = std::process::Command::new("sh");
            c.arg("-c").arg(&cmd);
            c
        };

        let status = command
            .env(TASK_ID_ENV, &block.task_id)
            .env(BLOCK_ID_ENV, block.block_id.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("running pre-check for block {block}"))?;

        debug!(
            task = %block.task_id,
            block = block.block_id,
            done = status.success(),
            "pre-check command finished"
        );
        Ok(status.success())
    }
}

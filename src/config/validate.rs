// src/config/validate.rs

use crate::config::model::{task_order, ConfigFile, RawConfigFile};
use crate::errors::{Result, SchedulerError};
use crate::types::BlockLink;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SchedulerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.task))
    }
}

/// Run every semantic check on a raw config.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_tasks(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(SchedulerError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.num_workers == 0 {
        return Err(SchedulerError::ConfigError(
            "[config].num_workers must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.blocks == 0 {
            return Err(SchedulerError::ConfigError(format!(
                "task '{}' must have at least one block (got 0)",
                name
            )));
        }
        if task.cmd.trim().is_empty() {
            return Err(SchedulerError::ConfigError(format!(
                "task '{}' has an empty `cmd`",
                name
            )));
        }
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            let Some(upstream) = cfg.task.get(dep) else {
                return Err(SchedulerError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            };
            if dep == name {
                return Err(SchedulerError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            if task.link == BlockLink::Pointwise && upstream.blocks != task.blocks {
                return Err(SchedulerError::ConfigError(format!(
                    "task '{}' has {} blocks but its pointwise dependency '{}' has {}",
                    name, task.blocks, dep, upstream.blocks
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    task_order(&cfg.task).map(|_order| ())
}

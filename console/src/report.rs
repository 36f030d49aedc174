//! CSV history exports
//!
//! The server renders the reports; this module fetches them and writes them
//! under their server-side file name.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

use crate::errors::{ConsoleError, Result};
use crate::http::api::{execution_report_name, schedules_report_name};
use crate::http::VmApi;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportKind {
    /// Every execution of one VM, oldest first
    Executions { vm_id: String },
    /// Schedules of the VMs of a node, with their last execution
    Schedules { node_id: String },
}

impl ReportKind {
    pub fn file_name(&self) -> String {
        match self {
            ReportKind::Executions { vm_id } => execution_report_name(vm_id),
            ReportKind::Schedules { node_id } => schedules_report_name(node_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub file_name: String,
    pub content: String,
}

#[derive(Clone)]
pub struct ReportExporter {
    api: VmApi,
}

impl ReportExporter {
    pub fn new(api: VmApi) -> Self {
        Self { api }
    }

    pub async fn fetch(&self, kind: &ReportKind) -> Result<Report> {
        let content = match kind {
            ReportKind::Executions { vm_id } => self.api.execution_report(vm_id).await?,
            ReportKind::Schedules { node_id } => self.api.schedules_report(node_id).await?,
        };
        Ok(Report {
            file_name: kind.file_name(),
            content,
        })
    }

    /// Download the report into `dir` and return the written path
    #[instrument(skip(self, dir))]
    pub async fn export(&self, kind: &ReportKind, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let report = self.fetch(kind).await?;
        let path = dir.as_ref().join(&report.file_name);
        fs::write(&path, report.content.as_bytes())
            .await
            .map_err(|e| ConsoleError::ReportWrite {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        info!("Wrote {} ({} bytes)", path.display(), report.content.len());
        Ok(path)
    }
}

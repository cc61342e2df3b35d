//! services/tracker/src/dispatch.rs
//!
//! Campaign dispatch: turns a recipient list into targets and pools, delivers
//! one message per recipient, and records the `Sent` milestone for every
//! successful delivery. Deliveries that fail are collected so they can be
//! written to a failure log and retried later.

use chrono::{DateTime, Local, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use phishing_core::domain::{Pool, Status, Target};
use phishing_core::ports::{MessageSender, OutgoingMessage, PoolStore, PortError, TargetStore};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::templating::fill;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Line {line}: expected 2 columns, found {found}")]
    WrongColumnCount { line: usize, found: usize },
    #[error("Line {line}: invalid email address {address:?}")]
    InvalidAddress { line: usize, address: String },
    #[error("Email address present twice: {0:?} (ignore duplicates if this is desired)")]
    DuplicateAddress(String),
    #[error("Line {line}: malformed failure record")]
    MalformedFailure { line: usize },
    #[error("No message templates configured")]
    NoTemplates,
    #[error("Unknown message template {0:?}")]
    UnknownTemplate(String),
    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid templates file: {0}")]
    Templates(#[from] serde_json::Error),
    #[error("Port error: {0}")]
    Port(#[from] PortError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//=========================================================================================
// Message Templates
//=========================================================================================

/// One campaign message variant. Bodies may use the `{target_id}` and
/// `{pool_id}` placeholders to build tracking links.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageTemplate {
    pub subject: String,
    pub from: String,
    pub text: String,
    pub html: String,
}

/// Template name -> template, in name order.
pub type Templates = BTreeMap<String, MessageTemplate>;

pub fn load_templates(path: &Path) -> Result<Templates, DispatchError> {
    let raw = std::fs::read_to_string(path)?;
    let templates: Templates = serde_json::from_str(&raw)?;
    if templates.is_empty() {
        return Err(DispatchError::NoTemplates);
    }
    Ok(templates)
}

impl MessageTemplate {
    pub fn render(&self, address: &str, target: &Target, pool: &Pool) -> OutgoingMessage {
        let values = [("target_id", target.id.as_str()), ("pool_id", pool.id.as_str())];
        OutgoingMessage {
            from: self.from.clone(),
            to: address.to_string(),
            subject: fill(&self.subject, &values),
            text: fill(&self.text, &values),
            html: fill(&self.html, &values),
        }
    }
}

//=========================================================================================
// Recipients
//=========================================================================================

/// Group name -> addresses, in file order.
pub type Groups = BTreeMap<String, Vec<String>>;

/// Reads comma-separated rows with standard quoting. Rows may have any
/// number of fields; callers check the count themselves.
fn csv_rows(text: &str) -> impl Iterator<Item = Result<(usize, StringRecord), csv::Error>> + '_ {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes())
        .into_records()
        .enumerate()
        .map(|(i, record)| {
            let record = record?;
            let line = record.position().map_or(i + 1, |p| p.line() as usize);
            Ok((line, record))
        })
}

/// Parses `address,group` lines. Blank lines are skipped.
pub fn parse_recipients(text: &str, ignore_duplicates: bool) -> Result<Groups, DispatchError> {
    let mut groups = Groups::new();
    let mut seen = HashSet::new();

    for row in csv_rows(text) {
        let (line, record) = row?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let (Some(address), Some(group), 2) = (record.get(0), record.get(1), record.len()) else {
            return Err(DispatchError::WrongColumnCount { line, found: record.len() });
        };
        if address.parse::<lettre::Address>().is_err() {
            return Err(DispatchError::InvalidAddress { line, address: address.to_string() });
        }
        if !seen.insert(address.to_string()) && !ignore_duplicates {
            return Err(DispatchError::DuplicateAddress(address.to_string()));
        }
        groups.entry(group.to_string()).or_default().push(address.to_string());
    }

    Ok(groups)
}

/// The addresses one pool's message goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub group: String,
    pub template: String,
    pub addresses: Vec<String>,
}

/// Shuffles every group, then deals its addresses round-robin over the
/// templates: template `i` of `n` gets positions `i, i + n, i + 2n, ...`.
pub fn assign_templates<R: Rng + ?Sized>(
    groups: Groups,
    template_names: &[String],
    rng: &mut R,
) -> Vec<Assignment> {
    let n = template_names.len();
    let mut assignments = Vec::new();
    for (group, mut addresses) in groups {
        addresses.shuffle(rng);
        for (i, template) in template_names.iter().enumerate() {
            assignments.push(Assignment {
                group: group.clone(),
                template: template.clone(),
                addresses: addresses.iter().skip(i).step_by(n).cloned().collect(),
            });
        }
    }
    assignments
}

//=========================================================================================
// Failure Log
//=========================================================================================

/// A delivery that did not go through. The target and pool already exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub address: String,
    pub target_id: String,
    pub pool_id: String,
}

/// Writes one `address,target_id,pool_id` row per failure.
pub fn write_failures<W: Write>(writer: W, failures: &[Failure]) -> Result<(), DispatchError> {
    let mut out = csv::Writer::from_writer(writer);
    for f in failures {
        out.write_record([&f.address, &f.target_id, &f.pool_id])?;
    }
    out.flush()?;
    Ok(())
}

pub fn parse_failures(text: &str) -> Result<Vec<Failure>, DispatchError> {
    let mut failures = Vec::new();
    for row in csv_rows(text) {
        let (line, record) = row?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let (Some(address), Some(target_id), Some(pool_id), 3) =
            (record.get(0), record.get(1), record.get(2), record.len())
        else {
            return Err(DispatchError::MalformedFailure { line });
        };
        failures.push(Failure {
            address: address.to_string(),
            target_id: target_id.to_string(),
            pool_id: pool_id.to_string(),
        });
    }
    Ok(failures)
}

/// `failures.<YYYY_MM_DD_HH_MM_SS>.csv`
pub fn failure_log_name(now: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!("failures.{}.csv", now.format("%Y_%m_%d_%H_%M_%S")))
}

//=========================================================================================
// Dispatcher
//=========================================================================================

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub sent: usize,
    pub failures: Vec<Failure>,
}

pub struct Dispatcher {
    targets: Arc<dyn TargetStore>,
    pools: Arc<dyn PoolStore>,
    sender: Arc<dyn MessageSender>,
    templates: Templates,
}

impl Dispatcher {
    pub fn new(
        targets: Arc<dyn TargetStore>,
        pools: Arc<dyn PoolStore>,
        sender: Arc<dyn MessageSender>,
        templates: Templates,
    ) -> Self {
        Self {
            targets,
            pools,
            sender,
            templates,
        }
    }

    pub fn template_names(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    /// Delivers every assignment. One target is created per address, whether
    /// or not its delivery succeeds.
    pub async fn send_campaign(
        &self,
        assignments: &[Assignment],
    ) -> Result<DispatchReport, DispatchError> {
        let total: usize = assignments.iter().map(|a| a.addresses.len()).sum();
        let mut report = DispatchReport::default();
        let mut i = 0;

        for assignment in assignments {
            let pool = self
                .pools
                .get_or_create(&assignment.group, &assignment.template)
                .await?;

            for address in &assignment.addresses {
                let target = self.targets.create_target().await?;
                i += 1;
                info!(
                    "[{}/{}] Sending email to {:?} (group={:?}, template={:?})",
                    i, total, address, pool.group, pool.template
                );
                self.deliver_or_record(address, &target, &pool, &mut report).await?;
            }
        }

        Ok(report)
    }

    /// Retries failed deliveries against their existing target and pool.
    pub async fn resend(&self, failures: &[Failure]) -> Result<DispatchReport, DispatchError> {
        let mut report = DispatchReport::default();
        for (i, failure) in failures.iter().enumerate() {
            let target = self.targets.get_target(&failure.target_id).await?;
            let pool = self.pools.get_pool(&failure.pool_id).await?;
            info!("[{}/{}] Resending email to {:?}", i + 1, failures.len(), failure.address);
            self.deliver_or_record(&failure.address, &target, &pool, &mut report).await?;
        }
        Ok(report)
    }

    async fn deliver_or_record(
        &self,
        address: &str,
        target: &Target,
        pool: &Pool,
        report: &mut DispatchReport,
    ) -> Result<(), DispatchError> {
        match self.deliver(address, target, pool).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                error!("Failed: {}", e);
                report.failures.push(Failure {
                    address: address.to_string(),
                    target_id: target.id.clone(),
                    pool_id: pool.id.clone(),
                });
            }
        }
        Ok(())
    }

    async fn deliver(&self, address: &str, target: &Target, pool: &Pool) -> Result<(), DispatchError> {
        let template = self
            .templates
            .get(&pool.template)
            .ok_or_else(|| DispatchError::UnknownTemplate(pool.template.clone()))?;

        self.sender.send(template.render(address, target, pool)).await?;

        let reached = self.targets.upgrade(&target.id, Status::Sent, Utc::now()).await?;
        self.pools.increment_statuses(&pool.id, &reached).await?;
        Ok(())
    }
}

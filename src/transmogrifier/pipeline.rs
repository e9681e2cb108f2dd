//! Reconfigure pipeline
//!
//! Selects transmogrifiers from the command line, orders them so that
//! requirements run first, and applies them only when every check passes.

use super::architecture_change::ArchitectureChange;
use super::bdr4pgd5::Bdr4Pgd5;
use super::common::Common;
use super::framework::{ReconfigureArgs, Transmogrifier, TransmogrifierKind};
use super::replace_2q::Replace2qRepositories;
use super::repositories::Repositories;
use super::report::CheckResult;
use crate::cluster::Cluster;
use crate::error::{Error, Result};
use tracing::{debug, info};

pub type BoxedTransmogrifier = Box<dyn Transmogrifier>;

/// Construct the transmogrifier for `kind` from the command line
pub fn build(kind: TransmogrifierKind, args: &ReconfigureArgs) -> Result<BoxedTransmogrifier> {
    Ok(match kind {
        TransmogrifierKind::Common => Box::new(Common::from_args(args)?),
        TransmogrifierKind::Replace2qRepositories => {
            Box::new(Replace2qRepositories::from_args(args)?)
        }
        TransmogrifierKind::Repositories => Box::new(Repositories::from_args(args)?),
        TransmogrifierKind::Bdr4Pgd5 => Box::new(Bdr4Pgd5::from_args(args)?),
        TransmogrifierKind::ArchitectureChange => Box::new(ArchitectureChange::from_args(args)?),
    })
}

/// Every transmogrifier selected by `args`, plus whatever they require,
/// ordered for application
pub fn transmogrifiers_from_args(args: &ReconfigureArgs) -> Result<Vec<BoxedTransmogrifier>> {
    let mut selected: Vec<BoxedTransmogrifier> = vec![build(TransmogrifierKind::Common, args)?];
    for kind in TransmogrifierKind::ALL {
        if kind != TransmogrifierKind::Common && kind.is_triggered(args) {
            selected.push(build(kind, args)?);
        }
    }

    // Requirements can add requirements of their own
    let mut i = 0;
    while i < selected.len() {
        for kind in selected[i].all_required() {
            if !selected.iter().any(|t| t.kind() == kind) {
                debug!("{} requires {}", selected[i].kind(), kind);
                selected.push(build(kind, args)?);
            }
        }
        i += 1;
    }

    sort_by_requirements(selected)
}

/// Order transmogrifiers so that each runs after everything it requires,
/// keeping the natural kind order where requirements allow
pub fn sort_by_requirements(
    mut pending: Vec<BoxedTransmogrifier>,
) -> Result<Vec<BoxedTransmogrifier>> {
    pending.sort_by_key(|t| t.kind());
    let mut sorted: Vec<BoxedTransmogrifier> = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let next = pending.iter().position(|t| {
            t.requires().iter().all(|req| {
                sorted.iter().any(|s| s.kind() == *req)
                    || !pending.iter().any(|p| p.kind() == *req)
            })
        });
        match next {
            Some(index) => sorted.push(pending.remove(index)),
            None => {
                let names: Vec<String> = pending.iter().map(|t| t.kind().to_string()).collect();
                return Err(Error::Transmogrifier(format!(
                    "Circular requirements between transmogrifiers: {}",
                    names.join(", ")
                )));
            }
        }
    }
    Ok(sorted)
}

/// Every transmogrifier must have the options it needs, whether or not it
/// has anything to change
fn ensure_ready(cluster: &Cluster, transmogrifiers: &[BoxedTransmogrifier]) -> Result<()> {
    for t in transmogrifiers {
        if !t.is_ready(cluster) {
            let flags: Vec<&str> = t.kind().options().iter().map(|o| o.flag).collect();
            return Err(Error::Transmogrifier(format!(
                "{} needs more options; please specify {}",
                t.kind(),
                flags.join(", ")
            )));
        }
    }
    Ok(())
}

fn applicable<'a>(
    cluster: &Cluster,
    transmogrifiers: &'a [BoxedTransmogrifier],
) -> Vec<&'a BoxedTransmogrifier> {
    transmogrifiers
        .iter()
        .filter(|t| t.is_applicable(cluster))
        .collect()
}

fn check_each(cluster: &Cluster, selected: &[&BoxedTransmogrifier]) -> CheckResult {
    let mut result = CheckResult::new();
    for t in selected {
        result.absorb(t.check(cluster));
    }
    result
}

/// Combined check of every applicable transmogrifier
pub fn check(cluster: &Cluster, transmogrifiers: &[BoxedTransmogrifier]) -> Result<CheckResult> {
    ensure_ready(cluster, transmogrifiers)?;
    Ok(check_each(cluster, &applicable(cluster, transmogrifiers)))
}

/// Human-readable summary of what `apply` would change
pub fn describe(cluster: &Cluster, transmogrifiers: &[BoxedTransmogrifier]) -> String {
    let descriptions: Vec<String> = applicable(cluster, transmogrifiers)
        .into_iter()
        .map(|t| t.description(cluster))
        .filter(|d| !d.is_empty())
        .map(|d| d.to_string())
        .collect();
    if descriptions.is_empty() {
        "No changes\n".to_string()
    } else {
        descriptions.join("\n")
    }
}

/// Check, then apply, every applicable transmogrifier in order
///
/// Nothing is changed unless all checks pass. Only the transmogrifiers
/// that were checked are applied; one of those is skipped when an earlier
/// step has already made its change.
pub fn apply(
    cluster: &mut Cluster,
    transmogrifiers: &[BoxedTransmogrifier],
) -> Result<CheckResult> {
    if transmogrifiers.is_empty() {
        return Err(Error::Configure("Nothing to do".into()));
    }

    ensure_ready(cluster, transmogrifiers)?;
    let selected = applicable(cluster, transmogrifiers);
    let result = check_each(cluster, &selected);
    if result.has_errors() {
        return Err(Error::Transmogrifier(result.to_string().trim_end().to_string()));
    }

    for t in selected {
        if t.is_applicable(cluster) {
            info!("Applying {} to {}", t.kind(), cluster.name);
            t.apply(cluster)?;
        } else {
            debug!("Skipping {}: nothing left to change", t.kind());
        }
    }
    Ok(result)
}

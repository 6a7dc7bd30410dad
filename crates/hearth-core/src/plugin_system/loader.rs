use std::fmt;
use std::sync::Arc;

use crate::plugin_system::activator::Activator;
use crate::plugin_system::dependency::{DependencyMap, resolve_order};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::scanner::{PackageScanner, ScanReport};
use crate::utils::error_chain;

/// Lifecycle of the staged loader. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoaderState {
    None,
    Scanned,
    PreLoaded,
    FullyLoaded,
}

impl fmt::Display for LoaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderState::None => write!(f, "None"),
            LoaderState::Scanned => write!(f, "Scanned"),
            LoaderState::PreLoaded => write!(f, "PreLoaded"),
            LoaderState::FullyLoaded => write!(f, "FullyLoaded"),
        }
    }
}

/// Outcome of a successful scan, with display names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub pre_order: Vec<String>,
    pub post_order: Vec<String>,
    pub no_load: Vec<String>,
    pub skipped: usize,
}

/// Outcome of one load stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    pub activated: Vec<String>,
    /// Package name and rendered error chain
    pub failed: Vec<(String, String)>,
}

#[derive(Debug)]
struct LoadPlan {
    pre_order: Vec<String>,
    post_order: Vec<String>,
    report: ScanReport,
}

impl LoadPlan {
    fn release(&mut self, keys: &[String]) -> usize {
        keys.iter().filter_map(|key| self.report.take_package(key)).count()
    }
}

/// Drives scan -> pre-world stage -> post-world stage.
#[derive(Debug)]
pub struct StagedLoader {
    state: LoaderState,
    scanner: PackageScanner,
    activator: Activator,
    registry: Arc<PluginRegistry>,
    plan: Option<LoadPlan>,
}

impl StagedLoader {
    pub fn new(scanner: PackageScanner, activator: Activator, registry: Arc<PluginRegistry>) -> Self {
        Self {
            state: LoaderState::None,
            scanner,
            activator,
            registry,
            plan: None,
        }
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Scan the plugins directory and resolve both stage orders.
    ///
    /// Legal only before any scan. On failure the state is unchanged, so the
    /// scan may be retried.
    pub fn scan(&mut self) -> Result<ScanSummary, PluginSystemError> {
        if self.state != LoaderState::None {
            return Err(PluginSystemError::InvalidLoaderState {
                operation: "scan".to_string(),
                state: self.state,
            });
        }

        let report = self.scanner.scan().map_err(|e| {
            log::error!("Scan of {} failed: {}", self.scanner.plugin_dir().display(), error_chain(&e));
            e
        })?;
        let pre_order = resolve_stage("pre", &report.pre)?;
        let post_order = resolve_stage("post", &report.post)?;

        let summary = ScanSummary {
            pre_order: pre_order.iter().map(|k| report.display_name(k)).collect(),
            post_order: post_order.iter().map(|k| report.display_name(k)).collect(),
            no_load: report.no_load.values().cloned().collect(),
            skipped: report.skipped.len(),
        };
        log::info!(
            "Scan complete: {} pre-world, {} post-world, {} no-load, {} skipped",
            summary.pre_order.len(),
            summary.post_order.len(),
            summary.no_load.len(),
            summary.skipped
        );

        self.plan = Some(LoadPlan {
            pre_order,
            post_order,
            report,
        });
        self.state = LoaderState::Scanned;
        Ok(summary)
    }

    /// Activate every package of one stage in dependency order.
    ///
    /// `pre = true` is legal only right after the scan; `pre = false` after the
    /// scan or the pre stage. Per-package failures are reported, not fatal, and
    /// the state advances regardless.
    pub async fn load_stage(&mut self, pre: bool) -> Result<StageReport, PluginSystemError> {
        let stage = if pre { "pre" } else { "post" };
        let legal = match self.state {
            LoaderState::Scanned => true,
            LoaderState::PreLoaded => !pre,
            LoaderState::None | LoaderState::FullyLoaded => false,
        };
        if !legal {
            return Err(PluginSystemError::InvalidLoaderState {
                operation: format!("load the {} stage", stage),
                state: self.state,
            });
        }
        let mut plan = self
            .plan
            .take()
            .ok_or_else(|| PluginSystemError::InternalError("scan results missing".to_string()))?;

        if !pre && self.state == LoaderState::Scanned && !plan.pre_order.is_empty() {
            let pre_order = std::mem::take(&mut plan.pre_order);
            let released = plan.release(&pre_order);
            log::warn!("Pre-world stage skipped; released {} pre-world package(s)", released);
        }

        let order = if pre {
            std::mem::take(&mut plan.pre_order)
        } else {
            std::mem::take(&mut plan.post_order)
        };
        log::info!("Loading {} stage: {} package(s)", stage, order.len());

        let mut report = StageReport::default();
        for key in &order {
            let Some(package) = plan.report.take_package(key) else {
                log::warn!("Package '{}' has no open context; skipping", key);
                report.failed.push((key.clone(), "no open context".to_string()));
                continue;
            };
            let name = package.descriptor.name().to_string();
            match self.activator.activate(&name, package.context, &self.registry).await {
                Ok(_) => report.activated.push(name),
                Err(e) => {
                    let chain = error_chain(&e);
                    log::error!("Could not activate '{}': {}", name, chain);
                    report.failed.push((name, chain));
                }
            }
        }

        // whatever is left of this stage will never load
        let leftover: Vec<String> = if pre {
            plan.report.pre.keys().cloned().collect()
        } else {
            plan.report.post.keys().cloned().collect()
        };
        plan.release(&leftover);

        self.state = if pre {
            LoaderState::PreLoaded
        } else {
            LoaderState::FullyLoaded
        };
        if pre {
            self.plan = Some(plan);
        }
        log::info!(
            "{} stage finished: {} activated, {} failed",
            stage,
            report.activated.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

fn resolve_stage(stage: &str, map: &DependencyMap) -> Result<Vec<String>, PluginSystemError> {
    resolve_order(map).map_err(|source| {
        log::error!("Cannot order the {} stage: {}", stage, source);
        PluginSystemError::StageResolution {
            stage: stage.to_string(),
            source,
        }
    })
}

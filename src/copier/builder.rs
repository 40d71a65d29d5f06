//! Assembles a deployable package of renamed copies
//!
//! Bodies are retrieved once per kind, parsed into [`MetadataBody`], renamed
//! against the names already present in the target folder, and written into a
//! [`DeployPackage`]. Dashboards are re-pointed at the copies of the reports
//! they use. Problems with a single item become [`BuildWarning`]s; only
//! org-level failures abort the build.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use log::{debug, info, warn};

use super::renamer::{ExistingNames, RenamePolicy};
use super::selector::Selector;
use super::CopyRequest;
use crate::api::OrgApi;
use crate::error::{CopierError, CopierResult};
use crate::metadata::{
    DeployPackage, FolderRef, ItemKind, MetadataBody, PackageManifest, split_full_name,
};

/// An item left out of the package, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildWarning {
    pub kind: ItemKind,
    pub full_name: String,
    pub reason: String,
}

impl BuildWarning {
    fn from_error(kind: ItemKind, full_name: &str, error: CopierError) -> Self {
        let reason = match error {
            CopierError::MetadataRetrieval { reason, .. }
            | CopierError::UnsupportedComponent { reason, .. } => reason,
            other => other.to_string(),
        };
        Self {
            kind,
            full_name: full_name.to_string(),
            reason,
        }
    }
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' skipped: {}", self.kind, self.full_name, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedItem {
    pub kind: ItemKind,
    pub source: String,
    pub target: String,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub package: DeployPackage,
    pub warnings: Vec<BuildWarning>,
    pub renames: Vec<RenamedItem>,
}

impl BuildOutcome {
    /// New full name of a copied source component
    pub fn renamed(&self, kind: ItemKind, source: &str) -> Option<&str> {
        self.renames
            .iter()
            .find(|r| r.kind == kind && r.source == source)
            .map(|r| r.target.as_str())
    }
}

struct StagedReport {
    target: String,
    label: String,
    xml: String,
}

pub struct PackageBuilder<'a> {
    api: &'a dyn OrgApi,
    policy: RenamePolicy,
}

impl<'a> PackageBuilder<'a> {
    pub fn new(api: &'a dyn OrgApi, policy: RenamePolicy) -> Self {
        Self { api, policy }
    }

    pub async fn build_package(&self, request: &CopyRequest) -> CopierResult<BuildOutcome> {
        let mut selected_reports = BTreeSet::new();
        let mut selected_dashboards = BTreeSet::new();
        for item in &request.items {
            match item.kind {
                ItemKind::Report => selected_reports.insert(item.full_name.clone()),
                ItemKind::Dashboard => selected_dashboards.insert(item.full_name.clone()),
            };
        }

        let dashboard_target = match (&request.targets.dashboards, selected_dashboards.is_empty()) {
            (Some(target), _) => Some(target),
            (None, true) => None,
            (None, false) => {
                return Err(CopierError::Config(
                    "a dashboard target folder is required to copy dashboards".to_string(),
                ));
            }
        };
        let report_target = &request.targets.reports;
        let mut warnings = Vec::new();

        info!(
            "Building package: {} report(s), {} dashboard(s) selected",
            selected_reports.len(),
            selected_dashboards.len()
        );

        let dashboards = self
            .fetch_bodies(ItemKind::Dashboard, &selected_dashboards, &mut warnings)
            .await?;

        let mut report_names = selected_reports.clone();
        for body in dashboards.values() {
            if let MetadataBody::Dashboard(dashboard) = body {
                report_names.extend(dashboard.report_refs.iter().cloned());
            }
        }
        let reports = self
            .fetch_bodies(ItemKind::Report, &report_names, &mut warnings)
            .await?;

        // Reports are staged first so dashboards can be checked against them
        let mut staged: BTreeMap<String, StagedReport> = BTreeMap::new();
        if !reports.is_empty() {
            let mut existing = self.existing_names(ItemKind::Report, report_target).await?;
            for (source, body) in &reports {
                let MetadataBody::Report(report) = body else {
                    continue;
                };
                let Some((_, api_name)) = split_full_name(source) else {
                    warnings.push(invalid_full_name(ItemKind::Report, source));
                    continue;
                };

                let renamed = self
                    .policy
                    .derive_name(
                        &report.label,
                        api_name,
                        &existing,
                        ItemKind::Report.label_max_len(),
                    )
                    .and_then(|name| Ok((report.relabel(&name.label)?, name)));
                match renamed {
                    Ok((xml, name)) => {
                        existing.insert(&name.api_name);
                        staged.insert(
                            source.clone(),
                            StagedReport {
                                target: report_target.member(&name.api_name),
                                label: name.label,
                                xml,
                            },
                        );
                    }
                    Err(e) => {
                        warn!("Cannot copy report {}: {}", source, e);
                        warnings.push(BuildWarning::from_error(ItemKind::Report, source, e));
                    }
                }
            }
        }

        let report_map: HashMap<String, String> = staged
            .iter()
            .map(|(source, copy)| (source.clone(), copy.target.clone()))
            .collect();

        let mut package = DeployPackage::new(self.api.api_version());
        let mut renames = Vec::new();
        let mut needed_reports = selected_reports;

        if let Some(target) = dashboard_target {
            if !dashboards.is_empty() {
                let mut existing = self.existing_names(ItemKind::Dashboard, target).await?;
                for (source, body) in &dashboards {
                    let MetadataBody::Dashboard(dashboard) = body else {
                        continue;
                    };
                    if let Some(missing) = dashboard
                        .report_refs
                        .iter()
                        .find(|r| !report_map.contains_key(*r))
                    {
                        warnings.push(BuildWarning {
                            kind: ItemKind::Dashboard,
                            full_name: source.clone(),
                            reason: format!("referenced report '{}' could not be copied", missing),
                        });
                        continue;
                    }
                    let Some((_, api_name)) = split_full_name(source) else {
                        warnings.push(invalid_full_name(ItemKind::Dashboard, source));
                        continue;
                    };

                    let renamed = self
                        .policy
                        .derive_name(
                            &dashboard.title,
                            api_name,
                            &existing,
                            ItemKind::Dashboard.label_max_len(),
                        )
                        .and_then(|name| Ok((dashboard.rewrite(&name.label, &report_map)?, name)));
                    match renamed {
                        Ok((xml, name)) => {
                            existing.insert(&name.api_name);
                            let full_name = target.member(&name.api_name);
                            package.add_component(ItemKind::Dashboard, &full_name, xml);
                            needed_reports.extend(dashboard.report_refs.iter().cloned());
                            renames.push(RenamedItem {
                                kind: ItemKind::Dashboard,
                                source: source.clone(),
                                target: full_name,
                                label: name.label,
                            });
                        }
                        Err(e) => {
                            warn!("Cannot copy dashboard {}: {}", source, e);
                            warnings.push(BuildWarning::from_error(ItemKind::Dashboard, source, e));
                        }
                    }
                }
            }
        }

        for (source, copy) in staged {
            if !needed_reports.contains(&source) {
                debug!("Dropping {} with no remaining dashboard using it", source);
                continue;
            }
            package.add_component(ItemKind::Report, &copy.target, copy.xml);
            renames.push(RenamedItem {
                kind: ItemKind::Report,
                source,
                target: copy.target,
                label: copy.label,
            });
        }
        renames.sort_by(|a, b| (a.kind, &a.source).cmp(&(b.kind, &b.source)));

        for rename in &renames {
            info!("{} {} -> {} ('{}')", rename.kind, rename.source, rename.target, rename.label);
        }
        info!(
            "Built package with {} component(s), {} warning(s)",
            package.len(),
            warnings.len()
        );
        debug!("package.xml:\n{}", package.package_xml());

        Ok(BuildOutcome {
            package,
            warnings,
            renames,
        })
    }

    /// Retrieve and parse `names`. Items that cannot be fetched or parsed are
    /// recorded in `warnings` and left out of the result.
    async fn fetch_bodies(
        &self,
        kind: ItemKind,
        names: &BTreeSet<String>,
        warnings: &mut Vec<BuildWarning>,
    ) -> CopierResult<BTreeMap<String, MetadataBody>> {
        let mut bodies = BTreeMap::new();
        if names.is_empty() {
            return Ok(bodies);
        }

        let mut manifest = PackageManifest::new(self.api.api_version());
        for name in names {
            manifest.add_member(kind.type_name(), name.clone());
        }

        info!("Retrieving {} {}(s)", names.len(), kind);
        let retrieved = match self.api.retrieve(&manifest).await {
            Ok(retrieved) => retrieved,
            Err(e) if e.is_item_scoped() => {
                warn!("Retrieve of {}(s) failed: {}", kind, e);
                let reason = e.to_string();
                warnings.extend(names.iter().map(|name| BuildWarning {
                    kind,
                    full_name: name.clone(),
                    reason: reason.clone(),
                }));
                return Ok(bodies);
            }
            Err(e) => return Err(e),
        };

        for name in names {
            let parsed = match retrieved.get(&kind.file_path(name)) {
                Some(xml) => MetadataBody::parse(kind, name, xml),
                None => Err(CopierError::retrieval(
                    name.clone(),
                    retrieved
                        .problem_for(kind, name)
                        .unwrap_or("not returned by retrieve"),
                )),
            };
            match parsed {
                Ok(body) => {
                    bodies.insert(name.clone(), body);
                }
                Err(e) if e.is_item_scoped() => {
                    warn!("Skipping {}: {}", name, e);
                    warnings.push(BuildWarning::from_error(kind, name, e));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(bodies)
    }

    async fn existing_names(&self, kind: ItemKind, folder: &FolderRef) -> CopierResult<ExistingNames> {
        if folder.id.is_empty() {
            return Ok(ExistingNames::new());
        }
        let items = Selector::new(self.api).list_items_in_folder(kind, folder).await?;
        let existing: ExistingNames = items.iter().map(|item| item.api_name.as_str()).collect();
        debug!(
            "{} name(s) already taken in {} folder '{}'",
            existing.len(),
            kind,
            folder.developer_name
        );
        Ok(existing)
    }
}

fn invalid_full_name(kind: ItemKind, full_name: &str) -> BuildWarning {
    BuildWarning {
        kind,
        full_name: full_name.to_string(),
        reason: "full name is not of the form Folder/Name".to_string(),
    }
}

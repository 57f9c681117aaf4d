//! The move processor: analysis, the conflict gate, then one write action that transforms,
//! moves and retargets.

use std::collections::HashMap;
use std::sync::Arc;

use relo_syntax::{DeclId, ExprId, SourceTree};
use tokio_util::sync::CancellationToken;

pub use relo_config::ConflictPolicy;

use crate::conflicts::{detect_conflicts, ConflictAnalysis, ConflictMap};
use crate::declarations::collect_declarations_to_track;
use crate::descriptor::{MoveDescriptor, MoveSettings, MoveSource, MoveTarget, ResolvedTarget};
use crate::error::MoveError;
use crate::host::InMemoryHost;
use crate::mover::{move_declarations, MoveMap};
use crate::preview::{generate_preview, RefactoringPreview};
use crate::retarget::{chain_tops, retarget_usages, usage_offsets};
use crate::services::{MoveServices, Transaction};
use crate::transform::{postprocess_declaration, preprocess_declaration, preprocess_usages};
use crate::usages::{discover_usages, OuterInstanceReference, UsageInfo};

/// Decides whether a move with conflicts goes ahead.
pub enum ConflictHandler {
    /// Ask a callback; `false` aborts the move.
    Interactive(Box<dyn FnMut(&SourceTree, &ConflictMap) -> bool + Send>),
    /// Decide without asking.
    Batch(ConflictPolicy),
}

impl Default for ConflictHandler {
    fn default() -> Self {
        ConflictHandler::Batch(ConflictPolicy::Abort)
    }
}

impl std::fmt::Debug for ConflictHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictHandler::Interactive(_) => f.write_str("Interactive"),
            ConflictHandler::Batch(policy) => f.debug_tuple("Batch").field(policy).finish(),
        }
    }
}

/// Observer of completed moves; not called for previews.
pub trait MoveListener: Send + Sync {
    fn before_move(&self, _descriptor: &MoveDescriptor) {}
    fn after_move(&self, _descriptor: &MoveDescriptor, _outcome: &MoveOutcome) {}
}

/// Everything known about a move before the tree is touched.
#[derive(Debug, Clone)]
pub struct MoveAnalysis {
    pub target: ResolvedTarget,
    pub tracked: Vec<DeclId>,
    pub usages: Vec<UsageInfo>,
    pub conflicts: ConflictAnalysis,
}

#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub descriptor: MoveDescriptor,
    pub map: MoveMap,
    /// The moved root declarations at their new location.
    pub moved: Vec<DeclId>,
    pub usages: Vec<UsageInfo>,
    /// Conflicts that were accepted.
    pub conflicts: ConflictMap,
    pub skipped_usages: usize,
    /// Rewritten references that no longer resolve to their target.
    pub unresolved_usages: usize,
    pub created_files: Vec<String>,
    pub deleted_files: Vec<String>,
    pub touched_files: Vec<String>,
}

pub struct MoveSession<'h> {
    host: &'h InMemoryHost,
    settings: MoveSettings,
    handler: ConflictHandler,
    listeners: Vec<Arc<dyn MoveListener>>,
    services: MoveServices,
    cancel: CancellationToken,
}

impl<'h> MoveSession<'h> {
    pub fn new(host: &'h InMemoryHost) -> Self {
        Self {
            host,
            settings: MoveSettings::default(),
            handler: ConflictHandler::default(),
            listeners: Vec::new(),
            services: MoveServices::default(),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: MoveSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_conflict_handler(mut self, handler: ConflictHandler) -> Self {
        self.handler = handler;
        self
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn MoveListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    #[must_use]
    pub fn with_services(mut self, services: MoveServices) -> Self {
        self.services = services;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolve the target, find usages and conflicts. Never mutates the tree.
    pub fn analyze(&self, source: &MoveSource, target: &MoveTarget) -> Result<MoveAnalysis, MoveError> {
        let tree = self.host.read();
        self.analyze_tree(&tree, source, target)
    }

    fn analyze_tree(
        &self,
        tree: &SourceTree,
        source: &MoveSource,
        target: &MoveTarget,
    ) -> Result<MoveAnalysis, MoveError> {
        let _span = tracing::debug_span!("analyze", declarations = source.decls().len()).entered();
        let resolved = target.resolve(tree, source)?;
        let tracked = collect_declarations_to_track(tree, source.decls());
        let usages = discover_usages(
            tree,
            source.decls(),
            &tracked,
            source.options(),
            self.services.search.as_ref(),
            &self.cancel,
        )?;
        let conflicts = detect_conflicts(
            tree,
            source.decls(),
            &resolved,
            &usages,
            &self.settings,
            &self.cancel,
        )?;
        Ok(MoveAnalysis {
            target: resolved,
            tracked,
            usages,
            conflicts,
        })
    }

    /// Perform the move. On any failure, and when conflicts are declined, the tree is left
    /// exactly as it was.
    pub fn run(&mut self, source: &MoveSource, target: &MoveTarget) -> Result<MoveOutcome, MoveError> {
        let host = self.host;
        self.run_on(host, source, target, true)
    }

    /// Perform the move on a scratch copy and report the resulting diffs.
    pub fn preview(
        &mut self,
        source: &MoveSource,
        target: &MoveTarget,
    ) -> Result<RefactoringPreview, MoveError> {
        let before = self.host.snapshot();
        let scratch = InMemoryHost::new(before.clone());
        self.run_on(&scratch, source, target, false)?;
        Ok(generate_preview(&before, &scratch.into_inner()))
    }

    fn run_on(
        &mut self,
        host: &InMemoryHost,
        source: &MoveSource,
        target: &MoveTarget,
        notify: bool,
    ) -> Result<MoveOutcome, MoveError> {
        let mut action = host.write_action();
        let analysis = self.analyze_tree(&action, source, target)?;

        let conflicts = analysis.conflicts.conflicts.clone();
        if !conflicts.is_empty() {
            let proceed = match &mut self.handler {
                ConflictHandler::Interactive(ask) => ask(&*action, &conflicts),
                ConflictHandler::Batch(policy) => *policy == ConflictPolicy::Proceed,
            };
            if !proceed {
                tracing::info!(target = "relo.move", conflicts = conflicts.len(), "move declined");
                return Err(MoveError::ConflictsRejected { conflicts });
            }
        }
        if self.cancel.is_cancelled() {
            return Err(MoveError::Cancelled);
        }

        let descriptor = MoveDescriptor::new(&action, source, &analysis.target);
        tracing::info!(
            target = "relo.move",
            declarations = descriptor.declarations.len(),
            destination = %descriptor.destination,
            "moving declarations"
        );
        if notify {
            for listener in &self.listeners {
                listener.before_move(&descriptor);
            }
        }

        action.begin();
        match apply_move(&mut action, source, analysis, &self.services, descriptor) {
            Ok(outcome) => {
                action.commit();
                if notify {
                    for listener in &self.listeners {
                        listener.after_move(&outcome.descriptor, &outcome);
                    }
                }
                Ok(outcome)
            }
            Err(err) => {
                tracing::error!(target = "relo.move", error = %err, "move failed; rolling back");
                action.rollback();
                Err(err)
            }
        }
    }
}

fn apply_move(
    tree: &mut SourceTree,
    source: &MoveSource,
    analysis: MoveAnalysis,
    services: &MoveServices,
    descriptor: MoveDescriptor,
) -> Result<MoveOutcome, MoveError> {
    let _span = tracing::debug_span!("apply", destination = %descriptor.destination).entered();
    let MoveAnalysis {
        target,
        tracked,
        usages,
        conflicts,
    } = analysis;
    let active = conflicts.retain_active(usages);
    let offsets = usage_offsets(tree, &active);

    let mut params: HashMap<DeclId, DeclId> = HashMap::new();
    let mut rewritten: Vec<ExprId> = Vec::new();
    for &root in source.decls() {
        let param = preprocess_declaration(tree, root, &target, conflicts.outer_params.get(&root));
        let references: Vec<OuterInstanceReference> = active
            .iter()
            .filter_map(|usage| match usage {
                UsageInfo::OuterInstance(reference) if reference.moved() == root => Some(*reference),
                _ => None,
            })
            .collect();
        rewritten.extend(preprocess_usages(tree, &references, param));
        if let Some(param) = param {
            params.insert(root, param);
        }
    }

    let moved = move_declarations(tree, source.decls(), &target)?;
    if let Some(&missing) = tracked.iter().find(|&&decl| moved.map.get(decl).is_none()) {
        return Err(MoveError::IncompleteMoveMap {
            name: tree.fq_name(missing).to_string(),
        });
    }

    let mut cleanup = moved.source_files.clone();
    cleanup.push(moved.destination);
    let report = retarget_usages(
        tree,
        &active,
        &moved.map,
        &offsets,
        &conflicts.outer_params,
        services.shortener.as_ref(),
        &cleanup,
    );

    let rewritten: Vec<ExprId> = rewritten
        .into_iter()
        .map(|expr| moved.map.map_expr(expr))
        .filter(|&expr| tree.is_expr_alive(expr))
        .collect();
    for top in chain_tops(tree, &rewritten) {
        if tree.is_expr_alive(top) {
            services.shortener.shorten(tree, top);
        }
    }
    for &(old, new) in moved.map.roots() {
        let param = params.get(&old).map(|&param| moved.map.map_decl(param));
        postprocess_declaration(tree, new, &target, param, services.shortener.as_ref());
    }

    let unresolved_usages = count_unresolved(tree, &report.applied, services);
    if unresolved_usages > 0 {
        tracing::warn!(
            target = "relo.move",
            unresolved = unresolved_usages,
            "rewritten references no longer resolve to their target"
        );
    }

    let paths = |files: &[relo_syntax::FileId]| -> Vec<String> {
        files.iter().map(|&file| tree.file(file).path.clone()).collect()
    };
    let outcome = MoveOutcome {
        moved: moved.map.roots().iter().map(|&(_, new)| new).collect(),
        created_files: paths(moved.created_file.as_slice()),
        deleted_files: paths(&moved.deleted_files),
        touched_files: paths(
            &report
                .touched_files
                .iter()
                .copied()
                .filter(|&file| tree.is_file_alive(file))
                .collect::<Vec<_>>(),
        ),
        descriptor,
        map: moved.map,
        usages: report.applied,
        conflicts: conflicts.conflicts,
        skipped_usages: report.skipped,
        unresolved_usages,
    };
    tracing::info!(
        target = "relo.move",
        moved = outcome.moved.len(),
        usages = outcome.usages.len(),
        files = outcome.touched_files.len(),
        "move finished"
    );
    Ok(outcome)
}

fn count_unresolved(tree: &SourceTree, applied: &[UsageInfo], services: &MoveServices) -> usize {
    let checked: Vec<(ExprId, DeclId)> = applied
        .iter()
        .filter_map(|usage| match usage {
            UsageInfo::Internal {
                expr,
                target,
                updatable: true,
            }
            | UsageInfo::External {
                expr,
                target,
                updatable: true,
                ..
            } => Some((*expr, *target)),
            UsageInfo::OuterInstanceCall { expr, class } => Some((*expr, *class)),
            _ => None,
        })
        .filter(|&(expr, _)| tree.is_expr_alive(expr))
        .collect();
    let exprs: Vec<ExprId> = checked.iter().map(|&(expr, _)| expr).collect();
    let resolved = services.resolver.resolve_all(tree, &exprs);
    checked
        .iter()
        .zip(resolved)
        .filter(|((expr, target), got)| {
            let ok = *got == Some(*target);
            if !ok {
                tracing::debug!(target = "relo.move", ?expr, expected = ?target, ?got, "reference lost its target");
            }
            !ok
        })
        .count()
}

//! C7 entry point — `reconcile()` ties composition handling, classification,
//! tape application, and the post-update shadow/sanity/selection checks into
//! the single update cycle described by §2 and §4.7.

use reconciler_buffer::AttributedBuffer;

use crate::applier;
use crate::composition::{CompositionState, MarkedTextOperation};
use crate::config::ReconcilerConfig;
use crate::decorators::DecoratorPositionCache;
use crate::error::ReconcileError;
use crate::metrics::ReconcileMetrics;
use crate::node_tree::{EditorState, NodeKey};
use crate::planner;
use crate::range_cache::RangeCache;
use crate::selection::{self, Point};

/// One state transition plus whatever out-of-band signals accompany it: the
/// dirty-key set the tree diff already narrowed down, a pending caret to
/// reconcile once the buffer lands, and an in-flight IME marked-text op.
#[derive(Debug, Clone)]
pub struct PendingUpdate {
    pub prev_state: EditorState,
    pub pending_state: EditorState,
    pub dirty_keys: Vec<NodeKey>,
    pub pending_selection: Option<Point>,
    pub marked_text_op: Option<MarkedTextOperation>,
}

/// The reconciler's persistent state across updates: the live buffer and
/// every cache that tracks it. `reconcile` takes this by `&mut`, so Rust's
/// own borrow-checker exclusivity is the §5 "update scope" guard — two
/// concurrent reconciles against the same editor would need two live `&mut`
/// borrows of the same `ReconcilerState`, which the compiler already
/// forbids, so no runtime re-entrancy flag is kept here.
#[derive(Debug, Default)]
pub struct ReconcilerState {
    pub buffer: AttributedBuffer,
    pub range_cache: RangeCache,
    pub decorator_cache: DecoratorPositionCache,
    pub composition: CompositionState,
}

impl ReconcilerState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Runs one reconcile cycle (§2):
///
/// 1. Feed a marked-text op, if any, through the composition state machine.
///    A protocol error cancels the composition and the update falls through
///    to normal classification rather than aborting (§7).
/// 2. If composition was active last cycle but no op arrived this cycle,
///    close it out.
/// 3. Classify the update into a `DiffPlan` (§4.4).
/// 4. Record which classifier branch ran.
/// 5. Apply the plan to the buffer and caches (§4.6, §4.8).
/// 6. If enabled, shadow-compare against a full rebuild (§8.2) — a
///    mismatch is logged, not a hard failure, since the flag is a
///    development-time diagnostic and defaults off.
/// 7. If enabled, run the §8.1 invariant sweep; a violation aborts the
///    update via `?`.
/// 8. Reconcile the pending selection, swallowing point-mapping failures
///    (the text change still commits) and skipping entirely while a
///    composition is active.
#[tracing::instrument(skip_all, fields(version = update.pending_state.version))]
pub fn reconcile(
    state: &mut ReconcilerState,
    update: PendingUpdate,
    config: &ReconcilerConfig,
) -> Result<ReconcileMetrics, ReconcileError> {
    let PendingUpdate {
        prev_state,
        pending_state,
        dirty_keys,
        pending_selection,
        marked_text_op,
    } = update;

    let was_active = state.composition.is_active();
    if let Some(op) = marked_text_op.as_ref() {
        if let Err(err) = state.composition.apply(op) {
            tracing::warn!(error = %err, "composition canceled, retrying update as a normal edit");
        }
    } else if was_active {
        state.composition.end();
    }
    // Only hand the op to the classifier if composition is still validly
    // active after `apply` — a canceled composition falls through to the
    // normal fast-path priority order instead.
    let marked_text_op = marked_text_op.as_ref().filter(|_| state.composition.is_active());

    let mut metrics = ReconcileMetrics::default();

    let plan = planner::classify(
        &prev_state,
        &pending_state,
        &dirty_keys,
        &state.range_cache,
        state.buffer.length(),
        marked_text_op,
        &state.composition,
        config,
    );
    if let Some(label) = plan.path_label {
        metrics.set_path_label(label);
    }

    applier::apply_plan(
        &mut state.buffer,
        &mut state.range_cache,
        &mut state.decorator_cache,
        &prev_state,
        &pending_state,
        plan,
        config,
        &mut metrics,
    )?;

    if config.use_shadow_compare {
        let rendered = planner::render::render_subtree(&pending_state, NodeKey::ROOT);
        let actual = state.buffer.as_str();
        if rendered.attributed.text != actual {
            tracing::error!(
                expected_len = rendered.attributed.text.len(),
                actual_len = actual.len(),
                "shadow compare mismatch between rebuilt and incrementally applied text"
            );
        }
    }

    if config.reconciler_sanity_check {
        state.range_cache.verify_invariants(
            &pending_state,
            state.buffer.length() as u32,
            &state.decorator_cache,
        )?;
    }

    if !state.composition.is_active() {
        if let Some(point) = pending_selection {
            match selection::location_of(&state.range_cache, &pending_state, point) {
                Ok(_location) => {}
                Err(ReconcileError::PointMappingFailure { key, offset }) => {
                    tracing::debug!(?key, offset, "selection reconcile skipped, point mapping failed");
                }
                Err(err) => return Err(err),
            }
        }
    }

    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_tree::{NodeRecord, TextFormat};

    fn state_with_single_paragraph(text: &str) -> EditorState {
        let mut state = EditorState::empty();
        let paragraph = NodeKey(1);
        let run = NodeKey(2);
        let mut root = state.node_map.get(&NodeKey::ROOT).unwrap().clone();
        root.children = vec![paragraph];
        state.node_map.insert(NodeKey::ROOT, root);
        let mut para = NodeRecord::element(paragraph, NodeKey::ROOT, false);
        para.children = vec![run];
        state.node_map.insert(paragraph, para);
        state
            .node_map
            .insert(run, NodeRecord::text(run, paragraph, text, TextFormat::default()));
        state
    }

    #[test]
    fn hydrate_then_single_text_edit_round_trips_through_reconcile() {
        let mut reconciler_state = ReconcilerState::new();
        let config = ReconcilerConfig::default();

        let empty = EditorState::empty();
        let hydrated = state_with_single_paragraph("Hello");
        let update = PendingUpdate {
            prev_state: empty,
            pending_state: hydrated.clone(),
            dirty_keys: vec![],
            pending_selection: None,
            marked_text_op: None,
        };
        let metrics = reconcile(&mut reconciler_state, update, &config).unwrap();
        assert_eq!(reconciler_state.buffer.as_str(), "Hello");
        assert!(metrics.path_label.is_some());

        let edited = state_with_single_paragraph("Hello there");
        let update = PendingUpdate {
            prev_state: hydrated,
            pending_state: edited,
            dirty_keys: vec![NodeKey(2)],
            pending_selection: None,
            marked_text_op: None,
        };
        reconcile(&mut reconciler_state, update, &config).unwrap();
        assert_eq!(reconciler_state.buffer.as_str(), "Hello there");
    }

    #[test]
    fn selection_point_mapping_failure_does_not_abort_the_update() {
        let mut reconciler_state = ReconcilerState::new();
        let config = ReconcilerConfig::default();
        let hydrated = state_with_single_paragraph("Hello");

        let update = PendingUpdate {
            prev_state: EditorState::empty(),
            pending_state: hydrated,
            dirty_keys: vec![],
            pending_selection: Some(Point {
                key: NodeKey(999),
                offset: 0,
                side: crate::selection::Side::Text,
                affinity: crate::selection::Affinity::Forward,
            }),
            marked_text_op: None,
        };

        let result = reconcile(&mut reconciler_state, update, &config);
        assert!(result.is_ok());
        assert_eq!(reconciler_state.buffer.as_str(), "Hello");
    }
}

//! §6.6 observability: per-update metrics recorded by the planner and
//! applier and handed back to the caller after `reconcile()` returns.

/// The classifier branch a single update took (§2 control flow step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathLabel {
    HydrateFromEmpty,
    Composition,
    SingleTextEdit,
    AttributeOnly,
    PrePostOnly,
    InsertBlock,
    DeleteBlock,
    ContiguousReplace,
    KeyedReorder,
    Rebuild,
}

impl PathLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathLabel::HydrateFromEmpty => "hydrate_from_empty",
            PathLabel::Composition => "composition",
            PathLabel::SingleTextEdit => "single_text_edit",
            PathLabel::AttributeOnly => "attribute_only",
            PathLabel::PrePostOnly => "pre_post_only",
            PathLabel::InsertBlock => "insert_block",
            PathLabel::DeleteBlock => "delete_block",
            PathLabel::ContiguousReplace => "contiguous_replace",
            PathLabel::KeyedReorder => "keyed_reorder",
            PathLabel::Rebuild => "rebuild",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileMetrics {
    pub path_label: Option<PathLabelSlot>,
    pub wall_ns: u64,
    pub plan_ns: u64,
    pub apply_ns: u64,
    pub deletes: u32,
    pub inserts: u32,
    pub set_attributes: u32,
    pub fix_attributes: u32,
    pub chars_added: u32,
    pub chars_deleted: u32,
    pub moved_children: u32,
    pub ranges_added: u32,
    pub ranges_deleted: u32,
    pub rebuild_subtree_count: u32,
}

/// `PathLabel` wrapped so `ReconcileMetrics` can derive `Default`/`Eq`
/// without `PathLabel` itself needing a meaningless default variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathLabelSlot(pub PathLabel);

impl ReconcileMetrics {
    pub fn set_path_label(&mut self, label: PathLabel) {
        self.path_label = Some(PathLabelSlot(label));
        if self.path_label.is_some() {
            tracing::debug!(path_label = label.as_str(), "classifier selected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_has_no_path_label() {
        let metrics = ReconcileMetrics::default();
        assert!(metrics.path_label.is_none());
    }

    #[test]
    fn set_path_label_records_the_chosen_branch() {
        let mut metrics = ReconcileMetrics::default();
        metrics.set_path_label(PathLabel::SingleTextEdit);
        assert_eq!(metrics.path_label, Some(PathLabelSlot(PathLabel::SingleTextEdit)));
    }
}

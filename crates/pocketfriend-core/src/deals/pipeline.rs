//! Stateful wrapper that keeps a view in step with the user's selections.

use super::{apply, CategoryFilter, DealMetrics, SortMode};

/// What a listing screen should render.
#[derive(Debug, Clone, PartialEq)]
pub enum DealView<T> {
    /// No base list has been supplied yet.
    Loading,
    /// The base list is known but nothing matches the selection.
    NoResults,
    Deals(Vec<T>),
}

impl<T> DealView<T> {
    /// Records to render; empty while loading or when nothing matches.
    #[must_use]
    pub fn deals(&self) -> &[T] {
        match self {
            Self::Deals(deals) => deals,
            Self::Loading | Self::NoResults => &[],
        }
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deals().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deals().is_empty()
    }
}

/// Base list plus category and sort selections.
///
/// Every change rebuilds the view from the untouched base list.
#[derive(Debug, Clone)]
pub struct DealPipeline<T> {
    base: Option<Vec<T>>,
    category: CategoryFilter,
    sort: SortMode,
    view: DealView<T>,
}

impl<T> Default for DealPipeline<T> {
    fn default() -> Self {
        Self {
            base: None,
            category: CategoryFilter::All,
            sort: SortMode::None,
            view: DealView::Loading,
        }
    }
}

impl<T: DealMetrics + Clone> DealPipeline<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_base(base: Vec<T>) -> Self {
        let mut pipeline = Self::default();
        pipeline.set_base(base);
        pipeline
    }

    pub fn set_base(&mut self, base: Vec<T>) {
        self.base = Some(base);
        self.recompute();
    }

    /// Forget the base list and go back to [`DealView::Loading`].
    pub fn clear_base(&mut self) {
        self.base = None;
        self.recompute();
    }

    pub fn select_category(&mut self, category: impl Into<CategoryFilter>) {
        self.category = category.into();
        self.recompute();
    }

    pub fn select_sort(&mut self, mode: SortMode) {
        self.sort = mode;
        self.recompute();
    }

    /// Select `mode`, or return to [`SortMode::None`] if it is already active.
    pub fn toggle_sort(&mut self, mode: SortMode) {
        let next = if self.sort == mode {
            SortMode::None
        } else {
            mode
        };
        self.select_sort(next);
    }

    /// Back to all categories in input order.
    pub fn reset(&mut self) {
        self.category = CategoryFilter::All;
        self.sort = SortMode::None;
        self.recompute();
    }

    #[must_use]
    pub fn has_active_filters(&self) -> bool {
        self.category != CategoryFilter::All || self.sort != SortMode::None
    }

    #[must_use]
    pub const fn category(&self) -> &CategoryFilter {
        &self.category
    }

    #[must_use]
    pub const fn sort_mode(&self) -> SortMode {
        self.sort
    }

    #[must_use]
    pub fn base(&self) -> Option<&[T]> {
        self.base.as_deref()
    }

    #[must_use]
    pub const fn view(&self) -> &DealView<T> {
        &self.view
    }

    fn recompute(&mut self) {
        self.view = match &self.base {
            None => DealView::Loading,
            Some(base) => {
                let deals = apply(base, &self.category, self.sort);
                if deals.is_empty() {
                    DealView::NoResults
                } else {
                    DealView::Deals(deals)
                }
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::super::fixtures::{ids, pizza_pair, record, Record};
    use super::*;

    fn mixed() -> Vec<Record> {
        let mut base = pizza_pair();
        base.push(Record {
            discount: 35,
            distance: Some(3.1),
            ..record("burger", "burgers")
        });
        base
    }

    #[test]
    fn loading_until_base_arrives() {
        let mut pipeline = DealPipeline::<Record>::new();
        assert!(pipeline.view().is_loading());

        pipeline.select_category("pizza");
        assert!(pipeline.view().is_loading());

        pipeline.set_base(mixed());
        assert_eq!(ids(pipeline.view().deals()), vec!["a", "b"]);
    }

    #[test]
    fn unknown_category_is_no_results_not_loading() {
        let mut pipeline = DealPipeline::with_base(mixed());
        pipeline.select_category("sushi");

        assert_eq!(pipeline.view(), &DealView::NoResults);
        assert!(!pipeline.view().is_loading());
    }

    #[test]
    fn empty_base_is_no_results() {
        let pipeline = DealPipeline::<Record>::with_base(Vec::new());
        assert_eq!(pipeline.view(), &DealView::NoResults);
    }

    #[test]
    fn selections_recompute_from_base() {
        let mut pipeline = DealPipeline::with_base(mixed());

        pipeline.select_sort(SortMode::Discount);
        assert_eq!(ids(pipeline.view().deals()), vec!["b", "burger", "a"]);

        pipeline.select_category("pizza");
        assert_eq!(ids(pipeline.view().deals()), vec!["b", "a"]);

        pipeline.select_category("all");
        pipeline.select_sort(SortMode::Distance);
        assert_eq!(ids(pipeline.view().deals()), vec!["b", "a", "burger"]);

        assert_eq!(ids(pipeline.base().unwrap()), vec!["a", "b", "burger"]);
    }

    #[test]
    fn toggling_active_sort_returns_to_none() {
        let mut pipeline = DealPipeline::with_base(mixed());

        pipeline.toggle_sort(SortMode::Distance);
        assert_eq!(pipeline.sort_mode(), SortMode::Distance);

        pipeline.toggle_sort(SortMode::Discount);
        assert_eq!(pipeline.sort_mode(), SortMode::Discount);

        pipeline.toggle_sort(SortMode::Discount);
        assert_eq!(pipeline.sort_mode(), SortMode::None);
        assert_eq!(ids(pipeline.view().deals()), vec!["a", "b", "burger"]);
    }

    #[test]
    fn reset_clears_active_filters() {
        let mut pipeline = DealPipeline::with_base(mixed());
        assert!(!pipeline.has_active_filters());

        pipeline.select_category("burgers");
        assert!(pipeline.has_active_filters());
        pipeline.select_category("all");
        pipeline.select_sort(SortMode::Popularity);
        assert!(pipeline.has_active_filters());

        pipeline.reset();
        assert!(!pipeline.has_active_filters());
        assert_eq!(pipeline.category(), &CategoryFilter::All);
        assert_eq!(pipeline.view().len(), 3);
    }

    #[test]
    fn clear_base_goes_back_to_loading() {
        let mut pipeline = DealPipeline::with_base(mixed());
        pipeline.clear_base();
        assert!(pipeline.view().is_loading());
        assert!(pipeline.view().is_empty());
    }
}

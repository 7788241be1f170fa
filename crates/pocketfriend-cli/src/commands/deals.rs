use std::collections::HashSet;

use pocketfriend_core::catalog::{category_info, demo_listings, DealListing};
use pocketfriend_core::deals::{
    search_listings, CategoryFilter, DealPipeline, DealView, SortMode,
};
use pocketfriend_core::gateway::DealQuery;
use pocketfriend_core::{Deal, DealId, FavoritesSynchronizer};

use crate::commands::common::{
    deal_to_list_item, format_deal_lines, format_listing_lines, open_profile, DealListItem,
};
use crate::error::CliError;

pub async fn run_deals(
    global_profile: Option<&str>,
    category: &str,
    sort: SortMode,
    query: Option<&str>,
    demo: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let filter = CategoryFilter::parse(category);

    if demo {
        let pipeline = demo_pipeline(filter.clone(), sort, query);
        if as_json {
            println!("{}", serde_json::to_string_pretty(pipeline.view().deals())?);
        } else {
            for line in render_listing_view(pipeline.view(), &filter, sort, query) {
                println!("{line}");
            }
        }
        return Ok(());
    }

    let context = open_profile(global_profile).await?;
    let session = context.session.session();
    let deal_query = DealQuery {
        category: None,
        newest_first: true,
    };
    let deals = context
        .gateway
        .fetch_active_deals(session.as_ref(), &deal_query)
        .await?;
    tracing::debug!("Fetched {} active deals", deals.len());
    let deals = match query {
        Some(query) => search_listings(&deals, query),
        None => deals,
    };

    let favorites = if session.is_some() {
        let synchronizer =
            FavoritesSynchronizer::new(context.gateway.clone(), context.session.subscribe());
        match synchronizer.refetch().await {
            Ok(()) => synchronizer.snapshot().ids().clone(),
            Err(error) => {
                tracing::warn!("Failed to load favorites: {error}");
                HashSet::new()
            }
        }
    } else {
        HashSet::new()
    };

    let mut pipeline = DealPipeline::with_base(deals);
    pipeline.select_category(filter.clone());
    pipeline.select_sort(sort);

    if as_json {
        let items = pipeline
            .view()
            .deals()
            .iter()
            .map(|deal| deal_to_list_item(deal, &favorites))
            .collect::<Vec<DealListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in render_deal_view(pipeline.view(), &favorites, &filter, sort, query) {
            println!("{line}");
        }
    }

    Ok(())
}

pub fn demo_pipeline(
    filter: CategoryFilter,
    sort: SortMode,
    query: Option<&str>,
) -> DealPipeline<DealListing> {
    let listings = demo_listings();
    let base = match query {
        Some(query) => search_listings(&listings, query),
        None => listings,
    };
    let mut pipeline = DealPipeline::with_base(base);
    pipeline.select_category(filter);
    pipeline.select_sort(sort);
    pipeline
}

pub fn view_heading(filter: &CategoryFilter, sort: SortMode) -> String {
    let title = match filter {
        CategoryFilter::All => category_info("all").title.to_string(),
        CategoryFilter::Tag(tag) => {
            let info = category_info(tag);
            if info.id.eq_ignore_ascii_case(tag) {
                info.title.to_string()
            } else {
                format!("{tag} deals")
            }
        }
    };
    if sort == SortMode::None {
        title
    } else {
        format!("{title} ({})", sort.label())
    }
}

pub fn render_listing_view(
    view: &DealView<DealListing>,
    filter: &CategoryFilter,
    sort: SortMode,
    query: Option<&str>,
) -> Vec<String> {
    render_view(view, filter, sort, query, format_listing_lines)
}

pub fn render_deal_view(
    view: &DealView<Deal>,
    favorites: &HashSet<DealId>,
    filter: &CategoryFilter,
    sort: SortMode,
    query: Option<&str>,
) -> Vec<String> {
    render_view(view, filter, sort, query, |deals| {
        format_deal_lines(deals, favorites)
    })
}

fn render_view<T>(
    view: &DealView<T>,
    filter: &CategoryFilter,
    sort: SortMode,
    query: Option<&str>,
    format_lines: impl FnOnce(&[T]) -> Vec<String>,
) -> Vec<String> {
    let query = query.map(str::trim).filter(|query| !query.is_empty());
    match view {
        DealView::Loading => vec!["Loading deals...".to_string()],
        DealView::NoResults => match query {
            Some(query) => vec![format!(
                "No deals found for category '{filter}' matching \"{query}\"."
            )],
            None => vec![format!("No deals found for category '{filter}'.")],
        },
        DealView::Deals(deals) => {
            let heading = view_heading(filter, sort);
            let heading = match query {
                Some(query) => {
                    format!("{heading}: {} matching \"{query}\"", deal_count(deals.len()))
                }
                None => heading,
            };
            let mut lines = vec![heading];
            lines.extend(format_lines(deals.as_slice()));
            lines
        }
    }
}

fn deal_count(count: usize) -> String {
    if count == 1 {
        "1 deal".to_string()
    } else {
        format!("{count} deals")
    }
}

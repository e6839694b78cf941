//! View catalog configuration.
//!
//! The catalog is the static allow-list of queryable views. Each entry carries
//! the description and usage text shown to the assistant by
//! `list_available_views`.

use serde::{Deserialize, Serialize};

/// Description of one allow-listed view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDescriptor {
    /// Unqualified view name.
    pub view: String,
    /// What the view contains.
    #[serde(default)]
    pub description: String,
    /// When the assistant should reach for it.
    #[serde(default)]
    pub usage: String,
}

impl ViewDescriptor {
    /// Create a descriptor.
    pub fn new(
        view: impl Into<String>,
        description: impl Into<String>,
        usage: impl Into<String>,
    ) -> Self {
        Self {
            view: view.into(),
            description: description.into(),
            usage: usage.into(),
        }
    }
}

/// Where the views live and how they relate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Unity catalog name.
    #[serde(default = "default_catalog")]
    pub catalog: String,

    /// Schema holding the views.
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Table describing view columns (within `catalog.schema`).
    #[serde(default = "default_metadata_table")]
    pub metadata_table: String,

    /// Column shared by every view, used for joins.
    #[serde(default = "default_join_key")]
    pub join_key: String,

    /// Allow-listed views.
    #[serde(default = "default_views")]
    pub views: Vec<ViewDescriptor>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            schema: default_schema(),
            metadata_table: default_metadata_table(),
            join_key: default_join_key(),
            views: default_views(),
        }
    }
}

fn default_catalog() -> String {
    "main".to_string()
}

fn default_schema() -> String {
    "ai_data_assets".to_string()
}

fn default_metadata_table() -> String {
    "item_views_column_metadata".to_string()
}

fn default_join_key() -> String {
    "item_id".to_string()
}

/// Built-in item views.
pub fn default_views() -> Vec<ViewDescriptor> {
    vec![
        ViewDescriptor::new(
            "item_details",
            "Identifying and descriptive information for each item, including identifiers (item_id, ims_item_id, item_icn), make/model details, VIN, and classification taxonomy (industry, family, category).",
            "Use to classify or filter items by physical or categorical attributes. Ideal for public listings or analytic segmentations.",
        ),
        ViewDescriptor::new(
            "item_sale_status",
            "Current and historical sale status flags for each item, such as whether it's published, sold, closed, or halted. Includes time-on-market (days_online).",
            "Use to understand item lifecycle status (sold, active, removed). Useful for forecasting and lifecycle analytics.",
        ),
        ViewDescriptor::new(
            "item_tracking_dates_durations",
            "Lifecycle and operational timestamps, including pickup dates, title receipt/distribution, and timing metrics between creation and publication.",
            "Use for timeline analysis of operational processes, bottleneck detection, and time-to-market metrics.",
        ),
        ViewDescriptor::new(
            "item_location",
            "Geospatial and organizational information about item location: full address, coordinates, region/district/territory, and associated TM/DD names.",
            "Use for mapping, routing, or geographic analysis of inventory and personnel assignment.",
        ),
        ViewDescriptor::new(
            "item_auction_details",
            "Auction-related metadata for the item including auction ID, workspace, title, end time, fiscal year/quarter, and category.",
            "Use when filtering by auction event or analyzing auction cadence and timing by fiscal period.",
        ),
        ViewDescriptor::new(
            "item_financials",
            "All financial outcomes and fee structures for the item. Includes hammer price, contract price, fees, taxes, invoice and settlement IDs and dates.",
            "Use to evaluate profitability, fees collected, and for computing metrics like average lot value (via `safe_for_avg_lot_value_calc`).",
        ),
        ViewDescriptor::new(
            "item_bidding_and_engagement",
            "Bidding metrics (e.g., count of bids, bidders) and user interaction data (views, watchlist adds, video views).",
            "Use for interest modeling, bid competitiveness analysis, and marketing performance reviews.",
        ),
        ViewDescriptor::new(
            "item_buyer_info",
            "Comprehensive buyer details including location, contact info, segment codes, buyer join date, and distance from item.",
            "Use for buyer demographic analysis, CRM segmentation, and assessing geographic reach of auctions.",
        ),
        ViewDescriptor::new(
            "item_seller_info",
            "Seller's company data, geographic info, engagement metadata, and classification tags. Includes sales team assignment.",
            "Use to evaluate seller behavior, territory performance, and account management insights.",
        ),
        ViewDescriptor::new(
            "item_opportunity_info",
            "CRM opportunity metadata linked to the item. Includes pipeline status, segment, region, and sales rep assignment.",
            "Use to assess funnel quality, territory productivity, and CRM pipeline coverage.",
        ),
        ViewDescriptor::new(
            "item_capture_and_content",
            "Data capture and content generation details, including form creator, image/video/doc counts, and submission dates.",
            "Use to analyze listing completeness, FOS contributions, and content lifecycle timing.",
        ),
    ]
}

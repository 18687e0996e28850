//! Client for the EODMS REST API: search, record metadata, ordering and
//! downloading of order items.
mod client;
mod response;

pub use client::EodmsClient;

use crate::collection::Collection;
use crate::params::QueryParams;
use crate::results::RawRecord;
use anyhow::Result;
use std::path::Path;

/// Identifiers returned by an order submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSubmission {
    /// Ids for tracking order status.
    pub order_ids: Vec<String>,
    /// Ids of the individual order items, used for downloading.
    pub item_ids: Vec<String>,
}

/// Operations the command line needs from the catalog service.
pub trait CatalogService {
    /// Runs a search and returns every matching record with its metadata.
    async fn search(&self, collection: Collection, params: &QueryParams) -> Result<Vec<RawRecord>>;

    async fn submit_order(
        &self,
        collection: Collection,
        record_ids: &[String],
    ) -> Result<OrderSubmission>;

    /// Downloads the files of every order item that is ready.
    async fn download(&self, item_ids: &[String], target_dir: &Path) -> Result<()>;
}

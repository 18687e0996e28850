use super::response::{id_string, record_from_metadata, OrderResponse, SearchHit, SearchResponse};
use super::{CatalogService, OrderSubmission};
use crate::collection::Collection;
use crate::config::{Credentials, ServiceConfig};
use crate::download_plan::DownloadPlan;
use crate::error::Error;
use crate::http::{self, ObjectOps};
use crate::params::QueryParams;
use crate::results::RawRecord;
use anyhow::{anyhow, Context, Result};
use futures_util::{stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Client, Response};
use serde_json::Value;
use std::fs;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub struct EodmsClient {
    client: Client,
    base_url: Url,
    credentials: Credentials,
    config: ServiceConfig,
}

impl EodmsClient {
    pub fn new(config: &ServiceConfig, credentials: Credentials) -> Result<Self> {
        config.validate()?;
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).with_context(|| format!("Invalid EODMS base url: {}", config.base_url))?;
        let client = http::client(Duration::from_secs(config.timeout_secs))?;
        Ok(Self {
            client,
            base_url,
            credentials,
            config: config.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    pub fn search_url(
        &self,
        collection: Collection,
        params: &QueryParams,
        max_results: usize,
    ) -> Result<Url> {
        let mut url = self.endpoint("search")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("collection", collection.id());
            if !params.is_empty() {
                pairs.append_pair("query", &params.to_query(collection));
            }
            pairs.append_pair("maxResults", &max_results.to_string());
            pairs.append_pair("format", "json");
        }
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url, timeout: Option<Duration>) -> Result<T> {
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = http::send(request, &self.credentials, self.config.max_retries).await?;
        Ok(response.json::<T>().await?)
    }

    /// Runs the search, growing the page size for as long as the service
    /// returns a full page; its `moreResults` flag is unreliable.
    pub async fn submit_search(
        &self,
        collection: Collection,
        params: &QueryParams,
    ) -> Result<SearchResponse> {
        let response = search_pages(
            self.config.max_results,
            self.config.result_limit,
            move |max_results| async move {
                let url = self.search_url(collection, params, max_results)?;
                debug!("Query sent: {}", url);
                self.get_json::<SearchResponse>(url, None).await
            },
        )
        .await?;
        debug!("Query response received: {} result(s)", response.total_results);
        Ok(response)
    }

    /// Fetches the metadata document of every hit, a few at a time, keeping
    /// response order. Records whose metadata cannot be fetched are skipped.
    pub async fn fetch_metadata(
        &self,
        hits: &[SearchHit],
        keys: &[&str],
    ) -> Result<Vec<RawRecord>> {
        let progress = ProgressBar::new(hits.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("Fetching result metadata {bar:40} {pos}/{len} item [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        let timeout = Duration::from_secs(self.config.metadata_timeout_secs);

        let fetched: Vec<(String, Result<RawRecord>)> = stream::iter(hits)
            .map(|hit| {
                let progress = progress.clone();
                async move {
                    let result = self.fetch_record(&hit.this_record_url, keys, timeout).await;
                    progress.inc(1);
                    let id = id_string(&hit.record_id).unwrap_or_else(|| hit.this_record_url.clone());
                    (id, result)
                }
            })
            .buffered(self.config.fetch_workers.max(1))
            .collect()
            .await;
        progress.finish_and_clear();

        let mut records = Vec::with_capacity(fetched.len());
        for (id, result) in fetched {
            match result {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping record {}: {:#}", id, e),
            }
        }
        Ok(records)
    }

    async fn fetch_record(&self, url: &str, keys: &[&str], timeout: Duration) -> Result<RawRecord> {
        let url = Url::parse(url)?;
        let document: Value = self.get_json(url, Some(timeout)).await?;
        record_from_metadata(&document, keys)
    }

    async fn order_items(&self, item_id: &str) -> Result<OrderResponse> {
        let mut url = self.endpoint("order")?;
        url.query_pairs_mut()
            .append_pair("itemId", item_id)
            .append_pair("format", "json");
        self.get_json(url, None).await
    }
}

/// Repeats a search with a page size grown by `step` while the page comes
/// back full, stopping at `limit` results.
async fn search_pages<F, Fut>(step: usize, limit: usize, mut fetch: F) -> Result<SearchResponse>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<SearchResponse>>,
{
    if step == 0 {
        return Err(Error::InvalidConfig("search page size must be at least 1".to_string()).into());
    }
    let mut max_results = step.min(limit.max(1));
    loop {
        let response = fetch(max_results).await?;
        if response.total_results < max_results {
            return Ok(response);
        }
        if max_results >= limit {
            warn!(
                "Search stopped at the result limit ({}); narrow the query to see the rest",
                limit
            );
            return Ok(response);
        }
        warn!(
            "Number of search results ({}) equals query limit ({})",
            response.total_results, max_results
        );
        max_results = (max_results + step).min(limit);
    }
}

impl CatalogService for EodmsClient {
    async fn search(&self, collection: Collection, params: &QueryParams) -> Result<Vec<RawRecord>> {
        let response = self.submit_search(collection, params).await?;
        self.fetch_metadata(&response.results, collection.meta_keys())
            .await
    }

    async fn submit_order(
        &self,
        collection: Collection,
        record_ids: &[String],
    ) -> Result<OrderSubmission> {
        if record_ids.is_empty() {
            warn!("No records passed to order submission");
            return Ok(OrderSubmission::default());
        }
        info!("Submitting order for {} items", record_ids.len());
        let body = serde_json::json!({
            "destinations": [],
            "items": record_ids
                .iter()
                .map(|record_id| serde_json::json!({
                    "collectionId": collection.id(),
                    "recordId": record_id,
                }))
                .collect::<Vec<_>>(),
        });
        let request = self.client.post(self.endpoint("order")?).json(&body);
        let response = http::send(request, &self.credentials, self.config.max_retries)
            .await
            .context("Problem submitting order")?;
        let order: OrderResponse = response.json().await?;
        Ok(order.submission())
    }

    async fn download(&self, item_ids: &[String], target_dir: &Path) -> Result<()> {
        let mut tasks = vec![];
        for item_id in item_ids {
            let items = self.order_items(item_id).await?;
            tasks.extend(items.download_tasks(target_dir)?);
        }
        if tasks.is_empty() {
            warn!("None of the {} order item(s) are ready for download", item_ids.len());
            return Ok(());
        }

        fs::create_dir_all(target_dir)?;
        let plan = DownloadPlan::new(tasks);
        plan.write(target_dir.join("download_plan.json"))?;
        plan.execute(self).await
    }
}

impl ObjectOps for EodmsClient {
    async fn head_object(self: &Self, url: &str) -> Result<Option<u64>> {
        let request = self.client.head(url);
        let response = http::send(request, &self.credentials, self.config.max_retries).await?;
        let length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        Ok(length)
    }

    async fn get_object_range(self: &Self, url: &str, start_byte: u64) -> Result<Response> {
        let mut request = self.client.get(url);
        if start_byte > 0 {
            request = request.header(RANGE, format!("bytes={}-", start_byte));
        }
        http::send(request, &self.credentials, self.config.max_retries)
            .await
            .map_err(|e| anyhow!("Error downloading {}: {:#}", url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{build_params, FilterSet};
    use chrono::Utc;

    fn client() -> EodmsClient {
        let credentials = Credentials {
            username: "user".to_string(),
            password: "secret".to_string(),
        };
        EodmsClient::new(&ServiceConfig::default(), credentials).unwrap()
    }

    #[test]
    fn test_search_url() {
        let filters = FilterSet {
            polarization: Some("HH".to_string()),
            ..Default::default()
        };
        let params = build_params(&filters, Collection::Rcm, Utc::now()).unwrap();
        let url = client().search_url(Collection::Rcm, &params, 150).unwrap();
        assert_eq!(url.path(), "/wes/rapi/search");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("collection".to_string(), "RCMImageProducts".to_string()),
                ("query".to_string(), "RCM.POLARIZATION='HH'".to_string()),
                ("maxResults".to_string(), "150".to_string()),
                ("format".to_string(), "json".to_string()),
            ]
        );
    }

    fn page(total: usize) -> SearchResponse {
        SearchResponse {
            total_results: total,
            results: vec![],
        }
    }

    #[tokio::test]
    async fn test_full_page_grows_page_size() {
        let mut requested = vec![];
        let response = search_pages(150, 10_000, |max_results| {
            requested.push(max_results);
            // 200 matches in the catalog
            let total = max_results.min(200);
            async move { Ok(page(total)) }
        })
        .await
        .unwrap();
        assert_eq!(requested, vec![150, 300]);
        assert_eq!(response.total_results, 200);
    }

    #[tokio::test]
    async fn test_page_growth_stops_at_limit() {
        let mut requested = vec![];
        let response = search_pages(150, 400, |max_results| {
            requested.push(max_results);
            async move { Ok(page(max_results)) }
        })
        .await
        .unwrap();
        assert_eq!(requested, vec![150, 300, 400]);
        assert_eq!(response.total_results, 400);
    }

    #[tokio::test]
    async fn test_zero_page_size_never_searches() {
        let mut calls = 0;
        let result = search_pages(0, 10_000, |_| {
            calls += 1;
            async move { Ok(page(0)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_client_rejects_zero_page_size() {
        let config = ServiceConfig {
            max_results: 0,
            ..Default::default()
        };
        let credentials = Credentials {
            username: "user".to_string(),
            password: "secret".to_string(),
        };
        assert!(EodmsClient::new(&config, credentials).is_err());
    }

    #[test]
    fn test_search_url_without_filters_has_no_query() {
        let url = client()
            .search_url(Collection::Napl, &QueryParams::default(), 300)
            .unwrap();
        assert!(url.query_pairs().all(|(k, _)| k != "query"));
    }
}

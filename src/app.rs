//! One command-line invocation: mode dispatch and the query/export/order flow.
use crate::cli::{Cli, Mode};
use crate::config::Config;
use crate::eodms::CatalogService;
use crate::params::build_params;
use crate::results::ResultTable;
use crate::spatial::{self, Crs};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// What happened during a run, for reporting and tests.
#[derive(Debug, Default)]
pub struct Outcome {
    pub results: Option<ResultTable>,
    pub exported: Option<PathBuf>,
    pub order_ids: Vec<String>,
    pub item_ids: Vec<String>,
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

pub async fn run(
    cli: &Cli,
    config: &Config,
    service: &impl CatalogService,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let mut outcome = Outcome::default();
    let download_dir = cli
        .download_dir
        .clone()
        .unwrap_or_else(|| config.output.download_dir.clone());

    match Mode::from_cli(cli)? {
        Mode::DirectOrder(record_ids) => {
            info!("Fast-ordering for {} record{}", record_ids.len(), plural(record_ids.len()));
            let submission = service.submit_order(cli.collection, &record_ids).await?;
            info!("EODMS Order Ids for tracking progress: {:?}", submission.order_ids);
            info!("EODMS Item Ids for downloading: {:?}", submission.item_ids);
            outcome.order_ids = submission.order_ids;
            outcome.item_ids = submission.item_ids;
            return Ok(outcome);
        }
        Mode::DirectDownload(item_ids) => {
            info!("Fast-downloading for {} order item{}", item_ids.len(), plural(item_ids.len()));
            service.download(&item_ids, &download_dir).await?;
            return Ok(outcome);
        }
        Mode::Query => {}
    }

    let search_crs = Crs::search();
    let geometry = match &cli.geometry {
        Some(path) => Some(spatial::normalize(path, &search_crs)?),
        None => None,
    };
    let target_crs = cli.target_crs.as_deref().map(Crs::new);

    debug!("Validate query args");
    let params = build_params(&cli.filters(geometry), cli.collection, now)?;
    debug!("Query args validated");

    info!("Querying EODMS API");
    let records = service.search(cli.collection, &params).await?;
    let table = ResultTable::build(records, &search_crs, target_crs.as_ref())?;
    info!("Finished query. {} result{}", table.len(), plural(table.len()));

    if cli.dump_results {
        let out_file = cli
            .output
            .clone()
            .unwrap_or_else(|| config.output.results_file.clone());
        if table.is_empty() {
            warn!("No results found");
        } else {
            info!("Saving query result{} to file: {}", plural(table.len()), out_file.display());
            table.write_geojson(&out_file)?;
            outcome.exported = Some(out_file);
        }
    }

    if cli.submit_order {
        if table.is_empty() {
            warn!("No records to order");
        } else {
            info!("Submitting order for {} record{}", table.len(), plural(table.len()));
            let submission = service
                .submit_order(cli.collection, &table.record_ids())
                .await?;
            info!(
                "EODMS Item Ids for tracking status and downloading: {:?}",
                submission.item_ids
            );
            outcome.order_ids = submission.order_ids;
            outcome.item_ids = submission.item_ids;
        }
    }

    outcome.results = Some(table);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collection;
    use crate::eodms::OrderSubmission;
    use crate::params::{Filter, QueryParams};
    use crate::results::RawRecord;
    use anyhow::anyhow;
    use clap::Parser;
    use geo::{LineString, Polygon};
    use serde_json::Value;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockService {
        records: Vec<RawRecord>,
        searches: Mutex<Vec<QueryParams>>,
        orders: Mutex<Vec<Vec<String>>>,
        downloads: Mutex<Vec<Vec<String>>>,
    }

    impl CatalogService for MockService {
        async fn search(&self, _: Collection, params: &QueryParams) -> Result<Vec<RawRecord>> {
            self.searches.lock().unwrap().push(params.clone());
            Ok(self.records.clone())
        }

        async fn submit_order(&self, _: Collection, record_ids: &[String]) -> Result<OrderSubmission> {
            self.orders.lock().unwrap().push(record_ids.to_vec());
            Ok(OrderSubmission {
                order_ids: vec!["77".to_string()],
                item_ids: record_ids.iter().map(|id| format!("item-{id}")).collect(),
            })
        }

        async fn download(&self, item_ids: &[String], _: &Path) -> Result<()> {
            self.downloads.lock().unwrap().push(item_ids.to_vec());
            Ok(())
        }
    }

    struct FailingService;

    impl CatalogService for FailingService {
        async fn search(&self, _: Collection, _: &QueryParams) -> Result<Vec<RawRecord>> {
            Err(anyhow!("search must not run"))
        }

        async fn submit_order(&self, _: Collection, _: &[String]) -> Result<OrderSubmission> {
            Err(anyhow!("order must not run"))
        }

        async fn download(&self, _: &[String], _: &Path) -> Result<()> {
            Err(anyhow!("download must not run"))
        }
    }

    fn record(id: &str) -> RawRecord {
        RawRecord {
            attributes: vec![
                ("recordId".to_string(), Value::from(id)),
                ("title".to_string(), Value::from(format!("granule-{id}"))),
            ],
            footprint: Polygon::new(
                LineString::from(vec![(0., 0.), (1., 0.), (1., 1.), (0., 0.)]),
                vec![],
            ),
        }
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("eodmsapi").chain(args.iter().copied())).unwrap()
    }

    #[tokio::test]
    async fn test_query_then_order_sorted_ids() {
        let service = MockService {
            records: vec![record("30"), record("4"), record("100")],
            ..Default::default()
        };
        let cli = cli(&["-c", "RCMImageProducts", "--submit-order"]);
        let outcome = run(&cli, &Config::default(), &service, Utc::now()).await.unwrap();

        assert_eq!(outcome.results.unwrap().record_ids(), vec!["4", "30", "100"]);
        assert_eq!(*service.orders.lock().unwrap(), vec![vec!["4", "30", "100"]]);
        assert_eq!(outcome.order_ids, vec!["77"]);
    }

    #[tokio::test]
    async fn test_query_resolves_default_window() {
        let service = MockService::default();
        let cli = cli(&["-c", "Radarsat2"]);
        run(&cli, &Config::default(), &service, Utc::now()).await.unwrap();

        let searches = service.searches.lock().unwrap();
        assert_eq!(searches.len(), 1);
        assert!(searches[0].get(Filter::Start).is_some());
        assert!(searches[0].get(Filter::End).is_some());
        assert!(searches[0].get(Filter::Geometry).is_none());
        assert_eq!(searches[0].len(), 2);
    }

    #[tokio::test]
    async fn test_empty_results_skip_export_and_order() {
        let service = MockService::default();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results.geojson");
        let cli = cli(&[
            "-c",
            "RCMImageProducts",
            "--dump-results",
            "--submit-order",
            "--output",
            out.to_str().unwrap(),
        ]);
        let outcome = run(&cli, &Config::default(), &service, Utc::now()).await.unwrap();

        assert!(outcome.exported.is_none());
        assert!(!out.exists());
        assert!(service.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dump_results_writes_geojson() {
        let service = MockService {
            records: vec![record("1")],
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results.geojson");
        let cli = cli(&["-c", "RCMImageProducts", "--dump-results", "-o", out.to_str().unwrap()]);
        let outcome = run(&cli, &Config::default(), &service, Utc::now()).await.unwrap();

        assert_eq!(outcome.exported.as_deref(), Some(out.as_path()));
        assert!(out.exists());
    }

    #[tokio::test]
    async fn test_invalid_filter_fails_before_search() {
        let cli = cli(&["-c", "Radarsat2", "--radarsat-polarization", "XX"]);
        let err = run(&cli, &Config::default(), &FailingService, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::Error>(),
            Some(crate::error::Error::InvalidFilterValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_direct_order_skips_search() {
        let service = MockService::default();
        let cli = cli(&["-c", "RCMImageProducts", "--record-id", "42"]);
        let outcome = run(&cli, &Config::default(), &service, Utc::now()).await.unwrap();

        assert!(service.searches.lock().unwrap().is_empty());
        assert_eq!(*service.orders.lock().unwrap(), vec![vec!["42"]]);
        assert_eq!(outcome.item_ids, vec!["item-42"]);
        assert!(outcome.results.is_none());
    }

    #[tokio::test]
    async fn test_direct_download_skips_search() {
        let service = MockService::default();
        let cli = cli(&["-c", "RCMImageProducts", "--download-id", "1001"]);
        run(&cli, &Config::default(), &service, Utc::now()).await.unwrap();

        assert!(service.searches.lock().unwrap().is_empty());
        assert_eq!(*service.downloads.lock().unwrap(), vec![vec!["1001"]]);
    }
}

#![allow(async_fn_in_trait)]
pub mod app;
pub mod cli;
pub mod collection;
pub mod config;
pub mod download_plan;
pub mod eodms;
pub mod error;
pub mod http;
pub mod params;
pub mod results;
pub mod spatial;

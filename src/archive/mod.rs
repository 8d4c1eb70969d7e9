pub mod audit;
pub mod catalog;
pub mod config;
pub mod crawl;
pub mod dates;
pub mod fetcher;
pub mod http;
pub mod indexer;
pub mod inventory;
pub mod month;
pub mod paths;
pub mod reconcile;
pub mod refresh;
pub mod state;
pub mod util;
pub mod warn;

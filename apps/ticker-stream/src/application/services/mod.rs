//! Application Services
//!
//! - [`ListStore`]: the authoritative instrument table
//! - [`MarketView`]: filter, sort and valuation derived from the table
//! - [`bootstrap`]: start-up loading from storage or the catalog
//! - [`persistence`]: background writers that keep storage current

pub mod bootstrap;
pub mod list_store;
pub mod market_view;
pub mod persistence;

pub use bootstrap::{BootstrapError, BootstrapReport, ListSource, bootstrap};
pub use list_store::{ListSnapshot, ListStore};
pub use market_view::{MarketSnapshot, MarketView};
pub use persistence::{run_investments_writer, run_list_writer};

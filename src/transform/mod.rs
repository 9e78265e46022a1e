//! Storage-independent model of the staging -> star schema transformation.
//!
//! Mirrors the insert statements in `sql_queries` row for row, so their
//! deduplication rules can be exercised without a warehouse.

pub mod dedup;
pub mod local;
pub mod model;
pub mod star;

pub use local::load_local;
pub use model::{Artist, Song, Songplay, StagingEvent, StagingSong, TimeRow, User};
pub use star::{epoch_millis_to_timestamp, Staging, StarSchema};

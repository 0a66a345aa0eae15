pub mod feed;
pub mod screener;
pub mod social;

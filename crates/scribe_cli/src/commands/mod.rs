pub(crate) mod backfill;
pub(crate) mod serve;
pub(crate) mod shared;

pub(crate) mod dedup;

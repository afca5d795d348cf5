use super::test_helpers::*;
use super::*;
use crate::config::CollectionConfig;
use crate::error::{Error, FetchError};
use crate::types::{Progress, Query};
use std::sync::Arc;
use std::time::Duration;


fn names(controller: &CollectionController) -> Vec<String> {
    controller
        .snapshot()
        .listings
        .into_iter()
        .map(|l| l.name)
        .collect()
}

fn lines_starting_with(snapshot: &CollectionSnapshot, prefix: &str) -> usize {
    snapshot
        .log_messages
        .iter()
        .filter(|line| line.starts_with(prefix))
        .count()
}

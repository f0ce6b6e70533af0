//! Scanning a block range in fixed-size pages, committing the checkpoint after each one.

use std::future::Future;

use anyhow::Result;
use tracing::*;

use crate::{checkpoint::CheckpointStore, error::HeartbeatError};

/// A closed range of blocks fetched in one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-based.
    pub number: u64,
    pub from: u64,
    pub to: u64,
}

/// Splits `[from, to]` into consecutive pages of `page_size` blocks. The last page may be shorter and always ends
/// exactly at `to`. Yields nothing if `from > to`.
pub fn pages(from: u64, to: u64, page_size: u64) -> impl Iterator<Item = Page> {
    let page_size = page_size.max(1);
    let count = if from > to {
        0
    } else {
        (to - from) / page_size + 1
    };
    (1..=count).map(move |number| {
        let page_from = from + (number - 1) * page_size;
        let page_to = if number == count {
            to
        } else {
            page_from + page_size - 1
        };
        Page {
            number,
            from: page_from,
            to: page_to,
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The range was empty; nothing was fetched or committed.
    NoOp,
    Scanned {
        pages: u64,
        events: usize,
        last_block: u64,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct LogPaginator {
    page_size: u64,
}

impl LogPaginator {
    pub fn new(page_size: u64) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    /// Fetches and handles each page of `[from, to]` in order, committing the page's last block to `checkpoint`
    /// before moving on. A fetch which returns `None` fails the scan; an empty page does not.
    pub async fn scan<L, F, FFut, H, HFut>(
        &self,
        from: u64,
        to: u64,
        checkpoint: &dyn CheckpointStore,
        mut fetch: F,
        mut handle: H,
    ) -> Result<ScanOutcome>
    where
        F: FnMut(u64, u64) -> FFut,
        FFut: Future<Output = Result<Option<Vec<L>>>>,
        H: FnMut(Page, Vec<L>) -> HFut,
        HFut: Future<Output = Result<()>>,
    {
        if from > to {
            warn!(from, to, "block range is empty, nothing to scan");
            return Ok(ScanOutcome::NoOp);
        }

        let count = (to - from) / self.page_size + 1;
        debug!("Total pages {count}, blocks per page {}", self.page_size);

        let mut events = 0;
        for page in pages(from, to, self.page_size) {
            debug!(
                "Page {} getting events from block {} to {}",
                page.number, page.from, page.to
            );
            let logs = fetch(page.from, page.to)
                .await
                .map_err(|e| e.context(format!("failed to fetch logs for page {}", page.number)))?
                .ok_or(HeartbeatError::MissingLogs {
                    from: page.from,
                    to: page.to,
                })?;

            let found = logs.len();
            handle(page, logs).await.map_err(|e| {
                e.context(format!(
                    "failed to process page {} (blocks {} to {})",
                    page.number, page.from, page.to
                ))
            })?;
            info!("Found {found} heartbeat logs");
            events += found;

            checkpoint.commit(page.to)?;
        }

        Ok(ScanOutcome::Scanned {
            pages: count,
            events,
            last_block: to,
        })
    }
}

impl Default for LogPaginator {
    fn default() -> Self {
        Self::new(crate::cfg::page_size_default())
    }
}

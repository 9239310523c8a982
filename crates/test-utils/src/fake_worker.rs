use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use blockwise::engine::BlockOutcome;
use blockwise::exec::BlockWorker;
use blockwise::{Block, BlockKey};

/// A fake worker that:
/// - records which blocks were "run", in order
/// - reports `Failed(1)` for blocks listed in `failing`
/// - returns an execution error for blocks listed in `erroring`
/// - otherwise reports `Success`, optionally after a short delay.
#[derive(Clone, Default)]
pub struct FakeWorker {
    processed: Arc<Mutex<Vec<BlockKey>>>,
    failing: HashSet<BlockKey>,
    erroring: HashSet<BlockKey>,
    delay: Option<Duration>,
}

impl FakeWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, key: BlockKey) -> Self {
        self.failing.insert(key);
        self
    }

    pub fn erroring(mut self, key: BlockKey) -> Self {
        self.erroring.insert(key);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared record of processed blocks.
    pub fn processed(&self) -> Arc<Mutex<Vec<BlockKey>>> {
        Arc::clone(&self.processed)
    }
}

impl BlockWorker for FakeWorker {
    fn process<'a>(
        &'a self,
        block: &'a Block,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<BlockOutcome>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let key = block.key();
            self.processed.lock().unwrap().push(key.clone());

            if self.erroring.contains(&key) {
                anyhow::bail!("simulated execution error for {key}");
            }
            if self.failing.contains(&key) {
                return Ok(BlockOutcome::Failed(1));
            }
            Ok(BlockOutcome::Success)
        })
    }
}

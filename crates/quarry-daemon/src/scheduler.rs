//! Per-scraper scheduling: one task per source, each on its own interval.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use quarry_core::scrapers::Scraper;

use crate::pipeline::Pipeline;

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    scrapers: Vec<Arc<dyn Scraper>>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, scrapers: Vec<Arc<dyn Scraper>>) -> Self {
        Self { pipeline, scrapers }
    }

    /// Run one cycle of every scraper, in order, then return.
    pub async fn run_once(&self) {
        for scraper in &self.scrapers {
            self.pipeline.run_cycle(scraper.as_ref()).await;
        }
    }

    /// Run every scraper on its own interval until `shutdown` flips to true.
    ///
    /// The first cycle of each scraper runs immediately. A slow cycle delays
    /// its own next tick rather than bursting to catch up, and one scraper's
    /// failures never touch another's schedule. Each cycle runs in its own
    /// task, so even a panicking cycle is logged and the ticker keeps firing.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        let mut handles = Vec::with_capacity(self.scrapers.len());
        for scraper in &self.scrapers {
            let pipeline = Arc::clone(&self.pipeline);
            let scraper = Arc::clone(scraper);
            let mut shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(scraper.interval());
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                info!(source = %scraper.source(), interval_secs = scraper.interval().as_secs(), "scraper scheduled");
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let cycle_pipeline = Arc::clone(&pipeline);
                            let cycle_scraper = Arc::clone(&scraper);
                            let cycle = tokio::spawn(async move {
                                cycle_pipeline.run_cycle(cycle_scraper.as_ref()).await;
                            });
                            if let Err(e) = cycle.await {
                                error!(
                                    source = %scraper.source(),
                                    error = %e,
                                    "cycle aborted, schedule continues"
                                );
                            }
                        }
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                }
                debug!(source = %scraper.source(), "scraper stopped");
            }));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "scraper task ended abnormally");
            }
        }
    }
}

use std::time::Duration;

use tracing::{debug, info};

use crate::service::RelayService;

/// Background task that prunes expired chunk assemblies and idle tokens.
///
/// Takes the same locks as the request path, so a sweep never races a
/// `submit_chunk` that is about to complete an assembly.
pub async fn run_sweep_loop(service: RelayService, interval: Duration) {
    let mut interval = tokio::time::interval(interval);

    loop {
        interval.tick().await;

        let report = service.sweep();
        if report.expired_assemblies > 0 || report.purged_tokens > 0 {
            info!(
                "Sweep: dropped {} expired assemblies, {} idle tokens",
                report.expired_assemblies, report.purged_tokens
            );
        } else {
            let stats = service.stats();
            debug!(
                "Sweep: nothing expired ({} tokens, {} messages, {} pending assemblies)",
                stats.tokens, stats.messages, stats.pending_assemblies
            );
        }
    }
}

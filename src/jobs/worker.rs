//! Worker loop pulling job descriptors off the shared queue.

use std::sync::Arc;

use tracing::{info, warn};

use super::{JobRequest, JobState, JobTable};
use crate::error::AnalysisFailure;
use crate::pipeline::AnalysisPipeline;

/// Runs until the queue is closed and drained. Each request is delivered to
/// exactly one worker; the terminal state goes to both the job table and the
/// in-flight slot that traveled with the request.
pub(super) async fn run(
    worker_id: usize,
    queue: flume::Receiver<JobRequest>,
    table: Arc<JobTable>,
    pipeline: Arc<AnalysisPipeline>,
) {
    info!(worker_id, "analysis worker started");
    while let Ok(request) = queue.recv_async().await {
        let JobRequest {
            id,
            reference,
            slot,
        } = request;
        let bill = reference.identifier.canonical();
        table.update(id, JobState::Running);
        info!(worker_id, job = %id, bill = %bill, "job started");

        match pipeline.execute(reference).await {
            Ok(result) => {
                table.update(id, JobState::Succeeded(Arc::clone(&result)));
                slot.publish(Ok(result));
                info!(worker_id, job = %id, bill = %bill, "job succeeded");
            }
            Err(error) => {
                let failure = AnalysisFailure::from(&error);
                warn!(
                    worker_id,
                    job = %id,
                    bill = %bill,
                    kind = %failure.kind,
                    error = %error,
                    "job failed"
                );
                table.update(id, JobState::Failed(failure.clone()));
                slot.publish(Err(failure));
            }
        }
    }
    info!(worker_id, "analysis worker stopped");
}

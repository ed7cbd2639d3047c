//! Batch assembly: placing admitted jobs into open batches.

use std::collections::HashMap;

use genqueue_core::types::id::{BatchId, JobId};

use crate::batch::{Batch, BatchStatus};

/// Where a job landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Batch the job joined.
    pub batch_id: BatchId,
    /// Whether the batch was opened for this job.
    pub created: bool,
    /// Whether this job filled the batch.
    pub full: bool,
}

/// Groups jobs into same-model batches of similar priority.
///
/// Operates on the live batch table owned by the orchestrator; callers
/// hold the table lock for the duration of a call.
#[derive(Debug, Clone)]
pub struct BatchAssembler {
    max_batch_size: usize,
    priority_tolerance: i32,
}

impl BatchAssembler {
    /// Create an assembler.
    pub fn new(max_batch_size: usize, priority_tolerance: i32) -> Self {
        Self {
            max_batch_size: max_batch_size.max(1),
            priority_tolerance: priority_tolerance.max(0),
        }
    }

    /// Configured batch capacity.
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Find an open batch for the model whose priority is within tolerance,
    /// or open a new one.
    ///
    /// Among candidates the closest priority wins, then the oldest batch.
    /// Returns the batch id and whether it was created.
    pub fn find_or_create(
        &self,
        batches: &mut HashMap<BatchId, Batch>,
        model_id: &str,
        priority: i32,
    ) -> (BatchId, bool) {
        let existing = batches
            .values()
            .filter(|batch| {
                batch.status == BatchStatus::Pending
                    && batch.model_id == model_id
                    && batch.len() < self.max_batch_size
                    && (batch.priority - priority).abs() <= self.priority_tolerance
            })
            .min_by_key(|batch| ((batch.priority - priority).abs(), batch.created_at))
            .map(|batch| batch.id);

        match existing {
            Some(id) => (id, false),
            None => {
                let batch = Batch::new(model_id, priority);
                let id = batch.id;
                batches.insert(id, batch);
                (id, true)
            }
        }
    }

    /// Append a job to a batch.
    ///
    /// Returns `Some(true)` when the batch is now full, `None` if the batch
    /// is unknown or no longer accepting members.
    pub fn add_job(
        &self,
        batches: &mut HashMap<BatchId, Batch>,
        batch_id: BatchId,
        job_id: JobId,
    ) -> Option<bool> {
        let batch = batches.get_mut(&batch_id)?;
        if batch.status != BatchStatus::Pending || batch.is_full(self.max_batch_size) {
            return None;
        }
        batch.job_ids.push(job_id);
        Some(batch.is_full(self.max_batch_size))
    }

    /// Place a job: find or open a batch and join it.
    pub fn assign(
        &self,
        batches: &mut HashMap<BatchId, Batch>,
        model_id: &str,
        priority: i32,
        job_id: JobId,
    ) -> Placement {
        let (batch_id, created) = self.find_or_create(batches, model_id, priority);
        match self.add_job(batches, batch_id, job_id) {
            Some(full) => Placement {
                batch_id,
                created,
                full,
            },
            // find_or_create only returns open batches with room
            None => {
                let batch = Batch::new(model_id, priority);
                let batch_id = batch.id;
                batches.insert(batch_id, batch);
                let full = self.add_job(batches, batch_id, job_id).unwrap_or(false);
                Placement {
                    batch_id,
                    created: true,
                    full,
                }
            }
        }
    }
}

//! Scale-down orchestrator — drives the per-batch state machine.
//!
//! Each batch is reconciled against the instance group, drained, scaled
//! and terminated before the next one starts. Any control-plane failure
//! aborts the run where it stands; earlier batches are not rolled back.

use tracing::{debug, error, info, warn};

use fleetdown_core::{DownscaleConfig, GroupCapacity, InstanceIdentity};
use fleetdown_plane::FleetClient;

use crate::error::{DownscaleError, DownscaleResult};
use crate::plan::{Batch, BatchPlan};

/// Step of a scale-down run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ScalePhase {
    /// Run not started.
    Init,
    /// Comparing the new scheduler count against the instance group.
    Reconciling { batch: u32, total: u32 },
    /// Marking batch N of M as draining.
    Draining { batch: u32, total: u32 },
    /// Lowering desired counts and waiting for convergence.
    Scaling { batch: u32, total: u32 },
    /// Terminating the batch's machines.
    Terminating { batch: u32, total: u32 },
    /// Restoring the scheduler (flip) or lowering the group ceiling.
    Finalizing,
    Completed,
}

/// Run-scoped state, threaded through every step.
#[derive(Debug, Clone)]
pub struct ScaleDownRun {
    /// Scheduler desired count before the run.
    pub original_desired: u32,
    /// Scheduler desired count as of the last completed update.
    pub service_desired: u32,
    pub target: u32,
    pub max_to_remove: u32,
    /// Instances in batches processed so far.
    pub removed: u32,
    pub batches: u32,
    pub phase: ScalePhase,
    pub drained: Vec<InstanceIdentity>,
    /// Machine ids confirmed terminated.
    pub terminated: Vec<String>,
}

impl ScaleDownRun {
    fn new(original_desired: u32, target: u32) -> Self {
        Self {
            original_desired,
            service_desired: original_desired,
            target,
            max_to_remove: original_desired.saturating_sub(target),
            removed: 0,
            batches: 0,
            phase: ScalePhase::Init,
            drained: Vec::new(),
            terminated: Vec::new(),
        }
    }

    /// The fleet is left where the failed step stopped; nothing is rolled back.
    fn log_abort(&self, err: &DownscaleError) {
        error!(
            phase = ?self.phase,
            removed = self.removed,
            max_to_remove = self.max_to_remove,
            service_desired = self.service_desired,
            error = %err,
            "scale-down aborted"
        );
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScaleDownOutcome {
    pub batches: u32,
    pub drained: Vec<InstanceIdentity>,
    pub terminated: Vec<String>,
    pub final_service_desired: u32,
    /// Final group capacity, when the ceiling was lowered.
    pub group: Option<GroupCapacity>,
    /// The scheduler count was put back to its original value (flip mode).
    pub restored: bool,
}

/// Scheduler and group targets for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BatchTargets {
    service_desired: u32,
    /// Group capacity to apply, outside flip mode.
    group: Option<(u32, u32)>,
}

pub struct Orchestrator<'a> {
    client: &'a FleetClient,
    config: &'a DownscaleConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(client: &'a FleetClient, config: &'a DownscaleConfig) -> Self {
        Self { client, config }
    }

    /// Drain and terminate `candidates` in batches until the scheduler
    /// reaches the configured desired count.
    pub async fn run(&self, candidates: &[String]) -> DownscaleResult<ScaleDownOutcome> {
        let cfg = self.config;
        let service = self
            .client
            .describe_service(&cfg.cluster, &cfg.service)
            .await?;

        let mut run = ScaleDownRun::new(service.desired_count, cfg.desired_count);
        if run.max_to_remove == 0 {
            return Err(DownscaleError::NoRoomToDecrease {
                candidates: candidates.len(),
                current: run.original_desired,
                target: run.target,
            });
        }

        let plan = BatchPlan::new(candidates, cfg.batch_size, run.max_to_remove);
        info!(
            service = %cfg.service,
            desired = run.original_desired,
            target = run.target,
            max_to_remove = run.max_to_remove,
            batches = plan.len(),
            batch_size = cfg.batch_size,
            flip = cfg.instance_flip,
            "starting scale-down"
        );

        for batch in &plan.batches {
            if let Err(e) = self.scale_down(&mut run, batch, plan.len()).await {
                run.log_abort(&e);
                return Err(e);
            }
        }

        let outcome = match self.finalize(&mut run).await {
            Ok(outcome) => outcome,
            Err(e) => {
                run.log_abort(&e);
                return Err(e);
            }
        };
        run.phase = ScalePhase::Completed;
        info!(
            phase = ?run.phase,
            batches = outcome.batches,
            terminated = outcome.terminated.len(),
            service_desired = outcome.final_service_desired,
            "scale-down completed"
        );
        Ok(outcome)
    }

    async fn scale_down(
        &self,
        run: &mut ScaleDownRun,
        batch: &Batch,
        total: u32,
    ) -> DownscaleResult<()> {
        let cfg = self.config;
        let index = batch.index;

        run.phase = ScalePhase::Reconciling { batch: index, total };
        let targets = self.reconcile(run, batch).await?;

        run.phase = ScalePhase::Draining { batch: index, total };
        info!(
            phase = ?run.phase,
            removed = run.removed,
            instances = ?batch.arns,
            "draining container instances"
        );
        let drained = self.client.drain_instances(&cfg.cluster, &batch.arns).await?;
        if drained.len() != batch.arns.len() {
            warn!(
                batch = index,
                requested = batch.arns.len(),
                confirmed = drained.len(),
                "not every instance was confirmed draining"
            );
        }

        if targets.service_desired > 0 {
            run.phase = ScalePhase::Scaling { batch: index, total };
            info!(
                phase = ?run.phase,
                count = targets.service_desired,
                "scaling down service tasks"
            );
            self.client
                .update_service_and_wait(&cfg.cluster, &cfg.service, targets.service_desired)
                .await?;
            run.service_desired = targets.service_desired;

            if let Some((min, desired)) = targets.group {
                info!(phase = ?run.phase, min, desired, "scaling down instance group");
                self.client
                    .update_group_and_wait(&cfg.group, min, desired, None)
                    .await?;
            }
        } else {
            debug!(phase = ?run.phase, "service count would reach zero, leaving counts as-is");
        }

        run.phase = ScalePhase::Terminating { batch: index, total };
        let machine_ids: Vec<String> = drained.iter().map(|d| d.machine_id.clone()).collect();
        info!(phase = ?run.phase, machines = ?machine_ids, "terminating drained machines");
        self.client.terminate_and_wait(&cfg.group, &machine_ids).await?;

        run.removed += batch.len();
        run.batches += 1;
        run.terminated.extend(machine_ids);
        run.drained.extend(drained);
        debug!(
            batch = index,
            removed = run.removed,
            max_to_remove = run.max_to_remove,
            "batch complete"
        );
        Ok(())
    }

    /// Work out the batch's new counts, enforcing the mismatch policy.
    async fn reconcile(
        &self,
        run: &ScaleDownRun,
        batch: &Batch,
    ) -> DownscaleResult<BatchTargets> {
        let cfg = self.config;
        let size = batch.len();
        let service_desired = run.service_desired.saturating_sub(size);

        if cfg.instance_flip {
            return Ok(BatchTargets {
                service_desired,
                group: None,
            });
        }

        let group = self.client.describe_group(&cfg.group).await?;
        let mut instance_desired = service_desired;
        if instance_desired > group.desired {
            instance_desired = group.desired.saturating_sub(size);
            if !cfg.allow_mismatch {
                return Err(DownscaleError::Mismatch {
                    service_desired: run.service_desired,
                    group_desired: group.desired,
                });
            }
            warn!(
                service_desired = run.service_desired,
                group_desired = group.desired,
                reduce_to = instance_desired,
                "mismatched container and instance count, reducing instances anyway"
            );
        }

        Ok(BatchTargets {
            service_desired,
            group: Some((group.min.min(instance_desired), instance_desired)),
        })
    }

    async fn finalize(&self, run: &mut ScaleDownRun) -> DownscaleResult<ScaleDownOutcome> {
        let cfg = self.config;
        run.phase = ScalePhase::Finalizing;
        debug!(phase = ?run.phase, removed = run.removed, "finalizing");

        if cfg.instance_flip {
            info!(count = run.original_desired, "restoring service to original task count");
            self.client
                .update_service_and_wait(&cfg.cluster, &cfg.service, run.original_desired)
                .await?;
            run.service_desired = run.original_desired;
            return Ok(self.outcome(run, None, true));
        }

        info!(capacity = run.target, "setting final instance group capacity");
        self.client
            .update_group_and_wait(&cfg.group, run.target, run.target, Some(run.target))
            .await?;
        let group = GroupCapacity {
            min: run.target,
            desired: run.target,
            max: run.target,
        };
        Ok(self.outcome(run, Some(group), false))
    }

    fn outcome(
        &self,
        run: &ScaleDownRun,
        group: Option<GroupCapacity>,
        restored: bool,
    ) -> ScaleDownOutcome {
        ScaleDownOutcome {
            batches: run.batches,
            drained: run.drained.clone(),
            terminated: run.terminated.clone(),
            final_service_desired: run.service_desired,
            group,
            restored,
        }
    }
}

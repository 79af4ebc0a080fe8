//! Gossipsub-style fair distributor.
//!
//! A finite job set is dispatched over a node set in discrete ticks. A
//! node is eligible while idle; when a dequeued job finds no eligible
//! node, a pseudo-random victim's backoff level rises and the job is
//! either reannounced after a delay proportional to that level or, past
//! `max_backoff`, lost. Successful assignment picks the least-loaded
//! eligible node and decrements its backoff — reannounce-then-success
//! does relieve pressure.

use std::collections::VecDeque;
use std::sync::Arc;

use qinfinity_ports::{EventBusPort, RandomSource};
use qinfinity_types::{topics, EventActor, EventEnvelope, JobId, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{GossipError, GossipResult};

#[derive(Debug, Clone)]
pub struct DistributorConfig {
    pub max_backoff: u32,
    /// Reannounce delay in ticks per backoff level.
    pub reannounce_delay_ticks: u64,
    /// Extra per-job work ticks drawn uniformly from [0, n]; 0 keeps every
    /// job at one tick and the fleet contention-free.
    pub work_jitter_ticks: u64,
    /// Pass threshold on the lost-job share.
    pub max_loss_rate: f64,
    /// Pass threshold on Jain's fairness index.
    pub min_fairness: f64,
    /// A node below this share of the average job count is starving.
    pub starvation_factor: f64,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            max_backoff: 3,
            reannounce_delay_ticks: 2,
            work_jitter_ticks: 0,
            max_loss_rate: 0.01,
            min_fairness: 0.99,
            starvation_factor: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub node: NodeId,
    pub processed: u64,
    pub backoff_level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionReport {
    pub total_jobs: usize,
    pub completed: usize,
    pub lost: usize,
    pub reannounced: usize,
    pub ticks: u64,
    pub fairness_index: f64,
    pub starvation: bool,
    pub nodes: Vec<NodeReport>,
    pub passed: bool,
}

struct NodeState {
    node: NodeId,
    busy_until_tick: u64,
    backoff_level: u32,
    processed: u64,
}

struct PendingJob {
    id: JobId,
    available_at_tick: u64,
}

pub struct FairDistributor {
    config: DistributorConfig,
    random: Arc<dyn RandomSource>,
    bus: Option<Arc<dyn EventBusPort>>,
}

impl FairDistributor {
    pub fn new(config: DistributorConfig, random: Arc<dyn RandomSource>) -> Self {
        Self {
            config,
            random,
            bus: None,
        }
    }

    pub fn with_bus(mut self, bus: Arc<dyn EventBusPort>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Dispatch `job_count` jobs across `nodes` and report fairness.
    pub fn run(&self, job_count: usize, nodes: &[NodeId]) -> GossipResult<DistributionReport> {
        if nodes.is_empty() {
            return Err(GossipError::NoNodes);
        }
        if job_count == 0 {
            return Err(GossipError::NoJobs);
        }

        let mut fleet: Vec<NodeState> = nodes
            .iter()
            .map(|node| NodeState {
                node: node.clone(),
                busy_until_tick: 0,
                backoff_level: 0,
                processed: 0,
            })
            .collect();

        let mut queue: VecDeque<PendingJob> = (0..job_count)
            .map(|_| PendingJob {
                id: JobId::generate(),
                available_at_tick: 0,
            })
            .collect();

        let mut tick: u64 = 0;
        let mut completed = 0usize;
        let mut lost = 0usize;
        let mut reannounced = 0usize;

        while completed + lost < job_count {
            // Dequeue at most one job per fleet slot per tick.
            let mut attempts = fleet.len();
            let mut deferred: VecDeque<PendingJob> = VecDeque::new();

            while attempts > 0 {
                let Some(job) = queue.pop_front() else {
                    break;
                };
                if job.available_at_tick > tick {
                    deferred.push_back(job);
                    continue;
                }
                attempts -= 1;

                let eligible: Vec<usize> = fleet
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| n.busy_until_tick <= tick)
                    .map(|(i, _)| i)
                    .collect();

                if eligible.is_empty() {
                    let victim = self.random.pick(fleet.len());
                    fleet[victim].backoff_level += 1;

                    if fleet[victim].backoff_level > self.config.max_backoff {
                        debug!(job = %job.id, victim = %fleet[victim].node, "job lost under backpressure");
                        lost += 1;
                    } else {
                        let delay = self.config.reannounce_delay_ticks
                            * fleet[victim].backoff_level as u64;
                        reannounced += 1;
                        deferred.push_back(PendingJob {
                            id: job.id,
                            available_at_tick: tick + delay.max(1),
                        });
                    }
                    continue;
                }

                let chosen = eligible
                    .into_iter()
                    .min_by_key(|&i| fleet[i].processed)
                    .unwrap_or(0);
                let work_ticks = 1 + if self.config.work_jitter_ticks == 0 {
                    0
                } else {
                    self.random.pick(self.config.work_jitter_ticks as usize + 1) as u64
                };
                fleet[chosen].busy_until_tick = tick + work_ticks;
                fleet[chosen].processed += 1;
                fleet[chosen].backoff_level = fleet[chosen].backoff_level.saturating_sub(1);
                completed += 1;
            }

            queue.extend(deferred);
            tick += 1;
        }

        let counts: Vec<u64> = fleet.iter().map(|n| n.processed).collect();
        let fairness_index = jain_index(&counts);
        let average = counts.iter().sum::<u64>() as f64 / counts.len() as f64;
        let starvation = counts
            .iter()
            .any(|&c| (c as f64) < self.config.starvation_factor * average);

        let loss_rate = lost as f64 / job_count as f64;
        let backoff_ok = fleet
            .iter()
            .all(|n| n.backoff_level <= self.config.max_backoff);
        let passed = fairness_index >= self.config.min_fairness
            && loss_rate <= self.config.max_loss_rate
            && !starvation
            && backoff_ok;

        let report = DistributionReport {
            total_jobs: job_count,
            completed,
            lost,
            reannounced,
            ticks: tick,
            fairness_index,
            starvation,
            nodes: fleet
                .iter()
                .map(|n| NodeReport {
                    node: n.node.clone(),
                    processed: n.processed,
                    backoff_level: n.backoff_level,
                })
                .collect(),
            passed,
        };

        info!(
            total_jobs = job_count,
            completed,
            lost,
            fairness = fairness_index,
            passed,
            "fair distribution run finished"
        );

        if let Some(bus) = &self.bus {
            let envelope = EventEnvelope::new(
                topics::DATAFLOW_GOSSIPSUB_VALIDATED,
                0,
                EventActor::system(),
                json!({
                    "total_jobs": report.total_jobs,
                    "lost": report.lost,
                    "fairness_index": report.fairness_index,
                    "passed": report.passed,
                }),
            );
            let _ = bus.publish(envelope);
        }

        Ok(report)
    }
}

/// Jain's fairness index: (Σx)² / (n · Σx²); 1.0 is perfectly fair.
fn jain_index(counts: &[u64]) -> f64 {
    if counts.is_empty() {
        return 1.0;
    }
    let sum: f64 = counts.iter().map(|&c| c as f64).sum();
    let squares: f64 = counts.iter().map(|&c| (c as f64) * (c as f64)).sum();
    if squares == 0.0 {
        return 1.0;
    }
    (sum * sum) / (counts.len() as f64 * squares)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qinfinity_ports::SeededRandom;

    fn nodes(n: usize) -> Vec<NodeId> {
        (0..n).map(|i| NodeId::new(format!("n{i}"))).collect()
    }

    #[test]
    fn identical_work_is_near_perfectly_fair() {
        // 1000 jobs over 5 nodes with identical work size.
        let distributor = FairDistributor::new(
            DistributorConfig::default(),
            Arc::new(SeededRandom::new(42)),
        );
        let report = distributor.run(1_000, &nodes(5)).unwrap();

        assert!(report.fairness_index >= 0.99);
        assert!(report.lost <= 10);
        assert!(!report.starvation);
        assert!(report.passed);
        assert_eq!(report.completed + report.lost, 1_000);
    }

    #[test]
    fn jittered_work_still_bounds_loss_and_backoff() {
        let distributor = FairDistributor::new(
            DistributorConfig {
                work_jitter_ticks: 3,
                max_loss_rate: 0.05,
                min_fairness: 0.95,
                ..Default::default()
            },
            Arc::new(SeededRandom::new(7)),
        );
        let report = distributor.run(500, &nodes(5)).unwrap();

        assert_eq!(report.completed + report.lost, 500);
        for node in &report.nodes {
            assert!(node.backoff_level <= 3);
        }
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let distributor = FairDistributor::new(
            DistributorConfig::default(),
            Arc::new(SeededRandom::new(1)),
        );
        assert_eq!(distributor.run(10, &[]).unwrap_err(), GossipError::NoNodes);
        assert_eq!(
            distributor.run(0, &nodes(3)).unwrap_err(),
            GossipError::NoJobs
        );
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let config = DistributorConfig {
            work_jitter_ticks: 2,
            ..Default::default()
        };
        let a = FairDistributor::new(config.clone(), Arc::new(SeededRandom::new(99)))
            .run(200, &nodes(4))
            .unwrap();
        let b = FairDistributor::new(config, Arc::new(SeededRandom::new(99)))
            .run(200, &nodes(4))
            .unwrap();

        assert_eq!(a.completed, b.completed);
        assert_eq!(a.lost, b.lost);
        assert_eq!(a.ticks, b.ticks);
        let counts_a: Vec<u64> = a.nodes.iter().map(|n| n.processed).collect();
        let counts_b: Vec<u64> = b.nodes.iter().map(|n| n.processed).collect();
        assert_eq!(counts_a, counts_b);
    }

    #[test]
    fn jain_index_extremes() {
        assert!((jain_index(&[10, 10, 10]) - 1.0).abs() < 1e-12);
        // One node does everything: 1/n.
        let skewed = jain_index(&[30, 0, 0]);
        assert!((skewed - 1.0 / 3.0).abs() < 1e-12);
    }
}

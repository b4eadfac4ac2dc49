//! Per-task duration sampling.

use rand::Rng;
use thiserror::Error;

use crate::distributions::{Distribution, DistributionError};
use crate::models::SimulationTaskInput;

/// A distribution that could not be built for a specific task.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Task {task} has an invalid duration distribution: {source}")]
pub struct TaskDistributionError {
    pub task: String,
    #[source]
    pub source: DistributionError,
}

/// Couples one task's identity with its duration distribution.
///
/// The simulation loop only ever calls [`TaskSampler::sample_duration`], so it
/// never needs to know which distribution variant sits behind a task.
#[derive(Clone, Debug)]
pub struct TaskSampler {
    task_id: String,
    /// Raw dependency text, parsed by the graph builder.
    dependencies: Option<String>,
    distribution: Distribution,
}

impl TaskSampler {
    pub fn new(
        task_id: impl Into<String>,
        distribution: Distribution,
        dependencies: Option<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            dependencies,
            distribution,
        }
    }

    /// Build a sampler from a simulation task record, naming the task on failure.
    pub fn from_input(input: &SimulationTaskInput) -> Result<Self, TaskDistributionError> {
        let distribution = input
            .distribution
            .build()
            .map_err(|source| TaskDistributionError {
                task: input.id.clone(),
                source,
            })?;
        Ok(Self::new(
            input.id.clone(),
            distribution,
            input.dependencies.clone(),
        ))
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn dependencies(&self) -> Option<&str> {
        self.dependencies.as_deref()
    }

    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    pub fn sample_duration<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.distribution.sample(rng)
    }

    pub fn mean_duration(&self) -> f64 {
        self.distribution.mean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::DistributionSpec;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sampler_from_input() {
        let input = SimulationTaskInput::new("T002", DistributionSpec::fixed(4.0))
            .with_dependencies("T001");
        let sampler = TaskSampler::from_input(&input).unwrap();
        assert_eq!(sampler.task_id(), "T002");
        assert_eq!(sampler.dependencies(), Some("T001"));
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(sampler.sample_duration(&mut rng), 4.0);
        assert_eq!(sampler.mean_duration(), 4.0);
    }

    #[test]
    fn test_invalid_distribution_names_task() {
        let input = SimulationTaskInput::new("T009", DistributionSpec::triangular(5.0, 3.0, 1.0));
        let err = TaskSampler::from_input(&input).unwrap_err();
        assert_eq!(err.task, "T009");
        assert!(err.to_string().contains("T009"));
    }

    #[test]
    fn test_same_seed_same_samples() {
        let sampler = TaskSampler::new("A", Distribution::uniform(1.0, 9.0).unwrap(), None);
        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);
        for _ in 0..100 {
            assert_eq!(sampler.sample_duration(&mut a), sampler.sample_duration(&mut b));
        }
    }
}

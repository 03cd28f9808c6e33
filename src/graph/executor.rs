//! Executors: the thread pools calculators run on.
//!
//! Every graph has a default executor sized by `num_threads`. With one
//! thread it runs calculators inline on the scheduler thread. Named
//! executors declared in the graph always get a pool of their own, and a
//! node picks one with its `executor` field.

use crate::config::GraphConfig;
use crate::graph::error::{GraphError, GraphResult};

/// Name that always refers to the default executor.
pub const DEFAULT_EXECUTOR: &str = "default";

/// Index of the default executor in an [`ExecutorPlan`].
pub(crate) const DEFAULT_EXECUTOR_INDEX: usize = 0;

/// Validated executor layout of a graph. Pools are only built at start.
#[derive(Debug, Clone)]
pub(crate) struct ExecutorPlan {
    names: Vec<String>,
    threads: Vec<usize>,
}

impl Default for ExecutorPlan {
    fn default() -> Self {
        Self {
            names: vec![DEFAULT_EXECUTOR.to_string()],
            threads: vec![1],
        }
    }
}

impl ExecutorPlan {
    pub(crate) fn from_config(config: &GraphConfig) -> GraphResult<Self> {
        let mut plan = Self::default();
        if let Some(threads) = config.num_threads {
            plan.threads[DEFAULT_EXECUTOR_INDEX] = check_threads(DEFAULT_EXECUTOR, threads)?;
        }

        let mut default_declared = false;
        for executor in &config.executors {
            let threads = check_threads(&executor.name, executor.num_threads)?;
            if is_default_name(&executor.name) {
                if default_declared {
                    return Err(invalid(DEFAULT_EXECUTOR, "declared more than once"));
                }
                default_declared = true;
                plan.threads[DEFAULT_EXECUTOR_INDEX] = threads;
            } else if plan.names.iter().any(|n| *n == executor.name) {
                return Err(invalid(&executor.name, "declared more than once"));
            } else {
                plan.names.push(executor.name.clone());
                plan.threads.push(threads);
            }
        }
        Ok(plan)
    }

    /// Executor index for a node's `executor` field.
    pub(crate) fn resolve(&self, node: &str, executor: Option<&str>) -> GraphResult<usize> {
        match executor {
            None => Ok(DEFAULT_EXECUTOR_INDEX),
            Some(name) if is_default_name(name) => Ok(DEFAULT_EXECUTOR_INDEX),
            Some(name) => self
                .names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| GraphError::UnknownExecutor {
                    node: node.to_string(),
                    executor: name.to_string(),
                }),
        }
    }

    pub(crate) fn threads(&self, index: usize) -> usize {
        self.threads.get(index).copied().unwrap_or(1)
    }

    /// Build one pool per executor. The default executor gets `None` when it
    /// has a single thread, meaning calculators run on the scheduler thread.
    pub(crate) fn build_pools(&self) -> GraphResult<Vec<Option<rayon::ThreadPool>>> {
        self.names
            .iter()
            .zip(&self.threads)
            .enumerate()
            .map(|(index, (name, &threads))| {
                if index == DEFAULT_EXECUTOR_INDEX && threads <= 1 {
                    Ok(None)
                } else {
                    build_pool(name, threads).map(Some)
                }
            })
            .collect()
    }
}

fn build_pool(name: &str, threads: usize) -> GraphResult<rayon::ThreadPool> {
    let prefix = format!("graphlink-{}", name);
    let pool_name = name.to_string();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |i| format!("{}-{}", prefix, i))
        .panic_handler(move |_| {
            tracing::error!("Calculator panicked on executor '{}'", pool_name);
        })
        .build()
        .map_err(|e| GraphError::Executor(format!("executor '{}': {}", name, e)))?;
    tracing::debug!("Executor '{}' started with {} threads", name, threads);
    Ok(pool)
}

fn is_default_name(name: &str) -> bool {
    name.is_empty() || name == DEFAULT_EXECUTOR
}

fn check_threads(name: &str, threads: usize) -> GraphResult<usize> {
    if threads == 0 {
        return Err(invalid(name, "num_threads must be at least 1"));
    }
    Ok(threads)
}

fn invalid(name: &str, reason: &str) -> GraphError {
    GraphError::InvalidExecutor {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

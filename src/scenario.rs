//! The static object graph of a simulation and its per-run copies.

use rand::{Rng, rngs::StdRng};
use tracing::debug;

use crate::error::SetupError;
use crate::sim::installation::Installation;
use crate::sim::types::SimConfig;

/// One population share of a [`Demographics`] section.
#[derive(Debug, Clone, PartialEq)]
pub struct DemographicEntry {
    /// Id of the template installation.
    pub template: String,
    /// Relative weight of the template in the population.
    pub probability: f64,
}

/// Builds a population by cloning template installations.
#[derive(Debug, Clone, PartialEq)]
pub struct Demographics {
    /// Number of installations to generate.
    pub count: usize,
    pub entries: Vec<DemographicEntry>,
}

impl Demographics {
    /// Replaces the template installations with `count` weighted clones.
    ///
    /// Installations not named by any entry are kept as they are. Clones get
    /// fresh ids of the form `<template>-<n>`.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::UnknownTemplate` if an entry names no installation.
    pub fn populate(
        &self,
        installations: Vec<Installation>,
        rng: &mut StdRng,
    ) -> Result<Vec<Installation>, SetupError> {
        let mut templates = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let template = installations
                .iter()
                .find(|i| i.id == entry.template)
                .ok_or_else(|| SetupError::UnknownTemplate(entry.template.clone()))?;
            templates.push((template.clone(), entry.probability.max(0.0)));
        }
        let total: f64 = templates.iter().map(|(_, w)| w).sum();

        let mut population: Vec<Installation> = installations
            .into_iter()
            .filter(|i| !self.entries.iter().any(|e| e.template == i.id))
            .collect();
        if templates.is_empty() {
            return Ok(population);
        }

        for n in 0..self.count {
            let target = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = templates.len() - 1;
            for (k, (_, weight)) in templates.iter().enumerate() {
                cumulative += weight;
                if cumulative > target {
                    chosen = k;
                    break;
                }
            }
            let (template, _) = &templates[chosen];
            let mut clone = template.clone();
            clone.id = format!("{}-{n}", template.id);
            clone.name = format!("{} #{n}", template.name);
            debug!(template = %template.id, id = %clone.id, "cloned installation");
            population.push(clone);
        }
        Ok(population)
    }
}

/// Static configuration plus the installations it simulates.
///
/// Never mutated by a run: [`Scenario::instantiate`] hands out fresh
/// runtime copies.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub config: SimConfig,
    pub installations: Vec<Installation>,
}

impl Scenario {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            installations: Vec::new(),
        }
    }

    pub fn with_installation(mut self, installation: Installation) -> Self {
        self.installations.push(installation);
        self
    }

    /// Fresh runtime copies of every installation for one Monte-Carlo run.
    ///
    /// Base-load phases are drawn here, in installation then appliance order.
    pub fn instantiate(&self, rng: &mut StdRng) -> Vec<Installation> {
        self.installations
            .iter()
            .map(|template| {
                let mut runtime = template.clone();
                runtime.instantiate(rng);
                runtime
            })
            .collect()
    }
}

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::{ExtractionConfig, Settings};
use crate::parser::{self, Extraction};
use crate::record::{RawSource, SourceKind};

const CHUNK: usize = 64;

/// A unit of work: either a loaded source or the reason it could not be loaded.
pub enum Unit {
    Ready(RawSource),
    Failed {
        name: String,
        kind: SourceKind,
        subject: String,
        year: Option<i32>,
        error: String,
    },
}

impl Unit {
    fn name(&self) -> &str {
        match self {
            Unit::Ready(s) => &s.name,
            Unit::Failed { name, .. } => name,
        }
    }
}

pub struct UnitResult {
    pub name: String,
    pub kind: SourceKind,
    pub subject: String,
    pub year: Option<i32>,
    pub outcome: Result<Extraction, String>,
}

impl UnitResult {
    pub fn records(&self) -> usize {
        self.outcome.as_ref().map_or(0, |e| e.records.len())
    }
}

/// Run every unit through the pipeline on a bounded rayon pool. Output
/// order matches input order; a failed unit never stops the batch.
pub fn process_batch(units: Vec<Unit>, settings: &Settings, jobs: Option<usize>) -> Result<Vec<UnitResult>> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = jobs {
        builder = builder.num_threads(n);
    }
    let pool = builder.build().context("failed to build worker pool")?;

    // One config per subject, resolved up front so workers only read.
    let mut configs: BTreeMap<String, Result<ExtractionConfig, String>> = BTreeMap::new();
    for unit in &units {
        if let Unit::Ready(source) = unit {
            configs
                .entry(source.subject.clone())
                .or_insert_with(|| settings.extraction_config(&source.subject).map_err(|e| e.to_string()));
        }
    }

    let pb = crate::progress_bar(units.len() as u64);
    let mut results = Vec::with_capacity(units.len());

    for chunk in units.chunks(CHUNK) {
        let done: Vec<UnitResult> = pool.install(|| {
            chunk
                .par_iter()
                .map(|unit| run_unit(unit, &configs))
                .collect()
        });
        for r in &done {
            match &r.outcome {
                Ok(e) => info!(
                    source = %r.name,
                    records = e.report.emitted,
                    rejected = e.report.rejected + e.report.dropped,
                    "extracted"
                ),
                Err(err) => warn!(source = %r.name, error = %err, "unit failed"),
            }
        }
        pb.inc(chunk.len() as u64);
        results.extend(done);
    }

    pb.finish_and_clear();
    Ok(results)
}

fn run_unit(unit: &Unit, configs: &BTreeMap<String, Result<ExtractionConfig, String>>) -> UnitResult {
    match unit {
        Unit::Ready(source) => {
            let outcome = match configs.get(&source.subject) {
                Some(Ok(cfg)) => Ok(parser::process_source(source, cfg)),
                Some(Err(e)) => Err(e.clone()),
                None => Err(format!("no settings for subject {:?}", source.subject)),
            };
            UnitResult {
                name: unit.name().to_string(),
                kind: source.kind,
                subject: source.subject.clone(),
                year: source.year,
                outcome,
            }
        }
        Unit::Failed {
            name,
            kind,
            subject,
            year,
            error,
        } => UnitResult {
            name: name.clone(),
            kind: *kind,
            subject: subject.clone(),
            year: *year,
            outcome: Err(error.clone()),
        },
    }
}

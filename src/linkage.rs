//! Single-hop linkage graph over a compendium.
//!
//! Every compound is run through every rule. A product whose identity key
//! equals another compound's key links the two. Links are symmetric in the
//! adjacency matrix. The edge list keeps the direction they were found in,
//! and one entry per rule that found them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::compendium::{Compendium, Molecule};
use crate::engine::TransformationEngine;
use crate::error::{Error, Result};
use crate::matcher::IdentityIndex;
use crate::products::flatten_and_dedup;
use crate::rules::{RuleCategory, RuleLibrary};
use crate::structure::Canonicalizer;

pub const DEFAULT_ADJACENCY_FILE: &str = "linkage_new.csv";
pub const DEFAULT_EDGES_FILE: &str = "from_to_list.csv";
pub const DEFAULT_STRUCTURES_FILE: &str = "smiles_list.txt";

/// One discovered link: applying rule `rule` of `category` to compound
/// `source` predicted compound `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub target: usize,
    pub source: usize,
    pub category: RuleCategory,
    pub rule: usize,
}

impl Edge {
    /// The pair with the smaller index first.
    pub fn unordered(&self) -> (usize, usize) {
        (self.target.min(self.source), self.target.max(self.source))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkageGraph {
    adjacency: Vec<Vec<u8>>,
    edges: Vec<Edge>,
}

impl LinkageGraph {
    pub fn new(size: usize) -> Self {
        Self {
            adjacency: vec![vec![0; size]; size],
            edges: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn adjacency(&self) -> &[Vec<u8>] {
        &self.adjacency
    }

    /// Links in discovery order, duplicates included.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn is_linked(&self, i: usize, j: usize) -> bool {
        self.adjacency
            .get(i)
            .and_then(|row| row.get(j))
            .is_some_and(|&v| v == 1)
    }

    pub fn neighbors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency
            .get(i)
            .into_iter()
            .flat_map(|row| row.iter().enumerate())
            .filter(|&(_, &v)| v == 1)
            .map(|(j, _)| j)
    }

    /// Unordered linked pairs with the number of edge entries supporting
    /// each.
    pub fn unique_pairs(&self) -> BTreeMap<(usize, usize), usize> {
        let mut pairs = BTreeMap::new();
        for edge in &self.edges {
            *pairs.entry(edge.unordered()).or_insert(0) += 1;
        }
        pairs
    }

    /// Records a link. Self-links are ignored.
    fn record(&mut self, edge: Edge) {
        let (i, j) = (edge.source, edge.target);
        if i == j {
            return;
        }
        self.adjacency[i][j] = 1;
        self.adjacency[j][i] = 1;
        self.edges.push(edge);
    }
}

/// File names used by [`BuildOutput::persist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    pub adjacency: String,
    pub edges: String,
    pub structures: String,
}

impl Default for OutputNames {
    fn default() -> Self {
        Self {
            adjacency: DEFAULT_ADJACENCY_FILE.to_string(),
            edges: DEFAULT_EDGES_FILE.to_string(),
            structures: DEFAULT_STRUCTURES_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    #[default]
    Sequential,
    Parallel {
        workers: usize,
    },
}

impl Execution {
    /// `0` means sequential.
    pub fn from_workers(workers: usize) -> Self {
        match workers {
            0 => Execution::Sequential,
            workers => Execution::Parallel { workers },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub molecules: usize,
    pub compendium_dropped: usize,
    pub without_products: usize,
    pub products_discarded: usize,
    pub links: usize,
    pub edges: usize,
}

#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub graph: LinkageGraph,
    pub report: BuildReport,
    /// Canonical SMILES, index-aligned with the graph.
    pub structures: Vec<String>,
}

/// Paths written by [`BuildOutput::persist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedFiles {
    pub adjacency: PathBuf,
    pub edges: PathBuf,
    pub structures: PathBuf,
}

impl BuildOutput {
    /// Writes the adjacency matrix, the edge list and the structure list in
    /// the dataframe layout downstream tools read: a header row of column
    /// indices and every row prefixed by its own index.
    pub fn persist(&self, dir: impl AsRef<Path>, names: &OutputNames) -> Result<PersistedFiles> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(Error::io(dir))?;
        let files = PersistedFiles {
            adjacency: dir.join(&names.adjacency),
            edges: dir.join(&names.edges),
            structures: dir.join(&names.structures),
        };

        let mut writer = csv::Writer::from_path(&files.adjacency).map_err(Error::csv(&files.adjacency))?;
        let n = self.graph.len();
        writer
            .write_record(std::iter::once(String::new()).chain((0..n).map(|j| j.to_string())))
            .map_err(Error::csv(&files.adjacency))?;
        for (i, row) in self.graph.adjacency().iter().enumerate() {
            let cells = row.iter().map(|&v| if v == 1 { "1.0" } else { "0.0" }.to_string());
            writer
                .write_record(std::iter::once(i.to_string()).chain(cells))
                .map_err(Error::csv(&files.adjacency))?;
        }
        writer.flush().map_err(Error::io(&files.adjacency))?;

        let mut writer = csv::Writer::from_path(&files.edges).map_err(Error::csv(&files.edges))?;
        writer.write_record(["", "0", "1"]).map_err(Error::csv(&files.edges))?;
        for (k, edge) in self.graph.edges().iter().enumerate() {
            writer
                .write_record([k.to_string(), edge.target.to_string(), edge.source.to_string()])
                .map_err(Error::csv(&files.edges))?;
        }
        writer.flush().map_err(Error::io(&files.edges))?;

        let mut text = self.structures.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        fs::write(&files.structures, text).map_err(Error::io(&files.structures))?;

        info!(dir = %dir.display(), "wrote linkage outputs");
        Ok(files)
    }

    /// Writes the build report as JSON.
    pub fn write_report(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.report).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(Error::io(path))
    }
}

/// Links found for one compound.
#[derive(Debug, Default)]
struct MoleculeLinks {
    edges: Vec<Edge>,
    products: usize,
    discarded: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkageBuilder {
    canonicalizer: Canonicalizer,
    engine: TransformationEngine,
    execution: Execution,
}

impl LinkageBuilder {
    pub fn new(canonicalizer: Canonicalizer, engine: TransformationEngine) -> Self {
        Self {
            canonicalizer,
            engine,
            execution: Execution::Sequential,
        }
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    /// Builds the graph. Parallel builds reduce per-compound results in
    /// compendium order, so both modes produce the same edge list.
    pub fn build(
        &self,
        compendium: &Compendium,
        biological: &RuleLibrary,
        chemical: Option<&RuleLibrary>,
    ) -> Result<BuildOutput> {
        let libraries: Vec<&RuleLibrary> = std::iter::once(biological).chain(chemical).collect();
        let index = IdentityIndex::new(compendium.identity_keys());
        let molecules = compendium.molecules();

        let per_molecule: Vec<MoleculeLinks> = match self.execution {
            Execution::Sequential => molecules
                .iter()
                .enumerate()
                .map(|(i, m)| self.links_for(i, m, &libraries, &index))
                .collect(),
            Execution::Parallel { workers } => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
                pool.install(|| {
                    molecules
                        .par_iter()
                        .enumerate()
                        .map(|(i, m)| self.links_for(i, m, &libraries, &index))
                        .collect()
                })
            }
        };

        let mut graph = LinkageGraph::new(molecules.len());
        let mut report = BuildReport {
            molecules: molecules.len(),
            compendium_dropped: compendium.dropped(),
            ..BuildReport::default()
        };
        for links in per_molecule {
            if links.products == 0 {
                report.without_products += 1;
            }
            report.products_discarded += links.discarded;
            for edge in links.edges {
                graph.record(edge);
            }
        }
        report.edges = graph.edges().len();
        report.links = graph.unique_pairs().len();

        info!(
            molecules = report.molecules,
            links = report.links,
            edges = report.edges,
            without_products = report.without_products,
            discarded = report.products_discarded,
            "built linkage graph"
        );

        Ok(BuildOutput {
            graph,
            report,
            structures: compendium
                .canonical_structures()
                .into_iter()
                .map(String::from)
                .collect(),
        })
    }

    fn links_for(
        &self,
        i: usize,
        molecule: &Molecule,
        libraries: &[&RuleLibrary],
        index: &IdentityIndex,
    ) -> MoleculeLinks {
        let mut links = MoleculeLinks::default();
        for library in libraries {
            for (rule_index, rule) in library.iter().enumerate() {
                let nodes = self.engine.apply(molecule.structure(), rule);
                if nodes.is_empty() {
                    continue;
                }
                let products = flatten_and_dedup(nodes, &self.canonicalizer);
                links.products += products.len();
                links.discarded += products.discarded;
                for j in index.find_matches(products.identity_keys()) {
                    if j != i {
                        links.edges.push(Edge {
                            target: j,
                            source: i,
                            category: library.category(),
                            rule: rule_index,
                        });
                    }
                }
            }
        }
        debug!(
            molecule = i,
            products = links.products,
            links = links.edges.len(),
            "processed compound"
        );
        links
    }
}

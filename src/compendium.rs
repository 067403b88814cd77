//! The ordered set of compounds a linkage graph is built over.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::atom::Atom;
use crate::bond::Bond;
use crate::error::{Error, Result};
use crate::mol::Mol;
use crate::structure::{prepare, CanonicalStructure, Canonicalizer};

/// Column read from delimited compendium files unless told otherwise.
pub const DEFAULT_STRUCTURE_COLUMN: &str = "Isomeric SMILES";

#[derive(Debug, Clone)]
pub struct Molecule {
    /// Record number in the input, counting entries that were dropped.
    pub source_index: usize,
    pub raw_structure: String,
    pub canonical: CanonicalStructure,
    structure: Mol<Atom, Bond>,
}

impl Molecule {
    pub fn canonical_structure(&self) -> &str {
        &self.canonical.smiles
    }

    pub fn identity_key(&self) -> &str {
        &self.canonical.identity_key
    }

    /// The prepared graph rules are matched against.
    pub fn structure(&self) -> &Mol<Atom, Bond> {
        &self.structure
    }
}

/// Compounds that survived canonicalization, in input order. Positions in
/// this list are the node indices of the linkage graph.
#[derive(Debug, Clone, Default)]
pub struct Compendium {
    molecules: Vec<Molecule>,
    dropped: usize,
}

impl Compendium {
    pub fn from_structures<I, S>(structures: I, canonicalizer: &Canonicalizer) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut compendium = Self::default();
        for (source_index, raw) in structures.into_iter().enumerate() {
            let raw_structure = raw.into();
            match prepare(&raw_structure) {
                Ok(structure) => compendium.molecules.push(Molecule {
                    source_index,
                    canonical: canonicalizer.describe(&structure),
                    raw_structure,
                    structure,
                }),
                Err(err) => {
                    warn!(record = source_index, structure = %raw_structure, error = %err, "dropping compendium entry");
                    compendium.dropped += 1;
                }
            }
        }
        compendium
    }

    /// Reads structures from `path`.
    ///
    /// A delimited file whose header has `column` contributes that column.
    /// Anything else is read as one structure per non-empty line.
    pub fn load(path: impl AsRef<Path>, column: &str, canonicalizer: &Canonicalizer) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(Error::io(path))?;
        let structures = match column_values(path, &text, column)? {
            Some(values) => values,
            None => text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
        };
        let compendium = Self::from_structures(structures, canonicalizer);
        info!(
            path = %path.display(),
            molecules = compendium.len(),
            dropped = compendium.dropped,
            "loaded compendium"
        );
        Ok(compendium)
    }

    pub fn len(&self) -> usize {
        self.molecules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.molecules.is_empty()
    }

    /// Entries that failed to parse and were left out.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn molecules(&self) -> &[Molecule] {
        &self.molecules
    }

    pub fn get(&self, index: usize) -> Option<&Molecule> {
        self.molecules.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Molecule> {
        self.molecules.iter()
    }

    pub fn identity_keys(&self) -> Vec<&str> {
        self.molecules.iter().map(Molecule::identity_key).collect()
    }

    pub fn canonical_structures(&self) -> Vec<&str> {
        self.molecules.iter().map(Molecule::canonical_structure).collect()
    }
}

fn column_values(path: &Path, text: &str, column: &str) -> Result<Option<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers().map_err(Error::csv(path))?;
    let Some(position) = headers.iter().position(|h| h.trim() == column) else {
        return Ok(None);
    };
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(Error::csv(path))?;
        values.push(record.get(position).unwrap_or_default().trim().to_string());
    }
    Ok(Some(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_failures_are_dropped_and_counted() {
        let c = Compendium::from_structures(["CCO", "C1CC", "c1ccccc1", ""], &Canonicalizer::default());
        assert_eq!(c.len(), 2);
        assert_eq!(c.dropped(), 2);
        assert_eq!(c.molecules()[1].source_index, 2);
        assert_eq!(c.molecules()[1].raw_structure, "c1ccccc1");
    }

    #[test]
    fn entries_carry_canonical_form_and_key() {
        let canonicalizer = Canonicalizer::default();
        let c = Compendium::from_structures(["OCC"], &canonicalizer);
        let expected = canonicalizer.canonicalize("CCO").unwrap();
        let m = c.get(0).unwrap();
        assert_eq!(m.canonical_structure(), expected.smiles);
        assert_eq!(m.identity_key(), expected.identity_key);
        assert_eq!(m.structure().atom_count(), 3);
        assert_eq!(c.identity_keys(), [expected.identity_key.as_str()]);
    }

    #[test]
    fn load_named_column() {
        let file = write_file(
            "Name,Isomeric SMILES,Formula\nethanol,CCO,C2H6O\n\"bad, entry\",C1CC,x\nbenzene,c1ccccc1,C6H6\n",
        );
        let c = Compendium::load(file.path(), DEFAULT_STRUCTURE_COLUMN, &Canonicalizer::default())
            .unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.dropped(), 1);
        assert_eq!(c.molecules()[1].raw_structure, "c1ccccc1");
    }

    #[test]
    fn load_plain_lines_without_the_column() {
        let file = write_file("CCO\n\nc1ccccc1\nCC(=O)O\n");
        let c = Compendium::load(file.path(), DEFAULT_STRUCTURE_COLUMN, &Canonicalizer::default())
            .unwrap();
        assert_eq!(c.len(), 3);
        assert_eq!(c.canonical_structures().len(), 3);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Compendium::load("/nonexistent/compendium.csv", "smiles", &Canonicalizer::default())
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}

//! Identity-key lookup of products against the compendium.

use std::collections::{BTreeSet, HashMap};

use crate::structure::Canonicalizer;

/// Compendium positions by identity key. Several entries may share a key
/// (stereoisomers, or a compound listed twice).
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex {
    by_key: HashMap<String, Vec<usize>>,
    len: usize,
}

impl IdentityIndex {
    /// Indexes `keys` by their position in the iterator.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::default();
        for (i, key) in keys.into_iter().enumerate() {
            index.by_key.entry(key.into()).or_default().push(i);
            index.len = i + 1;
        }
        index
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn indices(&self, key: &str) -> &[usize] {
        self.by_key.get(key).map_or(&[], Vec::as_slice)
    }

    /// Every compendium position whose key equals one of `keys`.
    pub fn find_matches<'k>(&self, keys: impl IntoIterator<Item = &'k str>) -> BTreeSet<usize> {
        keys.into_iter()
            .flat_map(|key| self.indices(key).iter().copied())
            .collect()
    }
}

/// Compendium positions matched by any of `predicted`, given as SMILES.
///
/// Each prediction is canonicalized to get its identity key. Predictions
/// that fail to canonicalize match nothing.
pub fn find_matches<'p, S>(
    predicted: impl IntoIterator<Item = &'p str>,
    compendium_keys: &[S],
    canonicalizer: &Canonicalizer,
) -> BTreeSet<usize>
where
    S: AsRef<str>,
{
    let index = IdentityIndex::new(compendium_keys.iter().map(|k| k.as_ref().to_string()));
    let keys: Vec<String> = predicted
        .into_iter()
        .filter_map(|smiles| canonicalizer.canonicalize(smiles).ok())
        .map(|c| c.identity_key)
        .collect();
    index.find_matches(keys.iter().map(String::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(smiles: &str) -> String {
        Canonicalizer::default().canonicalize(smiles).unwrap().identity_key
    }

    #[test]
    fn shared_keys_return_every_index() {
        let index = IdentityIndex::new(["AAA", "BBB", "AAA"]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.indices("AAA"), [0, 2]);
        assert!(index.indices("CCC").is_empty());
        assert_eq!(
            index.find_matches(["BBB", "AAA"]),
            BTreeSet::from([0, 1, 2])
        );
    }

    #[test]
    fn predictions_match_by_truncated_key() {
        let compendium = [key("F[C@H](Cl)Br"), key("CCO"), key("CC=O")];
        let found = find_matches(
            ["F[C@@H](Cl)Br", "OCC", "C1CC1"],
            &compendium,
            &Canonicalizer::default(),
        );
        assert_eq!(found, BTreeSet::from([0, 1]));
    }

    #[test]
    fn unparsable_predictions_match_nothing() {
        let compendium = [key("CCO")];
        let found = find_matches(["C1CC", ""], &compendium, &Canonicalizer::default());
        assert!(found.is_empty());
    }

    #[test]
    fn full_length_keys_separate_stereoisomers() {
        let exact = Canonicalizer::new(27);
        let compendium = [exact.canonicalize("F[C@H](Cl)Br").unwrap().identity_key];
        assert!(find_matches(["F[C@@H](Cl)Br"], &compendium, &exact).is_empty());
        assert_eq!(
            find_matches(["F[C@H](Cl)Br"], &compendium, &exact),
            BTreeSet::from([0])
        );
    }
}

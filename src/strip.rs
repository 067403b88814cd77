use crate::atom::{Atom, Chirality};
use crate::bond::{Bond, BondStereo};
use crate::mol::Mol;

pub fn strip_chirality(mol: &mut Mol<Atom, Bond>) {
    for idx in mol.atoms().collect::<Vec<_>>() {
        mol.atom_mut(idx).chirality = Chirality::None;
    }
}

pub fn strip_bond_stereo(mol: &mut Mol<Atom, Bond>) {
    for idx in mol.bonds().collect::<Vec<_>>() {
        mol.bond_mut(idx).stereo = BondStereo::None;
    }
}

pub fn strip_isotope(mol: &mut Mol<Atom, Bond>) {
    for idx in mol.atoms().collect::<Vec<_>>() {
        mol.atom_mut(idx).isotope = 0;
    }
}

/// Connectivity layer of a structure: no stereo, no isotopes.
pub fn skeleton(mol: &Mol<Atom, Bond>) -> Mol<Atom, Bond> {
    let mut out = mol.clone();
    strip_chirality(&mut out);
    strip_bond_stereo(&mut out);
    strip_isotope(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::{from_smiles, to_canonical_smiles};

    #[test]
    fn strip_chirality_removes_tetrahedral() {
        let mut mol = from_smiles("F[C@H](Cl)Br").unwrap();
        strip_chirality(&mut mol);
        assert!(mol.atoms().all(|a| mol.atom(a).chirality == Chirality::None));
    }

    #[test]
    fn strip_bond_stereo_removes_ez() {
        let mut mol = from_smiles("F/C=C/F").unwrap();
        strip_bond_stereo(&mut mol);
        assert!(mol.bonds().all(|e| mol.bond(e).stereo == BondStereo::None));
    }

    #[test]
    fn skeleton_merges_stereoisomers_and_isotopologues() {
        let c = |s: &str| to_canonical_smiles(&skeleton(&from_smiles(s).unwrap()));
        assert_eq!(c("N[C@@H](C)C(=O)O"), c("N[C@H](C)C(=O)O"));
        assert_eq!(c("F/C=C/F"), c(r"F/C=C\F"));
        assert_eq!(c("[13CH3]O"), c("CO"));
        assert_ne!(c("CCO"), c("COC"));
    }
}

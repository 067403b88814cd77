/// Tetrahedral chirality tag.
///
/// The tag is relative to the atom's *reference order*: the implicit
/// hydrogen first (when the atom carries one), then the heavy neighbours in
/// ascending node index. Looking from the first reference neighbour, the
/// remaining ones run counterclockwise for [`Ccw`](Chirality::Ccw) (`@`) and
/// clockwise for [`Cw`](Chirality::Cw) (`@@`). See
/// [`Mol::stereo_neighbors`](crate::Mol::stereo_neighbors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Chirality {
    #[default]
    None,
    /// Clockwise (`@@`).
    Cw,
    /// Counterclockwise (`@`).
    Ccw,
}

impl Chirality {
    pub fn inverted(self) -> Chirality {
        match self {
            Chirality::Cw => Chirality::Ccw,
            Chirality::Ccw => Chirality::Cw,
            Chirality::None => Chirality::None,
        }
    }

    /// Returns the tag after re-expressing the neighbour order by a
    /// permutation of the given parity (`true` = even).
    pub fn permuted(self, even: bool) -> Chirality {
        if even {
            self
        } else {
            self.inverted()
        }
    }
}

/// Atom type for molecular graphs.
///
/// # Examples
///
/// ```
/// use taxlink::Atom;
///
/// let carbon = Atom {
///     atomic_num: 6,
///     hydrogen_count: 3,
///     ..Atom::default()
/// };
/// assert_eq!(carbon.atomic_num, 6);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Atom {
    /// Atomic number (1 = H, 6 = C, 7 = N, …).
    pub atomic_num: u8,
    /// Formal charge in elementary charge units.
    pub formal_charge: i8,
    /// Mass number. `0` means natural isotopic abundance.
    pub isotope: u16,
    pub chirality: Chirality,
    /// Number of implicit hydrogens. These are not graph nodes.
    pub hydrogen_count: u8,
    /// Whether this atom is in an aromatic ring.
    ///
    /// Set by the SMILES reader for lowercase atoms and recomputed by
    /// aromaticity perception. Bond orders in a
    /// [`Mol<Atom, Bond>`](crate::Mol) stay Kekulé regardless of this flag.
    pub is_aromatic: bool,
}

impl Atom {
    pub fn new(atomic_num: u8) -> Self {
        Self {
            atomic_num,
            ..Self::default()
        }
    }
}

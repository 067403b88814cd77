use petgraph::graph::NodeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BondOrder {
    #[default]
    Single,
    Double,
    Triple,
}

impl BondOrder {
    pub fn valence(self) -> u8 {
        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
        }
    }
}

/// Double-bond geometry.
///
/// The first reference atom is a neighbour of the bond's first endpoint (as
/// returned by [`Mol::bond_endpoints`](crate::Mol::bond_endpoints)), the
/// second a neighbour of its second endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BondStereo {
    #[default]
    None,
    Cis(NodeIndex, NodeIndex),
    Trans(NodeIndex, NodeIndex),
}

impl BondStereo {
    pub fn refs(self) -> Option<(NodeIndex, NodeIndex, bool)> {
        match self {
            BondStereo::None => None,
            BondStereo::Cis(a, b) => Some((a, b, false)),
            BondStereo::Trans(a, b) => Some((a, b, true)),
        }
    }

    pub fn from_refs(a: NodeIndex, b: NodeIndex, trans: bool) -> BondStereo {
        if trans {
            BondStereo::Trans(a, b)
        } else {
            BondStereo::Cis(a, b)
        }
    }
}

/// Kekulé bond. `is_aromatic` is set by aromaticity perception.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bond {
    pub order: BondOrder,
    pub is_aromatic: bool,
    pub stereo: BondStereo,
}

impl Bond {
    pub fn new(order: BondOrder) -> Self {
        Self {
            order,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SmilesBondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
    #[default]
    Implicit,
}

/// Bond as written, before kekulization resolves aromatic bonds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmilesBond {
    pub order: SmilesBondOrder,
    pub stereo: BondStereo,
}

impl SmilesBond {
    pub fn new(order: SmilesBondOrder) -> Self {
        Self {
            order,
            stereo: BondStereo::None,
        }
    }
}

impl From<&Bond> for SmilesBond {
    fn from(bond: &Bond) -> Self {
        let order = if bond.is_aromatic {
            SmilesBondOrder::Aromatic
        } else {
            match bond.order {
                BondOrder::Single => SmilesBondOrder::Single,
                BondOrder::Double => SmilesBondOrder::Double,
                BondOrder::Triple => SmilesBondOrder::Triple,
            }
        };
        Self {
            order,
            stereo: bond.stereo,
        }
    }
}

use crate::bond::{Bond, BondStereo, SmilesBond};

/// Bonds that carry double-bond geometry. Graph rewrites that move atoms use
/// it to keep the stereo references pointing at the right nodes.
pub trait HasBondStereo {
    fn bond_stereo(&self) -> BondStereo;
    fn bond_stereo_mut(&mut self) -> &mut BondStereo;
}

impl HasBondStereo for Bond {
    fn bond_stereo(&self) -> BondStereo {
        self.stereo
    }

    fn bond_stereo_mut(&mut self) -> &mut BondStereo {
        &mut self.stereo
    }
}

impl HasBondStereo for SmilesBond {
    fn bond_stereo(&self) -> BondStereo {
        self.stereo
    }

    fn bond_stereo_mut(&mut self) -> &mut BondStereo {
        &mut self.stereo
    }
}

//! Sample input file.

use std::fs;
use std::path::Path;

/// A complete input for a Bi2Te3 bulk band structure run
pub const SAMPLE_INPUT: &str = "\
&TB_FILE
Hrfile = 'wannier90_hr.dat'
Package = 'VASP'
/

&CONTROL
BulkBand_calc         = T
BulkFS_calc           = F
BulkGap_cube_calc     = F
BulkGap_plane_calc    = F
SlabBand_calc         = F
WireBand_calc         = F
SlabSS_calc           = F
SlabArc_calc          = F
SlabSpintexture_calc  = F
wanniercenter_calc    = F
/

&SYSTEM
NSLAB = 10
NSLAB1= 4
NSLAB2= 4
NumOccupied = 18
SOC = 1
E_FERMI = 4.4195
/

&PARAMETERS
Eta_Arc = 0.001
E_arc = 0.0
OmegaNum = 100
OmegaMin = -0.6
OmegaMax =  0.5
Nk1 = 101
Nk2 = 101
Nk3 = 101
NP = 2
Gap_threshold = 0.01
/

LATTICE
Angstrom
-2.069  -3.583614  0.000000
 2.069  -3.583614  0.000000
 0.000   2.389075  9.546667

ATOM_POSITIONS
5
Direct
Bi 0.3990    0.3990    0.6970
Bi 0.6010    0.6010    0.3030
Te 0     0     0.5
Te 0.2060    0.2060    0.1180
Te 0.7940    0.7940    0.8820

PROJECTORS
3 3 3 3 3
Bi pz px py
Bi pz px py
Te pz px py
Te pz px py
Te pz px py

SURFACE
 1  0  0
 0  1  0

KPATH_BULK
4
G 0.00000 0.00000 0.0000 Z 0.00000 0.00000 0.5000
Z 0.00000 0.00000 0.5000 F 0.50000 0.50000 0.0000
F 0.50000 0.50000 0.0000 G 0.00000 0.00000 0.0000
G 0.00000 0.00000 0.0000 L 0.50000 0.00000 0.0000

KPATH_SLAB
2
K 0.33 0.67 G 0.0 0.0
G 0.0 0.0 M 0.5 0.5

KPLANE_SLAB
-0.1 -0.1
 0.1  0.1

KPLANE_BULK
-0.50 -0.50
 0.50  0.50

KCUBE_BULK
-0.50 -0.50 -0.50
 0.50  0.50  0.50
";

/// Write the sample input to `path`, creating parent directories
pub fn write_sample(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, SAMPLE_INPUT)
}

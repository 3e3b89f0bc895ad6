use crate::error::{PhenoError, Result};
use crate::models::{CompositeObject, RegionKind, RegionSet};

/// Merge every kept region into one object: outer regions unioned, holes
/// subtracted.
pub fn compose(regions: &RegionSet) -> Result<CompositeObject> {
    if regions.is_empty() {
        return Err(PhenoError::EmptyComposition);
    }
    let mask = regions.rasterize();
    Ok(CompositeObject {
        regions: regions.clone(),
        mask,
    })
}

/// One object per top-level outer region, each carrying its holes and any
/// islands nested inside them. Objects follow raster order.
pub fn compose_each(regions: &RegionSet) -> Result<Vec<CompositeObject>> {
    if regions.is_empty() {
        return Err(PhenoError::EmptyComposition);
    }
    regions
        .roots()
        .into_iter()
        .filter(|&root| {
            regions
                .get(root)
                .is_some_and(|region| region.kind == RegionKind::Outer)
        })
        .map(|root| compose(&regions.subset(&regions.subtree(root))))
        .collect()
}

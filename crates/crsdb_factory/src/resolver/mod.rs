//! Search for coordinate operations between two CRS.
//!
//! Three strategies are tried in order by [`AuthorityFactory::find_operations`]:
//! operations recorded directly between the two CRS, pairs of operations
//! sharing an intermediate CRS, and pairs sharing an intermediate datum.
//! Every strategy ranks its results the same way and caches them per
//! parameter set.

mod datum_pivot;
mod direct;
mod filter;
mod pivot;

use tracing::debug;

use crsdb_core::crs::Crs;
use crsdb_core::extent::Extent;
use crsdb_core::ident::ObjectId;
use crsdb_core::operation::CoordinateOperation;
use crsdb_error::{FactoryError, Result};

use crate::factory::AuthorityFactory;

/// Tuning of an operation search.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSearchOptions {
    /// Use the distributed name of grids instead of the catalog one.
    pub use_alternative_grid_names: bool,
    /// Drop operations needing a grid that is not available.
    pub discard_if_missing_grid: bool,
    /// Count grids with a known direct download URL as available.
    pub consider_known_grids_as_available: bool,
    /// Drop operations superseded by another candidate.
    pub discard_superseded: bool,
    /// Also look for operations recorded from target to source, returned
    /// inverted.
    pub try_reverse_order: bool,
    pub intersecting_extent1: Option<Extent>,
    pub intersecting_extent2: Option<Extent>,
}

impl Default for OperationSearchOptions {
    fn default() -> Self {
        OperationSearchOptions {
            use_alternative_grid_names: true,
            discard_if_missing_grid: false,
            consider_known_grids_as_available: false,
            discard_superseded: true,
            try_reverse_order: false,
            intersecting_extent1: None,
            intersecting_extent2: None,
        }
    }
}

impl OperationSearchOptions {
    fn filter_extents(&self) -> impl Iterator<Item = &Extent> {
        self.intersecting_extent1
            .iter()
            .chain(self.intersecting_extent2.iter())
    }

    fn has_filter_extents(&self) -> bool {
        self.filter_extents().next().is_some()
    }

    /// Whether `extent` (unknown when `None`) intersects every filter extent.
    fn accepts_extent(&self, extent: Option<&Extent>) -> bool {
        match extent {
            Some(extent) => self.filter_extents().all(|f| f.intersects(extent)),
            None => true,
        }
    }
}

/// Restrictions on the intermediate CRS of pivot searches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntermediateOptions {
    /// Only pivot through these CRS. Empty allows any.
    pub intermediate_crs: Vec<ObjectId>,
    /// Authorities the legs may come from. Empty means the factory's
    /// authority, or any when the factory has none.
    pub allowed_authorities: Vec<String>,
    /// Only pivot through geographic CRS, rejecting intermediates whose datum
    /// is older than both endpoint datums.
    pub geographic_only: bool,
}

/// Key of a search in the operation cache.
fn cache_key(
    kind: &str,
    factory: &AuthorityFactory<'_>,
    source: &ObjectId,
    target: &ObjectId,
    options: &OperationSearchOptions,
    intermediate: Option<&IntermediateOptions>,
) -> String {
    format!(
        "{kind}|{}|{source}|{target}|{options:?}|{intermediate:?}",
        factory.authority()
    )
}

/// Logs and drops a candidate that failed to build. Fatal errors abort the
/// search.
fn skip_candidate(what: &str, err: FactoryError) -> Result<()> {
    if err.is_fatal() {
        return Err(err);
    }
    debug!(candidate = %what, error = %err, "skipping candidate");
    Ok(())
}

impl AuthorityFactory<'_> {
    /// Authorities legs of a pivot search may come from. Empty means any.
    fn leg_authorities(&self, intermediate: &IntermediateOptions) -> Vec<String> {
        if !intermediate.allowed_authorities.is_empty() {
            intermediate.allowed_authorities.clone()
        } else if self.is_any_authority() {
            Vec::new()
        } else {
            vec![self.authority().to_string()]
        }
    }

    /// Operations from source to target, trying direct operations (both
    /// directions), then intermediate CRS, then intermediate datums.
    pub fn find_operations(
        &self,
        source: &ObjectId,
        target: &ObjectId,
        options: &OperationSearchOptions,
        intermediate: &IntermediateOptions,
    ) -> Result<Vec<CoordinateOperation>> {
        let direct_options = OperationSearchOptions {
            try_reverse_order: true,
            ..options.clone()
        };
        let ops = self.create_from_coordinate_reference_system_codes(source, target, &direct_options)?;
        if !ops.is_empty() {
            return Ok(ops);
        }

        let source_crs = self
            .with_authority(&source.authority)
            .create_coordinate_reference_system(&source.code)?;
        let target_crs = self
            .with_authority(&target.authority)
            .create_coordinate_reference_system(&target.code)?;

        let mut pivot_options = intermediate.clone();
        if source_crs.is_geographic()
            && target_crs.is_geographic()
            && intermediate.intermediate_crs.is_empty()
        {
            pivot_options.geographic_only = true;
        }
        let ops =
            self.create_from_crs_codes_with_intermediates(source, target, options, &pivot_options)?;
        if !ops.is_empty() {
            return Ok(ops);
        }

        if matches!(
            (&source_crs, &target_crs),
            (Crs::Geodetic(_), Crs::Geodetic(_))
        ) {
            return self.create_between_geodetic_crs_with_datum_based_intermediates(
                &source_crs,
                &target_crs,
                options,
                intermediate,
            );
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crsdb_core::extent::GeographicBoundingBox;

    #[test]
    fn extent_acceptance() {
        let germany = Extent::from_bbox(GeographicBoundingBox::new(47.27, 5.87, 55.09, 15.04));
        let norway = Extent::from_bbox(GeographicBoundingBox::new(57.93, -3.7, 81.05, 33.0));

        let options = OperationSearchOptions::default();
        assert!(!options.has_filter_extents());
        assert!(options.accepts_extent(Some(&norway)));

        let options = OperationSearchOptions {
            intersecting_extent1: Some(germany.clone()),
            ..Default::default()
        };
        assert!(options.has_filter_extents());
        assert!(options.accepts_extent(Some(&germany)));
        assert!(!options.accepts_extent(Some(&norway)));
        assert!(options.accepts_extent(Some(&Extent::unknown())));
        assert!(options.accepts_extent(None));
    }
}

//! Pairs of operations chained through an intermediate CRS.

use std::collections::HashSet;

use tracing::debug;

use crsdb_core::crs::Crs;
use crsdb_core::ident::ObjectId;
use crsdb_core::operation::{ConcatenatedOperation, CoordinateOperation};
use crsdb_error::Result;
use crsdb_sqlite::exec::SqlBuilder;

use super::{IntermediateOptions, OperationSearchOptions, cache_key, skip_candidate};
use crate::factory::AuthorityFactory;

/// End of a catalog operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Side {
    Source,
    Target,
}

impl Side {
    fn column(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Target => "target",
        }
    }

    fn other(&self) -> Side {
        match self {
            Side::Source => Side::Target,
            Side::Target => Side::Source,
        }
    }
}

/// Sides of the first leg touching the source and of the second leg
/// touching the target. The first leg is inverted when the source is its
/// target, the second when the target is its source.
const PATTERNS: [(Side, Side); 4] = [
    (Side::Source, Side::Target),
    (Side::Source, Side::Source),
    (Side::Target, Side::Target),
    (Side::Target, Side::Source),
];

/// A candidate pair of catalog operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LegPair {
    first: (String, ObjectId),
    second: (String, ObjectId),
    invert_first: bool,
    invert_second: bool,
    intermediate: ObjectId,
}

/// Whether `op` is a concatenation with a step touching `crs`.
fn passes_through(op: &CoordinateOperation, crs: &Crs) -> bool {
    let CoordinateOperation::Concatenated(concat) = op else {
        return false;
    };
    concat.steps.iter().any(|step| {
        step.source_crs().is_some_and(|s| s.is_same_object(crs))
            || step.target_crs().is_some_and(|t| t.is_same_object(crs))
    })
}

impl AuthorityFactory<'_> {
    /// Operations from `source` to `target` made of two catalog operations
    /// sharing an intermediate CRS, ranked.
    pub fn create_from_crs_codes_with_intermediates(
        &self,
        source: &ObjectId,
        target: &ObjectId,
        options: &OperationSearchOptions,
        intermediate: &IntermediateOptions,
    ) -> Result<Vec<CoordinateOperation>> {
        if source == target {
            return Ok(Vec::new());
        }
        let key = cache_key("pivot", self, source, target, options, Some(intermediate));
        if let Some(ops) = self.context().caches().crs_to_crs_operations.get(&key) {
            return Ok(ops);
        }

        let mut pairs = Vec::new();
        let mut seen = HashSet::new();
        for (first_near, second_near) in PATTERNS {
            for pair in self.leg_pairs(source, target, first_near, second_near, intermediate)? {
                if seen.insert(pair.clone()) {
                    pairs.push(pair);
                }
            }
        }

        let ops = self.assemble_pairs(source, target, pairs, options, intermediate)?;
        self.context()
            .caches()
            .crs_to_crs_operations
            .insert(key, ops.clone());
        Ok(ops)
    }

    fn leg_pairs(
        &self,
        source: &ObjectId,
        target: &ObjectId,
        first_near: Side,
        second_near: Side,
        intermediate: &IntermediateOptions,
    ) -> Result<Vec<LegPair>> {
        let near1 = first_near.column();
        let mid1 = first_near.other().column();
        let near2 = second_near.column();
        let mid2 = second_near.other().column();

        let mut builder = SqlBuilder::new("");
        let src_auth = builder.bind(&source.authority);
        let src_code = builder.bind(&source.code);
        let tgt_auth = builder.bind(&target.authority);
        let tgt_code = builder.bind(&target.code);

        builder.push(&format!(
            "SELECT v1.table_name, v1.auth_name, v1.code, v2.table_name, v2.auth_name, v2.code, \
             v1.{mid1}_crs_auth_name, v1.{mid1}_crs_code \
             FROM coordinate_operation_view v1 \
             JOIN coordinate_operation_view v2 ON v2.{mid2}_crs_auth_name = v1.{mid1}_crs_auth_name \
             AND v2.{mid2}_crs_code = v1.{mid1}_crs_code \
             LEFT JOIN usage u1 ON u1.object_table_name = v1.table_name \
             AND u1.object_auth_name = v1.auth_name AND u1.object_code = v1.code \
             LEFT JOIN extent e1 ON e1.auth_name = u1.extent_auth_name AND e1.code = u1.extent_code \
             LEFT JOIN usage u2 ON u2.object_table_name = v2.table_name \
             AND u2.object_auth_name = v2.auth_name AND u2.object_code = v2.code \
             LEFT JOIN extent e2 ON e2.auth_name = u2.extent_auth_name AND e2.code = u2.extent_code \
             WHERE v1.{near1}_crs_auth_name = {src_auth} AND v1.{near1}_crs_code = {src_code} \
             AND v2.{near2}_crs_auth_name = {tgt_auth} AND v2.{near2}_crs_code = {tgt_code} \
             AND NOT (v1.{mid1}_crs_auth_name = {src_auth} AND v1.{mid1}_crs_code = {src_code}) \
             AND NOT (v1.{mid1}_crs_auth_name = {tgt_auth} AND v1.{mid1}_crs_code = {tgt_code}) \
             AND v1.deprecated = 0 AND v2.deprecated = 0 \
             AND intersects_bbox(e1.south_lat, e1.west_lon, e1.north_lat, e1.east_lon, \
             e2.south_lat, e2.west_lon, e2.north_lat, e2.east_lon) = 1"
        ));

        let authorities = self.leg_authorities(intermediate);
        if !authorities.is_empty() {
            builder.push(" AND v1.auth_name IN ");
            builder.push_list(authorities.iter());
            builder.push(" AND v2.auth_name IN ");
            builder.push_list(authorities.iter());
        }

        if !intermediate.intermediate_crs.is_empty() {
            builder.push(" AND (");
            for (i, id) in intermediate.intermediate_crs.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder.push(&format!("(v1.{mid1}_crs_auth_name = "));
                builder.push_param(&id.authority);
                builder.push(&format!(" AND v1.{mid1}_crs_code = "));
                builder.push_param(&id.code);
                builder.push(")");
            }
            builder.push(")");
        }

        if intermediate.geographic_only {
            builder.push(&format!(
                " AND EXISTS (SELECT 1 FROM geodetic_crs x WHERE x.auth_name = v1.{mid1}_crs_auth_name \
                 AND x.code = v1.{mid1}_crs_code AND x.type IN ('geographic 2D', 'geographic 3D'))"
            ));
        }

        let rows = self.run(builder.sql(), builder.params())?;
        rows.iter()
            .map(|row| {
                Ok(LegPair {
                    first: (
                        row.get_string(0)?,
                        ObjectId::new(row.get_string(1)?, row.get_string(2)?),
                    ),
                    second: (
                        row.get_string(3)?,
                        ObjectId::new(row.get_string(4)?, row.get_string(5)?),
                    ),
                    invert_first: first_near == Side::Target,
                    invert_second: second_near == Side::Source,
                    intermediate: ObjectId::new(row.get_string(6)?, row.get_string(7)?),
                })
            })
            .collect()
    }

    fn build_leg(
        &self,
        leg: &(String, ObjectId),
        invert: bool,
        options: &OperationSearchOptions,
    ) -> Result<CoordinateOperation> {
        let (table, id) = leg;
        let op = self.with_authority(&id.authority).operation_from_table(
            table,
            &id.code,
            options.use_alternative_grid_names,
        )?;
        Ok(if invert { op.inverse() } else { op })
    }

    /// Whether the datum of `intermediate` is too old to pivot through: both
    /// endpoint datums are dated and more recent than it.
    fn is_outdated_pivot(&self, source: &Crs, target: &Crs, intermediate: &ObjectId) -> Result<bool> {
        let (Some(source_date), Some(target_date)) = (
            source.geodetic_datum().and_then(|d| d.publication_date()),
            target.geodetic_datum().and_then(|d| d.publication_date()),
        ) else {
            return Ok(false);
        };
        let mid = self
            .with_authority(&intermediate.authority)
            .create_coordinate_reference_system(&intermediate.code)?;
        let Some(mid_date) = mid.geodetic_datum().and_then(|d| d.publication_date()) else {
            return Ok(false);
        };
        Ok(mid_date < source_date && mid_date < target_date)
    }

    fn assemble_pairs(
        &self,
        source: &ObjectId,
        target: &ObjectId,
        pairs: Vec<LegPair>,
        options: &OperationSearchOptions,
        intermediate: &IntermediateOptions,
    ) -> Result<Vec<CoordinateOperation>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let source_crs = self
            .with_authority(&source.authority)
            .create_coordinate_reference_system(&source.code)?;
        let target_crs = self
            .with_authority(&target.authority)
            .create_coordinate_reference_system(&target.code)?;

        let mut ops = Vec::new();
        for pair in pairs {
            let what = format!("{} + {}", pair.first.1, pair.second.1);
            if intermediate.geographic_only {
                match self.is_outdated_pivot(&source_crs, &target_crs, &pair.intermediate) {
                    Ok(true) => {
                        debug!(intermediate = %pair.intermediate, "pivot datum older than both endpoints");
                        continue;
                    }
                    Ok(false) => (),
                    Err(e) => {
                        skip_candidate(&what, e)?;
                        continue;
                    }
                }
            }

            let legs = self
                .build_leg(&pair.first, pair.invert_first, options)
                .and_then(|first| {
                    Ok((first, self.build_leg(&pair.second, pair.invert_second, options)?))
                });
            let (first, second) = match legs {
                Ok(legs) => legs,
                Err(e) => {
                    skip_candidate(&what, e)?;
                    continue;
                }
            };
            if passes_through(&first, &target_crs) || passes_through(&second, &source_crs) {
                debug!(candidate = %what, "leg passes through the other endpoint");
                continue;
            }

            match ConcatenatedOperation::from_steps(vec![first, second]) {
                Ok(concat) => ops.push(CoordinateOperation::Concatenated(concat.into())),
                Err(e) => skip_candidate(&what, e)?,
            }
        }
        let ops = self.filter_by_extents_with_fallback(ops, options);
        self.rank_and_filter_grids(ops, options)
    }
}

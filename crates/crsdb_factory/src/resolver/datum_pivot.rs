//! Pairs of operations chained through an intermediate datum.
//!
//! Legs may start or end at any geodetic CRS of the endpoint datums; the
//! gaps between CRS of one datum are filled by the operation composer.

use std::collections::HashMap;

use tracing::debug;

use crsdb_core::crs::Crs;
use crsdb_core::extent::GeographicBoundingBox;
use crsdb_core::ident::ObjectId;
use crsdb_core::operation::{ConcatenatedOperation, CoordinateOperation};
use crsdb_error::{Result, factory_err};
use crsdb_sqlite::exec::SqlBuilder;

use super::{IntermediateOptions, OperationSearchOptions, cache_key, skip_candidate};
use crate::factory::AuthorityFactory;

/// A catalog operation between two geodetic CRS with their datums.
#[derive(Debug, Clone)]
struct DatumLeg {
    table: String,
    id: ObjectId,
    source_datum: ObjectId,
    target_datum: ObjectId,
    /// One per usage. Empty when the area of use is unknown.
    bboxes: Vec<GeographicBoundingBox>,
}

impl DatumLeg {
    /// Orientation leaving `datum`, and the datum reached.
    fn leaving(&self, datum: &ObjectId) -> Option<(bool, &ObjectId)> {
        if &self.source_datum == datum {
            Some((false, &self.target_datum))
        } else if &self.target_datum == datum {
            Some((true, &self.source_datum))
        } else {
            None
        }
    }

    fn intersects(&self, other: &DatumLeg) -> bool {
        if self.bboxes.is_empty() || other.bboxes.is_empty() {
            return true;
        }
        self.bboxes
            .iter()
            .any(|a| other.bboxes.iter().any(|b| a.intersects(b)))
    }
}

fn datum_id(crs: &Crs) -> Result<Option<ObjectId>> {
    let datum = crs
        .geodetic_datum()
        .ok_or_else(|| factory_err!("'{}' is not a geodetic crs", crs.name()))?;
    Ok(datum.props().id.clone())
}

impl AuthorityFactory<'_> {
    /// Operations between two geodetic CRS made of two catalog operations
    /// sharing an intermediate datum, with the conversions needed between
    /// CRS of the same datum spliced in.
    pub fn create_between_geodetic_crs_with_datum_based_intermediates(
        &self,
        source: &Crs,
        target: &Crs,
        options: &OperationSearchOptions,
        intermediate: &IntermediateOptions,
    ) -> Result<Vec<CoordinateOperation>> {
        if !matches!(source, Crs::Geodetic(_)) || !matches!(target, Crs::Geodetic(_)) {
            return Err(factory_err!(
                "datum based search needs geodetic crs, got a {} and a {}",
                source.kind_name(),
                target.kind_name()
            ));
        }
        let (Some(source_datum), Some(target_datum)) = (datum_id(source)?, datum_id(target)?)
        else {
            return Ok(Vec::new());
        };
        if source_datum == target_datum {
            return Ok(Vec::new());
        }
        let (Some(source_id), Some(target_id)) = (source.id(), target.id()) else {
            return Ok(Vec::new());
        };

        let key = cache_key("datum", self, source_id, target_id, options, Some(intermediate));
        if let Some(ops) = self.context().caches().crs_to_crs_operations.get(&key) {
            return Ok(ops);
        }

        let legs = self.legs_touching_datums(&source_datum, &target_datum, intermediate)?;
        let mut ops = Vec::new();
        for first in &legs {
            let Some((invert_first, pivot)) = first.leaving(&source_datum) else {
                continue;
            };
            if pivot == &source_datum || pivot == &target_datum {
                continue;
            }
            for second in &legs {
                let Some((invert_second_from_target, second_pivot)) = second.leaving(&target_datum)
                else {
                    continue;
                };
                if second_pivot != pivot || !first.intersects(second) {
                    continue;
                }
                let what = format!("{} + {}", first.id, second.id);
                match self.chain_through_datum(
                    source,
                    target,
                    (first, invert_first),
                    (second, !invert_second_from_target),
                    options,
                ) {
                    Ok(op) => ops.push(op),
                    Err(e) => skip_candidate(&what, e)?,
                }
            }
        }

        let ops = self.filter_by_extents_with_fallback(ops, options);
        let ops = self.rank_and_filter_grids(ops, options)?;
        self.context()
            .caches()
            .crs_to_crs_operations
            .insert(key, ops.clone());
        Ok(ops)
    }

    /// Operations between geodetic CRS where either end uses one of the two
    /// datums, one entry per operation carrying the bounds of all its usages.
    fn legs_touching_datums(
        &self,
        source_datum: &ObjectId,
        target_datum: &ObjectId,
        intermediate: &IntermediateOptions,
    ) -> Result<Vec<DatumLeg>> {
        let mut builder = SqlBuilder::new("");
        let sa = builder.bind(&source_datum.authority);
        let sc = builder.bind(&source_datum.code);
        let ta = builder.bind(&target_datum.authority);
        let tc = builder.bind(&target_datum.code);
        builder.push(&format!(
            "SELECT v.table_name, v.auth_name, v.code, gs.datum_auth_name, gs.datum_code, \
             gt.datum_auth_name, gt.datum_code, e.south_lat, e.west_lon, e.north_lat, e.east_lon \
             FROM coordinate_operation_view v \
             JOIN geodetic_crs gs ON gs.auth_name = v.source_crs_auth_name \
             AND gs.code = v.source_crs_code \
             JOIN geodetic_crs gt ON gt.auth_name = v.target_crs_auth_name \
             AND gt.code = v.target_crs_code \
             LEFT JOIN usage u ON u.object_table_name = v.table_name \
             AND u.object_auth_name = v.auth_name AND u.object_code = v.code \
             LEFT JOIN extent e ON e.auth_name = u.extent_auth_name AND e.code = u.extent_code \
             WHERE v.deprecated = 0 \
             AND gs.datum_code IS NOT NULL AND gt.datum_code IS NOT NULL \
             AND ((gs.datum_auth_name = {sa} AND gs.datum_code = {sc}) \
             OR (gt.datum_auth_name = {sa} AND gt.datum_code = {sc}) \
             OR (gs.datum_auth_name = {ta} AND gs.datum_code = {tc}) \
             OR (gt.datum_auth_name = {ta} AND gt.datum_code = {tc}))"
        ));
        let authorities = self.leg_authorities(intermediate);
        if !authorities.is_empty() {
            builder.push(" AND v.auth_name IN ");
            builder.push_list(authorities.iter());
        }
        builder.push(" ORDER BY v.auth_name, v.code");

        let mut index: HashMap<ObjectId, usize> = HashMap::new();
        let mut legs: Vec<DatumLeg> = Vec::new();
        for row in self.run(builder.sql(), builder.params())? {
            let id = ObjectId::new(row.get_string(1)?, row.get_string(2)?);
            let bbox = match (
                row.get_opt_f64(7)?,
                row.get_opt_f64(8)?,
                row.get_opt_f64(9)?,
                row.get_opt_f64(10)?,
            ) {
                (Some(s), Some(w), Some(n), Some(e)) => Some(GeographicBoundingBox::new(s, w, n, e)),
                _ => None,
            };
            if let Some(&i) = index.get(&id) {
                legs[i].bboxes.extend(bbox);
                continue;
            }
            let source_datum = ObjectId::new(row.get_string(3)?, row.get_string(4)?);
            let target_datum = ObjectId::new(row.get_string(5)?, row.get_string(6)?);
            if source_datum == target_datum {
                continue;
            }
            index.insert(id.clone(), legs.len());
            legs.push(DatumLeg {
                table: row.get_string(0)?,
                id,
                source_datum,
                target_datum,
                bboxes: bbox.into_iter().collect(),
            });
        }
        debug!(count = legs.len(), "legs touching endpoint datums");
        Ok(legs)
    }

    /// source -> first start, first, first end -> second start, second,
    /// second end -> target.
    fn chain_through_datum(
        &self,
        source: &Crs,
        target: &Crs,
        (first, invert_first): (&DatumLeg, bool),
        (second, invert_second): (&DatumLeg, bool),
        options: &OperationSearchOptions,
    ) -> Result<CoordinateOperation> {
        let build = |leg: &DatumLeg, invert: bool| -> Result<CoordinateOperation> {
            let op = self.with_authority(&leg.id.authority).operation_from_table(
                &leg.table,
                &leg.id.code,
                options.use_alternative_grid_names,
            )?;
            Ok(if invert { op.inverse() } else { op })
        };
        let first = build(first, invert_first)?;
        let second = build(second, invert_second)?;

        let endpoints = |op: &CoordinateOperation| -> Result<(Crs, Crs)> {
            match (op.source_crs(), op.target_crs()) {
                (Some(s), Some(t)) => Ok((s.clone(), t.clone())),
                _ => Err(factory_err!("operation '{}' is not bound", op.name())),
            }
        };
        let (first_start, first_end) = endpoints(&first)?;
        let (second_start, second_end) = endpoints(&second)?;

        let composer = &self.collaborators().composer;
        let mut steps = composer.same_datum_operations(source, &first_start)?;
        steps.push(first);
        steps.extend(composer.same_datum_operations(&first_end, &second_start)?);
        steps.push(second);
        steps.extend(composer.same_datum_operations(&second_end, target)?);

        Ok(CoordinateOperation::Concatenated(
            ConcatenatedOperation::from_steps(steps)?.into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(code: &str, bboxes: Vec<GeographicBoundingBox>) -> DatumLeg {
        DatumLeg {
            table: "helmert_transformation".to_string(),
            id: ObjectId::new("XTEST", code),
            source_datum: ObjectId::new("XTEST", "1"),
            target_datum: ObjectId::new("XTEST", "2"),
            bboxes,
        }
    }

    #[test]
    fn legs_intersect_through_any_usage() {
        let afghanistan = GeographicBoundingBox::new(29.4, 60.5, 38.48, 74.92);
        let europe = GeographicBoundingBox::new(32.88, -16.1, 84.73, 40.18);
        let germany = GeographicBoundingBox::new(47.27, 5.87, 55.09, 15.04);

        let german = leg("1", vec![germany]);
        assert!(leg("2", vec![afghanistan, europe]).intersects(&german));
        assert!(german.intersects(&leg("3", vec![afghanistan, europe])));
        assert!(!leg("4", vec![afghanistan]).intersects(&german));
        assert!(leg("5", Vec::new()).intersects(&german));
    }
}

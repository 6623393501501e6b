//! Operations recorded in the catalog between two given CRS.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crsdb_core::crs::Crs;
use crsdb_core::extent::Extent;
use crsdb_core::ident::{ObjectId, ObjectUsage};
use crsdb_core::operation::CoordinateOperation;
use crsdb_error::Result;
use crsdb_sqlite::Param;
use crsdb_sqlite::exec::SqlBuilder;

use super::{OperationSearchOptions, cache_key, skip_candidate};
use crate::factory::AuthorityFactory;

impl AuthorityFactory<'_> {
    /// Operations recorded from `source` to `target` (and, with
    /// `try_reverse_order`, from `target` to `source`, inverted), filtered
    /// and ranked.
    ///
    /// Operations are restricted to the factory's authority unless it has
    /// none.
    pub fn create_from_coordinate_reference_system_codes(
        &self,
        source: &ObjectId,
        target: &ObjectId,
        options: &OperationSearchOptions,
    ) -> Result<Vec<CoordinateOperation>> {
        if source == target {
            return Ok(Vec::new());
        }
        let key = cache_key("direct", self, source, target, options, None);
        if let Some(ops) = self.context().caches().crs_to_crs_operations.get(&key) {
            return Ok(ops);
        }

        let ops = match self.projection_shortcut(source, target, options)? {
            Some(op) => vec![op],
            None => self.direct_operations(source, target, options)?,
        };

        self.context()
            .caches()
            .crs_to_crs_operations
            .insert(key, ops.clone());
        Ok(ops)
    }

    /// Conversion of a projected CRS when the other CRS is its base.
    fn projection_shortcut(
        &self,
        source: &ObjectId,
        target: &ObjectId,
        options: &OperationSearchOptions,
    ) -> Result<Option<CoordinateOperation>> {
        let mut pairs = vec![(source, target, false)];
        if options.try_reverse_order {
            pairs.push((target, source, true));
        }

        for (base, projected, reversed) in pairs {
            let rows = self.run(
                "SELECT 1 FROM projected_crs WHERE auth_name = ?1 AND code = ?2 \
                 AND geodetic_crs_auth_name = ?3 AND geodetic_crs_code = ?4",
                &[
                    Param::from(&projected.authority),
                    Param::from(&projected.code),
                    Param::from(&base.authority),
                    Param::from(&base.code),
                ],
            )?;
            if rows.is_empty() {
                continue;
            }

            let projected_crs = self
                .with_authority(&projected.authority)
                .create_projected_crs(&projected.code)?;
            let conversion = &projected_crs.conversion;
            if !self.is_any_authority()
                && conversion
                    .props
                    .id
                    .as_ref()
                    .is_some_and(|id| id.authority != self.authority())
            {
                continue;
            }
            let base_crs = self
                .with_authority(&base.authority)
                .create_coordinate_reference_system(&base.code)?;

            let mut bound = conversion.bound_to(base_crs, Crs::Projected(projected_crs.clone()));
            bound.props.usages = vec![ObjectUsage {
                scope: None,
                extent: Arc::new(Extent::world()),
            }];
            let op = CoordinateOperation::Conversion(Arc::new(bound));
            debug!(%base, %projected, reversed, "projection shortcut");
            return Ok(Some(if reversed { op.inverse() } else { op }));
        }
        Ok(None)
    }

    fn direct_operations(
        &self,
        source: &ObjectId,
        target: &ObjectId,
        options: &OperationSearchOptions,
    ) -> Result<Vec<CoordinateOperation>> {
        let mut builder = SqlBuilder::new("");
        let auth_cond = if self.is_any_authority() {
            String::new()
        } else {
            format!(" AND v.auth_name = {}", builder.bind(self.authority()))
        };
        let select = |builder: &mut SqlBuilder, from: &ObjectId, to: &ObjectId, reversed: u8| {
            let from_auth = builder.bind(&from.authority);
            let from_code = builder.bind(&from.code);
            let to_auth = builder.bind(&to.authority);
            let to_code = builder.bind(&to.code);
            format!(
                "SELECT v.table_name, v.auth_name, v.code, {reversed} AS reversed, \
                 v.accuracy AS accuracy, v.accuracy IS NULL AS unknown_accuracy, \
                 pseudo_area_from_swne(e.south_lat, e.west_lon, e.north_lat, e.east_lon) AS area \
                 FROM coordinate_operation_view v \
                 LEFT JOIN usage u ON u.object_table_name = v.table_name \
                 AND u.object_auth_name = v.auth_name AND u.object_code = v.code \
                 LEFT JOIN extent e ON e.auth_name = u.extent_auth_name AND e.code = u.extent_code \
                 WHERE v.source_crs_auth_name = {from_auth} AND v.source_crs_code = {from_code} \
                 AND v.target_crs_auth_name = {to_auth} AND v.target_crs_code = {to_code} \
                 AND v.deprecated = 0{auth_cond}"
            )
        };

        let mut sql = select(&mut builder, source, target, 0);
        if options.try_reverse_order {
            sql.push_str(" UNION ALL ");
            sql.push_str(&select(&mut builder, target, source, 1));
        }
        sql.push_str(" ORDER BY area DESC, unknown_accuracy, accuracy");
        builder.push(&sql);

        let rows = self.run(builder.sql(), builder.params())?;
        let mut seen = HashSet::new();
        let mut ops = Vec::new();
        for row in rows {
            let table = row.get_string(0)?;
            let id = ObjectId::new(row.get_string(1)?, row.get_string(2)?);
            let reversed = row.get_bool(3)?;
            if !seen.insert((id.clone(), reversed)) {
                continue;
            }
            match self.with_authority(&id.authority).operation_from_table(
                &table,
                &id.code,
                options.use_alternative_grid_names,
            ) {
                Ok(op) => ops.push(if reversed { op.inverse() } else { op }),
                Err(e) => skip_candidate(&id.to_string(), e)?,
            }
        }

        let ops = if options.discard_superseded {
            self.discard_superseded(ops, options)?
        } else {
            ops
        };
        let ops = self.filter_by_extents_with_fallback(ops, options);
        self.rank_and_filter_grids(ops, options)
    }
}

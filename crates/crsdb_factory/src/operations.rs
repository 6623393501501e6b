//! Conversions, transformations and concatenated operations.

use std::sync::Arc;

use crsdb_core::crs::Crs;
use crsdb_core::ident::ObjectProperties;
use crsdb_core::operation::{
    ConcatenatedOperation, Conversion, CoordinateOperation, N_MAX_PARAMS, OperationMethod,
    OperationParameter, ParameterValue, Transformation, compute_metadata, fix_steps_direction,
};
use crsdb_core::unit::Measure;
use crsdb_error::{Result, ResultExt, factory_err};
use crsdb_sqlite::{Param, Row};

use crate::factory::{AuthorityFactory, one_row, optional_identity};

/// Columns shared by the three transformation tables, in order.
const TRANSFORMATION_HEADER: &str = "name, description, method_auth_name, method_code, \
     method_name, source_crs_auth_name, source_crs_code, target_crs_auth_name, \
     target_crs_code, accuracy";

/// `param1_auth_name, ..., param7_uom_code`.
fn param_columns() -> String {
    (1..=N_MAX_PARAMS)
        .map(|i| {
            format!(
                "param{i}_auth_name, param{i}_code, param{i}_name, param{i}_value, \
                 param{i}_uom_auth_name, param{i}_uom_code"
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parts common to every transformation row.
struct TransformationHeader {
    props: ObjectProperties,
    method: Arc<OperationMethod>,
    source: Crs,
    target: Crs,
    accuracy: Option<f64>,
}

impl AuthorityFactory<'_> {
    pub fn create_conversion(&self, code: &str) -> Result<Arc<Conversion>> {
        let sql = format!(
            "SELECT name, method_auth_name, method_code, method_name, deprecated, description, \
             {} FROM conversion WHERE auth_name = ?1 AND code = ?2",
            param_columns()
        );
        let rows = self.run(&sql, &self.key_params(code))?;
        let row = one_row(rows, "conversion", self.authority(), code)?;
        self.conversion_from_row(&row, code)
            .building("conversion", self.authority(), code)
    }

    fn conversion_from_row(&self, row: &Row, code: &str) -> Result<Arc<Conversion>> {
        let props = self.properties(
            "conversion",
            code,
            row.get_string(0)?,
            row.get_opt_string(5)?,
            row.get_bool(4)?,
        )?;
        let method = OperationMethod {
            props: optional_identity(
                row.get_opt_string(1)?,
                row.get_opt_string(2)?,
                row.get_string(3)?,
            ),
        };
        let params = self.measure_params(row, 6)?;
        Ok(Arc::new(Conversion::try_new(props, Arc::new(method), params)?))
    }

    /// Parameters stored as `N_MAX_PARAMS` column groups starting at
    /// `offset`. Groups without a name are unused.
    fn measure_params(&self, row: &Row, offset: usize) -> Result<Vec<OperationParameter>> {
        let mut params = Vec::new();
        for i in 0..N_MAX_PARAMS {
            let base = offset + i * 6;
            let Some(name) = row.get_opt_string(base + 2)? else {
                continue;
            };
            let value = row.get_opt_f64(base + 3)?.ok_or_else(|| {
                factory_err!("parameter '{name}' has no value")
            })?;
            let unit =
                self.optional_unit(row.get_opt_string(base + 4)?, row.get_opt_string(base + 5)?)?;
            params.push(OperationParameter {
                props: optional_identity(
                    row.get_opt_string(base)?,
                    row.get_opt_string(base + 1)?,
                    name,
                ),
                value: ParameterValue::Measure(Measure::new(value, unit)),
            });
        }
        Ok(params)
    }

    /// Any operation, conversions included.
    pub fn create_coordinate_operation(
        &self,
        code: &str,
        use_alternative_grid_names: bool,
    ) -> Result<CoordinateOperation> {
        let rows = self.run(
            "SELECT table_name FROM coordinate_operation_with_conversion_view \
             WHERE auth_name = ?1 AND code = ?2",
            &self.key_params(code),
        )?;
        let row = one_row(rows, "coordinate operation", self.authority(), code)?;
        self.operation_from_table(&row.get_string(0)?, code, use_alternative_grid_names)
    }

    pub(crate) fn operation_from_table(
        &self,
        table: &str,
        code: &str,
        use_alternative_grid_names: bool,
    ) -> Result<CoordinateOperation> {
        match table {
            "conversion" => Ok(CoordinateOperation::Conversion(self.create_conversion(code)?)),
            "helmert_transformation" => self
                .helmert_transformation(code)
                .map(CoordinateOperation::Transformation),
            "grid_transformation" => self
                .grid_transformation(code, use_alternative_grid_names)
                .map(CoordinateOperation::Transformation),
            "other_transformation" => self
                .other_transformation(code)
                .map(CoordinateOperation::Transformation),
            "concatenated_operation" => self
                .concatenated_operation(code, use_alternative_grid_names)
                .map(CoordinateOperation::Concatenated),
            other => Err(factory_err!("'{other}' is not an operation table")),
        }
    }

    fn transformation_header(&self, table: &str, row: &Row, code: &str) -> Result<TransformationHeader> {
        let deprecated_idx = row.len() - 1;
        let props = self.properties(
            table,
            code,
            row.get_string(0)?,
            row.get_opt_string(1)?,
            row.get_bool(deprecated_idx)?,
        )?;
        let method = OperationMethod {
            props: optional_identity(
                row.get_opt_string(2)?,
                row.get_opt_string(3)?,
                row.get_string(4)?,
            ),
        };
        let source = self
            .with_authority(&row.get_string(5)?)
            .create_coordinate_reference_system(&row.get_string(6)?)?;
        let target = self
            .with_authority(&row.get_string(7)?)
            .create_coordinate_reference_system(&row.get_string(8)?)?;
        Ok(TransformationHeader {
            props,
            method: Arc::new(method),
            source,
            target,
            accuracy: row.get_opt_f64(9)?,
        })
    }

    fn optional_crs(&self, authority: Option<String>, code: Option<String>) -> Result<Option<Crs>> {
        match (authority, code) {
            (Some(authority), Some(code)) => self
                .with_authority(&authority)
                .create_coordinate_reference_system(&code)
                .map(Some),
            _ => Ok(None),
        }
    }

    fn helmert_transformation(&self, code: &str) -> Result<Arc<Transformation>> {
        let sql = format!(
            "SELECT {TRANSFORMATION_HEADER}, tx, ty, tz, translation_uom_auth_name, \
             translation_uom_code, rx, ry, rz, rotation_uom_auth_name, rotation_uom_code, \
             scale_difference, scale_difference_uom_auth_name, scale_difference_uom_code, \
             operation_version, deprecated \
             FROM helmert_transformation WHERE auth_name = ?1 AND code = ?2"
        );
        let rows = self.run(&sql, &self.key_params(code))?;
        let row = one_row(rows, "helmert transformation", self.authority(), code)?;
        self.helmert_from_row(&row, code)
            .building("helmert transformation", self.authority(), code)
    }

    fn helmert_from_row(&self, row: &Row, code: &str) -> Result<Arc<Transformation>> {
        let header = self.transformation_header("helmert_transformation", row, code)?;

        let mut params = Vec::with_capacity(7);
        let mut push = |epsg_code: &str, name: &str, value: f64, unit| {
            params.push(OperationParameter {
                props: optional_identity(
                    Some("EPSG".to_string()),
                    Some(epsg_code.to_string()),
                    name.to_string(),
                ),
                value: ParameterValue::Measure(Measure::new(value, unit)),
            });
        };

        let translation_unit =
            self.optional_unit(row.get_opt_string(13)?, row.get_opt_string(14)?)?;
        push("8605", "X-axis translation", row.get_f64(10)?, translation_unit.clone());
        push("8606", "Y-axis translation", row.get_f64(11)?, translation_unit.clone());
        push("8607", "Z-axis translation", row.get_f64(12)?, translation_unit);

        if let (Some(rx), Some(ry), Some(rz)) =
            (row.get_opt_f64(15)?, row.get_opt_f64(16)?, row.get_opt_f64(17)?)
        {
            let rotation_unit =
                self.optional_unit(row.get_opt_string(18)?, row.get_opt_string(19)?)?;
            push("8608", "X-axis rotation", rx, rotation_unit.clone());
            push("8609", "Y-axis rotation", ry, rotation_unit.clone());
            push("8610", "Z-axis rotation", rz, rotation_unit);
        }
        if let Some(scale) = row.get_opt_f64(20)? {
            let scale_unit = self.optional_unit(row.get_opt_string(21)?, row.get_opt_string(22)?)?;
            push("8611", "Scale difference", scale, scale_unit);
        }

        Ok(Arc::new(Transformation::try_new(
            header.props,
            header.method,
            params,
            header.source,
            header.target,
            None,
            header.accuracy,
            row.get_opt_string(23)?,
        )?))
    }

    fn grid_transformation(
        &self,
        code: &str,
        use_alternative_grid_names: bool,
    ) -> Result<Arc<Transformation>> {
        let sql = format!(
            "SELECT {TRANSFORMATION_HEADER}, grid_param_auth_name, grid_param_code, \
             grid_param_name, grid_name, grid2_param_auth_name, grid2_param_code, \
             grid2_param_name, grid2_name, interpolation_crs_auth_name, interpolation_crs_code, \
             operation_version, deprecated \
             FROM grid_transformation WHERE auth_name = ?1 AND code = ?2"
        );
        let rows = self.run(&sql, &self.key_params(code))?;
        let row = one_row(rows, "grid transformation", self.authority(), code)?;
        self.grid_from_row(&row, code, use_alternative_grid_names)
            .building("grid transformation", self.authority(), code)
    }

    fn grid_from_row(
        &self,
        row: &Row,
        code: &str,
        use_alternative_grid_names: bool,
    ) -> Result<Arc<Transformation>> {
        let header = self.transformation_header("grid_transformation", row, code)?;

        let mut params = Vec::with_capacity(2);
        for base in [10, 14] {
            let (Some(name), Some(grid)) = (row.get_opt_string(base + 2)?, row.get_opt_string(base + 3)?)
            else {
                continue;
            };
            let grid = if use_alternative_grid_names {
                self.alternative_grid_name(&grid)?.unwrap_or(grid)
            } else {
                grid
            };
            params.push(OperationParameter {
                props: optional_identity(
                    row.get_opt_string(base)?,
                    row.get_opt_string(base + 1)?,
                    name,
                ),
                value: ParameterValue::Filename(grid),
            });
        }
        let interpolation = self.optional_crs(row.get_opt_string(18)?, row.get_opt_string(19)?)?;

        Ok(Arc::new(Transformation::try_new(
            header.props,
            header.method,
            params,
            header.source,
            header.target,
            interpolation,
            header.accuracy,
            row.get_opt_string(20)?,
        )?))
    }

    /// Name the grid is distributed under, if it differs from the catalog one.
    fn alternative_grid_name(&self, grid: &str) -> Result<Option<String>> {
        let rows = self.run(
            "SELECT proj_grid_name FROM grid_alternatives WHERE original_grid_name = ?1",
            &[Param::from(grid)],
        )?;
        match rows.first() {
            Some(row) => row.get_opt_string(0),
            None => Ok(None),
        }
    }

    fn other_transformation(&self, code: &str) -> Result<Arc<Transformation>> {
        let sql = format!(
            "SELECT {TRANSFORMATION_HEADER}, {}, interpolation_crs_auth_name, \
             interpolation_crs_code, operation_version, deprecated \
             FROM other_transformation WHERE auth_name = ?1 AND code = ?2",
            param_columns()
        );
        let rows = self.run(&sql, &self.key_params(code))?;
        let row = one_row(rows, "other transformation", self.authority(), code)?;
        self.other_from_row(&row, code)
            .building("other transformation", self.authority(), code)
    }

    fn other_from_row(&self, row: &Row, code: &str) -> Result<Arc<Transformation>> {
        let header = self.transformation_header("other_transformation", row, code)?;
        let params = self.measure_params(row, 10)?;
        let tail = 10 + N_MAX_PARAMS * 6;
        let interpolation =
            self.optional_crs(row.get_opt_string(tail)?, row.get_opt_string(tail + 1)?)?;

        Ok(Arc::new(Transformation::try_new(
            header.props,
            header.method,
            params,
            header.source,
            header.target,
            interpolation,
            header.accuracy,
            row.get_opt_string(tail + 2)?,
        )?))
    }

    fn concatenated_operation(
        &self,
        code: &str,
        use_alternative_grid_names: bool,
    ) -> Result<Arc<ConcatenatedOperation>> {
        let rows = self.run(
            "SELECT name, description, source_crs_auth_name, source_crs_code, \
             target_crs_auth_name, target_crs_code, accuracy, operation_version, deprecated \
             FROM concatenated_operation WHERE auth_name = ?1 AND code = ?2",
            &self.key_params(code),
        )?;
        let row = one_row(rows, "concatenated operation", self.authority(), code)?;
        self.concatenated_from_row(&row, code, use_alternative_grid_names)
            .building("concatenated operation", self.authority(), code)
    }

    fn concatenated_from_row(
        &self,
        row: &Row,
        code: &str,
        use_alternative_grid_names: bool,
    ) -> Result<Arc<ConcatenatedOperation>> {
        let props = self.properties(
            "concatenated_operation",
            code,
            row.get_string(0)?,
            row.get_opt_string(1)?,
            row.get_bool(8)?,
        )?;
        let source = self
            .with_authority(&row.get_string(2)?)
            .create_coordinate_reference_system(&row.get_string(3)?)?;
        let target = self
            .with_authority(&row.get_string(4)?)
            .create_coordinate_reference_system(&row.get_string(5)?)?;

        let step_rows = self.run(
            "SELECT step_auth_name, step_code, step_direction FROM concatenated_operation_step \
             WHERE operation_auth_name = ?1 AND operation_code = ?2 ORDER BY step_number",
            &self.key_params(code),
        )?;
        let mut steps = Vec::with_capacity(step_rows.len());
        for step_row in step_rows {
            let step = self
                .with_authority(&step_row.get_string(0)?)
                .create_coordinate_operation(&step_row.get_string(1)?, use_alternative_grid_names)?;
            match step_row.get_opt_string(2)?.as_deref() {
                Some("reverse") => steps.push(step.inverse()),
                _ => steps.push(step),
            }
        }

        let steps = fix_steps_direction(&source, &target, steps)?;
        let accuracy = match row.get_opt_f64(6)? {
            Some(accuracy) => Some(accuracy),
            None => compute_metadata(&steps).accuracy,
        };
        Ok(Arc::new(ConcatenatedOperation::try_new(props, steps, accuracy)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_column_groups() {
        let columns = param_columns();
        assert_eq!(N_MAX_PARAMS * 6, columns.split(", ").count());
        assert!(columns.starts_with("param1_auth_name, param1_code, param1_name"));
        assert!(columns.ends_with("param7_uom_auth_name, param7_uom_code"));
    }
}

//! Catalog listings.

use crsdb_core::extent::GeographicBoundingBox;
use crsdb_core::unit::UnitKind;
use crsdb_error::{FactoryError, Result};
use crsdb_sqlite::exec::SqlBuilder;

use crate::factory::AuthorityFactory;
use crate::object_type::{ObjectType, filter_condition};

/// Summary of a CRS, without building it.
#[derive(Debug, Clone, PartialEq)]
pub struct CrsInfo {
    pub auth_name: String,
    pub code: String,
    pub name: String,
    /// Catalog type, e.g. "geographic 2D" or "projected".
    pub crs_type: String,
    pub deprecated: bool,
    pub bbox: Option<GeographicBoundingBox>,
    pub area_name: Option<String>,
    pub projection_method_name: Option<String>,
    pub celestial_body_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitInfo {
    pub auth_name: String,
    pub code: String,
    pub name: String,
    pub kind: UnitKind,
    pub conversion_factor: Option<f64>,
    pub proj_short_name: Option<String>,
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CelestialBodyInfo {
    pub auth_name: String,
    pub name: String,
}

impl AuthorityFactory<'_> {
    /// `WHERE`/`AND` restriction on `column` to this authority, if any.
    fn push_authority_filter(&self, builder: &mut SqlBuilder, keyword: &str, column: &str) {
        if !self.is_any_authority() {
            builder
                .push(" ")
                .push(keyword)
                .push(" ")
                .push(column)
                .push(" = ")
                .push_param(self.authority());
        }
    }

    /// Sorted codes of objects of type `ty`.
    pub fn get_authority_codes(&self, ty: ObjectType, allow_deprecated: bool) -> Result<Vec<String>> {
        let mut builder = SqlBuilder::new("SELECT o.code FROM object_view o WHERE ");
        builder.push(&filter_condition(&[ty], "o"));
        self.push_authority_filter(&mut builder, "AND", "o.auth_name");
        if !allow_deprecated {
            builder.push(" AND o.deprecated = 0");
        }

        let rows = self.run(builder.sql(), builder.params())?;
        let mut codes = rows
            .iter()
            .map(|row| row.get_string(0))
            .collect::<Result<Vec<_>>>()?;
        codes.sort();
        codes.dedup();
        Ok(codes)
    }

    /// Name of the object with this code, whatever its kind. Coordinate
    /// systems have an empty description.
    pub fn get_description_text(&self, code: &str) -> Result<String> {
        let rows = self.run(
            "SELECT name FROM object_view WHERE auth_name = ?1 AND code = ?2 \
             ORDER BY table_name LIMIT 1",
            &self.key_params(code),
        )?;
        match rows.first() {
            Some(row) => row.get_string_or_empty(0),
            None => Err(FactoryError::no_such_code("object", self.authority(), code)),
        }
    }

    pub fn get_crs_info_list(&self) -> Result<Vec<CrsInfo>> {
        let mut builder = SqlBuilder::new(
            "SELECT c.auth_name, c.code, c.name, c.type, c.deprecated, \
             e.south_lat, e.west_lon, e.north_lat, e.east_lon, e.name, conv.method_name, cb.name \
             FROM crs_view c \
             LEFT JOIN usage u ON u.object_table_name = c.table_name \
             AND u.object_auth_name = c.auth_name AND u.object_code = c.code \
             LEFT JOIN extent e ON e.auth_name = u.extent_auth_name AND e.code = u.extent_code \
             LEFT JOIN projected_crs p ON c.table_name = 'projected_crs' \
             AND p.auth_name = c.auth_name AND p.code = c.code \
             LEFT JOIN conversion conv ON conv.auth_name = p.conversion_auth_name \
             AND conv.code = p.conversion_code \
             LEFT JOIN geodetic_crs g ON \
             (c.table_name = 'geodetic_crs' AND g.auth_name = c.auth_name AND g.code = c.code) \
             OR (g.auth_name = p.geodetic_crs_auth_name AND g.code = p.geodetic_crs_code) \
             LEFT JOIN geodetic_datum d ON d.auth_name = g.datum_auth_name AND d.code = g.datum_code \
             LEFT JOIN ellipsoid el ON el.auth_name = d.ellipsoid_auth_name \
             AND el.code = d.ellipsoid_code \
             LEFT JOIN celestial_body cb ON cb.auth_name = el.celestial_body_auth_name \
             AND cb.code = el.celestial_body_code",
        );
        self.push_authority_filter(&mut builder, "WHERE", "c.auth_name");
        builder.push(" ORDER BY c.auth_name, c.code, u.auth_name, u.code");

        let rows = self.run(builder.sql(), builder.params())?;
        let mut infos: Vec<CrsInfo> = Vec::with_capacity(rows.len());
        for row in rows {
            let auth_name = row.get_string(0)?;
            let code = row.get_string(1)?;
            if infos
                .last()
                .is_some_and(|last| last.auth_name == auth_name && last.code == code)
            {
                continue;
            }
            let bbox = match (
                row.get_opt_f64(5)?,
                row.get_opt_f64(6)?,
                row.get_opt_f64(7)?,
                row.get_opt_f64(8)?,
            ) {
                (Some(s), Some(w), Some(n), Some(e)) => Some(GeographicBoundingBox::new(s, w, n, e)),
                _ => None,
            };
            infos.push(CrsInfo {
                auth_name,
                code,
                name: row.get_string(2)?,
                crs_type: row.get_string(3)?,
                deprecated: row.get_bool(4)?,
                bbox,
                area_name: row.get_opt_string(9)?,
                projection_method_name: row.get_opt_string(10)?,
                celestial_body_name: row.get_opt_string(11)?,
            });
        }
        Ok(infos)
    }

    pub fn get_unit_list(&self) -> Result<Vec<UnitInfo>> {
        let mut builder = SqlBuilder::new(
            "SELECT auth_name, code, name, type, conv_factor, proj_short_name, deprecated \
             FROM unit_of_measure",
        );
        self.push_authority_filter(&mut builder, "WHERE", "auth_name");
        builder.push(" ORDER BY auth_name, code");

        let rows = self.run(builder.sql(), builder.params())?;
        let mut units = Vec::with_capacity(rows.len());
        for row in rows {
            let ty = row.get_string(3)?;
            let Some(kind) = UnitKind::from_catalog_type(&ty) else {
                continue;
            };
            units.push(UnitInfo {
                auth_name: row.get_string(0)?,
                code: row.get_string(1)?,
                name: row.get_string(2)?,
                kind,
                conversion_factor: row.get_opt_f64(4)?,
                proj_short_name: row.get_opt_string(5)?,
                deprecated: row.get_bool(6)?,
            });
        }
        Ok(units)
    }

    pub fn get_celestial_body_list(&self) -> Result<Vec<CelestialBodyInfo>> {
        let mut builder = SqlBuilder::new("SELECT auth_name, name FROM celestial_body");
        self.push_authority_filter(&mut builder, "WHERE", "auth_name");
        builder.push(" ORDER BY auth_name, name");

        self.run(builder.sql(), builder.params())?
            .iter()
            .map(|row| {
                Ok(CelestialBodyInfo {
                    auth_name: row.get_string(0)?,
                    name: row.get_string(1)?,
                })
            })
            .collect()
    }

    /// Every authority with at least one object in the catalog.
    pub fn get_authorities(&self) -> Result<Vec<String>> {
        let rows = self.run("SELECT auth_name FROM authority_list ORDER BY auth_name", &[])?;
        rows.iter().map(|row| row.get_string(0)).collect()
    }
}

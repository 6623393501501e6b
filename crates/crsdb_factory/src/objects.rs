//! Units, extents, ellipsoids, prime meridians, datums and coordinate
//! systems.

use std::sync::{Arc, LazyLock};

use chrono::NaiveDate;
use regex::Regex;

use crsdb_core::cs::{Axis, AxisDirection, CoordinateSystem, CsKind};
use crsdb_core::datum::{
    DatumEnsemble, Ellipsoid, EllipsoidShape, EnsembleMembers, GeodeticDatum,
    GeodeticReferenceFrame, PrimeMeridian, VerticalDatum, VerticalReferenceFrame,
};
use crsdb_core::extent::{Extent, GeographicBoundingBox};
use crsdb_core::ident::{ObjectId, ObjectProperties};
use crsdb_core::unit::{Measure, UnitKind, UnitOfMeasure};
use crsdb_error::{Qualified, Result, ResultExt, factory_err};
use crsdb_sqlite::Row;
use crsdb_sqlite::layout::LayoutFeature;

use crate::factory::{AuthorityFactory, one_row};

static POLAR_AXIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(North|South) along ([0-9]+(?:\.[0-9]+)?)°([EW])$").unwrap()
});

static UNITY: LazyLock<Arc<UnitOfMeasure>> = LazyLock::new(|| {
    Arc::new(UnitOfMeasure {
        props: ObjectProperties::named("unity"),
        kind: UnitKind::Scale,
        conversion_factor: 1.0,
    })
});

/// Unit of axes and parameters without one in the catalog.
pub(crate) fn unity() -> Arc<UnitOfMeasure> {
    UNITY.clone()
}

/// Direction and meridian of an axis orientation, e.g. "North along 90°E".
pub(crate) fn parse_orientation(orientation: &str) -> (AxisDirection, Option<Measure>) {
    if let Some(caps) = POLAR_AXIS.captures(orientation) {
        let direction = if &caps[1] == "North" {
            AxisDirection::North
        } else {
            AxisDirection::South
        };
        if let Ok(mut longitude) = caps[2].parse::<f64>() {
            if &caps[3] == "W" {
                longitude = -longitude;
            }
            return (
                direction,
                Some(Measure::new(longitude, UnitOfMeasure::degree())),
            );
        }
    }
    (AxisDirection::from_catalog(orientation), None)
}

fn parse_publication_date(value: Option<String>) -> Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|e| factory_err!("invalid publication date '{s}': {e}"))
        })
        .transpose()
}

impl AuthorityFactory<'_> {
    /// Datum date columns, NULL on catalogs predating them.
    fn datum_date_columns(&self) -> &'static str {
        if self.context().supports(LayoutFeature::DatumPublicationDates) {
            "publication_date, frame_reference_epoch"
        } else {
            "NULL, NULL"
        }
    }

    /// Units given by an optional (authority, code) pair.
    pub(crate) fn optional_unit(
        &self,
        authority: Option<String>,
        code: Option<String>,
    ) -> Result<Arc<UnitOfMeasure>> {
        match (authority, code) {
            (Some(authority), Some(code)) => {
                self.with_authority(&authority).create_unit_of_measure(&code)
            }
            _ => Ok(unity()),
        }
    }

    pub fn create_unit_of_measure(&self, code: &str) -> Result<Arc<UnitOfMeasure>> {
        let id = self.id(code);
        if let Some(unit) = self.context().caches().units.get(&id) {
            return Ok(unit);
        }

        let rows = self.run(
            "SELECT name, conv_factor, type, deprecated FROM unit_of_measure \
             WHERE auth_name = ?1 AND code = ?2",
            &self.key_params(code),
        )?;
        let row = one_row(rows, "unit of measure", self.authority(), code)?;
        let unit = unit_from_row(&row, id.clone())
            .building("unit of measure", self.authority(), code)?;

        let unit = Arc::new(unit);
        self.context().caches().units.insert(id, unit.clone());
        Ok(unit)
    }

    pub fn create_extent(&self, code: &str) -> Result<Arc<Extent>> {
        let id = self.id(code);
        if let Some(extent) = self.context().caches().extents.get(&id) {
            return Ok(extent);
        }

        let rows = self.run(
            "SELECT description, south_lat, north_lat, west_lon, east_lon FROM extent \
             WHERE auth_name = ?1 AND code = ?2",
            &self.key_params(code),
        )?;
        let row = one_row(rows, "extent", self.authority(), code)?;

        let bbox = match (
            row.get_opt_f64(1)?,
            row.get_opt_f64(2)?,
            row.get_opt_f64(3)?,
            row.get_opt_f64(4)?,
        ) {
            (Some(south), Some(north), Some(west), Some(east)) => {
                Some(GeographicBoundingBox::new(south, west, north, east))
            }
            _ => None,
        };
        let extent = Arc::new(Extent {
            id: Some(id.clone()),
            description: row.get_opt_string(0)?,
            bbox,
        });
        self.context().caches().extents.insert(id, extent.clone());
        Ok(extent)
    }

    pub fn create_ellipsoid(&self, code: &str) -> Result<Arc<Ellipsoid>> {
        let id = self.id(code);
        if let Some(ellipsoid) = self.context().caches().ellipsoids.get(&id) {
            return Ok(ellipsoid);
        }

        let rows = self.run(
            "SELECT e.name, e.semi_major_axis, e.uom_auth_name, e.uom_code, e.inv_flattening, \
             e.semi_minor_axis, e.deprecated, cb.name, e.description FROM ellipsoid e \
             LEFT JOIN celestial_body cb ON cb.auth_name = e.celestial_body_auth_name \
             AND cb.code = e.celestial_body_code \
             WHERE e.auth_name = ?1 AND e.code = ?2",
            &self.key_params(code),
        )?;
        let row = one_row(rows, "ellipsoid", self.authority(), code)?;
        let ellipsoid = self
            .ellipsoid_from_row(&row, code)
            .building("ellipsoid", self.authority(), code)?;

        let ellipsoid = Arc::new(ellipsoid);
        self.context()
            .caches()
            .ellipsoids
            .insert(id, ellipsoid.clone());
        Ok(ellipsoid)
    }

    fn ellipsoid_from_row(&self, row: &Row, code: &str) -> Result<Ellipsoid> {
        let props = ObjectProperties {
            id: Some(self.id(code)),
            name: row.get_string(0)?,
            remarks: row.get_opt_string(8)?,
            deprecated: row.get_bool(6)?,
            usages: Vec::new(),
        };
        let unit = self
            .with_authority(&row.get_string(2)?)
            .create_unit_of_measure(&row.get_string(3)?)?;
        let semi_major_axis = Measure::new(row.get_f64(1)?, unit.clone());

        let shape = match (row.get_opt_f64(4)?, row.get_opt_f64(5)?) {
            (Some(rf), _) if rf == 0.0 => EllipsoidShape::Sphere,
            (Some(rf), _) => EllipsoidShape::InverseFlattening(rf),
            (None, Some(b)) if b == semi_major_axis.value => EllipsoidShape::Sphere,
            (None, Some(b)) => EllipsoidShape::SemiMinorAxis(Measure::new(b, unit)),
            (None, None) => {
                return Err(factory_err!(
                    "ellipsoid has neither an inverse flattening nor a semi-minor axis"
                ));
            }
        };

        Ok(Ellipsoid {
            props,
            semi_major_axis,
            shape,
            celestial_body: row
                .get_opt_string(7)?
                .unwrap_or_else(|| "Earth".to_string()),
        })
    }

    pub fn create_prime_meridian(&self, code: &str) -> Result<Arc<PrimeMeridian>> {
        let id = self.id(code);
        if let Some(pm) = self.context().caches().prime_meridians.get(&id) {
            return Ok(pm);
        }

        let rows = self.run(
            "SELECT name, longitude, uom_auth_name, uom_code, deprecated FROM prime_meridian \
             WHERE auth_name = ?1 AND code = ?2",
            &self.key_params(code),
        )?;
        let row = one_row(rows, "prime meridian", self.authority(), code)?;
        let pm = self
            .prime_meridian_from_row(&row, code)
            .building("prime meridian", self.authority(), code)?;

        let pm = Arc::new(pm);
        self.context().caches().prime_meridians.insert(id, pm.clone());
        Ok(pm)
    }

    fn prime_meridian_from_row(&self, row: &Row, code: &str) -> Result<PrimeMeridian> {
        let unit = self
            .with_authority(&row.get_string(2)?)
            .create_unit_of_measure(&row.get_string(3)?)?;
        Ok(PrimeMeridian {
            props: ObjectProperties::identified(self.id(code), row.get_string(0)?)
                .with_deprecated(row.get_bool(4)?),
            longitude: Measure::new(row.get_f64(1)?, unit),
        })
    }

    fn ensemble_member_ids(&self, member_table: &str, code: &str) -> Result<Vec<ObjectId>> {
        let sql = match member_table {
            "geodetic_datum_ensemble_member" => {
                "SELECT member_auth_name, member_code FROM geodetic_datum_ensemble_member \
                 WHERE ensemble_auth_name = ?1 AND ensemble_code = ?2 ORDER BY sequence"
            }
            "vertical_datum_ensemble_member" => {
                "SELECT member_auth_name, member_code FROM vertical_datum_ensemble_member \
                 WHERE ensemble_auth_name = ?1 AND ensemble_code = ?2 ORDER BY sequence"
            }
            other => return Err(factory_err!("unknown ensemble member table '{other}'")),
        };
        self.run(sql, &self.key_params(code))?
            .iter()
            .map(|row| Ok(ObjectId::new(row.get_string(0)?, row.get_string(1)?)))
            .collect()
    }

    /// Geodetic datum, ensembles kept as such.
    pub fn create_geodetic_datum_or_ensemble(&self, code: &str) -> Result<GeodeticDatum> {
        let id = self.id(code);
        if let Some(datum) = self.context().caches().geodetic_datums.get(&id) {
            return Ok(datum);
        }

        let sql = format!(
            "SELECT name, ellipsoid_auth_name, ellipsoid_code, prime_meridian_auth_name, \
             prime_meridian_code, {}, ensemble_accuracy, anchor, deprecated, description \
             FROM geodetic_datum WHERE auth_name = ?1 AND code = ?2",
            self.datum_date_columns()
        );
        let rows = self.run(&sql, &self.key_params(code))?;
        let row = one_row(rows, "geodetic datum", self.authority(), code)?;
        let datum = self
            .geodetic_datum_from_row(&row, code)
            .building("geodetic datum", self.authority(), code)?;

        let caches = self.context().caches();
        if let GeodeticDatum::Ensemble(ensemble) = &datum {
            caches.datum_ensembles.insert(id.clone(), ensemble.clone());
        }
        caches.geodetic_datums.insert(id, datum.clone());
        Ok(datum)
    }

    fn geodetic_datum_from_row(&self, row: &Row, code: &str) -> Result<GeodeticDatum> {
        let props = self.properties(
            "geodetic_datum",
            code,
            row.get_string(0)?,
            row.get_opt_string(10)?,
            row.get_bool(9)?,
        )?;

        if let Some(accuracy) = row.get_opt_f64(7)? {
            let mut frames = Vec::new();
            for member in self.ensemble_member_ids("geodetic_datum_ensemble_member", code)? {
                match self
                    .with_authority(&member.authority)
                    .create_geodetic_datum_or_ensemble(&member.code)?
                {
                    GeodeticDatum::Frame(frame) => frames.push(frame),
                    GeodeticDatum::Ensemble(_) => {
                        return Err(factory_err!("ensemble member {member} is itself an ensemble"));
                    }
                }
            }
            let ensemble =
                DatumEnsemble::try_new(props, EnsembleMembers::Geodetic(frames), accuracy)?;
            return Ok(GeodeticDatum::Ensemble(Arc::new(ensemble)));
        }

        let ellipsoid = self
            .with_authority(&row.get_string(1)?)
            .create_ellipsoid(&row.get_string(2)?)?;
        let prime_meridian = self
            .with_authority(&row.get_string(3)?)
            .create_prime_meridian(&row.get_string(4)?)?;

        Ok(GeodeticDatum::Frame(Arc::new(GeodeticReferenceFrame {
            props,
            ellipsoid,
            prime_meridian,
            anchor: row.get_opt_string(8)?,
            publication_date: parse_publication_date(row.get_opt_string(5)?)?,
            frame_reference_epoch: row.get_opt_f64(6)?,
        })))
    }

    /// Geodetic reference frame. An ensemble is flattened into a frame using
    /// its first member's ellipsoid and prime meridian.
    pub fn create_geodetic_datum(&self, code: &str) -> Result<Arc<GeodeticReferenceFrame>> {
        match self.create_geodetic_datum_or_ensemble(code)? {
            GeodeticDatum::Frame(frame) => Ok(frame),
            GeodeticDatum::Ensemble(ensemble) => Ok(Arc::new(ensemble.as_geodetic_frame()?)),
        }
    }

    pub fn create_vertical_datum_or_ensemble(&self, code: &str) -> Result<VerticalDatum> {
        let id = self.id(code);
        if let Some(datum) = self.context().caches().vertical_datums.get(&id) {
            return Ok(datum);
        }

        let sql = format!(
            "SELECT name, {}, ensemble_accuracy, anchor, deprecated, description \
             FROM vertical_datum WHERE auth_name = ?1 AND code = ?2",
            self.datum_date_columns()
        );
        let rows = self.run(&sql, &self.key_params(code))?;
        let row = one_row(rows, "vertical datum", self.authority(), code)?;
        let datum = self
            .vertical_datum_from_row(&row, code)
            .building("vertical datum", self.authority(), code)?;

        let caches = self.context().caches();
        if let VerticalDatum::Ensemble(ensemble) = &datum {
            caches.datum_ensembles.insert(id.clone(), ensemble.clone());
        }
        caches.vertical_datums.insert(id, datum.clone());
        Ok(datum)
    }

    fn vertical_datum_from_row(&self, row: &Row, code: &str) -> Result<VerticalDatum> {
        let props = self.properties(
            "vertical_datum",
            code,
            row.get_string(0)?,
            row.get_opt_string(6)?,
            row.get_bool(5)?,
        )?;

        if let Some(accuracy) = row.get_opt_f64(3)? {
            let mut frames = Vec::new();
            for member in self.ensemble_member_ids("vertical_datum_ensemble_member", code)? {
                match self
                    .with_authority(&member.authority)
                    .create_vertical_datum_or_ensemble(&member.code)?
                {
                    VerticalDatum::Frame(frame) => frames.push(frame),
                    VerticalDatum::Ensemble(_) => {
                        return Err(factory_err!("ensemble member {member} is itself an ensemble"));
                    }
                }
            }
            let ensemble =
                DatumEnsemble::try_new(props, EnsembleMembers::Vertical(frames), accuracy)?;
            return Ok(VerticalDatum::Ensemble(Arc::new(ensemble)));
        }

        Ok(VerticalDatum::Frame(Arc::new(VerticalReferenceFrame {
            props,
            anchor: row.get_opt_string(4)?,
            publication_date: parse_publication_date(row.get_opt_string(1)?)?,
            frame_reference_epoch: row.get_opt_f64(2)?,
        })))
    }

    pub fn create_vertical_datum(&self, code: &str) -> Result<Arc<VerticalReferenceFrame>> {
        match self.create_vertical_datum_or_ensemble(code)? {
            VerticalDatum::Frame(frame) => Ok(frame),
            VerticalDatum::Ensemble(ensemble) => Ok(Arc::new(ensemble.as_vertical_frame()?)),
        }
    }

    pub fn create_datum_ensemble(&self, code: &str) -> Result<Arc<DatumEnsemble>> {
        let id = self.id(code);
        if let Some(ensemble) = self.context().caches().datum_ensembles.get(&id) {
            return Ok(ensemble);
        }

        let rows = self.run(
            "SELECT 'geodetic_datum' FROM geodetic_datum \
             WHERE auth_name = ?1 AND code = ?2 AND ensemble_accuracy IS NOT NULL \
             UNION ALL SELECT 'vertical_datum' FROM vertical_datum \
             WHERE auth_name = ?1 AND code = ?2 AND ensemble_accuracy IS NOT NULL",
            &self.key_params(code),
        )?;
        let row = one_row(rows, "datum ensemble", self.authority(), code)?;

        let ensemble = match row.get_string(0)?.as_str() {
            "geodetic_datum" => match self.create_geodetic_datum_or_ensemble(code)? {
                GeodeticDatum::Ensemble(e) => Some(e),
                GeodeticDatum::Frame(_) => None,
            },
            _ => match self.create_vertical_datum_or_ensemble(code)? {
                VerticalDatum::Ensemble(e) => Some(e),
                VerticalDatum::Frame(_) => None,
            },
        };
        ensemble.ok_or_else(|| {
            factory_err!("{} is not a datum ensemble", Qualified(self.authority(), code))
        })
    }

    pub fn create_coordinate_system(&self, code: &str) -> Result<Arc<CoordinateSystem>> {
        let id = self.id(code);
        if let Some(cs) = self.context().caches().coordinate_systems.get(&id) {
            return Ok(cs);
        }

        let rows = self.run(
            "SELECT type, dimension FROM coordinate_system WHERE auth_name = ?1 AND code = ?2",
            &self.key_params(code),
        )?;
        let row = one_row(rows, "coordinate system", self.authority(), code)?;
        let cs = self
            .coordinate_system_from_row(&row, code)
            .building("coordinate system", self.authority(), code)?;

        let cs = Arc::new(cs);
        self.context()
            .caches()
            .coordinate_systems
            .insert(id, cs.clone());
        Ok(cs)
    }

    fn coordinate_system_from_row(&self, row: &Row, code: &str) -> Result<CoordinateSystem> {
        let ty = row.get_string(0)?;
        let kind = CsKind::from_catalog_type(&ty)
            .ok_or_else(|| factory_err!("unknown coordinate system type '{ty}'"))?;
        let dimension = row.get_i64(1)?;

        let axis_rows = self.run(
            "SELECT name, abbrev, orientation, uom_auth_name, uom_code FROM axis \
             WHERE coordinate_system_auth_name = ?1 AND coordinate_system_code = ?2 \
             ORDER BY coordinate_system_order",
            &self.key_params(code),
        )?;
        if axis_rows.len() as i64 != dimension {
            return Err(factory_err!(
                "coordinate system declares {dimension} axes but {} are defined",
                axis_rows.len()
            ));
        }

        let mut axes = Vec::with_capacity(axis_rows.len());
        for axis in axis_rows {
            let (direction, meridian) = parse_orientation(&axis.get_string(2)?);
            axes.push(Axis {
                name: axis.get_string(0)?,
                abbreviation: axis.get_string_or_empty(1)?,
                direction,
                unit: self.optional_unit(axis.get_opt_string(3)?, axis.get_opt_string(4)?)?,
                meridian,
            });
        }
        CoordinateSystem::try_new(Some(self.id(code)), kind, axes)
    }
}

fn unit_from_row(row: &Row, id: ObjectId) -> Result<UnitOfMeasure> {
    let ty = row.get_string(2)?;
    let kind =
        UnitKind::from_catalog_type(&ty).ok_or_else(|| factory_err!("unknown unit type '{ty}'"))?;
    let conversion_factor = row
        .get_opt_f64(1)?
        .ok_or_else(|| factory_err!("unit has no conversion factor"))?;
    Ok(UnitOfMeasure {
        props: ObjectProperties::identified(id, row.get_string(0)?)
            .with_deprecated(row.get_bool(3)?),
        kind,
        conversion_factor,
    })
}

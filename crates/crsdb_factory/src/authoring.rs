//! Insert statements recording objects in the catalog.
//!
//! Statements are executed in the context's insert session as they are
//! generated, so objects inserted for one reference are found by the next
//! lookup. Objects already in the catalog under the target authority or an
//! allowed authority are referenced instead of being inserted again.

use tracing::debug;

use crsdb_core::crs::Crs;
use crsdb_core::cs::{Axis, AxisDirection, CoordinateSystem};
use crsdb_core::datum::{
    DatumEnsemble, Ellipsoid, EllipsoidShape, EnsembleMembers, GeodeticDatum,
    GeodeticReferenceFrame, PrimeMeridian, VerticalDatum, VerticalReferenceFrame,
};
use crsdb_core::extent::Extent;
use crsdb_core::ident::{ObjectId, ObjectUsage};
use crsdb_core::operation::{
    Conversion, CoordinateOperation, OperationMethod, OperationParameter, ParameterValue,
    Transformation,
};
use crsdb_core::unit::{Measure, UnitOfMeasure};
use crsdb_error::{Result, factory_err};
use crsdb_sqlite::attach::is_known_table;
use crsdb_sqlite::insert::InsertStatement;
use crsdb_sqlite::layout::LayoutFeature;
use crsdb_sqlite::Param;
use crsdb_sqlite::param::format_double;

use crate::factory::{AuthorityFactory, FactoryObject};

/// Parameter groups of the conversion and other_transformation tables.
const MAX_PARAMS: usize = 7;

/// Catalog table an object is recorded in.
fn table_of(obj: &FactoryObject) -> Result<&'static str> {
    Ok(match obj {
        FactoryObject::Unit(_) => "unit_of_measure",
        FactoryObject::Extent(_) => "extent",
        FactoryObject::Ellipsoid(_) => "ellipsoid",
        FactoryObject::PrimeMeridian(_) => "prime_meridian",
        FactoryObject::GeodeticDatum(_) => "geodetic_datum",
        FactoryObject::VerticalDatum(_) => "vertical_datum",
        FactoryObject::DatumEnsemble(e) => match e.members {
            EnsembleMembers::Geodetic(_) => "geodetic_datum",
            EnsembleMembers::Vertical(_) => "vertical_datum",
        },
        FactoryObject::CoordinateSystem(_) => "coordinate_system",
        FactoryObject::Crs(crs) => crs_table(crs),
        FactoryObject::Operation(op) => operation_table(op)?,
    })
}

fn crs_table(crs: &Crs) -> &'static str {
    match crs {
        Crs::Geodetic(_) => "geodetic_crs",
        Crs::Projected(_) => "projected_crs",
        Crs::Vertical(_) => "vertical_crs",
        Crs::Compound(_) => "compound_crs",
    }
}

/// The single grid file of a transformation, if it has exactly one
/// parameter and it is a file name.
fn single_grid(t: &Transformation) -> Option<(&OperationParameter, &str)> {
    match t.parameters.as_slice() {
        [param] => match &param.value {
            ParameterValue::Filename(name) => Some((param, name.as_str())),
            ParameterValue::Measure(_) => None,
        },
        _ => None,
    }
}

fn operation_table(op: &CoordinateOperation) -> Result<&'static str> {
    match op {
        CoordinateOperation::Conversion(_) => Ok("conversion"),
        CoordinateOperation::Transformation(t) if single_grid(t).is_some() => {
            Ok("grid_transformation")
        }
        CoordinateOperation::Transformation(_) => Ok("other_transformation"),
        CoordinateOperation::Concatenated(c) => Err(factory_err!(
            "cannot record concatenated operation '{}'",
            c.props.name
        )),
    }
}

/// Catalog spelling of an axis orientation, with the meridian of polar axes
/// as in "North along 90°E".
fn format_orientation(axis: &Axis) -> String {
    let Some(meridian) = &axis.meridian else {
        return axis.direction.as_catalog().to_string();
    };
    let direction = match axis.direction {
        AxisDirection::North => "North",
        AxisDirection::South => "South",
        _ => return axis.direction.as_catalog().to_string(),
    };
    let degrees = meridian.to_si() / UnitOfMeasure::degree().conversion_factor;
    let hemisphere = if degrees < 0.0 { 'W' } else { 'E' };
    format!(
        "{direction} along {}°{hemisphere}",
        format_double(degrees.abs(), false)
    )
}

/// Code made of the upper-cased alphanumerics of `name`.
fn code_from_name(name: &str) -> String {
    let code: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    if code.is_empty() {
        "UNNAMED".to_string()
    } else {
        code
    }
}

fn checked_table(table: &str) -> Result<&str> {
    if !is_known_table(table) {
        return Err(factory_err!("unknown catalog table '{table}'"));
    }
    Ok(table)
}

impl AuthorityFactory<'_> {
    fn code_exists(&self, table: &str, id: &ObjectId) -> Result<bool> {
        let rows = self.run(
            &format!(
                "SELECT 1 FROM {} WHERE auth_name = ?1 AND code = ?2 LIMIT 1",
                checked_table(table)?
            ),
            &[Param::from(&id.authority), Param::from(&id.code)],
        )?;
        Ok(!rows.is_empty())
    }

    fn next_numeric_code(&self, table: &str, authority: &str) -> Result<String> {
        let rows = self.run(
            &format!(
                "SELECT MAX(CAST(code AS INTEGER)) FROM {} WHERE auth_name = ?1",
                checked_table(table)?
            ),
            &[Param::from(authority)],
        )?;
        let max = match rows.first() {
            Some(row) => row.get_opt_i64(0)?,
            None => None,
        };
        Ok(max.map_or(1, |m| m + 1).to_string())
    }

    /// A code for recording `obj` under `authority`: one more than the
    /// largest numeric code of its table, or one derived from its name.
    pub fn suggests_code_for(
        &self,
        obj: &FactoryObject,
        authority: &str,
        numeric: bool,
    ) -> Result<String> {
        let table = table_of(obj)?;
        if numeric {
            self.next_numeric_code(table, authority)
        } else {
            Ok(code_from_name(obj.name()))
        }
    }

    /// Statements recording `obj` as `authority`:`code`, with every object
    /// it references that is not already in the catalog under `authority`
    /// or one of `allowed_authorities`.
    ///
    /// Needs an active insert session. Statements are executed in the
    /// session as they are generated.
    pub fn get_insert_statements_for(
        &self,
        obj: &FactoryObject,
        authority: &str,
        code: &str,
        numeric_codes: bool,
        allowed_authorities: &[String],
    ) -> Result<Vec<InsertStatement>> {
        if !self.context().has_insert_session() {
            return Err(factory_err!("no insert statements session is active"));
        }
        self.context()
            .layout_version()
            .require(LayoutFeature::Authoring)?;

        let table = table_of(obj)?;
        let id = ObjectId::new(authority, code);
        if self.code_exists(table, &id)? {
            return Err(factory_err!("{id} is already used in table {table}"));
        }

        let mut writer = InsertWriter {
            factory: self,
            authority: authority.to_string(),
            base_code: code.to_string(),
            numeric_codes,
            allowed_authorities: allowed_authorities.to_vec(),
            statements: Vec::new(),
        };
        match obj {
            FactoryObject::Unit(u) => writer.insert_unit(u, code)?,
            FactoryObject::Extent(e) => writer.insert_extent(e, code)?,
            FactoryObject::Ellipsoid(e) => writer.insert_ellipsoid(e, code)?,
            FactoryObject::PrimeMeridian(p) => writer.insert_prime_meridian(p, code)?,
            FactoryObject::GeodeticDatum(GeodeticDatum::Frame(f)) => {
                writer.insert_geodetic_frame(f, code)?
            }
            FactoryObject::GeodeticDatum(GeodeticDatum::Ensemble(e))
            | FactoryObject::VerticalDatum(VerticalDatum::Ensemble(e))
            | FactoryObject::DatumEnsemble(e) => writer.insert_ensemble(e, code)?,
            FactoryObject::VerticalDatum(VerticalDatum::Frame(f)) => {
                writer.insert_vertical_frame(f, code)?
            }
            FactoryObject::CoordinateSystem(cs) => writer.insert_coordinate_system(cs, code)?,
            FactoryObject::Crs(crs) => writer.insert_crs(crs, code)?,
            FactoryObject::Operation(op) => writer.insert_operation(op, code)?,
        }
        debug!(%id, count = writer.statements.len(), "generated insert statements");
        Ok(writer.statements)
    }
}

/// State of one `get_insert_statements_for` call.
struct InsertWriter<'f, 'a> {
    factory: &'f AuthorityFactory<'a>,
    authority: String,
    /// Code of the requested object, prefix of generated sub-codes.
    base_code: String,
    numeric_codes: bool,
    allowed_authorities: Vec<String>,
    statements: Vec<InsertStatement>,
}

impl InsertWriter<'_, '_> {
    fn emit(&mut self, table: &str, values: Vec<Param>) -> Result<()> {
        let stmt = InsertStatement::try_new(table, values)?;
        self.factory.context().execute_insert(&stmt)?;
        self.statements.push(stmt);
        Ok(())
    }

    fn id(&self, code: &str) -> ObjectId {
        ObjectId::new(&self.authority, code)
    }

    /// `id` if it names a row of `table` under a usable authority.
    fn existing(&self, table: &str, id: Option<&ObjectId>) -> Result<Option<ObjectId>> {
        let Some(id) = id else {
            return Ok(None);
        };
        let usable = id.authority == self.authority
            || self.allowed_authorities.iter().any(|a| a == &id.authority);
        if usable && self.factory.code_exists(table, id)? {
            return Ok(Some(id.clone()));
        }
        Ok(None)
    }

    /// Unused code for a referenced object of `table`.
    fn sub_code(&self, table: &str, suffix: &str) -> Result<String> {
        if self.numeric_codes {
            return self.factory.next_numeric_code(table, &self.authority);
        }
        let base = format!("{}_{suffix}", self.base_code);
        let mut candidate = base.clone();
        let mut n = 2;
        while self.factory.code_exists(table, &self.id(&candidate))? {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        Ok(candidate)
    }

    fn key(&self, code: &str) -> [Param; 2] {
        [Param::from(&self.authority), Param::from(code)]
    }

    fn push_id(values: &mut Vec<Param>, id: Option<&ObjectId>) {
        values.push(Param::from(id.map(|id| id.authority.clone())));
        values.push(Param::from(id.map(|id| id.code.clone())));
    }

    fn insert_usages(&mut self, table: &str, code: &str, usages: &[ObjectUsage]) -> Result<()> {
        for usage in usages {
            let extent = self.reference_extent(&usage.extent)?;
            let scope = self.reference_scope(usage.scope.as_deref().unwrap_or("unknown"))?;
            let usage_code = self.sub_code("usage", "USAGE")?;
            let mut values = self.key(&usage_code).to_vec();
            values.push(Param::from(table));
            values.extend(self.key(code));
            Self::push_id(&mut values, Some(&extent));
            Self::push_id(&mut values, Some(&scope));
            self.emit("usage", values)?;
        }
        Ok(())
    }

    fn reference_scope(&mut self, text: &str) -> Result<ObjectId> {
        let rows = self.factory.run(
            "SELECT auth_name, code FROM scope WHERE scope = ?1 AND deprecated = 0 \
             ORDER BY auth_name, code LIMIT 1",
            &[Param::from(text)],
        )?;
        if let Some(row) = rows.first() {
            return Ok(ObjectId::new(row.get_string(0)?, row.get_string(1)?));
        }
        let code = self.sub_code("scope", "SCOPE")?;
        let mut values = self.key(&code).to_vec();
        values.push(Param::from(text));
        values.push(Param::from(false));
        self.emit("scope", values)?;
        Ok(self.id(&code))
    }

    fn reference_extent(&mut self, extent: &Extent) -> Result<ObjectId> {
        if let Some(id) = self.existing("extent", extent.id.as_ref())? {
            return Ok(id);
        }
        let code = self.sub_code("extent", "EXTENT")?;
        self.insert_extent(extent, &code)?;
        Ok(self.id(&code))
    }

    fn insert_extent(&mut self, extent: &Extent, code: &str) -> Result<()> {
        let description = extent.description.clone().unwrap_or_else(|| "unknown".to_string());
        let bbox = extent.bbox.as_ref();
        let mut values = self.key(code).to_vec();
        values.push(Param::from(&description));
        values.push(Param::from(&description));
        values.push(Param::from(bbox.map(|b| b.south)));
        values.push(Param::from(bbox.map(|b| b.north)));
        values.push(Param::from(bbox.map(|b| b.west)));
        values.push(Param::from(bbox.map(|b| b.east)));
        values.push(Param::from(false));
        self.emit("extent", values)
    }

    /// Unit columns for `unit`; NULL for the implicit unity of axes.
    fn reference_unit(&mut self, unit: &UnitOfMeasure) -> Result<Option<ObjectId>> {
        if unit.props.id.is_none() && unit.props.name == "unity" {
            return Ok(None);
        }
        if let Some(id) = self.existing("unit_of_measure", unit.props.id.as_ref())? {
            return Ok(Some(id));
        }
        let code = self.sub_code("unit_of_measure", "UNIT")?;
        self.insert_unit(unit, &code)?;
        Ok(Some(self.id(&code)))
    }

    fn insert_unit(&mut self, unit: &UnitOfMeasure, code: &str) -> Result<()> {
        let mut values = self.key(code).to_vec();
        values.push(Param::from(&unit.props.name));
        values.push(Param::from(unit.kind.as_catalog_type()));
        values.push(Param::from(unit.conversion_factor));
        values.push(Param::Null);
        values.push(Param::from(unit.props.deprecated));
        self.emit("unit_of_measure", values)
    }

    fn reference_celestial_body(&mut self, name: &str, semi_major_axis: f64) -> Result<ObjectId> {
        let rows = self.factory.run(
            "SELECT auth_name, code FROM celestial_body WHERE name = ?1 \
             ORDER BY auth_name, code LIMIT 1",
            &[Param::from(name)],
        )?;
        if let Some(row) = rows.first() {
            return Ok(ObjectId::new(row.get_string(0)?, row.get_string(1)?));
        }
        let code = self.sub_code("celestial_body", "BODY")?;
        let mut values = self.key(&code).to_vec();
        values.push(Param::from(name));
        values.push(Param::from(semi_major_axis));
        self.emit("celestial_body", values)?;
        Ok(self.id(&code))
    }

    fn reference_ellipsoid(&mut self, ellipsoid: &Ellipsoid) -> Result<ObjectId> {
        if let Some(id) = self.existing("ellipsoid", ellipsoid.props.id.as_ref())? {
            return Ok(id);
        }
        let code = self.sub_code("ellipsoid", "ELLPS")?;
        self.insert_ellipsoid(ellipsoid, &code)?;
        Ok(self.id(&code))
    }

    fn insert_ellipsoid(&mut self, ellipsoid: &Ellipsoid, code: &str) -> Result<()> {
        let a = &ellipsoid.semi_major_axis;
        let body = self.reference_celestial_body(&ellipsoid.celestial_body, a.to_si())?;
        let unit = self.reference_unit(&a.unit)?;
        let (inv_flattening, semi_minor_axis) = match &ellipsoid.shape {
            EllipsoidShape::Sphere => (Some(0.0), None),
            EllipsoidShape::InverseFlattening(rf) => (Some(*rf), None),
            EllipsoidShape::SemiMinorAxis(b) => (None, Some(b.to_si() / a.unit.conversion_factor)),
        };

        let mut values = self.key(code).to_vec();
        values.push(Param::from(&ellipsoid.props.name));
        values.push(Param::from(ellipsoid.props.remarks.clone()));
        Self::push_id(&mut values, Some(&body));
        values.push(Param::from(a.value));
        Self::push_id(&mut values, unit.as_ref());
        values.push(Param::from(inv_flattening));
        values.push(Param::from(semi_minor_axis));
        values.push(Param::from(ellipsoid.props.deprecated));
        self.emit("ellipsoid", values)
    }

    fn reference_prime_meridian(&mut self, pm: &PrimeMeridian) -> Result<ObjectId> {
        if let Some(id) = self.existing("prime_meridian", pm.props.id.as_ref())? {
            return Ok(id);
        }
        let code = self.sub_code("prime_meridian", "PM")?;
        self.insert_prime_meridian(pm, &code)?;
        Ok(self.id(&code))
    }

    fn insert_prime_meridian(&mut self, pm: &PrimeMeridian, code: &str) -> Result<()> {
        let unit = self.reference_unit(&pm.longitude.unit)?;
        let mut values = self.key(code).to_vec();
        values.push(Param::from(&pm.props.name));
        values.push(Param::from(pm.longitude.value));
        Self::push_id(&mut values, unit.as_ref());
        values.push(Param::from(pm.props.deprecated));
        self.emit("prime_meridian", values)
    }

    fn reference_geodetic_frame(&mut self, frame: &GeodeticReferenceFrame) -> Result<ObjectId> {
        if let Some(id) = self.existing("geodetic_datum", frame.props.id.as_ref())? {
            return Ok(id);
        }
        let code = self.sub_code("geodetic_datum", "DATUM")?;
        self.insert_geodetic_frame(frame, &code)?;
        Ok(self.id(&code))
    }

    fn insert_geodetic_frame(&mut self, frame: &GeodeticReferenceFrame, code: &str) -> Result<()> {
        let ellipsoid = self.reference_ellipsoid(&frame.ellipsoid)?;
        let pm = self.reference_prime_meridian(&frame.prime_meridian)?;
        let mut values = self.key(code).to_vec();
        values.push(Param::from(&frame.props.name));
        values.push(Param::from(frame.props.remarks.clone()));
        Self::push_id(&mut values, Some(&ellipsoid));
        Self::push_id(&mut values, Some(&pm));
        values.push(Param::from(
            frame.publication_date.map(|d| d.format("%Y-%m-%d").to_string()),
        ));
        values.push(Param::from(frame.frame_reference_epoch));
        values.push(Param::Null);
        values.push(Param::from(frame.anchor.clone()));
        values.push(Param::from(frame.props.deprecated));
        self.emit("geodetic_datum", values)?;
        self.insert_usages("geodetic_datum", code, &frame.props.usages)
    }

    fn reference_vertical_frame(&mut self, frame: &VerticalReferenceFrame) -> Result<ObjectId> {
        if let Some(id) = self.existing("vertical_datum", frame.props.id.as_ref())? {
            return Ok(id);
        }
        let code = self.sub_code("vertical_datum", "DATUM")?;
        self.insert_vertical_frame(frame, &code)?;
        Ok(self.id(&code))
    }

    fn insert_vertical_frame(&mut self, frame: &VerticalReferenceFrame, code: &str) -> Result<()> {
        let mut values = self.key(code).to_vec();
        values.push(Param::from(&frame.props.name));
        values.push(Param::from(frame.props.remarks.clone()));
        values.push(Param::from(
            frame.publication_date.map(|d| d.format("%Y-%m-%d").to_string()),
        ));
        values.push(Param::from(frame.frame_reference_epoch));
        values.push(Param::Null);
        values.push(Param::from(frame.anchor.clone()));
        values.push(Param::from(frame.props.deprecated));
        self.emit("vertical_datum", values)?;
        self.insert_usages("vertical_datum", code, &frame.props.usages)
    }

    fn reference_ensemble(&mut self, ensemble: &DatumEnsemble) -> Result<ObjectId> {
        let table = match ensemble.members {
            EnsembleMembers::Geodetic(_) => "geodetic_datum",
            EnsembleMembers::Vertical(_) => "vertical_datum",
        };
        if let Some(id) = self.existing(table, ensemble.props.id.as_ref())? {
            return Ok(id);
        }
        let code = self.sub_code(table, "ENSEMBLE")?;
        self.insert_ensemble(ensemble, &code)?;
        Ok(self.id(&code))
    }

    /// Ensemble row, then one member row per member in order.
    fn insert_ensemble(&mut self, ensemble: &DatumEnsemble, code: &str) -> Result<()> {
        let props = &ensemble.props;
        let (table, member_table, members) = match &ensemble.members {
            EnsembleMembers::Geodetic(frames) => {
                let first = frames
                    .first()
                    .ok_or_else(|| factory_err!("empty datum ensemble '{}'", props.name))?;
                let ellipsoid = self.reference_ellipsoid(&first.ellipsoid)?;
                let pm = self.reference_prime_meridian(&first.prime_meridian)?;
                let members = frames
                    .iter()
                    .map(|f| self.reference_geodetic_frame(f))
                    .collect::<Result<Vec<_>>>()?;

                let mut values = self.key(code).to_vec();
                values.push(Param::from(&props.name));
                values.push(Param::from(props.remarks.clone()));
                Self::push_id(&mut values, Some(&ellipsoid));
                Self::push_id(&mut values, Some(&pm));
                values.extend([Param::Null, Param::Null]);
                values.push(Param::from(ensemble.accuracy));
                values.push(Param::Null);
                values.push(Param::from(props.deprecated));
                self.emit("geodetic_datum", values)?;
                ("geodetic_datum", "geodetic_datum_ensemble_member", members)
            }
            EnsembleMembers::Vertical(frames) => {
                let members = frames
                    .iter()
                    .map(|f| self.reference_vertical_frame(f))
                    .collect::<Result<Vec<_>>>()?;

                let mut values = self.key(code).to_vec();
                values.push(Param::from(&props.name));
                values.push(Param::from(props.remarks.clone()));
                values.extend([Param::Null, Param::Null]);
                values.push(Param::from(ensemble.accuracy));
                values.push(Param::Null);
                values.push(Param::from(props.deprecated));
                self.emit("vertical_datum", values)?;
                ("vertical_datum", "vertical_datum_ensemble_member", members)
            }
        };

        for (i, member) in members.iter().enumerate() {
            let mut values = self.key(code).to_vec();
            Self::push_id(&mut values, Some(member));
            values.push(Param::from(i as i64 + 1));
            self.emit(member_table, values)?;
        }
        self.insert_usages(table, code, &props.usages)
    }

    fn reference_coordinate_system(&mut self, cs: &CoordinateSystem) -> Result<ObjectId> {
        if let Some(id) = self.existing("coordinate_system", cs.id.as_ref())? {
            return Ok(id);
        }
        let code = self.sub_code("coordinate_system", "CS")?;
        self.insert_coordinate_system(cs, &code)?;
        Ok(self.id(&code))
    }

    fn insert_coordinate_system(&mut self, cs: &CoordinateSystem, code: &str) -> Result<()> {
        let mut values = self.key(code).to_vec();
        values.push(Param::from(cs.kind.as_catalog_type()));
        values.push(Param::from(cs.axes.len() as i64));
        self.emit("coordinate_system", values)?;

        for (i, axis) in cs.axes.iter().enumerate() {
            let unit = self.reference_unit(&axis.unit)?;
            let axis_code = if self.numeric_codes {
                self.factory.next_numeric_code("axis", &self.authority)?
            } else {
                format!("{code}_AXIS_{}", i + 1)
            };
            let mut values = self.key(&axis_code).to_vec();
            values.push(Param::from(&axis.name));
            values.push(Param::from(&axis.abbreviation));
            values.push(Param::from(format_orientation(axis)));
            values.extend(self.key(code));
            values.push(Param::from(i as i64 + 1));
            Self::push_id(&mut values, unit.as_ref());
            self.emit("axis", values)?;
        }
        Ok(())
    }

    fn reference_crs(&mut self, crs: &Crs) -> Result<ObjectId> {
        let table = crs_table(crs);
        if let Some(id) = self.existing(table, crs.id())? {
            return Ok(id);
        }
        let code = self.sub_code(table, "CRS")?;
        self.insert_crs(crs, &code)?;
        Ok(self.id(&code))
    }

    fn insert_crs(&mut self, crs: &Crs, code: &str) -> Result<()> {
        let props = crs.props();
        let mut values = self.key(code).to_vec();
        values.push(Param::from(&props.name));
        values.push(Param::from(props.remarks.clone()));

        match crs {
            Crs::Geodetic(g) => {
                let datum = match &g.datum {
                    GeodeticDatum::Frame(f) => self.reference_geodetic_frame(f)?,
                    GeodeticDatum::Ensemble(e) => self.reference_ensemble(e)?,
                };
                let cs = self.reference_coordinate_system(&g.cs)?;
                values.push(Param::from(g.kind.as_catalog_type()));
                Self::push_id(&mut values, Some(&cs));
                Self::push_id(&mut values, Some(&datum));
                values.push(Param::Null);
            }
            Crs::Projected(p) => {
                let base = self.reference_crs(&Crs::Geodetic(p.base.clone()))?;
                let conversion = self.reference_conversion(&p.conversion)?;
                let cs = self.reference_coordinate_system(&p.cs)?;
                Self::push_id(&mut values, Some(&cs));
                Self::push_id(&mut values, Some(&base));
                Self::push_id(&mut values, Some(&conversion));
                values.push(Param::Null);
            }
            Crs::Vertical(v) => {
                let datum = match &v.datum {
                    VerticalDatum::Frame(f) => self.reference_vertical_frame(f)?,
                    VerticalDatum::Ensemble(e) => self.reference_ensemble(e)?,
                };
                let cs = self.reference_coordinate_system(&v.cs)?;
                Self::push_id(&mut values, Some(&cs));
                Self::push_id(&mut values, Some(&datum));
            }
            Crs::Compound(c) => {
                let [horizontal, vertical] = c.components.as_slice() else {
                    return Err(factory_err!(
                        "compound crs '{}' must have 2 components",
                        props.name
                    ));
                };
                let horizontal = self.reference_crs(horizontal)?;
                let vertical = self.reference_crs(vertical)?;
                Self::push_id(&mut values, Some(&horizontal));
                Self::push_id(&mut values, Some(&vertical));
            }
        }
        values.push(Param::from(props.deprecated));

        let table = crs_table(crs);
        self.emit(table, values)?;
        self.insert_usages(table, code, &props.usages)
    }

    fn push_method(values: &mut Vec<Param>, method: &OperationMethod) {
        Self::push_id(values, method.props.id.as_ref());
        values.push(Param::from(&method.props.name));
    }

    /// Seven (auth, code, name, value, uom auth, uom code) groups.
    fn push_measure_params(
        &mut self,
        values: &mut Vec<Param>,
        operation: &str,
        params: &[OperationParameter],
    ) -> Result<()> {
        if params.len() > MAX_PARAMS {
            return Err(factory_err!(
                "operation '{operation}' has {} parameters, at most {MAX_PARAMS} can be recorded",
                params.len()
            ));
        }
        for param in params {
            let ParameterValue::Measure(Measure { value, unit }) = &param.value else {
                return Err(factory_err!(
                    "parameter '{}' of '{operation}' is not a measure",
                    param.props.name
                ));
            };
            let unit = self.reference_unit(unit)?;
            Self::push_id(values, param.props.id.as_ref());
            values.push(Param::from(&param.props.name));
            values.push(Param::from(*value));
            Self::push_id(values, unit.as_ref());
        }
        for _ in params.len()..MAX_PARAMS {
            values.extend(std::iter::repeat_n(Param::Null, 6));
        }
        Ok(())
    }

    fn reference_conversion(&mut self, conversion: &Conversion) -> Result<ObjectId> {
        if let Some(id) = self.existing("conversion", conversion.props.id.as_ref())? {
            return Ok(id);
        }
        let code = self.sub_code("conversion", "CONVERSION")?;
        self.insert_conversion(conversion, &code)?;
        Ok(self.id(&code))
    }

    fn insert_conversion(&mut self, conversion: &Conversion, code: &str) -> Result<()> {
        let props = &conversion.props;
        let mut values = self.key(code).to_vec();
        values.push(Param::from(&props.name));
        values.push(Param::from(props.remarks.clone()));
        Self::push_method(&mut values, &conversion.method);
        self.push_measure_params(&mut values, &props.name, &conversion.parameters)?;
        values.push(Param::from(props.deprecated));
        self.emit("conversion", values)?;
        self.insert_usages("conversion", code, &props.usages)
    }

    fn insert_operation(&mut self, op: &CoordinateOperation, code: &str) -> Result<()> {
        match op {
            CoordinateOperation::Conversion(c) => self.insert_conversion(c, code),
            CoordinateOperation::Transformation(t) => self.insert_transformation(t, code),
            CoordinateOperation::Concatenated(_) => operation_table(op).map(|_| ()),
        }
    }

    fn insert_transformation(&mut self, t: &Transformation, code: &str) -> Result<()> {
        let props = &t.props;
        if t.method.props.id.is_none() {
            return Err(factory_err!(
                "method '{}' of '{}' has no identifier",
                t.method.props.name,
                props.name
            ));
        }
        let source = self.reference_crs(&t.source)?;
        let target = self.reference_crs(&t.target)?;
        let interpolation = t
            .interpolation
            .as_ref()
            .map(|crs| self.reference_crs(crs))
            .transpose()?;

        let mut values = self.key(code).to_vec();
        values.push(Param::from(&props.name));
        values.push(Param::from(props.remarks.clone()));
        Self::push_method(&mut values, &t.method);
        Self::push_id(&mut values, Some(&source));
        Self::push_id(&mut values, Some(&target));
        values.push(Param::from(t.accuracy));

        let table = match single_grid(t) {
            Some((param, grid)) => {
                let Some(param_id) = param.props.id.as_ref() else {
                    return Err(factory_err!(
                        "grid parameter '{}' of '{}' has no identifier",
                        param.props.name,
                        props.name
                    ));
                };
                Self::push_id(&mut values, Some(param_id));
                values.push(Param::from(&param.props.name));
                values.push(Param::from(grid));
                values.extend(std::iter::repeat_n(Param::Null, 4));
                "grid_transformation"
            }
            None => {
                self.push_measure_params(&mut values, &props.name, &t.parameters)?;
                "other_transformation"
            }
        };
        Self::push_id(&mut values, interpolation.as_ref());
        values.push(Param::from(t.version.clone()));
        values.push(Param::from(props.deprecated));
        self.emit(table, values)?;
        self.insert_usages(table, code, &props.usages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::objects::parse_orientation;

    #[test]
    fn codes_from_names() {
        struct TestCase {
            name: &'static str,
            expected: &'static str,
        }

        let test_cases = vec![
            TestCase {
                name: "WGS 84 / my projection",
                expected: "WGS_84___MY_PROJECTION",
            },
            TestCase {
                name: "ETRS89",
                expected: "ETRS89",
            },
            TestCase {
                name: "",
                expected: "UNNAMED",
            },
        ];

        for test_case in test_cases {
            assert_eq!(test_case.expected, code_from_name(test_case.name));
        }
    }

    #[test]
    fn polar_orientation_written_back() {
        let axis = Axis {
            name: "Easting".to_string(),
            abbreviation: "E".to_string(),
            direction: AxisDirection::South,
            unit: UnitOfMeasure::metre(),
            meridian: Some(Measure::new(-45.0, UnitOfMeasure::degree())),
        };
        let orientation = format_orientation(&axis);
        assert_eq!("South along 45°W", orientation);

        let (direction, meridian) = parse_orientation(&orientation);
        assert_eq!(AxisDirection::South, direction);
        assert_eq!(Some(-45.0), meridian.map(|m| m.value));

        let plain = Axis {
            meridian: None,
            direction: AxisDirection::Up,
            ..axis
        };
        assert_eq!("up", format_orientation(&plain));
    }
}

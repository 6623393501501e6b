use std::sync::Arc;

use tracing::debug;

use crsdb_core::crs::{CompoundCrs, Crs, GeodeticCrs, GeodeticKind, ProjectedCrs, VerticalCrs};
use crsdb_core::cs::CsKind;
use crsdb_core::ident::ObjectProperties;
use crsdb_error::{Qualified, Result, ResultExt, factory_err};
use crsdb_sqlite::Row;
use crsdb_sqlite::layout::LayoutFeature;

use crate::factory::{AuthorityFactory, ResolveDepth, one_row};
use crate::text::ParseContext;

const CRS_TABLES: [&str; 4] = ["geodetic_crs", "projected_crs", "vertical_crs", "compound_crs"];

impl AuthorityFactory<'_> {
    /// Any kind of CRS.
    pub fn create_coordinate_reference_system(&self, code: &str) -> Result<Crs> {
        self.crs_at(code, ResolveDepth::ROOT)
    }

    pub(crate) fn crs_at(&self, code: &str, depth: ResolveDepth) -> Result<Crs> {
        if let Some(crs) = CRS_TABLES
            .iter()
            .find_map(|&table| self.cached_crs(table, code))
        {
            return Ok(crs);
        }

        let rows = self.run(
            "SELECT table_name FROM crs_view WHERE auth_name = ?1 AND code = ?2",
            &self.key_params(code),
        )?;
        let row = one_row(rows, "crs", self.authority(), code)?;
        self.crs_from_table(&row.get_string(0)?, code, depth)
    }

    fn cached_crs(&self, table: &'static str, code: &str) -> Option<Crs> {
        self.context().caches().crs.get(&(table, self.id(code)))
    }

    fn cache_crs(&self, table: &'static str, code: &str, crs: Crs) {
        self.context().caches().crs.insert((table, self.id(code)), crs);
    }

    pub(crate) fn crs_from_table(&self, table: &str, code: &str, depth: ResolveDepth) -> Result<Crs> {
        match table {
            "geodetic_crs" => self.geodetic_crs_at(code, depth),
            "projected_crs" => Ok(Crs::Projected(self.projected_crs_at(code, depth)?)),
            "vertical_crs" => Ok(Crs::Vertical(self.create_vertical_crs(code)?)),
            "compound_crs" => Ok(Crs::Compound(self.compound_crs_at(code, depth)?)),
            other => Err(factory_err!("'{other}' is not a crs table")),
        }
    }

    /// Geodetic CRS, or whatever the text definition of the row describes.
    pub fn create_geodetic_crs(&self, code: &str) -> Result<Crs> {
        self.geodetic_crs_at(code, ResolveDepth::ROOT)
    }

    /// Geodetic CRS that is not geocentric.
    pub fn create_geographic_crs(&self, code: &str) -> Result<Arc<GeodeticCrs>> {
        match self.create_geodetic_crs(code)? {
            Crs::Geodetic(crs) if crs.kind.is_geographic() => Ok(crs),
            _ => Err(factory_err!(
                "{} is not a geographic crs",
                Qualified(self.authority(), code)
            )),
        }
    }

    pub(crate) fn geodetic_crs_at(&self, code: &str, depth: ResolveDepth) -> Result<Crs> {
        if let Some(crs) = self.cached_crs("geodetic_crs", code) {
            return Ok(crs);
        }

        let text_column = if self.context().supports(LayoutFeature::TextDefinitions) {
            "text_definition"
        } else {
            "NULL"
        };
        let sql = format!(
            "SELECT name, type, coordinate_system_auth_name, coordinate_system_code, \
             datum_auth_name, datum_code, {text_column}, deprecated, description \
             FROM geodetic_crs WHERE auth_name = ?1 AND code = ?2"
        );
        let rows = self.run(&sql, &self.key_params(code))?;
        let row = one_row(rows, "geodetic crs", self.authority(), code)?;
        let crs = self
            .geodetic_crs_from_row(&row, code, depth)
            .building("geodetic crs", self.authority(), code)?;

        self.cache_crs("geodetic_crs", code, crs.clone());
        Ok(crs)
    }

    fn geodetic_crs_from_row(&self, row: &Row, code: &str, depth: ResolveDepth) -> Result<Crs> {
        let props = self.properties(
            "geodetic_crs",
            code,
            row.get_string(0)?,
            row.get_opt_string(8)?,
            row.get_bool(7)?,
        )?;

        if let Some(text) = row.get_opt_string(6)? {
            return self.parse_text_definition(&text, props, depth);
        }

        let (Some(cs_auth), Some(cs_code), Some(datum_auth), Some(datum_code)) = (
            row.get_opt_string(2)?,
            row.get_opt_string(3)?,
            row.get_opt_string(4)?,
            row.get_opt_string(5)?,
        ) else {
            return Err(factory_err!(
                "geodetic crs has neither a datum and coordinate system nor a text definition"
            ));
        };

        let ty = row.get_string(1)?;
        let kind = GeodeticKind::from_catalog_type(&ty)
            .ok_or_else(|| factory_err!("unknown geodetic crs type '{ty}'"))?;
        let cs = self
            .with_authority(&cs_auth)
            .create_coordinate_system(&cs_code)?;
        let datum = self
            .with_authority(&datum_auth)
            .create_geodetic_datum_or_ensemble(&datum_code)?;

        Ok(Crs::Geodetic(Arc::new(GeodeticCrs::try_new(
            props, kind, datum, cs,
        )?)))
    }

    fn parse_text_definition(
        &self,
        text: &str,
        props: ObjectProperties,
        depth: ResolveDepth,
    ) -> Result<Crs> {
        let parser = self
            .collaborators()
            .text_parser
            .clone()
            .ok_or_else(|| factory_err!("no text definition parser is configured"))?;
        debug!(name = %props.name, depth = depth.get(), "parsing text definition");

        let ctx = ParseContext::new(self.with_authority(""), depth);
        let parsed = parser.parse(text, &ctx)?;
        Ok(parsed.with_properties(props))
    }

    pub fn create_projected_crs(&self, code: &str) -> Result<Arc<ProjectedCrs>> {
        self.projected_crs_at(code, ResolveDepth::ROOT)
    }

    pub(crate) fn projected_crs_at(
        &self,
        code: &str,
        depth: ResolveDepth,
    ) -> Result<Arc<ProjectedCrs>> {
        if let Some(crs) = self.cached_crs("projected_crs", code) {
            return match crs {
                Crs::Projected(p) => Ok(p),
                other => Err(factory_err!(
                    "{} is a {}, not a projected crs",
                    Qualified(self.authority(), code),
                    other.kind_name()
                )),
            };
        }

        let text_column = if self.context().supports(LayoutFeature::TextDefinitions) {
            "text_definition"
        } else {
            "NULL"
        };
        let sql = format!(
            "SELECT name, coordinate_system_auth_name, coordinate_system_code, \
             geodetic_crs_auth_name, geodetic_crs_code, conversion_auth_name, conversion_code, \
             {text_column}, deprecated, description \
             FROM projected_crs WHERE auth_name = ?1 AND code = ?2"
        );
        let rows = self.run(&sql, &self.key_params(code))?;
        let row = one_row(rows, "projected crs", self.authority(), code)?;
        let crs = self
            .projected_crs_from_row(&row, code, depth)
            .building("projected crs", self.authority(), code)?;

        self.cache_crs("projected_crs", code, Crs::Projected(crs.clone()));
        Ok(crs)
    }

    fn projected_crs_from_row(
        &self,
        row: &Row,
        code: &str,
        depth: ResolveDepth,
    ) -> Result<Arc<ProjectedCrs>> {
        let props = self.properties(
            "projected_crs",
            code,
            row.get_string(0)?,
            row.get_opt_string(9)?,
            row.get_bool(8)?,
        )?;

        if let Some(text) = row.get_opt_string(7)? {
            return match self.parse_text_definition(&text, props, depth)? {
                Crs::Projected(p) => Ok(p),
                other => Err(factory_err!(
                    "text definition describes a {}, not a projected crs",
                    other.kind_name()
                )),
            };
        }

        let (
            Some(cs_auth),
            Some(cs_code),
            Some(base_auth),
            Some(base_code),
            Some(conv_auth),
            Some(conv_code),
        ) = (
            row.get_opt_string(1)?,
            row.get_opt_string(2)?,
            row.get_opt_string(3)?,
            row.get_opt_string(4)?,
            row.get_opt_string(5)?,
            row.get_opt_string(6)?,
        )
        else {
            return Err(factory_err!(
                "projected crs has neither a complete definition nor a text definition"
            ));
        };

        let cs = self
            .with_authority(&cs_auth)
            .create_coordinate_system(&cs_code)?;
        let base = match self
            .with_authority(&base_auth)
            .geodetic_crs_at(&base_code, depth)?
        {
            Crs::Geodetic(base) => base,
            other => {
                return Err(factory_err!(
                    "base crs {} is a {}",
                    Qualified(&base_auth, &base_code),
                    other.kind_name()
                ));
            }
        };
        let conversion = self
            .with_authority(&conv_auth)
            .create_conversion(&conv_code)?;

        Ok(Arc::new(ProjectedCrs::try_new(props, base, conversion, cs)?))
    }

    pub fn create_vertical_crs(&self, code: &str) -> Result<Arc<VerticalCrs>> {
        if let Some(crs) = self.cached_crs("vertical_crs", code) {
            return match crs {
                Crs::Vertical(v) => Ok(v),
                other => Err(factory_err!(
                    "{} is a {}, not a vertical crs",
                    Qualified(self.authority(), code),
                    other.kind_name()
                )),
            };
        }

        let rows = self.run(
            "SELECT name, coordinate_system_auth_name, coordinate_system_code, \
             datum_auth_name, datum_code, deprecated, description \
             FROM vertical_crs WHERE auth_name = ?1 AND code = ?2",
            &self.key_params(code),
        )?;
        let row = one_row(rows, "vertical crs", self.authority(), code)?;
        let crs = self
            .vertical_crs_from_row(&row, code)
            .building("vertical crs", self.authority(), code)?;

        self.cache_crs("vertical_crs", code, Crs::Vertical(crs.clone()));
        Ok(crs)
    }

    fn vertical_crs_from_row(&self, row: &Row, code: &str) -> Result<Arc<VerticalCrs>> {
        let props = self.properties(
            "vertical_crs",
            code,
            row.get_string(0)?,
            row.get_opt_string(6)?,
            row.get_bool(5)?,
        )?;
        let cs = self
            .with_authority(&row.get_string(1)?)
            .create_coordinate_system(&row.get_string(2)?)?;
        if cs.kind != CsKind::Vertical {
            return Err(factory_err!(
                "vertical crs requires a vertical coordinate system, got {}",
                cs.kind.as_catalog_type()
            ));
        }
        let datum = self
            .with_authority(&row.get_string(3)?)
            .create_vertical_datum_or_ensemble(&row.get_string(4)?)?;
        Ok(Arc::new(VerticalCrs { props, datum, cs }))
    }

    pub fn create_compound_crs(&self, code: &str) -> Result<Arc<CompoundCrs>> {
        self.compound_crs_at(code, ResolveDepth::ROOT)
    }

    pub(crate) fn compound_crs_at(
        &self,
        code: &str,
        depth: ResolveDepth,
    ) -> Result<Arc<CompoundCrs>> {
        if let Some(crs) = self.cached_crs("compound_crs", code) {
            return match crs {
                Crs::Compound(c) => Ok(c),
                other => Err(factory_err!(
                    "{} is a {}, not a compound crs",
                    Qualified(self.authority(), code),
                    other.kind_name()
                )),
            };
        }

        let rows = self.run(
            "SELECT name, horiz_crs_auth_name, horiz_crs_code, vertical_crs_auth_name, \
             vertical_crs_code, deprecated, description \
             FROM compound_crs WHERE auth_name = ?1 AND code = ?2",
            &self.key_params(code),
        )?;
        let row = one_row(rows, "compound crs", self.authority(), code)?;
        let crs = self
            .compound_crs_from_row(&row, code, depth)
            .building("compound crs", self.authority(), code)?;

        self.cache_crs("compound_crs", code, Crs::Compound(crs.clone()));
        Ok(crs)
    }

    fn compound_crs_from_row(
        &self,
        row: &Row,
        code: &str,
        depth: ResolveDepth,
    ) -> Result<Arc<CompoundCrs>> {
        let props = self.properties(
            "compound_crs",
            code,
            row.get_string(0)?,
            row.get_opt_string(6)?,
            row.get_bool(5)?,
        )?;
        let horizontal = self
            .with_authority(&row.get_string(1)?)
            .crs_at(&row.get_string(2)?, depth)?;
        let vertical = self
            .with_authority(&row.get_string(3)?)
            .create_vertical_crs(&row.get_string(4)?)?;
        Ok(Arc::new(CompoundCrs::try_new(
            props,
            vec![horizontal, Crs::Vertical(vertical)],
        )?))
    }
}

use crate::config::BoundaryConfig;
use crate::error::AtlasError;
use crate::projection::{reproject, Crs};
use crate::types::{Region, RegionField};
use anyhow::{anyhow, Context, Result};
use geo::{ChamberlainDuquetteArea, MapCoords, MultiPolygon};
use shapefile::dbase::FieldValue;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

/// Loads every polygon feature of a GeoJSON or shapefile boundary set.
///
/// Geometry comes back in WGS84 whatever `crs` the file is in. Features with
/// no id or no polygon geometry are skipped.
pub fn load_regions(path: &Path, fields: &BoundaryConfig, crs: Crs) -> Result<Vec<Region>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .ok_or_else(|| anyhow!("Boundary file has no extension: {:?}", path))?;

    let regions = match extension.as_str() {
        "shp" => load_shapefile(path, fields, crs)?,
        "json" | "geojson" => load_geojson(path, fields, crs)?,
        _ => return Err(anyhow!("Unsupported boundary format: {}", extension)),
    };

    info!(count = regions.len(), path = ?path, "Loaded boundary regions");
    Ok(regions)
}

/// Keeps the regions whose `field` starts with `prefix`, in their original order.
pub fn filter_by_prefix(
    regions: &[Region],
    field: RegionField,
    prefix: &str,
) -> Result<Vec<Region>, AtlasError> {
    let subset: Vec<Region> = regions
        .iter()
        .filter(|r| field.value(r).starts_with(prefix))
        .cloned()
        .collect();

    if subset.is_empty() {
        return Err(AtlasError::EmptyResult {
            field,
            prefix: prefix.to_string(),
        });
    }
    info!(kept = subset.len(), of = regions.len(), %field, prefix, "Filtered regions");
    Ok(subset)
}

fn load_geojson(path: &Path, fields: &BoundaryConfig, crs: Crs) -> Result<Vec<Region>> {
    use geojson::GeoJson;

    let file = File::open(path)
        .with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    let geojson = GeoJson::from_reader(BufReader::new(file)).context("Failed to parse GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("Boundary GeoJSON must be a FeatureCollection")),
    };

    let mut regions = Vec::new();

    for feature in collection.features {
        let props = feature.properties.as_ref();
        let property = |name: &str| props.and_then(|p| p.get(name));

        let id = match property(&fields.id_field).and_then(json_text) {
            Some(id) => id,
            None => continue,
        };
        let name = property(&fields.name_field)
            .and_then(json_text)
            .unwrap_or_default();
        let area = fields
            .area_field
            .as_deref()
            .and_then(property)
            .and_then(json_number);

        let geometry = match feature.geometry {
            Some(geometry) => {
                let geometry: geo::Geometry<f64> = geometry
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert geometry of {}: {:?}", id, e))?;
                match geometry {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue,
                }
            }
            None => continue,
        };

        regions.push(build_region(id, name, area, geometry, crs)?);
    }

    Ok(regions)
}

fn load_shapefile(path: &Path, fields: &BoundaryConfig, crs: Crs) -> Result<Vec<Region>> {
    let mut reader = shapefile::Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {:?}", path))?;

    let mut regions = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let id_value = record
            .get(&fields.id_field)
            .ok_or_else(|| anyhow!("Id field '{}' not found in shapefile", fields.id_field))?;
        let id = match dbase_text(id_value) {
            Some(id) => id,
            None => continue,
        };
        let name = record
            .get(&fields.name_field)
            .and_then(dbase_text)
            .unwrap_or_default();
        let area = fields
            .area_field
            .as_deref()
            .and_then(|f| record.get(f))
            .and_then(dbase_number);

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygon of {}: {:?}", id, e))?,
            shapefile::Shape::PolygonM(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygonM of {}: {:?}", id, e))?,
            shapefile::Shape::PolygonZ(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygonZ of {}: {:?}", id, e))?,
            _ => continue,
        };

        regions.push(build_region(id, name, area, geometry, crs)?);
    }

    Ok(regions)
}

fn build_region(
    id: String,
    name: String,
    area: Option<f64>,
    geometry: MultiPolygon<f64>,
    crs: Crs,
) -> Result<Region> {
    let geometry = match crs {
        Crs::Wgs84 => geometry,
        Crs::Bng => geometry
            .try_map_coords(|c| reproject(c, Crs::Bng, Crs::Wgs84))
            .with_context(|| format!("Failed to reproject boundary of {}", id))?,
    };

    let area = match area {
        Some(area) => area,
        None => {
            debug!(%id, "No area attribute, computing from geometry");
            geometry.chamberlain_duquette_unsigned_area()
        }
    };

    Ok(Region {
        id,
        name,
        area,
        geometry,
    })
}

fn json_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn dbase_text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(Some(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        FieldValue::Numeric(Some(n)) => Some(n.to_string()),
        FieldValue::Integer(i) => Some(i.to_string()),
        _ => None,
    }
}

fn dbase_number(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Numeric(Some(n)) => Some(*n),
        FieldValue::Float(Some(f)) => Some(f64::from(*f)),
        FieldValue::Double(d) => Some(*d),
        FieldValue::Integer(i) => Some(f64::from(*i)),
        FieldValue::Character(Some(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use geo::{polygon, BoundingRect};
    use shapefile::dbase;
    use std::io::Write;

    pub(crate) fn square(id: &str, name: &str, area: f64, x: f64, y: f64) -> Region {
        Region {
            id: id.to_string(),
            name: name.to_string(),
            area,
            geometry: MultiPolygon::new(vec![polygon![
                (x: x, y: y),
                (x: x + 1.0, y: y),
                (x: x + 1.0, y: y + 1.0),
                (x: x, y: y + 1.0),
                (x: x, y: y),
            ]]),
        }
    }

    fn fields(area_field: Option<&str>) -> BoundaryConfig {
        BoundaryConfig {
            id_field: "lad19cd".to_string(),
            name_field: "lad19nm".to_string(),
            area_field: area_field.map(str::to_string),
            filter_field: RegionField::Id,
            prefix: "E".to_string(),
        }
    }

    // 380 districts, 326 of them with English (E) codes
    fn lad_set() -> Vec<Region> {
        let mut regions = Vec::new();
        for i in 0..326 {
            regions.push(square(&format!("E0{:07}", i), "England", 1.0, 0.0, 0.0));
        }
        for i in 0..22 {
            regions.push(square(&format!("W0{:07}", i), "Wales", 1.0, 0.0, 0.0));
        }
        for i in 0..32 {
            regions.push(square(&format!("S1{:07}", i), "Scotland", 1.0, 0.0, 0.0));
        }
        regions
    }

    #[test]
    fn prefix_e_keeps_english_districts() {
        let regions = lad_set();
        assert_eq!(regions.len(), 380);
        let england = filter_by_prefix(&regions, RegionField::Id, "E").unwrap();
        assert_eq!(england.len(), 326);
        assert!(england.iter().all(|r| r.id.starts_with('E')));
    }

    #[test]
    fn prefix_filter_can_match_names() {
        let regions = vec![
            square("E1", "Bristol", 1.0, 0.0, 0.0),
            square("E2", "Bath", 1.0, 0.0, 0.0),
            square("E3", "Leeds", 1.0, 0.0, 0.0),
        ];
        let b = filter_by_prefix(&regions, RegionField::Name, "B").unwrap();
        let ids: Vec<_> = b.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["E1", "E2"]);
    }

    #[test]
    fn empty_filter_result_is_an_error() {
        let err = filter_by_prefix(&lad_set(), RegionField::Id, "N").unwrap_err();
        assert!(matches!(err, AtlasError::EmptyResult { ref prefix, .. } if prefix == "N"));
    }

    const GEOJSON: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {"type": "Feature",
         "properties": {"lad19cd": "E06000001", "lad19nm": "Hartlepool", "st_areasha": 93712620.0},
         "geometry": {"type": "Polygon", "coordinates": [[[-1.3, 54.6], [-1.2, 54.6], [-1.2, 54.7], [-1.3, 54.6]]]}},
        {"type": "Feature",
         "properties": {"lad19cd": "W06000001", "lad19nm": "Isle of Anglesey", "st_areasha": 711680000.0},
         "geometry": {"type": "MultiPolygon", "coordinates": [[[[-4.5, 53.2], [-4.2, 53.2], [-4.2, 53.4], [-4.5, 53.2]]]]}},
        {"type": "Feature",
         "properties": {"lad19nm": "No code"},
         "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]}},
        {"type": "Feature",
         "properties": {"lad19cd": "E99999999", "lad19nm": "A point"},
         "geometry": {"type": "Point", "coordinates": [0.0, 51.0]}}
      ]
    }"#;

    fn write_fixture(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".geojson").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn geojson_features_become_regions() {
        let file = write_fixture(GEOJSON);
        let regions = load_regions(file.path(), &fields(Some("st_areasha")), Crs::Wgs84).unwrap();

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].id, "E06000001");
        assert_eq!(regions[0].name, "Hartlepool");
        assert_eq!(regions[0].area, 93712620.0);
        assert_eq!(regions[1].geometry.0.len(), 1);
    }

    #[test]
    fn area_is_computed_when_field_is_absent() {
        let file = write_fixture(GEOJSON);
        let regions = load_regions(file.path(), &fields(None), Crs::Wgs84).unwrap();
        // A ~0.1 degree triangle at 54.6N is tens of square kilometres
        assert!(regions[0].area > 1.0e7 && regions[0].area < 1.0e9, "{}", regions[0].area);
    }

    #[test]
    fn bng_boundaries_are_reprojected() {
        let bng = r#"{"type": "FeatureCollection", "features": [
          {"type": "Feature", "properties": {"lad19cd": "E09000001", "lad19nm": "City of London"},
           "geometry": {"type": "Polygon", "coordinates": [[[530000, 180000], [533000, 180000], [533000, 182000], [530000, 180000]]]}}
        ]}"#;
        let file = write_fixture(bng);
        let regions = load_regions(file.path(), &fields(None), Crs::Bng).unwrap();
        let first = regions[0].geometry.0[0].exterior().0[0];
        assert!((first.y - 51.5).abs() < 0.05);
        assert!((first.x + 0.13).abs() < 0.05);
    }

    fn shapefile_fields() -> BoundaryConfig {
        BoundaryConfig {
            id_field: "code".to_string(),
            name_field: "name".to_string(),
            area_field: Some("area".to_string()),
            filter_field: RegionField::Id,
            prefix: "E".to_string(),
        }
    }

    fn record(code: Option<&str>, name: &str, area: f64) -> dbase::Record {
        let mut record = dbase::Record::default();
        record.insert("code".to_string(), FieldValue::Character(code.map(str::to_string)));
        record.insert("name".to_string(), FieldValue::Character(Some(name.to_string())));
        record.insert("area".to_string(), FieldValue::Numeric(Some(area)));
        record
    }

    fn table() -> dbase::TableWriterBuilder {
        dbase::TableWriterBuilder::new()
            .add_character_field(dbase::FieldName::try_from("code").unwrap(), 16)
            .add_character_field(dbase::FieldName::try_from("name").unwrap(), 32)
            .add_numeric_field(dbase::FieldName::try_from("area").unwrap(), 16, 1)
    }

    // Clockwise, closed ring over a grid square
    fn bng_ring(e: f64, n: f64, size: f64) -> Vec<shapefile::Point> {
        vec![
            shapefile::Point::new(e, n),
            shapefile::Point::new(e, n + size),
            shapefile::Point::new(e + size, n + size),
            shapefile::Point::new(e + size, n),
            shapefile::Point::new(e, n),
        ]
    }

    #[test]
    fn shapefile_records_become_regions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lad.shp");
        {
            let mut writer = shapefile::Writer::from_path(&path, table()).unwrap();
            let shapes = [
                (Some("E09000001"), "City of London", 2.9e6, bng_ring(530_000.0, 180_000.0, 3_000.0)),
                (None, "Nameless", 1.0, bng_ring(400_000.0, 300_000.0, 1_000.0)),
                (Some("W06000015"), "Cardiff", 1.4e8, bng_ring(310_000.0, 170_000.0, 10_000.0)),
            ];
            for (code, name, area, ring) in shapes {
                let polygon = shapefile::Polygon::new(shapefile::PolygonRing::Outer(ring));
                writer
                    .write_shape_and_record(&polygon, &record(code, name, area))
                    .unwrap();
            }
        }

        let regions = load_regions(&path, &shapefile_fields(), Crs::Bng).unwrap();
        let ids: Vec<_> = regions.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["E09000001", "W06000015"]);
        assert_eq!(regions[0].name, "City of London");
        assert_eq!(regions[0].area, 2.9e6);

        // Grid square now sits in degrees around central London
        let rect = regions[0].geometry.bounding_rect().unwrap();
        assert!((51.49..51.54).contains(&rect.min().y), "{:?}", rect);
        assert!((-0.14..-0.07).contains(&rect.min().x), "{:?}", rect);
    }

    #[test]
    fn shapefile_polygon_z_without_area_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lad_z.shp");
        {
            let mut writer = shapefile::Writer::from_path(&path, table()).unwrap();
            let ring: Vec<shapefile::PointZ> = bng_ring(530_000.0, 180_000.0, 3_000.0)
                .into_iter()
                .map(|p| shapefile::PointZ::new(p.x, p.y, 0.0, 0.0))
                .collect();
            let polygon = shapefile::PolygonZ::new(shapefile::PolygonRing::Outer(ring));
            writer
                .write_shape_and_record(&polygon, &record(Some("E09000001"), "City of London", 0.0))
                .unwrap();
        }

        let fields = BoundaryConfig {
            area_field: None,
            ..shapefile_fields()
        };
        let regions = load_regions(&path, &fields, Crs::Bng).unwrap();
        assert_eq!(regions.len(), 1);
        // 3km x 3km square, give or take projection scale
        assert!((regions[0].area - 9.0e6).abs() < 0.5e6, "{}", regions[0].area);
    }

    #[test]
    fn shapefile_polygon_m_keeps_its_area_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lad_m.shp");
        {
            let mut writer = shapefile::Writer::from_path(&path, table()).unwrap();
            let ring: Vec<shapefile::PointM> = bng_ring(450_000.0, 260_000.0, 5_000.0)
                .into_iter()
                .map(|p| shapefile::PointM::new(p.x, p.y, 0.0))
                .collect();
            let polygon = shapefile::PolygonM::new(shapefile::PolygonRing::Outer(ring));
            writer
                .write_shape_and_record(&polygon, &record(Some("E07000222"), "Warwick", 2.8e8))
                .unwrap();
        }

        let regions = load_regions(&path, &shapefile_fields(), Crs::Bng).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].id, "E07000222");
        assert_eq!(regions[0].area, 2.8e8);
        let rect = regions[0].geometry.bounding_rect().unwrap();
        assert!((52.1..52.4).contains(&rect.min().y), "{:?}", rect);
        assert!((-1.4..-1.1).contains(&rect.min().x), "{:?}", rect);
    }

    #[test]
    fn dbase_values_read_as_text_and_numbers() {
        assert_eq!(dbase_text(&FieldValue::Character(Some("  E1 ".into()))), Some("E1".into()));
        assert_eq!(dbase_text(&FieldValue::Character(Some("   ".into()))), None);
        assert_eq!(dbase_text(&FieldValue::Character(None)), None);
        assert_eq!(dbase_text(&FieldValue::Integer(7)), Some("7".into()));
        assert_eq!(dbase_number(&FieldValue::Numeric(Some(2.5))), Some(2.5));
        assert_eq!(dbase_number(&FieldValue::Double(4.0)), Some(4.0));
        assert_eq!(dbase_number(&FieldValue::Integer(3)), Some(3.0));
        assert_eq!(dbase_number(&FieldValue::Character(Some(" 12.5".into()))), Some(12.5));
        assert_eq!(dbase_number(&FieldValue::Numeric(None)), None);
    }

    #[test]
    fn non_collection_is_rejected() {
        let file = write_fixture(r#"{"type": "Point", "coordinates": [0.0, 0.0]}"#);
        assert!(load_regions(file.path(), &fields(None), Crs::Wgs84).is_err());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_regions(Path::new("boundaries.kml"), &fields(None), Crs::Wgs84).unwrap_err();
        assert!(err.to_string().contains("Unsupported boundary format"));
    }
}

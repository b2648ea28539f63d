use std::io::Write;

use log::warn;

use super::{Column, EdmType, Table, DEFAULT_DATA_SOURCE_NAME};
use crate::error::GeoKitError;
use crate::xml::{parse_document, XmlElement, XmlWriter};

const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
const MSDATA_NAMESPACE: &str = "urn:schemas-microsoft-com:xml-msdata";

pub(crate) fn read_table(data: &[u8]) -> Result<Table, GeoKitError> {
    let root = parse_document(data)?;
    let schema = root
        .child_ns(XSD_NAMESPACE, "schema")
        .ok_or_else(|| GeoKitError::Format("data source schema is missing".into()))?;

    let entity = schema
        .descendant("choice")
        .and_then(|choice| choice.child("element"))
        .ok_or_else(|| GeoKitError::Format("data source schema does not define an entity type".into()))?;
    let entity_type_name = entity
        .attr("name")
        .ok_or_else(|| GeoKitError::Format("entity type has no name".into()))?;

    let primary_key = schema
        .descendant("unique")
        .and_then(|unique| unique.child("field"))
        .and_then(|field| field.attr("xpath"));

    let mut columns = vec![];
    if let Some(sequence) = entity.descendant("sequence") {
        for element in sequence.children_named("element") {
            let Some(name) = element.attr("name") else {
                warn!("Skipping data source column without name");
                continue;
            };

            let edm_type = element.attr("type").and_then(EdmType::from_xsd).unwrap_or_else(|| {
                warn!("Unknown type of column {name}, reading it as text");
                EdmType::String
            });
            columns.push(Column {
                primary_key: primary_key == Some(name),
                ..Column::new(name, edm_type)
            });
        }
    }

    let rows = root
        .children_named(entity_type_name)
        .map(|entity| read_row(entity, &columns))
        .collect();

    Ok(Table {
        data_source_name: Some(root.name.clone()),
        entity_type_name: entity_type_name.to_string(),
        columns,
        rows,
    })
}

fn read_row(entity: &XmlElement, columns: &[Column]) -> Vec<Option<String>> {
    columns
        .iter()
        .map(|column| entity.child(&column.name).and_then(|cell| cell.value(false)))
        .collect()
}

pub(crate) fn write_table(table: &Table, out: &mut dyn Write) -> Result<(), GeoKitError> {
    let data_source_name = table.data_source_name.as_deref().unwrap_or(DEFAULT_DATA_SOURCE_NAME);
    let entity_type_name = table.entity_type_name.as_str();

    let mut writer = XmlWriter::new(out);
    writer.declaration()?;
    writer.start(data_source_name, &[])?;

    writer.start(
        "xs:schema",
        &[
            ("id", data_source_name),
            ("xmlns:xs", XSD_NAMESPACE),
            ("xmlns:msdata", MSDATA_NAMESPACE),
        ],
    )?;
    writer.start("xs:element", &[("name", data_source_name), ("msdata:IsDataSet", "true")])?;
    writer.start("xs:complexType", &[])?;
    writer.start("xs:choice", &[("minOccurs", "0"), ("maxOccurs", "unbounded")])?;
    writer.start("xs:element", &[("name", entity_type_name)])?;
    writer.start("xs:complexType", &[])?;
    writer.start("xs:sequence", &[])?;
    for column in &table.columns {
        let mut attributes = vec![("name", column.name.as_str()), ("type", column.edm_type.xsd_name())];
        if !column.primary_key {
            attributes.push(("minOccurs", "0"));
        }
        writer.empty("xs:element", &attributes)?;
    }
    writer.end("xs:sequence")?;
    writer.end("xs:complexType")?;
    writer.end("xs:element")?;
    writer.end("xs:choice")?;
    writer.end("xs:complexType")?;

    if let Some(primary_key) = table.columns.iter().find(|c| c.primary_key) {
        let selector = format!(".//{entity_type_name}");
        writer.start("xs:unique", &[("name", "Constraint1")])?;
        writer.empty("xs:selector", &[("xpath", selector.as_str())])?;
        writer.empty("xs:field", &[("xpath", primary_key.name.as_str())])?;
        writer.end("xs:unique")?;
    }
    writer.end("xs:element")?;
    writer.end("xs:schema")?;

    for row in &table.rows {
        writer.start(entity_type_name, &[])?;
        for (column, cell) in table.columns.iter().zip(row) {
            if let Some(cell) = cell {
                writer.text_element(&column.name, cell)?;
            }
        }
        writer.end(entity_type_name)?;
    }

    writer.end(data_source_name)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use geokit_types::{
        latlon, Attributed, Geometry, GeometryType, LineString, Point, PropertyValue, Shape, ShapeMetadata,
        SpatialDataSet,
    };

    use super::*;
    use crate::codec::data_source::{
        DataSourceFormat, DataSourceOptions, DataSourceReader, DataSourceWriter, DATA_SOURCE_PROPERTY,
    };
    use crate::codec::{SpatialReader, TextWriter};

    const PARKS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<CityParks>
  <xs:schema id="CityParks" xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:msdata="urn:schemas-microsoft-com:xml-msdata">
    <xs:element name="CityParks" msdata:IsDataSet="true">
      <xs:complexType>
        <xs:choice minOccurs="0" maxOccurs="unbounded">
          <xs:element name="Park">
            <xs:complexType>
              <xs:sequence>
                <xs:element name="ParkId" type="xs:long" />
                <xs:element name="Name" type="xs:string" minOccurs="0" />
                <xs:element name="Opened" type="xs:dateTime" minOccurs="0" />
                <xs:element name="Latitude" type="xs:double" minOccurs="0" />
                <xs:element name="Longitude" type="xs:double" minOccurs="0" />
                <xs:element name="Boundary" type="xs:anyType" minOccurs="0" />
              </xs:sequence>
            </xs:complexType>
          </xs:element>
        </xs:choice>
      </xs:complexType>
      <xs:unique name="Constraint1">
        <xs:selector xpath=".//Park" />
        <xs:field xpath="ParkId" />
      </xs:unique>
    </xs:element>
  </xs:schema>
  <Park>
    <ParkId>10</ParkId>
    <Name>Green &amp; Quiet</Name>
    <Opened>1999-05-01T00:00:00Z</Opened>
    <Boundary>POLYGON ((0 0, 1 0, 1 1, 0 0))</Boundary>
  </Park>
  <Park>
    <ParkId>11</ParkId>
    <Latitude>5</Latitude>
    <Longitude>6</Longitude>
  </Park>
</CityParks>"#;

    #[test]
    fn read_xml() {
        let dataset = DataSourceReader::default().parse(PARKS.as_bytes()).unwrap();
        assert_eq!(dataset.geometries.len(), 2);

        let park = &dataset.geometries[0];
        assert_eq!(park.geometry_type(), GeometryType::Polygon);
        let metadata = park.metadata().unwrap();
        assert_eq!(metadata.id.as_deref(), Some("10"));
        assert_eq!(metadata.title.as_deref(), Some("Green & Quiet"));
        assert_matches!(metadata.property("Opened"), Some(PropertyValue::DateTime(_)));

        assert_matches!(&dataset.geometries[1], Geometry::Point(p) if p.coordinate == latlon!(5.0, 6.0));

        let document = dataset.metadata.as_ref().unwrap();
        assert_eq!(
            document.property(DATA_SOURCE_PROPERTY).and_then(|v| v.as_str()),
            Some("CityParks")
        );
    }

    #[test]
    fn missing_schema() {
        let reader = DataSourceReader::default();
        assert_matches!(
            reader.parse(b"<CityParks><Park/></CityParks>"),
            Err(GeoKitError::Format(_))
        );
    }

    #[test]
    fn write_and_read_back() {
        let dataset = SpatialDataSet::from_geometries(vec![
            Point::new(latlon!(1.0, 2.0))
                .with_metadata(ShapeMetadata::new().with_title("A").with_property("visited", true))
                .into(),
            LineString::new(vec![latlon!(0.0, 0.0), latlon!(3.0, 3.0)]).into(),
        ]);

        let options = DataSourceOptions::new(DataSourceFormat::Xml)
            .with_data_source_name("Trips")
            .with_entity_type_name("Stop");
        let text = DataSourceWriter::new(options).write_string(&dataset).unwrap();
        assert!(text.contains("<xs:field xpath=\"EntityID\"/>"));
        assert!(text.contains("<visited>true</visited>"));

        let back = DataSourceReader::default().parse(text.as_bytes()).unwrap();
        assert_eq!(back.geometries.len(), 2);
        let metadata = back.geometries[0].metadata().unwrap();
        assert_eq!(metadata.id.as_deref(), Some("1"));
        assert_eq!(metadata.title.as_deref(), Some("A"));
        assert_eq!(metadata.property("visited"), Some(&PropertyValue::Bool(true)));
        assert_eq!(back.geometries[1].geometry_type(), GeometryType::LineString);

        let document = back.metadata.as_ref().unwrap();
        assert_eq!(document.property(DATA_SOURCE_PROPERTY).and_then(|v| v.as_str()), Some("Trips"));
    }
}

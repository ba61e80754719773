//! Columnar persistence of the catalog in Parquet format

use arrow::array::{
    Array, ArrayRef, Float64Array, Float64Builder, ListArray, ListBuilder, RecordBatch,
    StringArray, StringBuilder, UInt32Array, UInt32Builder,
};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use bytes::Bytes;
use parquet::arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter};
use parquet::file::properties::WriterProperties;
use std::path::Path;
use std::sync::Arc;

use super::Catalog;
use crate::types::{AggregatedFeatureRow, Column};
use crate::{Error, Result};

const J_ARRAY: &str = "J_array";
const CT_ARRAY: &str = "Ct_array";
const CP_ARRAY: &str = "Cp_array";
const PE_ARRAY: &str = "Pe_array";
const STATIC_POWER: &str = "static_power (W)";
const STATIC_THRUST: &str = "static_thrust (N)";

fn curve_type() -> DataType {
    DataType::List(Arc::new(Field::new("item", DataType::Float64, true)))
}

fn catalog_schema() -> Arc<ArrowSchema> {
    let mut fields = vec![
        Field::new(Column::PropId.name(), DataType::Utf8, false),
        Field::new(Column::PropType.name(), DataType::Utf8, false),
        Field::new(Column::SourceFilename.name(), DataType::Utf8, false),
        Field::new(Column::Diameter.name(), DataType::Float64, false),
        Field::new(Column::Pitch.name(), DataType::Float64, false),
        Field::new(Column::Speed.name(), DataType::UInt32, false),
    ];
    for column in [
        Column::MaxThrust,
        Column::MaxPower,
        Column::MaxTorque,
        Column::MaxFigureOfMerit,
        Column::MaxThrustPerPower,
    ] {
        fields.push(Field::new(column.name(), DataType::Float64, false));
    }
    for name in [J_ARRAY, CT_ARRAY, CP_ARRAY, PE_ARRAY] {
        fields.push(Field::new(name, curve_type(), false));
    }
    for name in [STATIC_POWER, STATIC_THRUST] {
        fields.push(Field::new(name, DataType::Float64, true));
    }
    Arc::new(ArrowSchema::new(fields))
}

/// Writes a catalog as a single Parquet file
pub struct CatalogWriter {
    pub arrow_schema: Arc<ArrowSchema>,
}

impl Default for CatalogWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogWriter {
    pub fn new() -> Self {
        Self {
            arrow_schema: catalog_schema(),
        }
    }

    /// Encode the catalog to Parquet bytes
    pub fn write_parquet(&self, catalog: &Catalog) -> Result<Bytes> {
        let batch = self.catalog_to_record_batch(catalog.rows())?;

        let mut buffer = Vec::new();
        let props = WriterProperties::builder()
            .set_compression(parquet::basic::Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(&mut buffer, self.arrow_schema.clone(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        Ok(Bytes::from(buffer))
    }

    pub fn write_to_path(&self, catalog: &Catalog, path: &Path) -> Result<()> {
        let data = self.write_parquet(catalog)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &data)?;
        tracing::info!(
            path = %path.display(),
            rows = catalog.len(),
            bytes = data.len(),
            "Catalog written"
        );
        Ok(())
    }

    fn catalog_to_record_batch(&self, rows: &[AggregatedFeatureRow]) -> Result<RecordBatch> {
        let num_rows = rows.len();

        let strings = |f: fn(&AggregatedFeatureRow) -> &str| -> ArrayRef {
            let mut builder = StringBuilder::with_capacity(num_rows, num_rows * 10);
            for row in rows {
                builder.append_value(f(row));
            }
            Arc::new(builder.finish())
        };
        let floats = |f: fn(&AggregatedFeatureRow) -> f64| -> ArrayRef {
            let mut builder = Float64Builder::with_capacity(num_rows);
            for row in rows {
                builder.append_value(f(row));
            }
            Arc::new(builder.finish())
        };
        let optional_floats = |f: fn(&AggregatedFeatureRow) -> Option<f64>| -> ArrayRef {
            let mut builder = Float64Builder::with_capacity(num_rows);
            for row in rows {
                builder.append_option(f(row));
            }
            Arc::new(builder.finish())
        };
        let curves = |f: fn(&AggregatedFeatureRow) -> &[f64]| -> ArrayRef {
            let mut builder = ListBuilder::new(Float64Builder::new());
            for row in rows {
                builder.values().append_slice(f(row));
                builder.append(true);
            }
            Arc::new(builder.finish())
        };

        let mut speed_builder = UInt32Builder::with_capacity(num_rows);
        for row in rows {
            speed_builder.append_value(row.speed);
        }

        let columns: Vec<ArrayRef> = vec![
            strings(|r| r.prop_id.as_str()),
            strings(|r| r.prop_type.as_str()),
            strings(|r| r.source_filename.as_str()),
            floats(|r| r.diameter),
            floats(|r| r.pitch),
            Arc::new(speed_builder.finish()),
            floats(|r| r.max_thrust),
            floats(|r| r.max_power),
            floats(|r| r.max_torque),
            floats(|r| r.max_figure_of_merit),
            floats(|r| r.max_thrust_per_power),
            curves(|r| r.advance_ratio_curve.as_slice()),
            curves(|r| r.thrust_coeff_curve.as_slice()),
            curves(|r| r.power_coeff_curve.as_slice()),
            curves(|r| r.efficiency_curve.as_slice()),
            optional_floats(|r| r.static_power),
            optional_floats(|r| r.static_thrust),
        ];

        RecordBatch::try_new(self.arrow_schema.clone(), columns)
            .map_err(|e| Error::internal(format!("Failed to create RecordBatch: {}", e)))
    }
}

/// Reads a catalog back from Parquet
#[derive(Debug, Default)]
pub struct CatalogReader;

impl CatalogReader {
    pub fn read_parquet(&self, data: Bytes) -> Result<Catalog> {
        let reader = ParquetRecordBatchReaderBuilder::try_new(data)?.build()?;

        let mut catalog = Catalog::new();
        for batch in reader {
            let batch = batch?;
            for row in Self::record_batch_to_rows(&batch)? {
                catalog.push(row);
            }
        }
        Ok(catalog)
    }

    pub fn read_from_path(&self, path: &Path) -> Result<Catalog> {
        let data = std::fs::read(path)?;
        self.read_parquet(Bytes::from(data))
    }

    fn record_batch_to_rows(batch: &RecordBatch) -> Result<Vec<AggregatedFeatureRow>> {
        let prop_id = string_column(batch, Column::PropId.name())?;
        let prop_type = string_column(batch, Column::PropType.name())?;
        let source = string_column(batch, Column::SourceFilename.name())?;
        let diameter = float_column(batch, Column::Diameter.name())?;
        let pitch = float_column(batch, Column::Pitch.name())?;
        let speed = typed_column::<UInt32Array>(batch, Column::Speed.name())?;
        let max_thrust = float_column(batch, Column::MaxThrust.name())?;
        let max_power = float_column(batch, Column::MaxPower.name())?;
        let max_torque = float_column(batch, Column::MaxTorque.name())?;
        let max_fom = float_column(batch, Column::MaxFigureOfMerit.name())?;
        let max_tpp = float_column(batch, Column::MaxThrustPerPower.name())?;
        let j = typed_column::<ListArray>(batch, J_ARRAY)?;
        let ct = typed_column::<ListArray>(batch, CT_ARRAY)?;
        let cp = typed_column::<ListArray>(batch, CP_ARRAY)?;
        let pe = typed_column::<ListArray>(batch, PE_ARRAY)?;
        let static_power = float_column(batch, STATIC_POWER)?;
        let static_thrust = float_column(batch, STATIC_THRUST)?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(AggregatedFeatureRow {
                    prop_id: prop_id.value(i).to_string(),
                    prop_type: prop_type.value(i).to_string(),
                    source_filename: source.value(i).to_string(),
                    diameter: diameter.value(i),
                    pitch: pitch.value(i),
                    speed: speed.value(i),
                    max_thrust: max_thrust.value(i),
                    max_power: max_power.value(i),
                    max_torque: max_torque.value(i),
                    max_figure_of_merit: max_fom.value(i),
                    max_thrust_per_power: max_tpp.value(i),
                    advance_ratio_curve: curve_at(j, i)?,
                    thrust_coeff_curve: curve_at(ct, i)?,
                    power_coeff_curve: curve_at(cp, i)?,
                    efficiency_curve: curve_at(pe, i)?,
                    static_power: optional_at(static_power, i),
                    static_thrust: optional_at(static_thrust, i),
                })
            })
            .collect()
    }
}

fn typed_column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::internal(format!("Catalog column '{}' missing", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::internal(format!("Catalog column '{}' type mismatch", name)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    typed_column::<StringArray>(batch, name)
}

fn float_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    typed_column::<Float64Array>(batch, name)
}

fn optional_at(array: &Float64Array, row: usize) -> Option<f64> {
    array.is_valid(row).then(|| array.value(row))
}

fn curve_at(list: &ListArray, row: usize) -> Result<Vec<f64>> {
    let values = list.value(row);
    let floats = values
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::internal("Curve values are not Float64Array"))?;
    Ok(floats.values().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parquet_roundtrip() {
        let catalog = Catalog::from_rows(vec![
            AggregatedFeatureRow {
                prop_id: "20x10E".to_string(),
                prop_type: "E".to_string(),
                source_filename: "PER3_20x10E.dat".to_string(),
                diameter: 20.0,
                pitch: 10.0,
                speed: 1000,
                max_thrust: 2.76,
                max_power: 2.99,
                max_torque: 0.0286,
                max_figure_of_merit: 0.63,
                max_thrust_per_power: 94.23,
                advance_ratio_curve: vec![0.0, 0.1, 0.2],
                thrust_coeff_curve: vec![0.12, 0.11, 0.09],
                power_coeff_curve: vec![0.058, 0.057, 0.055],
                efficiency_curve: vec![0.0, 0.19, 0.33],
                static_power: Some(2.99),
                static_thrust: Some(2.76),
            },
            AggregatedFeatureRow {
                prop_id: "9x6".to_string(),
                prop_type: "Standard".to_string(),
                source_filename: "PER3_9x6.dat".to_string(),
                diameter: 9.0,
                pitch: 6.0,
                speed: 4000,
                max_thrust: 3.1,
                max_power: 20.5,
                max_torque: 0.05,
                max_figure_of_merit: 0.7,
                max_thrust_per_power: 15.2,
                advance_ratio_curve: vec![0.0],
                thrust_coeff_curve: vec![0.1],
                power_coeff_curve: vec![0.04],
                efficiency_curve: vec![0.0],
                static_power: None,
                static_thrust: None,
            },
        ]);

        let data = CatalogWriter::new().write_parquet(&catalog).unwrap();
        let read_back = CatalogReader.read_parquet(data).unwrap();

        assert_eq!(read_back, catalog);
    }
}

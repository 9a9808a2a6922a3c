use crate::traits::*;
use matrix_util::traits::{IoOps, MeltOps};

use parquet::basic::Type as ParquetType;
use parquet::basic::{Compression, ConvertedType, Repetition, ZstdLevel};
use parquet::data_type::{ByteArray, ByteArrayType, FloatType};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::types::Type;
use std::fs::File;
use std::sync::Arc;

/// consolidated output of parameters and expectations
pub trait ParamIo: FactorParam {
    /// One `{header}.{name}.gz` file per parameter or expectation
    fn to_tsv(&self, header: &str) -> anyhow::Result<()> {
        for (name, mat) in self.named_matrices() {
            mat.to_tsv(&format!("{}.{}.gz", header, name))?;
        }
        Ok(())
    }

    /// Melted table: `row`, `column`, then one float column per
    /// parameter or expectation
    fn to_parquet(
        &self,
        row_names: Option<&[Box<str>]>,
        column_names: Option<&[Box<str>]>,
        file_path: &str,
    ) -> anyhow::Result<()> {
        let named = self.named_matrices();

        let mut fields = vec![
            build_field("row", ParquetType::BYTE_ARRAY, ConvertedType::UTF8)?,
            build_field("column", ParquetType::BYTE_ARRAY, ConvertedType::UTF8)?,
        ];
        for (name, _) in named.iter() {
            fields.push(build_field(name, ParquetType::FLOAT, ConvertedType::NONE)?);
        }

        let schema = Arc::new(
            Type::group_type_builder("FactorParam")
                .with_fields(fields)
                .build()?,
        );

        let Some((_, first)) = named.first() else {
            anyhow::bail!("nothing to write");
        };
        let (_, idx) = first.melt_with_indexes();

        let name_of = |names: Option<&[Box<str>]>, i: usize| -> anyhow::Result<ByteArray> {
            match names {
                Some(names) => names
                    .get(i)
                    .map(|x| ByteArray::from(x.as_ref()))
                    .ok_or_else(|| anyhow::anyhow!("missing name for index {}", i)),
                None => Ok(ByteArray::from(i.to_string().as_bytes())),
            }
        };

        let rows = idx[0]
            .iter()
            .map(|&i| name_of(row_names, i))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let cols = idx[1]
            .iter()
            .map(|&j| name_of(column_names, j))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let file = File::create(file_path)?;
        let zstd_level = ZstdLevel::try_new(5)?;
        let writer_properties = Arc::new(
            WriterProperties::builder()
                .set_compression(Compression::ZSTD(zstd_level))
                .build(),
        );
        let mut writer = SerializedFileWriter::new(file, schema, writer_properties)?;
        let mut row_group_writer = writer.next_row_group()?;

        for data in [&rows, &cols] {
            if let Some(mut column_writer) = row_group_writer.next_column()? {
                column_writer
                    .typed::<ByteArrayType>()
                    .write_batch(data, None, None)?;
                column_writer.close()?;
            }
        }

        for (_, mat) in named.iter() {
            let values = mat.melt();
            if let Some(mut column_writer) = row_group_writer.next_column()? {
                column_writer
                    .typed::<FloatType>()
                    .write_batch(&values, None, None)?;
                column_writer.close()?;
            }
        }

        row_group_writer.close()?;
        writer.close()?;
        Ok(())
    }
}

fn build_field(
    name: &str,
    parquet_type: ParquetType,
    converted_type: ConvertedType,
) -> anyhow::Result<Arc<Type>> {
    Ok(Arc::new(
        Type::primitive_type_builder(name, parquet_type)
            .with_repetition(Repetition::REQUIRED)
            .with_converted_type(converted_type)
            .build()?,
    ))
}

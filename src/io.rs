//! CSV tables read and written by the command-line driver.
//!
//! Readers and writers are generic over `std::io` so they work on files and
//! in-memory buffers alike.

use anyhow::{bail, Context};
use chrono::{DateTime, SecondsFormat, Utc};
use flowcast_core::forcing::ForcingSeries;
use flowcast_core::state::StateTable;
use flowcast_core::units::FloatValue;
use flowcast_core::SessionOutput;
use ndarray::Array2;
use std::io::{Read, Write};

fn parse_value(value: &str, line: usize, column: usize) -> anyhow::Result<FloatValue> {
    value
        .trim()
        .parse::<FloatValue>()
        .with_context(|| format!("line {}, column {}: `{}` is not a number", line, column + 1, value))
}

/// Read forcing samples from a CSV with a header naming each field.
///
/// Columns that are not forcing fields, such as a timestamp, are skipped unparsed.
pub fn read_forcing<R: Read>(reader: R) -> anyhow::Result<ForcingSeries> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let names: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let used: Vec<bool> = names
        .iter()
        .map(|n| {
            ForcingSeries::FIELDS.iter().any(|field| field == n)
                || n == ForcingSeries::SOLAR_RADIATION_FIELD
        })
        .collect();

    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let row = record
            .iter()
            .enumerate()
            .map(|(column, value)| match used.get(column) {
                Some(true) => parse_value(value, i + 2, column),
                _ => Ok(FloatValue::NAN),
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        rows.push(row);
    }

    Ok(ForcingSeries::from_columns(&names, &rows)?)
}

/// Read the first `columns` values of each row of a header-less numeric CSV.
pub fn read_matrix<R: Read>(reader: R, columns: usize) -> anyhow::Result<Array2<FloatValue>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut values = Vec::new();
    let mut n_rows = 0;
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        if record.iter().all(|v| v.is_empty()) {
            continue;
        }
        if record.len() < columns {
            bail!(
                "line {} has {} values, expected at least {}",
                i + 1,
                record.len(),
                columns
            );
        }
        for (column, value) in record.iter().take(columns).enumerate() {
            values.push(parse_value(value, i + 1, column)?);
        }
        n_rows += 1;
    }

    Ok(Array2::from_shape_vec((n_rows, columns), values)?)
}

fn timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn write_rows<W: Write>(
    writer: W,
    header: &[String],
    times: &[DateTime<Utc>],
    columns: &[&[FloatValue]],
) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(header)?;
    for (i, time) in times.iter().enumerate() {
        let mut record = vec![timestamp(time)];
        record.extend(columns.iter().map(|c| c[i].to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// One row per timestep, one column per ensemble member.
pub fn write_flow<W: Write>(writer: W, output: &SessionOutput) -> anyhow::Result<()> {
    let header: Vec<String> = std::iter::once("time".to_string())
        .chain((0..output.n_members()).map(|j| format!("member_{}", j)))
        .collect();
    let members: Vec<Vec<FloatValue>> = output.flow.columns().into_iter().map(|c| c.to_vec()).collect();
    let columns: Vec<&[FloatValue]> = members.iter().map(Vec::as_slice).collect();
    write_rows(writer, &header, &output.forecast_times(), &columns)
}

pub fn write_diagnostics<W: Write>(writer: W, output: &SessionOutput) -> anyhow::Result<()> {
    let header = ["time", "rainfall", "potential_et", "open_water_evaporation"].map(String::from);
    write_rows(
        writer,
        &header,
        &output.forecast_times(),
        &[
            output.rainfall.as_slice(),
            output.potential_et.as_slice(),
            output.open_water_evaporation.as_slice(),
        ],
    )
}

pub fn write_summary<W: Write>(writer: W, output: &SessionOutput) -> anyhow::Result<()> {
    let summary = output.summary();
    let header = ["time", "median", "p25", "p75"].map(String::from);
    write_rows(
        writer,
        &header,
        &output.forecast_times(),
        &[
            summary.median.as_slice(),
            summary.p25.as_slice(),
            summary.p75.as_slice(),
        ],
    )
}

/// Header-less, in the layout [`read_matrix`] expects for states.
pub fn write_states<W: Write>(writer: W, states: &StateTable) -> anyhow::Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    for row in states.to_array().rows() {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcast_core::state::InitialState;

    #[test]
    fn test_read_forcing_by_name() {
        let data = "\
time,precipitation,temp_min,temp_max,relative_humidity,wind_v,wind_u
2022-03-01T00:00:00Z,1.5,290.0,300.0,80,0.5,2.0
2022-03-01T06:00:00Z,0.0,289.0,301.0,75,0.0,1.0
";
        let forcing = read_forcing(data.as_bytes()).unwrap();
        assert_eq!(forcing.len(), 2);
        let first = forcing.records()[0];
        assert_eq!(first.precipitation, 1.5);
        assert_eq!(first.temp_max, 300.0);
        assert_eq!(first.wind_u, 2.0);
        assert_eq!(first.solar_radiation, None);
    }

    #[test]
    fn test_read_forcing_bad_value() {
        let data = "relative_humidity,temp_max,temp_min,wind_u,wind_v,precipitation\n80,300,290,1,1,n/a\n";
        let err = read_forcing(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2, column 6"));
    }

    #[test]
    fn test_read_forcing_missing_column() {
        let data = "temp_min,temp_max\n290,300\n";
        let err = read_forcing(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("relative_humidity"));
    }

    #[test]
    fn test_read_matrix_takes_leading_columns() {
        let data = "80,50,10,5,0.83\n150,20,4,12,0.79\n";
        let values = read_matrix(data.as_bytes(), 4).unwrap();
        assert_eq!(values.dim(), (2, 4));
        assert_eq!(values[[1, 3]], 12.0);
    }

    #[test]
    fn test_read_matrix_short_row() {
        let data = "1,2,3\n4,5\n";
        assert!(read_matrix(data.as_bytes(), 3).is_err());
    }

    #[test]
    fn test_states_round_trip() {
        let states = StateTable::new(vec![
            InitialState::new(4.0, 2.0, 2.0),
            InitialState::new(7.5, 0.25, 0.0),
        ]);
        let mut buffer = Vec::new();
        write_states(&mut buffer, &states).unwrap();

        let values = read_matrix(buffer.as_slice(), InitialState::N_COLUMNS).unwrap();
        assert_eq!(StateTable::from_array(values.view()).unwrap(), states);
    }
}

/*!
# CSV Input and Output for Dependency Networks.

Training matrices are read from, and sampled matrices written to, headed CSV files with one column
per variable in network order. Discrete variables are stored as their integer level codes. Enable
via the `csv` feature.
*/

use csv::{Reader, Writer};
use ndarray::Array2;
use std::fs::File;
use std::path::Path;

use crate::error::{Error, Result};

/**
Loads a headed, all-numeric CSV file as a training matrix.

Returns the header and an `n_rows x n_columns` matrix. Every record must have as many fields as
the header and every field must parse as a floating point number.

# Examples

```rust
use depnet::io::csv::load_csv;
use std::io::Write;

let mut file = tempfile::NamedTempFile::new().unwrap();
writeln!(file, "x,y\n1,2\n3,4.5").unwrap();

let (header, data) = load_csv(file.path()).unwrap();
assert_eq!(header, vec!["x", "y"]);
assert_eq!(data[[1, 1]], 4.5);
```
*/
pub fn load_csv(path: impl AsRef<Path>) -> Result<(Vec<String>, Array2<f64>)> {
    let mut rdr = Reader::from_reader(File::open(path)?);
    let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    let mut values = Vec::new();
    let mut n_rows = 0;
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        for (col, field) in record.iter().enumerate() {
            let value = field.trim().parse::<f64>().map_err(|e| {
                Error::config(format!(
                    "row {row}, column `{}`: cannot parse `{field}` as a number ({e})",
                    header[col]
                ))
            })?;
            values.push(value);
        }
        n_rows += 1;
    }

    let data = Array2::from_shape_vec((n_rows, header.len()), values)
        .map_err(|e| Error::config(format!("malformed matrix: {e}")))?;
    Ok((header, data))
}

/**
Saves sampled rows under the given column names.

`names` must hold one name per column of `samples`, typically the network's variable names.

# Examples

```rust
use depnet::io::csv::save_samples_csv;
use ndarray::array;

let file = tempfile::NamedTempFile::new().unwrap();
let samples = array![[1.0, 0.0], [2.5, 1.0]];
save_samples_csv(&samples, &["x", "y"], file.path()).unwrap();

let contents = std::fs::read_to_string(file.path()).unwrap();
assert_eq!(contents, "x,y\n1,0\n2.5,1\n");
```
*/
pub fn save_samples_csv<S: AsRef<str>>(
    samples: &Array2<f64>,
    names: &[S],
    path: impl AsRef<Path>,
) -> Result<()> {
    if names.len() != samples.ncols() {
        return Err(Error::config(format!(
            "{} column names for {} columns",
            names.len(),
            samples.ncols()
        )));
    }
    let mut wtr = Writer::from_writer(File::create(path)?);
    wtr.write_record(names.iter().map(AsRef::as_ref))?;
    for row in samples.rows() {
        wtr.write_record(row.iter().map(f64::to_string))?;
    }
    wtr.flush()?;
    Ok(())
}

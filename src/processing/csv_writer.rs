use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Write column data with a header line to `path`. Shorter columns leave
/// their trailing cells empty; `NaN` is written as `NaN`.
pub fn write_csv<P, S>(path: P, headers: &[S], columns: &[Vec<f64>]) -> io::Result<()>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    write_columns(&mut out, headers, columns)?;
    out.flush()
}

/// Same as [`write_csv`] into any writer.
pub fn write_columns<W, S>(out: &mut W, headers: &[S], columns: &[Vec<f64>]) -> io::Result<()>
where
    W: Write,
    S: AsRef<str>,
{
    if !headers.is_empty() && !columns.is_empty() && headers.len() != columns.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Headers count ({}) doesn't match data columns ({})",
                headers.len(),
                columns.len()
            ),
        ));
    }

    let header: Vec<&str> = headers.iter().map(|h| h.as_ref()).collect();
    writeln!(out, "{}", header.join(","))?;

    let n_rows = columns.iter().map(|col| col.len()).max().unwrap_or(0);
    for i in 0..n_rows {
        let row: Vec<String> = columns
            .iter()
            .map(|col| col.get(i).map(|v| format!("{v:.15e}")).unwrap_or_default())
            .collect();
        writeln!(out, "{}", row.join(","))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn ragged_columns_leave_blanks() {
        let mut buf = Vec::new();
        write_columns(&mut buf, &["x", "y"], &[vec![1.0, 2.0], vec![f64::NAN]]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "x,y");
        assert_eq!(lines[1], "1.000000000000000e0,NaN");
        assert_eq!(lines[2], "2.000000000000000e0,");
    }

    #[test]
    fn header_count_must_match() {
        let mut buf = Vec::new();
        let err = write_columns(&mut buf, &["x"], &[vec![1.0], vec![2.0]]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn writes_a_file() {
        let path = std::env::temp_dir().join("vbox_fvm_csv_writer_test.csv");
        write_csv(&path, &["x", "y", "z"], &[vec![1.0], vec![4.0], vec![7.0]]).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("x,y,z\n"));
        fs::remove_file(&path).ok();
    }
}

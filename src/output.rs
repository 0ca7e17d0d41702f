use crate::segmentation::{normalise, Segment};
use anyhow::{Context, Result};
use std::path::Path;

/// Segments of one patient, ready for the normalised table.
pub struct PatientSegments<'a> {
    pub patient: &'a str,
    pub segments: &'a [Segment],
}

/// Writes every segment trimmed to `size` samples, one row each.
///
/// The header is `0,1,..,size-1,patient`. Returns the number of rows written.
pub fn write_segments_csv(path: &Path, patients: &[PatientSegments], size: usize) -> Result<usize> {
    let dir = path.parent().unwrap_or(Path::new("."));
    if !dir.as_os_str().is_empty() {
        // Create directory if it doesn't exist
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);

    let mut header: Vec<String> = (0..size).map(|i| i.to_string()).collect();
    header.push("patient".to_string());
    writer.write_record(&header)?;

    let mut rows = 0;
    for entry in patients {
        for segment in entry.segments {
            let mut record: Vec<String> = normalise(segment, size)
                .iter()
                .map(|x| x.to_string())
                .collect();
            record.push(entry.patient.to_string());
            writer.write_record(&record)?;
            rows += 1;
        }
    }

    writer.flush()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_segments_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("normalised_data.csv");

        let first = vec![Segment {
            left: 0,
            right: 4,
            samples: vec![0.0, 1.0, 2.0, 3.0, 4.0],
        }];
        let second = vec![
            Segment {
                left: 10,
                right: 12,
                samples: vec![0.5, 1.5, 2.5],
            },
            Segment {
                left: 20,
                right: 23,
                samples: vec![7.0, 8.0, 9.0, 10.0],
            },
        ];
        let patients = [
            PatientSegments {
                patient: "100",
                segments: &first,
            },
            PatientSegments {
                patient: "101",
                segments: &second,
            },
        ];

        let rows = write_segments_csv(&path, &patients, 3).unwrap();
        assert_eq!(rows, 3);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec!["0,1,2,patient", "1,2,3,100", "0.5,1.5,2.5,101", "7,8,9,101"]
        );
    }
}

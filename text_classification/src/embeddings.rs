use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use machine_learning::arch::layers::EmbeddingBag;

use crate::{Result, TextClassificationErr};

/// The path of the precomputed embeddings for a vocabulary of `vocabulary_size` words of
/// `embeddings_size` values each.
pub fn embeddings_path(dir: &Path, vocabulary_size: usize, embeddings_size: usize) -> PathBuf {
    dir.join(format!("embeddings_{vocabulary_size}_{embeddings_size}"))
}

/// Parses comma separated embeddings, one row per vocabulary entry.
///
/// # Arguments
/// * `reader` - The embeddings' contents.
/// * `path` - Names the source in errors.
///
/// # Returns
/// One vector of values per non blank line, or an error naming the line and column of the
/// first value that isn't a number.
pub fn parse_embeddings<R: BufRead>(reader: R, path: &Path) -> Result<Vec<Vec<f32>>> {
    let rows = parse_lines(reader, path)?;
    Ok(rows.into_iter().map(|(_, row)| row).collect())
}

/// The non blank rows of `reader`, each with its 1-based line in the file.
fn parse_lines<R: BufRead>(reader: R, path: &Path) -> Result<Vec<(usize, Vec<f32>)>> {
    let mut rows = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let row = line
            .split(',')
            .enumerate()
            .map(|(j, field)| {
                let field = field.trim().trim_matches('"');
                field.parse::<f32>().map_err(|e| TextClassificationErr::Parse {
                    path: path.to_path_buf(),
                    line: i + 1,
                    column: j + 1,
                    detail: format!("invalid value {field:?}: {e}"),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        rows.push((i + 1, row));
    }

    Ok(rows)
}

/// Loads the frozen embeddings table for the configured vocabulary.
///
/// # Returns
/// The table, or an error if the file can't be parsed or doesn't hold `vocabulary_size`
/// rows of `embeddings_size` values.
pub fn load_embedding_bag(
    dir: &Path,
    vocabulary_size: usize,
    embeddings_size: usize,
) -> Result<EmbeddingBag> {
    let path = embeddings_path(dir, vocabulary_size, embeddings_size);
    let rows = parse_lines(BufReader::new(File::open(&path)?), &path)?;

    if rows.len() != vocabulary_size {
        return Err(TextClassificationErr::EmbeddingsShape {
            path,
            rows: rows.len(),
            expected_rows: vocabulary_size,
        });
    }

    if let Some((line, row)) = rows.iter().find(|(_, row)| row.len() != embeddings_size) {
        // The first missing or extra value.
        return Err(TextClassificationErr::Parse {
            path,
            line: *line,
            column: row.len().min(embeddings_size) + 1,
            detail: format!("expected {embeddings_size} values, got {}", row.len()),
        });
    }

    let rows = rows.into_iter().map(|(_, row)| row).collect();
    Ok(EmbeddingBag::from_rows(rows)?)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn rows_and_columns_follow_the_file() {
        let raw = "0.1,0.2,0.3\n\n1,2,3\n-1,-2,-3\n";
        let rows = parse_embeddings(raw.as_bytes(), Path::new("mem")).unwrap();

        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.len() == 3));
        assert_eq!(rows[2], vec![-1., -2., -3.]);
    }

    #[test]
    fn malformed_values_name_their_position() {
        let raw = "1,2\n3,oops\n";
        let err = parse_embeddings(raw.as_bytes(), Path::new("mem")).unwrap_err();

        assert!(matches!(
            err,
            TextClassificationErr::Parse {
                line: 2,
                column: 2,
                ..
            }
        ));
    }

    #[test]
    fn bag_checks_the_vocabulary() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(embeddings_path(dir.path(), 2, 2), "1,0\n0,1\n").unwrap();

        let bag = load_embedding_bag(dir.path(), 2, 2).unwrap();
        assert_eq!((bag.vocabulary(), bag.dim()), (2, 2));

        fs::write(embeddings_path(dir.path(), 3, 2), "1,0\n0,1\n").unwrap();
        assert!(matches!(
            load_embedding_bag(dir.path(), 3, 2),
            Err(TextClassificationErr::EmbeddingsShape { rows: 2, .. })
        ));
    }

    #[test]
    fn short_rows_name_their_line_in_the_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(embeddings_path(dir.path(), 3, 2), "1,0

0,1

5
").unwrap();

        assert!(matches!(
            load_embedding_bag(dir.path(), 3, 2),
            Err(TextClassificationErr::Parse {
                line: 5,
                column: 2,
                ..
            })
        ));

        fs::write(embeddings_path(dir.path(), 2, 2), "1,0
0,1,2
").unwrap();
        assert!(matches!(
            load_embedding_bag(dir.path(), 2, 2),
            Err(TextClassificationErr::Parse {
                line: 2,
                column: 3,
                ..
            })
        ));
    }
}

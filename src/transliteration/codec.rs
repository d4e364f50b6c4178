/*!
 * Line format shared with the prompt templates.
 *
 * Items travel to the model as one `id,name` row per line and come back in
 * the same shape. Rows sent for verification carry a third field, the
 * existing transliteration.
 */

use log::info;

use crate::catalog::NamedItem;
use crate::errors::TransliterationError;

/// Field delimiter of a row
pub const DELIMITER: char = ',';

/// Join each row's fields with the delimiter and the rows with newlines
pub fn serialize_rows<R, F>(rows: R) -> String
where
    R: IntoIterator,
    R::Item: IntoIterator<Item = F>,
    F: AsRef<str>,
{
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|field| field.as_ref().to_string())
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize items as `id,name` rows
pub fn serialize_items(items: &[NamedItem]) -> String {
    serialize_rows(items.iter().map(|item| [item.id.to_string(), item.name.clone()]))
}

/// Parse a model reply back into items
///
/// Lines without a delimiter are skipped. Each remaining line is split at
/// its first delimiter, so names may themselves contain commas. A line whose
/// id part is not a number is dropped; callers compare the parsed count
/// with what they sent and reject the whole reply on a mismatch.
pub fn parse_response(text: &str) -> Vec<NamedItem> {
    text.trim()
        .split('\n')
        .filter(|line| line.contains(DELIMITER))
        .map(str::trim)
        .filter_map(|line| {
            let (id, name) = line.split_once(DELIMITER)?;
            let id = id.trim().parse::<u64>().ok()?;
            Some(NamedItem::new(id, name))
        })
        .collect()
}

/// Split items into consecutive chunks of at most `size`
pub fn chunk_items<T>(items: &[T], size: usize) -> Result<Vec<&[T]>, TransliterationError> {
    if size == 0 {
        return Err(TransliterationError::Configuration("Chunk size must be greater than zero".to_string()));
    }
    Ok(items.chunks(size).collect())
}

/// Check that chunking kept every item
pub fn validate_chunks<T>(chunks: &[&[T]], expected_total: usize) -> Result<(), TransliterationError> {
    let actual: usize = chunks.iter().map(|c| c.len()).sum();
    if actual != expected_total {
        return Err(TransliterationError::Consistency {
            actual,
            expected: expected_total,
        });
    }

    info!("Sanity check passed: {} items in chunks match {} expected items", actual, expected_total);
    Ok(())
}

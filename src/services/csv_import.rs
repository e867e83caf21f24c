//! CSV parsing for vocabulary and sentence-book uploads. Nothing is written until the
//! whole file has parsed.

use std::collections::HashMap;
use std::io::Read;

use thiserror::Error;

use crate::db::models::{count_from_value, split_options, SentenceItem, VocabularyItem, NO_DATE};

pub(crate) const VOCABULARY_REQUIRED: &[&str] = &["English", "Chinese_1"];
pub(crate) const SENTENCE_REQUIRED: &[&str] = &["Category", "Template", "Options"];

#[derive(Debug, Error)]
pub(crate) enum ImportError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Parsed rows plus the number of rows dropped for blank required cells.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Parsed<T> {
    pub(crate) records: Vec<T>,
    pub(crate) skipped: usize,
}

struct Table {
    columns: HashMap<String, usize>,
    rows: Vec<csv::StringRecord>,
}

impl Table {
    fn read(input: impl Read, required: &[&str]) -> Result<Self, ImportError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(input);

        let columns: HashMap<String, usize> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(index, name)| (name.trim_start_matches('\u{feff}').to_string(), index))
            .collect();

        let missing: Vec<String> = required
            .iter()
            .filter(|name| !columns.contains_key(**name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns(missing));
        }

        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self { columns, rows })
    }

    fn cell<'a>(&self, row: &'a csv::StringRecord, column: &str) -> Option<&'a str> {
        self.columns.get(column).and_then(|index| row.get(*index)).filter(|value| !value.is_empty())
    }
}

fn count_cell(value: Option<&str>) -> u32 {
    value
        .and_then(|raw| count_from_value(&serde_json::Value::String(raw.to_string())))
        .map_or(0, |count| count.min(u64::from(u32::MAX)) as u32)
}

/// Rows without `English` or `Chinese_1` are skipped; a missing or blank `Course` takes
/// `default_course`.
pub(crate) fn parse_vocabulary(
    input: impl Read,
    default_course: &str,
) -> Result<Parsed<VocabularyItem>, ImportError> {
    let table = Table::read(input, VOCABULARY_REQUIRED)?;
    let mut parsed = Parsed { records: Vec::with_capacity(table.rows.len()), skipped: 0 };

    for row in &table.rows {
        let (Some(english), Some(chinese_1)) = (table.cell(row, "English"), table.cell(row, "Chinese_1"))
        else {
            parsed.skipped += 1;
            continue;
        };

        let mut item = VocabularyItem::new(english, chinese_1);
        item.pos = table.cell(row, "POS").or_else(|| table.cell(row, "Group")).unwrap_or_default().to_string();
        item.chinese_2 = table.cell(row, "Chinese_2").unwrap_or_default().to_string();
        item.example = table.cell(row, "Example").unwrap_or_default().to_string();
        item.course = table.cell(row, "Course").unwrap_or(default_course).to_string();
        item.date = table.cell(row, "Date").unwrap_or(NO_DATE).to_string();
        item.total = count_cell(table.cell(row, "Total"));
        item.correct = count_cell(table.cell(row, "Correct")).min(item.total);
        parsed.records.push(item);
    }

    Ok(parsed)
}

/// Options are pipe-delimited. `Order` comes from its column when readable, otherwise
/// from the row index. Rows with a blank template are skipped.
pub(crate) fn parse_sentences(input: impl Read) -> Result<Parsed<SentenceItem>, ImportError> {
    let table = Table::read(input, SENTENCE_REQUIRED)?;
    let mut parsed = Parsed { records: Vec::with_capacity(table.rows.len()), skipped: 0 };

    for (index, row) in table.rows.iter().enumerate() {
        let Some(template) = table.cell(row, "Template") else {
            parsed.skipped += 1;
            continue;
        };
        let order = table
            .cell(row, "Order")
            .and_then(|raw| raw.parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .map_or(index as i64, |value| value as i64);

        parsed.records.push(SentenceItem::new(
            table.cell(row, "Category").unwrap_or_default(),
            template,
            split_options(table.cell(row, "Options").unwrap_or_default()),
            order,
        ));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::UNCATEGORIZED;

    #[test]
    fn vocabulary_without_course_uses_the_default() {
        let csv = "English,Chinese_1\napple,蘋果\npear,梨\n";

        let parsed = parse_vocabulary(csv.as_bytes(), "ImportedX").unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert!(parsed.records.iter().all(|item| item.course == "ImportedX"));
        assert!(parsed.records.iter().all(|item| item.date == NO_DATE));
    }

    #[test]
    fn vocabulary_optional_columns_are_read() {
        let csv = "\u{feff}English,Group,Chinese_1,Chinese_2,Example,Course,Date,Correct,Total\n\
                   run,v.,跑,奔跑,I run.,Verbs,2025-01-02,5,3\n\
                   ,n.,空,,,,,,\n";

        let parsed = parse_vocabulary(csv.as_bytes(), "Imported").unwrap();

        assert_eq!(parsed.skipped, 1);
        let item = &parsed.records[0];
        assert_eq!(item.pos, "v.");
        assert_eq!(item.chinese_2, "奔跑");
        assert_eq!(item.course, "Verbs");
        assert_eq!((item.correct, item.total), (3, 3));
    }

    #[test]
    fn missing_columns_are_named() {
        let err = parse_vocabulary("English,Meaning\napple,蘋果\n".as_bytes(), "X").unwrap_err();
        assert_eq!(err.to_string(), "missing required columns: Chinese_1");

        let err = parse_sentences("Template\nI like ___.\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ImportError::MissingColumns(columns) if columns == vec!["Category", "Options"]));
    }

    #[test]
    fn sentences_split_options_and_assign_order() {
        let csv = "Category,Template,Options\nFood,I like ___.,apples | pears\n,I eat ___.,rice\nFood,,x\n";

        let parsed = parse_sentences(csv.as_bytes()).unwrap();

        assert_eq!(parsed.skipped, 1);
        assert_eq!(parsed.records[0].options, vec!["apples", "pears"]);
        assert_eq!(parsed.records[0].order, 0);
        assert_eq!(parsed.records[1].order, 1);
        assert_eq!(parsed.records[1].category, UNCATEGORIZED);
    }

    #[test]
    fn explicit_order_column_wins() {
        let csv = "Category,Template,Options,Order\nA,x ___,a,12\nA,y ___,b,oops\n";

        let parsed = parse_sentences(csv.as_bytes()).unwrap();

        assert_eq!(parsed.records[0].order, 12);
        assert_eq!(parsed.records[1].order, 1);
    }
}

use crate::bag::PropertyBag;
use crate::value::Value;

/// Cursor over tabular rows: a query result, a CSV reader, anything
/// column-addressable that advances row by row.
pub trait RowCursor {
    fn columns(&self) -> Vec<String>;

    /// Move to the next row. Returns false once the cursor is exhausted.
    fn advance(&mut self) -> bool;

    /// Value of `column` in the current row.
    fn get(&self, column: &str) -> Value;
}

/// Drain the cursor's current row into a string-keyed snapshot.
///
/// The mapping core only ever sees in-memory object/map sources; this is
/// the adapter that keeps cursors out of it.
pub fn snapshot_row(cursor: &dyn RowCursor) -> PropertyBag {
    let mut bag = PropertyBag::new();
    for column in cursor.columns() {
        let value = cursor.get(&column);
        bag.insert(column, value);
    }
    bag
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TwoColumns {
        row: usize,
    }

    impl RowCursor for TwoColumns {
        fn columns(&self) -> Vec<String> {
            vec!["Name".into(), "Age".into()]
        }

        fn advance(&mut self) -> bool {
            self.row += 1;
            self.row < 2
        }

        fn get(&self, column: &str) -> Value {
            match column {
                "Name" => Value::Str(format!("row{}", self.row)),
                "Age" => Value::I64(30 + self.row as i64),
                _ => Value::Null,
            }
        }
    }

    #[test]
    fn snapshot_copies_all_columns() {
        let cursor = TwoColumns { row: 0 };
        let bag = snapshot_row(&cursor);
        assert_eq!(bag.get("name"), Some(&Value::Str("row0".into())));
        assert_eq!(bag.get("age"), Some(&Value::I64(30)));
    }
}

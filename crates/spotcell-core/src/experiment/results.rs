use std::collections::BTreeMap;

/// A table of measurement rows with fixed columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ResultTable {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row, padded or truncated to the column count.
    pub fn push(&mut self, mut values: Vec<String>) {
        values.resize(self.columns.len(), String::new());
        self.rows.push(values);
    }

    /// Comma-separated text with a header line.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for row in std::iter::once(&self.columns).chain(self.rows.iter()) {
            let cells: Vec<String> = row.iter().map(|c| csv_cell(c)).collect();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }
}

fn csv_cell(text: &str) -> String {
    if text.contains(|c: char| matches!(c, ',' | '"' | '\n')) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// Named result tables accumulated over a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultTables {
    tables: BTreeMap<String, ResultTable>,
}

impl ResultTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table `name`, created with `columns` on first use.
    pub fn table_mut<S: AsRef<str>>(&mut self, name: &str, columns: &[S]) -> &mut ResultTable {
        self.tables
            .entry(name.to_string())
            .or_insert_with(|| ResultTable::new(columns))
    }

    pub fn get(&self, name: &str) -> Option<&ResultTable> {
        self.tables.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.tables.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResultTable)> + '_ {
        self.tables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(ResultTable::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_rows() == 0
    }

    /// Move every row of `other` into the table of the same name.
    pub fn append(&mut self, other: ResultTables) {
        for (name, table) in other.tables {
            match self.tables.get_mut(&name) {
                Some(existing) => {
                    for row in table.rows {
                        existing.push(row);
                    }
                }
                None => {
                    self.tables.insert(name, table);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_merges_tables_by_name() {
        let mut a = ResultTables::new();
        a.table_mut("Nuclei", &["name", "area"])
            .push(vec!["A".into(), "12".into()]);
        let mut b = ResultTables::new();
        b.table_mut("Nuclei", &["name", "area"])
            .push(vec!["B".into(), "7".into()]);
        b.table_mut("Spots", &["name"]).push(vec!["B".into()]);
        a.append(b);
        assert_eq!(a.get("Nuclei").unwrap().len(), 2);
        assert_eq!(a.total_rows(), 3);
    }

    #[test]
    fn test_csv_quotes_commas() {
        let mut t = ResultTable::new(&["name", "note"]);
        t.push(vec!["A".into(), "x, y".into()]);
        assert_eq!(t.to_csv(), "name,note\nA,\"x, y\"\n");
    }
}

//! Plain-text table rendering in the familiar dataframe `to_string` layout:
//! an optional left-aligned index column followed by right-aligned value
//! columns separated by two spaces.

#[derive(Debug, Clone, Default)]
pub struct TextTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    index: Option<Vec<String>>,
}

impl TextTable {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
            index: None,
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Attach row labels. Must match the number of rows pushed.
    pub fn with_index(mut self, index: Vec<String>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn render(&self) -> String {
        let ncols = self.header.len();
        let mut widths: Vec<usize> = self.header.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate().take(ncols) {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
        let index_width = self
            .index
            .as_ref()
            .map(|idx| idx.iter().map(|l| l.chars().count()).max().unwrap_or(0));

        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(self.render_line(index_width, "", &self.header, &widths));
        for (r, row) in self.rows.iter().enumerate() {
            let label = self
                .index
                .as_ref()
                .and_then(|idx| idx.get(r))
                .map(String::as_str)
                .unwrap_or("");
            lines.push(self.render_line(index_width, label, row, &widths));
        }
        lines.join("\n")
    }

    fn render_line(
        &self,
        index_width: Option<usize>,
        label: &str,
        cells: &[String],
        widths: &[usize],
    ) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(widths.len() + 1);
        if let Some(w) = index_width {
            parts.push(format!("{:<w$}", label, w = w));
        }
        for (i, w) in widths.iter().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            parts.push(format!("{:>w$}", cell, w = *w));
        }
        parts.join("  ").trim_end().to_string()
    }
}

/// Render `label  value` pairs the way a dataframe renders a Series: labels
/// left-aligned, values right-aligned, no header line.
pub fn render_series(pairs: &[(String, String)]) -> String {
    let lw = pairs.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
    let vw = pairs.iter().map(|(_, v)| v.chars().count()).max().unwrap_or(0);
    pairs
        .iter()
        .map(|(l, v)| format!("{:<lw$}  {:>vw$}", l, v, lw = lw, vw = vw))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_index() {
        let mut table = TextTable::new(vec!["a".into(), "name".into()]);
        table.push_row(vec!["1".into(), "x".into()]);
        table.push_row(vec!["10".into(), "yy".into()]);
        let text = table.with_index(vec!["0".into(), "1".into()]).render();
        assert_eq!(text, "    a  name\n0   1     x\n1  10    yy");
    }

    #[test]
    fn test_render_without_index() {
        let mut table = TextTable::new(vec!["column".into(), "description".into()]);
        table.push_row(vec!["age".into(), "Age in years".into()]);
        assert_eq!(
            table.render(),
            "column   description\n   age  Age in years"
        );
    }

    #[test]
    fn test_render_series() {
        let text = render_series(&[
            ("age".into(), "int64".into()),
            ("city".into(), "object".into()),
        ]);
        assert_eq!(text, "age    int64\ncity  object");
    }
}

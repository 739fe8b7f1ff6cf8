//! Prompt construction for dataset analysis and chart suggestions.

use crate::dataset::Dataset;
use crate::stats::describe;

/// Rows of the dataset included as a sample in every prompt.
pub const DEFAULT_SAMPLE_ROWS: usize = 5;

/// Which analysis template is used. Chosen only by whether a data
/// dictionary is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    WithDictionary,
    WithoutDictionary,
}

pub struct PromptBuilder<'a> {
    dataset: &'a Dataset,
    dictionary: Option<&'a Dataset>,
    sample_rows: usize,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            dictionary: None,
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }

    pub fn with_dictionary(mut self, dictionary: Option<&'a Dataset>) -> Self {
        self.dictionary = dictionary;
        self
    }

    pub fn with_sample_rows(mut self, rows: usize) -> Self {
        self.sample_rows = rows;
        self
    }

    pub fn template(&self) -> PromptTemplate {
        if self.dictionary.is_some() {
            PromptTemplate::WithDictionary
        } else {
            PromptTemplate::WithoutDictionary
        }
    }

    fn sample_text(&self) -> String {
        self.dataset.head(self.sample_rows).to_text(true)
    }

    /// Analysis prompt for a chat turn: statistical summary, sample rows,
    /// the dictionary when present, then the user's question.
    pub fn analysis_prompt(&self, question: &str) -> String {
        let summary = describe(self.dataset).to_text();
        let sample = self.sample_text();

        let body = match (self.template(), self.dictionary) {
            (PromptTemplate::WithDictionary, Some(dictionary)) => format!(
                "I uploaded a dataset. Here's a statistical summary:\n\n{summary}\n\n\
                 Sample rows from the dataset:\n\n{sample}\n\n\
                 Column descriptions from the data dictionary:\n\n{dictionary}\n\n\
                 Please analyze the dataset and provide key insights in bullet points.",
                dictionary = dictionary.to_text(false),
            ),
            _ => format!(
                "I uploaded a dataset. Here's a statistical summary:\n\n{summary}\n\n\
                 Sample rows from the dataset:\n\n{sample}\n\n\
                 Please analyze the dataset and provide insights or summaries in bullet points."
            ),
        };

        format!("{body}\n\nUser question: {}", question.trim())
    }

    /// Prompt asking the model which columns to chart and how.
    pub fn chart_suggestion_prompt(&self) -> String {
        format!(
            "This is a dataset with the following columns and types:\n{columns}\n\n\
             Here are some sample rows:\n{sample}\n\n\
             Based on this, please recommend which columns to visualize and what chart types to use. \
             For each chart, mention the column(s) and the chart type (bar, line, histogram, scatter, etc.) \
             Format your answer in bullet points.",
            columns = self.dataset.dtypes_text(),
            sample = self.sample_text(),
        )
    }
}

//! The fixed create/read/delete/truncate exercise.

use std::io::Write;

use crate::{
    config::RunOptions,
    error::{Phase, RunError, StoreError},
    record::Record,
    store::{with_transaction, Mutation, Store},
};

/// Row counts observed during a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub initial_count: i64,
    pub inserted: u64,
    pub count_after_insert: i64,
    pub deleted: u64,
    pub count_after_delete: i64,
    /// `None` when the truncate step was skipped
    pub count_after_truncate: Option<i64>,
    /// Rows listed by the last read of the run
    pub final_rows: Vec<Record>,
}

/// Runs the exercise against one store, writing the listing to `out`
pub struct Runner<'a, S, W> {
    store: &'a S,
    out: W,
    options: RunOptions,
}

impl<'a, S, W> Runner<'a, S, W>
where
    S: Store,
    W: Write,
{
    pub fn new(store: &'a S, out: W, options: RunOptions) -> Self {
        Self {
            store,
            out,
            options,
        }
    }

    /// Execute every step in order, stopping at the first failure
    pub async fn run(mut self) -> Result<RunReport, RunError> {
        let mut report = RunReport::default();

        if self.options.create_table {
            self.store
                .ensure_table()
                .await
                .map_err(RunError::at(Phase::Init))?;
        }

        self.banner("Read", Phase::Read)?;
        let (count, _) = self.show_table().await?;
        report.initial_count = count;

        self.banner("Insert", Phase::Create)?;
        let record = self.options.record.clone();
        report.inserted = self
            .mutate(Phase::Create, &Mutation::Create(record.clone()))
            .await?;
        self.line(format_args!("Insert Result: {}", report.inserted), Phase::Create)?;
        let (count, _) = self.show_table().await?;
        report.count_after_insert = count;

        self.banner("Delete", Phase::Delete)?;
        report.deleted = self
            .mutate(Phase::Delete, &Mutation::delete_matching(&record))
            .await?;
        self.line(format_args!("Delete Result: {}", report.deleted), Phase::Delete)?;
        self.line(
            format_args!("Delete Data ID: {}, Name: {}", record.id, record.name),
            Phase::Delete,
        )?;
        let (count, rows) = self.show_table().await?;
        report.count_after_delete = count;
        report.final_rows = rows;

        if self.options.truncate {
            self.banner("Truncate", Phase::Truncate)?;
            self.mutate(Phase::Truncate, &Mutation::Truncate).await?;
            self.line(format_args!("Truncate Table"), Phase::Truncate)?;
            let (count, rows) = self.show_table().await?;
            report.count_after_truncate = Some(count);
            report.final_rows = rows;
        } else {
            tracing::info!(table = %self.store.table(), "Skipping truncate");
        }

        tracing::info!(table = %self.store.table(), "Run finished");
        Ok(report)
    }

    async fn mutate(&mut self, phase: Phase, mutation: &Mutation) -> Result<u64, RunError> {
        tracing::info!(%phase, table = %self.store.table(), %mutation, "Applying mutation");
        with_transaction(self.store, mutation)
            .await
            .map_err(RunError::at(phase))
    }

    /// Print the row count followed by every row
    async fn show_table(&mut self) -> Result<(i64, Vec<Record>), RunError> {
        let count = self.store.count().await.map_err(RunError::at(Phase::Count))?;
        self.line(format_args!("TableCount: {}", count), Phase::Count)?;

        let rows = self
            .store
            .find_all()
            .await
            .map_err(RunError::at(Phase::Read))?;
        for row in &rows {
            self.line(format_args!("{}", row), Phase::Read)?;
        }
        Ok((count, rows))
    }

    fn banner(&mut self, step: &str, phase: Phase) -> Result<(), RunError> {
        self.line(format_args!("\n--Start {}--", step), phase)
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>, phase: Phase) -> Result<(), RunError> {
        writeln!(self.out, "{}", args).map_err(|e| RunError::new(phase, StoreError::from(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backends::MemoryStore, table::TableName};

    fn table() -> TableName {
        TableName::new("advertiser").unwrap()
    }

    async fn run(store: &MemoryStore, options: RunOptions) -> (Result<RunReport, RunError>, String) {
        let mut out = Vec::new();
        let result = Runner::new(store, &mut out, options).run().await;
        (result, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_full_sequence_on_empty_table() {
        let store = MemoryStore::new(table());
        let (result, output) = run(&store, RunOptions::default()).await;
        let report = result.unwrap();

        assert_eq!(report.initial_count, 0);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.count_after_insert, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.count_after_delete, 0);
        assert_eq!(report.count_after_truncate, Some(0));
        assert!(report.final_rows.is_empty());

        let expected = "\n--Start Read--\n\
                        TableCount: 0\n\
                        \n--Start Insert--\n\
                        Insert Result: 1\n\
                        TableCount: 1\n\
                        ID: 1, Name: test\n\
                        \n--Start Delete--\n\
                        Delete Result: 1\n\
                        Delete Data ID: 1, Name: test\n\
                        TableCount: 0\n\
                        \n--Start Truncate--\n\
                        Truncate Table\n\
                        TableCount: 0\n";
        assert_eq!(output, expected);
        assert_eq!(store.stats().committed, 3);
        assert_eq!(store.stats().rolled_back, 0);
    }

    #[tokio::test]
    async fn test_truncate_clears_existing_rows() {
        let store = MemoryStore::with_rows(
            table(),
            vec![Record::new("10", "acme"), Record::new("11", "globex")],
        );
        let (result, output) = run(&store, RunOptions::default()).await;
        let report = result.unwrap();

        assert_eq!(report.initial_count, 2);
        assert_eq!(report.count_after_insert, 3);
        assert_eq!(report.count_after_delete, 2);
        assert_eq!(
            report.final_rows,
            Vec::<Record>::new(),
            "truncate should leave nothing behind"
        );
        assert_eq!(report.count_after_truncate, Some(0));
        assert!(output.contains("ID: 10, Name: acme\nID: 11, Name: globex\n"));
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn test_skip_truncate_keeps_other_rows() {
        let store = MemoryStore::with_rows(table(), vec![Record::new("10", "acme")]);
        let options = RunOptions {
            truncate: false,
            ..RunOptions::default()
        };
        let (result, output) = run(&store, options).await;
        let report = result.unwrap();

        assert_eq!(report.count_after_truncate, None);
        assert_eq!(report.count_after_delete, report.initial_count);
        assert_eq!(report.final_rows, vec![Record::new("10", "acme")]);
        assert!(!output.contains("--Start Truncate--"));
    }

    #[tokio::test]
    async fn test_duplicate_insert_rolls_back_and_stops() {
        let existing = Record::new("1", "already-here");
        let store = MemoryStore::with_rows(table(), vec![existing.clone()]);
        let (result, output) = run(&store, RunOptions::default()).await;

        let err = result.unwrap_err();
        assert_eq!(err.phase, Phase::Create);
        assert!(matches!(err.source, StoreError::DuplicateKey(_)));
        assert!(err.to_string().starts_with("Failed to insert data: "));

        assert_eq!(store.rows(), vec![existing]);
        assert_eq!(store.stats().rolled_back, 1);
        assert_eq!(store.stats().committed, 0);
        assert!(!output.contains("Insert Result"));
        assert!(!output.contains("--Start Delete--"));
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_inserted_row() {
        let store = MemoryStore::new(table()).failing_on("delete");
        let (result, _) = run(&store, RunOptions::default()).await;

        let err = result.unwrap_err();
        assert_eq!(err.phase, Phase::Delete);
        assert!(err.to_string().starts_with("Failed to delete data: "));
        assert_eq!(store.rows(), vec![Record::default()]);
        assert_eq!(store.stats().committed, 1);
        assert_eq!(store.stats().rolled_back, 1);
    }

    #[tokio::test]
    async fn test_truncate_failure_leaves_table_unchanged() {
        let store =
            MemoryStore::with_rows(table(), vec![Record::new("10", "acme")]).failing_on("truncate");
        let (result, output) = run(&store, RunOptions::default()).await;

        let err = result.unwrap_err();
        assert_eq!(err.phase, Phase::Truncate);
        assert_eq!(store.rows(), vec![Record::new("10", "acme")]);
        assert!(!output.contains("Truncate Table"));
    }

    #[tokio::test]
    async fn test_zero_match_delete_is_not_an_error() {
        let store = MemoryStore::with_rows(table(), vec![Record::new("10", "acme")]);
        let mut tx_out = Vec::new();
        let rows = {
            let mut runner = Runner::new(&store, &mut tx_out, RunOptions::default());
            runner
                .mutate(
                    Phase::Delete,
                    &Mutation::Delete {
                        id: "10".to_string(),
                        name: "nobody".to_string(),
                    },
                )
                .await
                .unwrap()
        };

        assert_eq!(rows, 0);
        assert_eq!(store.rows(), vec![Record::new("10", "acme")]);
    }

    #[tokio::test]
    async fn test_custom_record_is_used_throughout() {
        let store = MemoryStore::new(table());
        let options = RunOptions {
            record: Record::new("42", "custom"),
            ..RunOptions::default()
        };
        let (result, output) = run(&store, options).await;

        assert!(result.is_ok());
        assert!(output.contains("ID: 42, Name: custom\n"));
        assert!(output.contains("Delete Data ID: 42, Name: custom\n"));
    }
}

//! Command-line surface: argument types and command handlers.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use ppn_registry_core::analytics::{self, CategoryValue};
use ppn_registry_core::config::{RegistryConfig, APP_NAME};
use ppn_registry_core::export::{DatasetExport, DEFAULT_EXPORT_FILE};
use ppn_registry_core::query::run_query;
use ppn_registry_core::schema::parse_date;
use ppn_registry_core::{
    CategoryFilter, Column, DataSource, Dataset, NewRecord, RecordFilter, RecordStore, Snapshot,
    StoreError, TreatmentRecord,
};

#[derive(Parser, Debug)]
#[command(name = "ppn", version, about = "PPN practitioner treatment registry")]
pub struct Cli {
    /// Config file (default: ppn-registry.toml in the working directory, if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backing CSV store, overriding config and PPN_REGISTRY_STORE
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search and filter records
    Search {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },
    /// Summary metrics and per-category aggregates
    Stats {
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Latest record and history for a client, or all client ids
    Client {
        /// Client id; lists ids when omitted
        id: Option<String>,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Append a new treatment record
    Add(AddArgs),
    /// Write the query's result set to a file
    Export {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,
        #[arg(short = 'o', long = "out", default_value = DEFAULT_EXPORT_FILE)]
        out: PathBuf,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Free-text search across all fields
    #[arg(default_value = "")]
    pub text: String,
    /// Restrict to these focus areas (repeatable)
    #[arg(long = "focus")]
    pub focus: Vec<String>,
    /// Restrict to these chemicals (repeatable)
    #[arg(long = "chemical")]
    pub chemical: Vec<String>,
    /// Minimum outcome rating (default from config)
    #[arg(long)]
    pub min_rating: Option<i64>,
}

impl QueryArgs {
    pub fn filter(&self, config: &RegistryConfig) -> RecordFilter {
        let category = |values: &[String]| {
            if values.is_empty() {
                CategoryFilter::Any
            } else {
                CategoryFilter::one_of(values.iter().cloned())
            }
        };
        config
            .default_filter()
            .focus(category(&self.focus))
            .chemical(category(&self.chemical))
            .min_rating(self.min_rating.unwrap_or(config.min_rating))
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(long)]
    pub practitioner: String,
    #[arg(long = "client-id")]
    pub client_id: String,
    /// Treatment date (default: today)
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub age: Option<i64>,
    #[arg(long)]
    pub sex: Option<String>,
    #[arg(long)]
    pub focus: Option<String>,
    #[arg(long)]
    pub chemical: Option<String>,
    #[arg(long)]
    pub dosage: Option<i64>,
    #[arg(long)]
    pub intake: Option<String>,
    #[arg(long, default_value = "")]
    pub protocol: String,
    #[arg(long)]
    pub rating: Option<i64>,
    #[arg(long, default_value = "")]
    pub results: String,
    #[arg(long = "next-steps", default_value = "")]
    pub next_steps: String,
}

impl AddArgs {
    /// Form draft with unspecified fields at their form defaults.
    pub fn draft(&self, today: NaiveDate) -> Result<NewRecord> {
        let date = match &self.date {
            Some(text) => parse_date(text).with_context(|| format!("Unrecognised date: {text}"))?,
            None => today,
        };

        let mut draft = NewRecord::new(self.practitioner.clone(), self.client_id.clone(), date);
        if let Some(age) = self.age {
            draft.patient_age = age;
        }
        if let Some(sex) = &self.sex {
            draft.patient_sex = sex.clone();
        }
        if let Some(focus) = &self.focus {
            draft.focus_area = focus.clone();
        }
        if let Some(chemical) = &self.chemical {
            draft.chemical_used = chemical.clone();
        }
        if let Some(dosage) = self.dosage {
            draft.dosage_mg = dosage;
        }
        if let Some(intake) = &self.intake {
            draft.intake_form = intake.clone();
        }
        if let Some(rating) = self.rating {
            draft.treatment_outcome_rating = rating;
        }
        draft.protocol_description = self.protocol.clone();
        draft.detailed_results = self.results.clone();
        draft.next_steps = self.next_steps.clone();
        Ok(draft)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Table,
    Csv,
    Json,
}

impl Cli {
    pub fn resolve_config(&self) -> Result<RegistryConfig> {
        let mut config = RegistryConfig::discover(self.config.as_deref())?;
        if let Some(store) = &self.store {
            config.store_path = store.clone();
        }
        Ok(config)
    }

    pub fn run(self) -> Result<()> {
        let config = self.resolve_config()?;
        info!(store = %config.store_path.display(), "starting {APP_NAME}");
        let mut store = config.open_store();

        match self.command {
            Command::Search { query, format } => {
                let hits = select(&mut store, &query, &config);
                print!("{}", render(&hits, &query.text, format)?);
            }
            Command::Stats { query } => {
                let hits = select(&mut store, &query, &config);
                print_stats(&hits, &config);
            }
            Command::Client { id, query } => {
                let hits = select(&mut store, &query, &config);
                match id {
                    Some(id) => print_client(&hits, &id)?,
                    None => {
                        for id in analytics::client_ids(&hits) {
                            println!("{id}");
                        }
                    }
                }
            }
            Command::Add(args) => {
                let today = chrono::Local::now().date_naive();
                let record = args.draft(today)?.validate_strict()?;
                append(&mut store, &record)?;
                println!(
                    "Saved record for {} on {}",
                    record.client_id,
                    record.date_string()
                );
            }
            Command::Export { query, format, out } => {
                let hits = select(&mut store, &query, &config);
                let body = render(&hits, &query.text, format)?;
                fs::write(&out, body)
                    .with_context(|| format!("Could not write {}", out.display()))?;
                println!("Exported {} records to {}", hits.len(), out.display());
            }
        }
        Ok(())
    }
}

fn load(store: &mut RecordStore) -> Snapshot {
    let snapshot = store.load();
    if let DataSource::Fallback { reason } = &snapshot.source {
        eprintln!("Warning: showing sample records ({reason})");
    }
    snapshot
}

fn select(store: &mut RecordStore, query: &QueryArgs, config: &RegistryConfig) -> Dataset {
    let snapshot = load(store);
    run_query(&snapshot.dataset, &query.text, &query.filter(config))
}

fn append(store: &mut RecordStore, record: &TreatmentRecord) -> Result<()> {
    store.append(record).map_err(append_error)
}

/// Locked stores get a hint to retry; other failures pass through.
fn append_error(err: StoreError) -> anyhow::Error {
    if err.is_retryable() {
        warn!(error = %err, "store locked");
        anyhow::anyhow!("{err}. Close the file in other programs and try again.")
    } else {
        err.into()
    }
}

pub fn render(hits: &Dataset, text: &str, format: Format) -> Result<String> {
    Ok(match format {
        Format::Table => render_table(hits),
        Format::Csv => DatasetExport::new(hits.clone()).with_query(text).to_csv(),
        Format::Json => {
            let mut json = DatasetExport::new(hits.clone()).with_query(text).to_json()?;
            json.push('\n');
            json
        }
    })
}

const TABLE_COLUMNS: [Column; 7] = [
    Column::TreatmentDate,
    Column::ClientId,
    Column::PractitionerName,
    Column::FocusArea,
    Column::ChemicalUsed,
    Column::DosageMg,
    Column::TreatmentOutcomeRating,
];

fn render_table(hits: &Dataset) -> String {
    let rows: Vec<Vec<String>> = hits
        .iter()
        .map(|r| TABLE_COLUMNS.iter().map(|c| r.field(*c).into_owned()).collect())
        .collect();

    let widths: Vec<usize> = TABLE_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, c)| {
            rows.iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(c.header().len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = pad_line(&TABLE_COLUMNS.map(|c| c.header()), &widths);
    out.push('\n');
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&pad_line(&cells, &widths));
        out.push('\n');
    }
    out.push_str(&format!("{} records\n", hits.len()));
    out
}

fn pad_line(cells: &[&str], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, &w)| format!("{cell:<w$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

fn print_bars(title: &str, bars: &[CategoryValue]) {
    println!("\n{title}");
    if bars.is_empty() {
        println!("  (no data)");
    }
    for bar in bars {
        let label = if bar.category.is_empty() {
            "(blank)"
        } else {
            bar.category.as_str()
        };
        println!("  {label:<24} {:.2}", bar.value);
    }
}

fn print_stats(hits: &Dataset, config: &RegistryConfig) {
    let summary = analytics::summarize(hits, config.outcome_policy);
    println!("Total records:  {}", summary.total);
    println!("Average rating: {:.2}", summary.average_rating);
    print_bars(
        "Mean outcome rating by chemical",
        &analytics::mean_outcome_by_category(hits, Column::ChemicalUsed, config.outcome_policy),
    );
    print_bars(
        "Records by focus area",
        &analytics::count_by_category(hits, Column::FocusArea),
    );
}

fn print_client(hits: &Dataset, id: &str) -> Result<()> {
    let Some(latest) = analytics::most_recent_for_client(hits, id) else {
        bail!("No records for client {id}");
    };

    println!("Most recent record for {id}");
    for column in Column::ALL {
        println!("  {:<26} {}", column.header(), latest.field(column));
    }

    let history = analytics::client_history(hits, id);
    if history.len() > 1 {
        println!("\nHistory ({} records)", history.len());
        for record in &history {
            println!(
                "  {:<10}  {:<24} rating {}",
                record.date_string(),
                record.chemical_used,
                record.treatment_outcome_rating
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn run(store: &Path, args: &[&str]) -> Result<()> {
        let store = store.display().to_string();
        let mut argv = vec!["ppn", "--store", store.as_str()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv)?.run()
    }

    fn add(store: &Path, client_id: &str, chemical: &str) -> Result<()> {
        run(
            store,
            &[
                "add",
                "--practitioner",
                "Dr. A. Smith",
                "--client-id",
                client_id,
                "--date",
                "2024-05-01",
                "--chemical",
                chemical,
                "--rating",
                "5",
            ],
        )
    }

    #[test]
    fn test_add_appends_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.csv");

        add(&path, "P-1", "Ketamine").unwrap();
        add(&path, "P-2", "LSD").unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(&Column::header_row()));
        assert_eq!(text.lines().count(), 3);

        let snapshot = RecordStore::open(&path).load();
        assert_eq!(snapshot.source, DataSource::File);
        let stored = &snapshot.dataset.records()[1];
        assert_eq!(stored.client_id, "P-2");
        assert_eq!(stored.chemical_used, "LSD");
        assert_eq!(stored.treatment_outcome_rating, 5);
        assert_eq!(stored.date_string(), "2024-05-01");
        assert_eq!(stored.patient_age, 35);
    }

    #[test]
    fn test_add_rejects_blank_client_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.csv");

        assert!(add(&path, "  ", "Ketamine").is_err());
        assert!(!path.exists());

        let out_of_range = run(
            &path,
            &["add", "--practitioner", "Dr. X", "--client-id", "P-1", "--rating", "9"],
        );
        assert!(out_of_range.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_export_writes_filtered_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.csv");
        let out = dir.path().join("out").join("results.csv");
        fs::create_dir_all(out.parent().unwrap()).unwrap();
        add(&path, "P-1", "Ketamine").unwrap();
        add(&path, "P-2", "LSD").unwrap();

        let out_arg = out.display().to_string();
        run(&path, &["export", "--chemical", "LSD", "--out", &out_arg]).unwrap();

        let text = fs::read_to_string(&out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], Column::header_row());
        assert!(lines[1].contains("P-2"));
    }

    #[test]
    fn test_export_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.csv");
        let out = dir.path().join("results.json");
        add(&path, "P-1", "Ketamine").unwrap();
        add(&path, "P-2", "LSD").unwrap();

        let out_arg = out.display().to_string();
        run(
            &path,
            &["export", "ketamine", "--format", "json", "--out", &out_arg],
        )
        .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(value["metadata"]["record_count"], 1);
        assert_eq!(value["metadata"]["query"], "ketamine");
        assert_eq!(value["records"][0]["client_id"], "P-1");
    }

    #[test]
    fn test_locked_store_gets_retry_hint() {
        let err = append_error(StoreError::Locked {
            path: PathBuf::from("records.csv"),
            source: std::io::Error::from(std::io::ErrorKind::WouldBlock),
        });
        assert!(err.to_string().contains("try again"));

        let err = append_error(StoreError::Unexpected {
            path: PathBuf::from("records.csv"),
            detail: "disk vanished".into(),
        });
        assert!(!err.to_string().contains("try again"));
        assert!(err.to_string().contains("disk vanished"));
    }

    #[test]
    fn test_parse_search_with_filters() {
        let cli = Cli::try_parse_from([
            "ppn", "search", "ketamine", "--focus", "PTSD", "--focus", "Addiction", "--min-rating",
            "3",
        ])
        .unwrap();

        let Command::Search { query, format } = cli.command else {
            panic!("expected search");
        };
        assert_eq!(query.text, "ketamine");
        assert_eq!(query.focus, vec!["PTSD", "Addiction"]);
        assert_eq!(format, Format::Table);

        let filter = query.filter(&RegistryConfig::default());
        assert_eq!(filter.min_rating, 3);
        assert_eq!(filter.chemical, CategoryFilter::Any);
        assert!(filter.focus.allows("PTSD"));
        assert!(!filter.focus.allows("Spirituality"));
    }

    #[test]
    fn test_min_rating_defaults_to_config() {
        let config = RegistryConfig {
            min_rating: 2,
            ..Default::default()
        };
        assert_eq!(QueryArgs::default().filter(&config).min_rating, 2);
    }

    #[test]
    fn test_global_store_flag() {
        let cli = Cli::try_parse_from(["ppn", "stats", "--store", "/tmp/x.csv"]).unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/x.csv")));
    }

    #[test]
    fn test_add_draft_defaults() {
        let cli =
            Cli::try_parse_from(["ppn", "add", "--practitioner", "Dr. X", "--client-id", "P-1"])
                .unwrap();
        let Command::Add(args) = cli.command else {
            panic!("expected add");
        };

        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let draft = args.draft(today).unwrap();
        assert_eq!(draft.treatment_date, today);
        assert_eq!(draft.patient_age, 35);
        assert_eq!(draft.treatment_outcome_rating, 4);
    }

    #[test]
    fn test_add_rejects_bad_date() {
        let cli = Cli::try_parse_from([
            "ppn",
            "add",
            "--practitioner",
            "Dr. X",
            "--client-id",
            "P-1",
            "--date",
            "yesterday",
        ])
        .unwrap();
        let Command::Add(args) = cli.command else {
            panic!("expected add");
        };
        assert!(args.draft(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()).is_err());
    }

    #[test]
    fn test_render_table_counts() {
        let ds: Dataset = vec![TreatmentRecord {
            client_id: "P-1".into(),
            chemical_used: "LSD".into(),
            treatment_outcome_rating: 5,
            ..Default::default()
        }]
        .into();
        let out = render(&ds, "", Format::Table).unwrap();
        assert!(out.starts_with("Treatment_Date"));
        assert!(out.contains("P-1"));
        assert!(out.ends_with("1 records\n"));
    }
}

mod batch;
mod config;
mod fetch;
mod output;
mod parser;
mod record;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use batch::{Unit, UnitResult};
use crate::config::Settings;
use record::{RawSource, SourceKind};

#[derive(Parser)]
#[command(name = "exam_extract", about = "Extract structured exam questions from study material")]
struct Cli {
    /// Settings file layered over the built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline on local text or HTML files
    Extract {
        #[arg(short, long, value_enum)]
        kind: SourceKind,
        /// Subject name, selects the chapter table (e.g. 计算机网络)
        #[arg(short, long)]
        subject: String,
        /// Exam year, for scraped pages saved to disk
        #[arg(short, long)]
        year: Option<i32>,
        /// Output directory for JSON files
        #[arg(short, long, default_value = "output")]
        out: PathBuf,
        /// Worker threads (default: one per core)
        #[arg(short, long)]
        jobs: Option<usize>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Fetch one exam page per year and extract it
    Scrape {
        #[arg(short, long)]
        subject: String,
        #[arg(long)]
        from: i32,
        #[arg(long)]
        to: i32,
        #[arg(short, long, default_value = "output")]
        out: PathBuf,
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Show the chapter boundaries found in a file
    Chapters {
        #[arg(short, long, value_enum)]
        kind: SourceKind,
        #[arg(short, long)]
        subject: String,
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;

    let result = match cli.command {
        Commands::Extract {
            kind,
            subject,
            year,
            out,
            jobs,
            files,
        } => {
            check_year(year, &files)?;
            let units: Vec<Unit> = files
                .iter()
                .map(|path| load_unit(path, kind, &subject, year))
                .collect();
            println!("Extracting {} file(s) as {:?}...", units.len(), kind);
            let results = batch::process_batch(units, &settings, jobs)?;
            write_outputs(&out, &results)?;
            print_summary(&results);
            Ok(())
        }
        Commands::Scrape {
            subject,
            from,
            to,
            out,
            jobs,
        } => {
            if from > to {
                bail!("--from {} is after --to {}", from, to);
            }
            let years: Vec<i32> = (from..=to).collect();

            let t_fetch = Instant::now();
            println!("Fetching {} page(s) from {}...", years.len(), settings.scrape.url_template);
            let pages = fetch::fetch_years(&years, &settings.scrape).await?;
            let ok = pages.iter().filter(|p| p.body.is_ok()).count();
            println!(
                "Fetched {} pages ({} ok, {} errors) in {:.1}s",
                pages.len(),
                ok,
                pages.len() - ok,
                t_fetch.elapsed().as_secs_f64()
            );

            let units: Vec<Unit> = pages
                .into_iter()
                .map(|page| {
                    let name = format!("year-{:04}", page.year);
                    match page.body {
                        Ok(text) => Unit::Ready(RawSource {
                            name,
                            text,
                            kind: SourceKind::ScrapedHtml,
                            subject: subject.clone(),
                            year: Some(page.year),
                        }),
                        Err(e) => Unit::Failed {
                            name,
                            kind: SourceKind::ScrapedHtml,
                            subject: subject.clone(),
                            year: Some(page.year),
                            error: e.to_string(),
                        },
                    }
                })
                .collect();

            let results = batch::process_batch(units, &settings, jobs)?;
            write_outputs(&out, &results)?;
            print_summary(&results);
            Ok(())
        }
        Commands::Chapters { kind, subject, file } => {
            let cfg = settings.extraction_config(&subject)?;
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let source = RawSource {
                name: file_stem(&file),
                text,
                kind,
                subject,
                year: None,
            };
            let boundaries = parser::chapter_boundaries(&source, &cfg);
            if boundaries.is_empty() {
                println!("No chapter headings found.");
                return Ok(());
            }

            println!("{:>8} | {:>3} | {}", "Offset", "No.", "Chapter");
            println!("{}", "-".repeat(50));
            for b in &boundaries {
                println!("{:>8} | {:>3} | {}", b.offset, b.number, truncate(&b.label, 36));
            }
            println!("\n{} chapters", boundaries.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn load_unit(path: &Path, kind: SourceKind, subject: &str, year: Option<i32>) -> Unit {
    let name = file_stem(path);
    match std::fs::read_to_string(path) {
        Ok(text) => Unit::Ready(RawSource {
            name,
            text,
            kind,
            subject: subject.to_string(),
            year,
        }),
        Err(e) => Unit::Failed {
            name,
            kind,
            subject: subject.to_string(),
            year,
            error: format!("{}: {}", path.display(), e),
        },
    }
}

/// Output files for a year are named `year-NNNN.json`, so one year can only
/// label one file.
fn check_year(year: Option<i32>, files: &[PathBuf]) -> anyhow::Result<()> {
    if year.is_some() && files.len() > 1 {
        bail!("--year applies to a single file, got {}", files.len());
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn write_outputs(dir: &Path, results: &[UnitResult]) -> anyhow::Result<()> {
    let mut written = 0;
    for r in results {
        if let Ok(extraction) = &r.outcome {
            let envelope = output::Envelope::new(&r.name, &r.subject, r.kind, r.year, extraction);
            output::write_records(dir, &envelope)?;
            written += 1;
        }
    }
    println!("Wrote {} file(s) to {}", written, dir.display());
    Ok(())
}

fn print_summary(results: &[UnitResult]) {
    println!(
        "{:>3} | {:<24} | {:>7} | {:>8} | {:>7} | {:>8} | {:>7} | {}",
        "#", "Source", "Matched", "Rejected", "Records", "Chapters", "Answers", "Status"
    );
    println!("{}", "-".repeat(96));

    for (i, r) in results.iter().enumerate() {
        let name = truncate(&r.name, 24);
        match &r.outcome {
            Ok(e) => {
                let rep = &e.report;
                let answers = match r.kind {
                    SourceKind::ScrapedHtml => format!("{}+{}", rep.answers_table, rep.answers_fallback),
                    _ => "-".into(),
                };
                println!(
                    "{:>3} | {:<24} | {:>7} | {:>8} | {:>7} | {:>8} | {:>7} | ok",
                    i + 1,
                    name,
                    rep.matched,
                    rep.rejected + rep.dropped,
                    rep.emitted,
                    rep.chapters,
                    answers
                );
            }
            Err(err) => println!(
                "{:>3} | {:<24} | {:>7} | {:>8} | {:>7} | {:>8} | {:>7} | error: {}",
                i + 1,
                name,
                "-",
                "-",
                0,
                "-",
                "-",
                truncate(err, 60)
            ),
        }
    }

    let records: usize = results.iter().map(UnitResult::records).sum();
    let failed = results.iter().filter(|r| r.outcome.is_err()).count();
    println!("\n{} units | {} records | {} failed", results.len(), records, failed);
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_by_chars() {
        assert_eq!(truncate("第1章 计算机网络体系结构", 4), "第1章 ...");
        assert_eq!(truncate("短", 4), "短");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(std::time::Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(std::time::Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(std::time::Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn unreadable_file_becomes_failed_unit() {
        let unit = load_unit(Path::new("tests/fixtures/nope.txt"), SourceKind::ChoiceDoc, "数据结构", None);
        assert!(matches!(unit, Unit::Failed { ref name, .. } if name == "nope"));
    }

    #[test]
    fn year_needs_single_file() {
        let files = [PathBuf::from("2019.html"), PathBuf::from("2020.html")];
        assert!(check_year(Some(2019), &files).is_err());
        assert!(check_year(Some(2019), &files[..1]).is_ok());
        assert!(check_year(None, &files).is_ok());

        let cli = Cli::try_parse_from([
            "exam_extract", "extract", "--kind", "html", "--subject", "数据结构", "--year", "2019", "a.html", "b.html",
        ])
        .unwrap();
        let Commands::Extract { year, files, .. } = cli.command else {
            panic!("expected extract");
        };
        assert!(check_year(year, &files).is_err());
    }

    #[test]
    fn cli_parses() {
        let cli = Cli::try_parse_from([
            "exam_extract", "extract", "--kind", "essay", "--subject", "计算机网络", "a.txt", "b.txt",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Extract { kind: SourceKind::EssayDoc, ref files, .. } if files.len() == 2
        ));
        assert!(Cli::try_parse_from(["exam_extract", "extract", "--kind", "pdf", "--subject", "x", "a"]).is_err());
    }
}

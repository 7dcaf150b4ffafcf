//! Command implementation cho keychain2bitwarden CLI.
//!
//! Một command duy nhất: đọc keychain, diff với vault, và (với `--write`)
//! tạo các items còn thiếu. Kết quả được in ra stdout, logs ra stderr.

use super::prompt::TerminalPrompt;
use super::Cli;
use anyhow::Result;
use chrono::Local;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use keychain2bitwarden::{
    run, BitwardenCli, Config, CredentialEntry, Mode, RunObserver, RunOptions, SecurityKeychain,
    Stage, SyncError, SyncPlan, SyncReport,
};
use std::process::ExitCode;

/// Progress bar cho write phase. Ẩn khi verbose vì mỗi item đã có log riêng.
struct ProgressObserver {
    verbose: bool,
    planned: u64,
    progress: Option<ProgressBar>,
}

impl ProgressObserver {
    fn new(verbose: bool) -> Self {
        Self {
            verbose,
            planned: 0,
            progress: None,
        }
    }
}

impl RunObserver for ProgressObserver {
    fn stage(&mut self, stage: Stage) {
        match stage {
            Stage::Write if !self.verbose => {
                let pb = ProgressBar::new(self.planned);
                if let Ok(style) =
                    ProgressStyle::with_template("  [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
                {
                    pb.set_style(style.progress_chars("=> "));
                }
                self.progress = Some(pb);
            }
            Stage::Report | Stage::Failed => {
                if let Some(pb) = self.progress.take() {
                    pb.finish_and_clear();
                }
            }
            _ => {}
        }
    }

    fn planned(&mut self, plan: &SyncPlan) {
        self.planned = plan.len() as u64;
    }

    fn item(&mut self, _entry: &CredentialEntry, _result: &Result<(), SyncError>) {
        if let Some(pb) = &self.progress {
            pb.inc(1);
        }
    }
}

/// Đọc keychain, diff với vault và tạo các items còn thiếu (nếu `--write`)
pub fn sync(cli: &Cli) -> Result<ExitCode> {
    let mode = if cli.write { Mode::Write } else { Mode::DryRun };

    println!("{}", "Keychain → Bitwarden".cyan().bold());
    match mode {
        Mode::DryRun => println!("{}", "Dry run: no items will be created".dimmed()),
        Mode::Write => println!("{}", "Write mode: missing items will be created".yellow()),
    }
    println!();

    let config = Config::load_default()?;
    let keychain = SecurityKeychain::new(&config);
    let vault = BitwardenCli::new(&config, TerminalPrompt);
    let options = RunOptions {
        mode,
        imported_at: Local::now().fixed_offset(),
    };

    let mut observer = ProgressObserver::new(cli.verbose);
    match run(&keychain, &vault, &options, &mut observer) {
        Ok(report) => {
            print_report(&report);
            if report.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(1))
            }
        }
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            Ok(e.exit_code())
        }
    }
}

/// Dòng tổng kết: scanned, missing, created, failed
pub fn summary_line(report: &SyncReport) -> String {
    format!(
        "{} scanned, {} missing, {} created, {} failed",
        report.scanned,
        report.missing(),
        report.created,
        report.failed.len()
    )
}

fn print_report(report: &SyncReport) {
    println!(
        "Keychain: {} entries ({} skipped)",
        report.scanned.to_string().cyan(),
        report.skipped
    );
    println!(
        "Vault:    {} already present",
        report.existing.to_string().cyan()
    );
    println!();

    if report.mode == Mode::DryRun && !report.planned.is_empty() {
        println!("{}", "Missing from Bitwarden:".bold());
        for item in &report.planned {
            println!("  {} {}", "+".green(), item.name());
        }
        println!();
    }

    if !report.failed.is_empty() {
        println!("{}", "Failed to create:".red().bold());
        for failed in &report.failed {
            println!(
                "  {} {} - {}: {}",
                "✗".red(),
                failed.service,
                failed.account,
                failed.error.dimmed()
            );
        }
        println!();
    }

    let summary = summary_line(report);
    if report.is_success() {
        println!("{} {}", "✓".green(), summary.green().bold());
    } else {
        println!("{} {}", "✗".red(), summary.red().bold());
    }

    if report.mode == Mode::DryRun && !report.planned.is_empty() {
        println!(
            "\nRun again with {} to create {} item(s).",
            "--write".cyan(),
            report.missing()
        );
    }
}

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use etljob::bookmark::{BookmarkStore, FileBookmarkStore};
use etljob::cli::{Cli, Command};
use etljob::config::EtlConfig;
use etljob::context::EngineContextFactory;
use etljob::error::JobError;
use etljob::ui::{self, RunProgress};
use etljob::{logging, runner};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match EtlConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error[Config]: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    logging::init_logging(&config.log_level, cli.verbose);

    let result = match cli.command {
        Command::Run { args } => Ok(run(&args, &config)),
        Command::Show { job_name } => show(&job_name, &config),
        Command::Reset { job_name } => reset(&job_name, &config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let kind = e.downcast_ref::<JobError>().map_or("Error", JobError::kind);
            error!(kind, "{e:#}");
            eprintln!("error[{kind}]: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String], config: &EtlConfig) -> u8 {
    let store = FileBookmarkStore::new(&config.bookmark_dir);
    let factory = EngineContextFactory::new(config.engine_master.clone());

    let progress = RunProgress::start("Running job");
    let job_run = runner::run_job(args, config, store, &factory, |ctx, _staged| {
        info!(
            app = %ctx.app_name,
            master = %ctx.master,
            bookmark_run = ctx.bookmark.run,
            "execution context ready"
        );
        Ok(())
    });
    progress.complete(&job_run);
    if let Some(record) = &job_run.record {
        progress.print_record(record);
    }

    if let Err(e) = &job_run.outcome {
        eprintln!("error[{}]: {e}", e.kind());
    }
    job_run.exit_code()
}

fn show(job_name: &str, config: &EtlConfig) -> Result<u8> {
    let store = FileBookmarkStore::new(&config.bookmark_dir);
    let bookmark = store.load(job_name)?;
    ui::print_bookmark(job_name, bookmark.as_ref());
    Ok(0)
}

fn reset(job_name: &str, config: &EtlConfig) -> Result<u8> {
    let store = FileBookmarkStore::new(&config.bookmark_dir);
    if store.reset(job_name)? {
        info!(job = job_name, dir = %store.dir().display(), "bookmark reset");
        println!("Bookmark for job {job_name} reset");
    } else {
        println!("No bookmark stored for job {job_name}");
    }
    Ok(0)
}

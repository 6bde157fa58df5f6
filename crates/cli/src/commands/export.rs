use std::fs;
use std::path::PathBuf;

use clap::ValueEnum;
use policydesk_core::domain::agent::AgentId;
use policydesk_db::BackOfficeService;

use crate::commands::{
    application_failure, build_runtime, load_config, open_database, CommandResult,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportKind {
    Customers,
    Policies,
}

pub struct ExportArgs {
    pub kind: ExportKind,
    pub agent: String,
    pub output: Option<PathBuf>,
}

/// Without `--output` the CSV text is returned as the outcome message.
pub fn run(args: ExportArgs) -> CommandResult {
    let config = match load_config("export") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("export") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let service = BackOfficeService::sql(pool.clone());
        let csv = async {
            let actor = service.identify(&AgentId(args.agent.clone())).await?;
            match args.kind {
                ExportKind::Customers => service.export_customers_csv(&actor).await,
                ExportKind::Policies => service.export_policies_csv(&actor).await,
            }
        }
        .await
        .map_err(application_failure);
        pool.close().await;
        csv
    });

    let csv = match result {
        Ok(csv) => csv,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("export", error_class, message, exit_code);
        }
    };

    match args.output {
        Some(path) => match fs::write(&path, &csv) {
            Ok(()) => CommandResult::success(
                "export",
                format!("wrote {} rows to {}", csv.lines().count().saturating_sub(1), path.display()),
            ),
            Err(error) => CommandResult::failure(
                "export",
                "output_write",
                format!("could not write {}: {error}", path.display()),
                12,
            ),
        },
        None => CommandResult::success("export", csv),
    }
}

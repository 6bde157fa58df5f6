use chrono::{NaiveDate, Utc};
use policydesk_core::expiry::{notice_date, MAX_LEAD_DAYS};
use policydesk_db::BackOfficeService;

use crate::commands::{
    application_failure, build_runtime, load_config, open_database, CommandResult,
};

pub struct CheckExpiryArgs {
    pub today: Option<NaiveDate>,
    pub lead_days: Option<u32>,
}

/// Lists the active policies that end exactly `lead_days` from today. Meant
/// to run once a day from a scheduler.
pub fn run(args: CheckExpiryArgs) -> CommandResult {
    let config = match load_config("check-expiry") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("check-expiry") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let today = args.today.unwrap_or_else(|| Utc::now().date_naive());
    let lead_days = args.lead_days.unwrap_or(config.expiry.lead_days);
    let Some(due) = notice_date(today, lead_days) else {
        return CommandResult::failure(
            "check-expiry",
            "invalid_request",
            format!("--lead-days must be in range 0..={MAX_LEAD_DAYS}, got {lead_days}"),
            9,
        );
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let notices = BackOfficeService::sql(pool.clone())
            .expiry_notices(today, lead_days)
            .await
            .map_err(application_failure);
        pool.close().await;
        notices
    });

    match result {
        Ok(notices) => {
            let mut lines = vec![format!(
                "{} policies end on {} ({lead_days} days from {today})",
                notices.len(),
                due
            )];
            lines.extend(notices.iter().map(|notice| format!("- {}", notice.summary())));
            CommandResult::success("check-expiry", lines.join("\n"))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("check-expiry", error_class, message, exit_code)
        }
    }
}

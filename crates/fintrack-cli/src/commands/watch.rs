use fintrack_core::{
    ChangeEvent, ChangeFeed, RemoteTable, ResourceController, StoreUpdate, UserId,
};
use serde::Serialize;

use crate::commands::records::{print_records, CliRecord};
use crate::error::CliError;

pub async fn run_watch<R, B>(backend: B, owner: UserId, as_json: bool) -> Result<(), CliError>
where
    R: CliRecord,
    R::Summary: Serialize,
    B: RemoteTable + ChangeFeed,
{
    let mut controller = ResourceController::<R, B>::new(backend, owner);
    if let Err(error) = controller.start().await {
        eprintln!("Warning: {error}");
    }
    if !as_json {
        print_records(&controller, false)?;
        eprintln!(
            "Watching {} ({}), press Ctrl-C to stop",
            R::TABLE,
            controller.store().subscription_status()
        );
    }

    loop {
        tokio::select! {
            update = controller.next_update() => {
                let Some(update) = update else {
                    eprintln!(
                        "Live updates ended: {}",
                        controller.store().subscription_status()
                    );
                    break;
                };
                if let Some(line) = describe_update(&update, &controller.summary(), as_json)? {
                    println!("{line}");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    controller.teardown();
    Ok(())
}

/// One output line for a processed feed message, if it is worth printing.
pub fn describe_update<R>(
    update: &StoreUpdate<R>,
    summary: &R::Summary,
    as_json: bool,
) -> Result<Option<String>, CliError>
where
    R: CliRecord,
    R::Summary: Serialize,
{
    let line = match update {
        StoreUpdate::Changed(event) if as_json => {
            let record = match event {
                ChangeEvent::Inserted(record) | ChangeEvent::Updated(record) => {
                    serde_json::to_value(record)?
                }
                ChangeEvent::Removed(_) => serde_json::Value::Null,
            };
            serde_json::to_string(&serde_json::json!({
                "event": event.label(),
                "id": event.record_id(),
                "record": record,
                "summary": summary,
            }))?
        }
        StoreUpdate::Changed(event) => {
            let detail = match event {
                ChangeEvent::Inserted(record) | ChangeEvent::Updated(record) => record.row(),
                ChangeEvent::Removed(id) => id.to_string(),
            };
            let totals = R::summary_lines(summary).join(" | ");
            format!("{:<8} {detail}\n         {totals}", event.label())
        }
        StoreUpdate::Status(status) => {
            if as_json {
                return Ok(None);
            }
            format!("[{status}]")
        }
        StoreUpdate::Unchanged(_) | StoreUpdate::Dropped(_) => return Ok(None),
    };
    Ok(Some(line))
}

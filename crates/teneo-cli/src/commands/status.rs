use chrono::Utc;
use serde_json::json;
use teneo_core::reward::estimate_base;

use super::{CliResult, Context};

/// Print the state file and what the estimate would read right now.
pub fn run(ctx: &Context) -> CliResult {
    let store = ctx.store()?;
    let state = store.read()?;
    let estimate = estimate_base(Utc::now(), state.last_heartbeat_at);

    let out = json!({
        "stateFile": store.path(),
        "state": state,
        "estimate": estimate,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

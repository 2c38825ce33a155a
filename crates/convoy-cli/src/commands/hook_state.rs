//! Inspecting recorded hook state

use anyhow::Result;
use convoy_hook::{HookError, Recovery, State, StateFile};
use serde_json::{Value, json};
use std::path::Path;

/// Printable summary of a state and what recovery it calls for
pub fn describe(state: Option<&State>) -> Value {
    let Some(state) = state else {
        return json!({ "status": "none", "recovery": "nothing" });
    };
    let recovery = match state.recovery() {
        Recovery::Nothing => "nothing",
        Recovery::Resolve(_) => "resolve",
        Recovery::Resynchronise(_) => "resynchronise",
    };
    let info = &state.info;
    json!({
        "kind": info.kind.as_str(),
        "relation-id": info.relation_id,
        "remote-unit": info.remote_unit,
        "change-version": info.change_version,
        "members": info.members.keys().collect::<Vec<_>>(),
        "status": state.status.to_string(),
        "recovery": recovery,
    })
}

pub async fn show(path: &Path, json: bool) -> Result<()> {
    let state = match StateFile::new(path).read().await {
        Ok(state) => Some(state),
        Err(HookError::NoStateFile) => None,
        Err(e) => return Err(e.into()),
    };
    let summary = describe(state.as_ref());
    let rendered = if json {
        serde_json::to_string_pretty(&summary)?
    } else {
        serde_yaml::to_string(&summary)?
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

//! `osconfig check` command: report required host tools.

use clap::Args;
use osconfig_runtime::check_dependencies;

use crate::output;

#[derive(Args)]
pub struct CheckArgs;

pub async fn execute(_args: CheckArgs) -> Result<(), Box<dyn std::error::Error>> {
    let tools = check_dependencies();

    let mut table = output::new_table(&["TOOL", "STATUS", "PATH"]);
    for tool in &tools {
        let path = tool
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        let status = if tool.found() { "ok" } else { "missing" };
        table.add_row([tool.name.as_str(), status, path.as_str()]);
    }
    println!("{table}");

    let missing = tools.iter().filter(|t| !t.found()).count();
    if missing > 0 {
        return Err(format!("{missing} required tool(s) missing").into());
    }
    Ok(())
}

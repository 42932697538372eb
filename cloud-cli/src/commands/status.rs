//! Show a leader's view of its cloud.

use anyhow::{Context, Result};

use cloudfuzz_client::ClusterApi;
use cloudfuzz_types::{CloudStatus, NodeAddr};

use super::http_api;

/// Run the status command.
pub async fn run(leader: &NodeAddr, json: bool) -> Result<()> {
    let status = http_api()?
        .cloud_status(leader)
        .await
        .with_context(|| format!("Failed to query cloud status from {leader}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", render(leader, &status));
    }
    Ok(())
}

fn render(leader: &NodeAddr, status: &CloudStatus) -> String {
    let mut out = String::new();
    out.push_str("=== cloud status ===\n");
    out.push_str(&format!(
        "  Name:  {}\n",
        status.cloud_name.as_deref().unwrap_or("(unnamed)")
    ));
    out.push_str(&format!("  Size:  {}\n", status.cloud_size));
    out.push_str("  Nodes:\n");
    for node in &status.nodes {
        let marker = if node == leader { " (queried)" } else { "" };
        out.push_str(&format!("    {node}{marker}\n"));
    }
    out
}

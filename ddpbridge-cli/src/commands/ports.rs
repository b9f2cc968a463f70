use anyhow::{Context, Result};
use colored::*;
use ddpbridge_core::transport::{describe_port, list_ports, select_port};

pub fn execute() -> Result<()> {
    let ports = list_ports().context("Failed to enumerate serial ports")?;

    if ports.is_empty() {
        println!("{} No serial ports found", "✗".red());
        return Ok(());
    }

    let selected = select_port(&ports);

    println!("\n=== Serial Ports ===");
    for info in &ports {
        let marker = if selected.as_deref() == Some(info.port_name.as_str()) {
            "*".green().to_string()
        } else {
            " ".to_string()
        };
        println!("{} {:<20} {}", marker, info.port_name, describe_port(info));
    }

    if let Some(port) = selected {
        println!("\nAuto-detect would use: {}", port.green());
    }

    Ok(())
}

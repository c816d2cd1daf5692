//! `toolstream abilities`: print the built-in ability schemas.

use toolstream_core::provider::ToolDefinition;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let registry = toolstream_abilities::default_registry()?;
    println!("{}", render(&registry.definitions())?);
    Ok(())
}

fn render(definitions: &[ToolDefinition]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(definitions)
}

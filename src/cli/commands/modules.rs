//! `modules` command: list the registered converter modules

use crate::cli::error::CliError;
use crate::config::InteropConfig;
use crate::models::{ModuleDescriptor, ModuleType};
use crate::registry::ModuleRegistry;
use std::path::PathBuf;

/// Arguments for the modules listing
#[derive(Debug, Clone)]
pub struct ModulesArgs {
    /// Only list modules of this type
    pub module_type: Option<ModuleType>,
    /// Directory holding `.interop.toml`
    pub config_dir: Option<PathBuf>,
    /// Print JSON instead of a table
    pub json: bool,
}

fn describe(module: &ModuleDescriptor) -> serde_json::Value {
    serde_json::json!({
        "type": module.module_type.to_string(),
        "format": module.format,
        "description": module.description,
        "fileExtensions": module.file_extensions,
        "sources": module.sources.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        "target": module.target.map(|t| t.to_string()),
        "outputFormat": module.output_format.to_string(),
        "isDefault": module.is_default,
    })
}

fn format_row(module: &ModuleDescriptor) -> String {
    let location = match (module.module_type, module.target) {
        (ModuleType::Exporter, Some(target)) => target.to_string(),
        _ => module
            .sources
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("/"),
    };
    format!(
        "{:<9} {:<16} {:<10} {:<5} {}{}",
        module.module_type.to_string(),
        module.format,
        location,
        module.output_format.to_string(),
        module.description,
        if module.is_default { " (default)" } else { "" }
    )
}

/// Handle the modules command
pub fn handle_modules(args: &ModulesArgs) -> Result<(), CliError> {
    let config_dir = args.config_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let config = InteropConfig::load(&config_dir)?;

    let registry = ModuleRegistry::new();
    config.register_modules(&registry);

    let modules: Vec<ModuleDescriptor> = registry
        .list_modules()
        .into_iter()
        .filter(|m| args.module_type.is_none_or(|t| m.module_type == t))
        .collect();

    if args.json {
        let values: Vec<serde_json::Value> = modules.iter().map(describe).collect();
        let output = serde_json::to_string_pretty(&values)
            .map_err(|e| CliError::IoError(format!("Failed to serialize modules: {}", e)))?;
        println!("{}", output);
    } else {
        for module in &modules {
            println!("{}", format_row(module));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModuleOptions;

    #[test]
    fn test_format_row_marks_default() {
        let module = ModuleOptions::importer("enex")
            .description("Evernote")
            .is_default(true)
            .into_descriptor();
        let row = format_row(&module);
        assert!(row.starts_with("importer"));
        assert!(row.ends_with("Evernote (default)"));
    }

    #[test]
    fn test_describe_has_camel_case_keys() {
        let module = ModuleOptions::exporter("raw").into_descriptor();
        let value = describe(&module);
        assert_eq!(value["format"], "raw");
        assert_eq!(value["target"], "file");
        assert_eq!(value["isDefault"], false);
    }
}

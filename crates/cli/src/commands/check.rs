//! Validate key patterns and show the resolved selection.

use reqlog_config::AppConfig;

pub fn run(config: &AppConfig, patterns: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let exporter = match super::build_exporter(config, patterns) {
        Ok(exporter) => exporter,
        Err(e) => {
            eprintln!("Key pattern validation failed: {e}");
            std::process::exit(1);
        }
    };

    if exporter.is_empty() {
        println!("Patterns are valid but select nothing.");
        return Ok(());
    }

    if !exporter.built_ins().is_empty() {
        println!("Built-in properties ({}):", exporter.built_ins().len());
        for property in exporter.built_ins() {
            println!("  {property}");
        }
    }

    let headers: Vec<String> = exporter
        .request_headers()
        .iter()
        .map(|h| format!("req.headers.{h}"))
        .chain(
            exporter
                .response_headers()
                .iter()
                .map(|h| format!("res.headers.{h}")),
        )
        .collect();
    if !headers.is_empty() {
        println!("Headers ({}):", headers.len());
        for header in headers {
            println!("  {header}");
        }
    }

    if !exporter.attributes().is_empty() {
        println!("Attributes ({}):", exporter.attributes().len());
        for attr in exporter.attributes() {
            match attr.type_hint() {
                Some(hint) => println!("  {} ({hint})", attr.export_key()),
                None => println!("  {}", attr.export_key()),
            }
        }
    }
    if exporter.exports_all_attributes() {
        println!("attrs.* is set: every declared attribute is exported.");
    }
    if !exporter.key_prefix().is_empty() {
        println!("Key prefix: {}", exporter.key_prefix());
    }
    Ok(())
}

//! List built-in property keys.

use reqlog_core::BuiltInProperty;
use reqlog_exporter::KeyPattern;

pub fn run(pattern: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(pattern) = pattern else {
        for property in BuiltInProperty::ALL {
            println!("{property}");
        }
        return Ok(());
    };

    let parsed: KeyPattern = pattern.parse()?;
    let matched: Vec<_> = BuiltInProperty::ALL
        .iter()
        .filter(|p| parsed.matches(p.key))
        .collect();

    if matched.is_empty() {
        println!("'{pattern}' selects no built-in properties.");
    }
    for property in matched {
        println!("{property}");
    }
    Ok(())
}

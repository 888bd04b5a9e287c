pub mod check;
pub mod export;
pub mod init;
pub mod keys;

use reqlog_config::AppConfig;
use reqlog_exporter::{ExportResult, RequestContextExporter};

/// Build an exporter from explicit patterns, or from the config when none
/// are given. The config's key prefix applies either way.
pub(crate) fn build_exporter(
    config: &AppConfig,
    patterns: &[String],
) -> ExportResult<RequestContextExporter> {
    let patterns = if patterns.is_empty() {
        config.export.key_patterns.as_slice()
    } else {
        patterns
    };
    let mut builder = RequestContextExporter::builder();
    builder
        .add_key_patterns(patterns)?
        .key_prefix(config.export.key_prefix.as_str());
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqlog_core::BuiltInProperty;

    #[test]
    fn explicit_patterns_win_over_config() {
        let config = AppConfig::default();
        let exporter = build_exporter(&config, &["scheme".to_string()]).unwrap();
        assert_eq!(exporter.built_ins().len(), 1);
        assert_eq!(exporter.built_ins()[0].key, "scheme");
    }

    #[test]
    fn config_patterns_and_prefix_used_by_default() {
        let mut config = AppConfig::default();
        config.export.key_prefix = "ctx.".into();
        let exporter = build_exporter(&config, &[]).unwrap();
        let want: Vec<&str> = BuiltInProperty::ALL
            .iter()
            .map(|p| p.key)
            .filter(|k| k.starts_with("req.") || *k == "res.status_code")
            .collect();
        let got: Vec<&str> = exporter.built_ins().iter().map(|p| p.key).collect();
        assert_eq!(got, want);
        assert!(exporter.attribute("request_id").is_some());
        assert_eq!(exporter.key_prefix(), "ctx.");
    }

    #[test]
    fn invalid_config_pattern_fails_fast() {
        let mut config = AppConfig::default();
        config.export.key_patterns.push("req.nonexistent".into());
        assert!(build_exporter(&config, &[]).is_err());
    }
}

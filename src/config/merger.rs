//! First-found-wins merge for layered YAML configuration.
//!
//! runnel reads several candidate configuration files. A key found in an
//! earlier (higher priority) file is never overridden by a later one; later
//! files only fill in keys the earlier ones lack.
//!
//! # Merge Rules
//!
//! - Mappings are merged recursively
//! - Sequences are taken whole from the first file that declares them
//! - Null values count as absent and are filled from later files
//! - Scalars in the primary document win

use serde_yaml::Value;

/// Merge two YAML values, keeping `primary` wherever it has a value.
///
/// # Arguments
///
/// * `primary` - The higher priority document
/// * `fallback` - The lower priority document
///
/// # Returns
///
/// A new Value with merged contents
pub fn first_wins_merge(primary: &Value, fallback: &Value) -> Value {
    match (primary, fallback) {
        (Value::Mapping(primary_map), Value::Mapping(fallback_map)) => {
            let mut result = primary_map.clone();

            for (key, fallback_value) in fallback_map {
                match primary_map.get(key) {
                    Some(existing) if !existing.is_null() => {
                        result.insert(key.clone(), first_wins_merge(existing, fallback_value));
                    }
                    _ => {
                        result.insert(key.clone(), fallback_value.clone());
                    }
                }
            }

            Value::Mapping(result)
        }

        (Value::Null, fallback) => fallback.clone(),

        (primary, _) => primary.clone(),
    }
}

/// Merge multiple configs in priority order (first has highest priority).
pub fn merge_configs(configs: &[Value]) -> Value {
    configs
        .iter()
        .fold(Value::Mapping(Default::default()), |acc, config| {
            first_wins_merge(&acc, config)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn earlier_key_is_not_overridden() {
        let primary = yaml("params:\n  inp_title: local\n");
        let fallback = yaml("params:\n  inp_title: shared\n  pheno: p.txt\n");

        let result = first_wins_merge(&primary, &fallback);

        assert_eq!(result["params"]["inp_title"], "local");
        assert_eq!(result["params"]["pheno"], "p.txt");
    }

    #[test]
    fn sequences_come_from_first_declaring_file() {
        let primary = yaml("tasks:\n  - name: a\n");
        let fallback = yaml("tasks:\n  - name: b\n  - name: c\n");

        let result = first_wins_merge(&primary, &fallback);

        let tasks = result["tasks"].as_sequence().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0]["name"], "a");
    }

    #[test]
    fn missing_sequence_filled_from_fallback() {
        let primary = yaml("params:\n  a: 1\n");
        let fallback = yaml("tasks:\n  - name: b\n");

        let result = first_wins_merge(&primary, &fallback);

        assert_eq!(result["tasks"][0]["name"], "b");
        assert_eq!(result["params"]["a"], 1);
    }

    #[test]
    fn null_in_primary_is_filled() {
        let primary = yaml("settings:\n  log_dir: ~\n");
        let fallback = yaml("settings:\n  log_dir: logs\n");

        let result = first_wins_merge(&primary, &fallback);

        assert_eq!(result["settings"]["log_dir"], "logs");
    }

    #[test]
    fn merge_configs_respects_priority_order() {
        let configs = vec![
            yaml("params:\n  x: first\n"),
            yaml("params:\n  x: second\n  y: second\n"),
            yaml("params:\n  x: third\n  y: third\n  z: third\n"),
        ];

        let result = merge_configs(&configs);

        assert_eq!(result["params"]["x"], "first");
        assert_eq!(result["params"]["y"], "second");
        assert_eq!(result["params"]["z"], "third");
    }

    #[test]
    fn merge_configs_empty_is_empty_mapping() {
        let result = merge_configs(&[]);
        assert!(result.as_mapping().unwrap().is_empty());
    }
}

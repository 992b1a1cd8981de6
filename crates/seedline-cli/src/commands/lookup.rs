use crate::support::{load_config_or_exit, load_registry_or_exit, print_json_or_exit};
use seedline_kernel::normalize;
use serde_json::json;

pub fn run(config: Option<String>, units: String, text: String, json_output: bool) {
    let config = load_config_or_exit(config.as_deref());
    let registry = load_registry_or_exit(&units, &config);
    let key = normalize(&text);
    let unit = registry.lookup(&key);

    if json_output {
        print_json_or_exit(&json!({
            "query": text,
            "normalized": key.as_str(),
            "found": unit.is_some(),
            "unit": unit.map(|u| u.to_record()),
        }));
    } else {
        match unit {
            Some(unit) => {
                println!("{} -> unit {}", key.as_str(), unit.id);
                println!("  Target: {}", unit.target_text);
                println!("  Known: {}", unit.known_text);
                println!("  Kind: {}", unit.kind.tag().as_str());
                println!("  Introduced at: {}", unit.introduced_at);
                if let Some(components) = unit.kind.components() {
                    let parts: Vec<&str> =
                        components.iter().map(|c| c.target_text.as_str()).collect();
                    println!("  Components: {}", parts.join(" + "));
                }
            }
            None => println!("{} -> not registered", key.as_str()),
        }
    }
    if unit.is_none() {
        std::process::exit(1);
    }
}

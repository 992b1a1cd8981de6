use crate::support::{
    load_config_or_exit, load_registry_or_exit, parse_sentence_id_or_exit, print_json_or_exit,
};
use seedline_kernel::FrontierIndex;
use serde_json::json;

pub fn run(config: Option<String>, units: String, at: String, window: Option<u32>, json_output: bool) {
    let config = load_config_or_exit(config.as_deref());
    let registry = load_registry_or_exit(&units, &config);
    let position = parse_sentence_id_or_exit(&at);
    let index = FrontierIndex::build(&registry);

    let available = index.frontier(position);
    let recent = match window {
        Some(requested) => {
            let width = config.recent_window(Some(requested)).unwrap_or_else(|e| {
                eprintln!("error: {e}");
                std::process::exit(1);
            });
            Some((width, index.recent_frontier(position, width)))
        }
        None => config
            .recent_window(None)
            .ok()
            .map(|width| (width, index.recent_frontier(position, width))),
    };

    if json_output {
        let mut payload = json!({
            "position": position,
            "tokenCount": available.len(),
            "frontier": available,
        });
        if let Some((width, tokens)) = &recent {
            payload["window"] = json!(width);
            payload["recentFrontier"] = json!(tokens);
        }
        print_json_or_exit(&payload);
    } else {
        println!("seedline frontier at {position}");
        println!("  Available tokens: {}", available.len());
        for token in &available {
            println!("    {token}");
        }
        if let Some((width, tokens)) = &recent {
            println!("  Taught in the last {width} sentence(s): {}", tokens.len());
            for token in tokens {
                println!("    {token}");
            }
        }
    }
}

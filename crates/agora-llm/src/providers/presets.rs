use agora_core::config::ModelConfig;

/// A named provider preset for OpenAI-compatible APIs.
pub struct ProviderPreset {
    pub default_base_url: &'static str,
    pub api_key_env: Option<&'static str>,
    pub extra_headers: &'static [(&'static str, &'static str)],
}

/// Look up a provider preset by name.
pub fn get_preset(provider: &str) -> Option<ProviderPreset> {
    match provider {
        "ollama" => Some(ProviderPreset {
            default_base_url: "http://localhost:11434/v1/chat/completions",
            api_key_env: None,
            extra_headers: &[],
        }),
        "groq" => Some(ProviderPreset {
            default_base_url: "https://api.groq.com/openai/v1/chat/completions",
            api_key_env: Some("GROQ_API_KEY"),
            extra_headers: &[],
        }),
        "openrouter" => Some(ProviderPreset {
            default_base_url: "https://openrouter.ai/api/v1/chat/completions",
            api_key_env: Some("OPENROUTER_API_KEY"),
            extra_headers: &[("X-Title", "Agora")],
        }),
        "together" => Some(ProviderPreset {
            default_base_url: "https://api.together.xyz/v1/chat/completions",
            api_key_env: Some("TOGETHER_API_KEY"),
            extra_headers: &[],
        }),
        "mistral" => Some(ProviderPreset {
            default_base_url: "https://api.mistral.ai/v1/chat/completions",
            api_key_env: Some("MISTRAL_API_KEY"),
            extra_headers: &[],
        }),
        "deepseek" => Some(ProviderPreset {
            default_base_url: "https://api.deepseek.com/v1/chat/completions",
            api_key_env: Some("DEEPSEEK_API_KEY"),
            extra_headers: &[],
        }),
        "gemini" => Some(ProviderPreset {
            default_base_url:
                "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
            api_key_env: Some("GEMINI_API_KEY"),
            extra_headers: &[],
        }),
        _ => None,
    }
}

/// Fill in base URL, API key and headers for preset providers.
///
/// Values the user set explicitly always win.
pub fn apply_preset_defaults(config: &mut ModelConfig) {
    let Some(preset) = get_preset(&config.provider) else {
        return;
    };

    if config.base_url.is_none() {
        config.base_url = Some(preset.default_base_url.to_string());
    }
    if config.api_key.is_none() {
        if let Some(var) = preset.api_key_env {
            config.api_key = std::env::var(var).ok();
        }
    }
    for (k, v) in preset.extra_headers {
        config
            .extra_headers
            .entry(k.to_string())
            .or_insert_with(|| v.to_string());
    }
}

/// List all known preset provider names.
pub fn all_preset_names() -> &'static [&'static str] {
    &["ollama", "groq", "openrouter", "together", "mistral", "deepseek", "gemini"]
}

//! Init command implementation
//!
//! Scaffolds a `delve.toml` (plus `.env.example` and `.gitignore`) in a directory.

use super::output::Output;
use crate::utils::toml_config::SearchBackend;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug, PartialEq, Eq)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// Project already exists (delve.toml found)
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// LLM provider to configure (none, ollama or openai)
    pub provider: String,
    /// Evidence backend
    pub backend: SearchBackend,
    /// Host address for the server
    pub host: String,
    /// Port for the server
    pub port: u16,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing Delve");

    let base_path = &config.path;
    if !base_path.exists()
        && let Err(e) = fs::create_dir_all(base_path)
    {
        output.error(&format!("Failed to create {}: {}", base_path.display(), e));
        return InitResult::Error(e.to_string());
    }

    let config_path = base_path.join("delve.toml");
    if config_path.exists() && !config.force {
        output.warning("delve.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    output.subheader("Creating configuration files");

    if let Err(e) = write_file(&config_path, &generate_delve_toml(&config), config.force) {
        output.error(&format!("Failed to create delve.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "delve.toml");

    let env_example_path = base_path.join(".env.example");
    if let Err(e) = write_file(&env_example_path, &generate_env_example(), config.force) {
        output.error(&format!("Failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("env", ".env.example");

    let gitignore_path = base_path.join(".gitignore");
    if gitignore_path.exists() {
        output.skipped(".gitignore", "already exists");
    } else if let Err(e) = write_file(&gitignore_path, &generate_gitignore(), false) {
        output.warning(&format!("Failed to create .gitignore: {}", e));
    } else {
        output.created("file", ".gitignore");
    }

    output.complete("Delve initialized successfully!");

    output.header("Next Steps");
    output.newline();
    match config.provider.as_str() {
        "ollama" => {
            output.info("Start Ollama (if not running):");
            output.command("ollama serve");
            output.command("ollama pull llama3.2  # or your preferred model");
        }
        "openai" => {
            output.info("Set your API key:");
            output.command("cp .env.example .env");
            output.command("# Edit .env and set OPENAI_API_KEY");
        }
        _ => output.info("No LLM configured; rule-based planning and template reports are used."),
    }
    output.newline();

    output.info("Try a research run:");
    output.command("delve research \"Impact of tariffs on semiconductor supply chains\"");
    output.info("Or start the server:");
    output.command("delve serve");

    output.hint(&format!(
        "Server will be available at http://{}:{}",
        config.host, config.port
    ));
    output.hint("API docs available at /swagger-ui/ (requires 'swagger-ui' feature)");

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(()); // Skip existing files unless force is true
    }
    fs::write(path, content)
}

fn generate_delve_toml(config: &InitConfig) -> String {
    let backend = match config.backend {
        SearchBackend::Simulated => "simulated",
        SearchBackend::Web => "web",
    };

    let llm_section = match config.provider.as_str() {
        "ollama" => {
            r#"# Ollama - Local inference (no API key required)
[llm]
type = "ollama"
base_url = "http://localhost:11434"
model = "llama3.2"
"#
        }
        "openai" => {
            r#"# OpenAI API (set OPENAI_API_KEY in .env)
[llm]
type = "openai"
api_key_env = "OPENAI_API_KEY"
api_base = "https://api.openai.com/v1"
model = "gpt-4o-mini"
"#
        }
        _ => {
            r#"# Uncomment to plan and write reports with an LLM
# [llm]
# type = "ollama"
# base_url = "http://localhost:11434"
# model = "llama3.2"
"#
        }
    };

    format!(
        r#"# Delve configuration
# Changes are picked up while the server is running.

[server]
host = "{host}"
port = {port}
log_level = "info"
# "pretty" or "json"
log_format = "pretty"

[research]
# "simulated" (offline, deterministic) or "web" (DuckDuckGo)
backend = "{backend}"
max_concurrency = 4
gather_timeout_ms = 15000
min_tasks = 3
max_tasks = 6
results_per_task = 3
results_per_query = 3
archive_capacity = 100

{llm_section}"#,
        host = config.host,
        port = config.port,
        backend = backend,
        llm_section = llm_section,
    )
}

fn generate_env_example() -> String {
    r#"# Delve Environment Variables
# Copy this file to .env and fill in the values.

# Optional: Logging filter, overrides server.log_level
RUST_LOG=info,delve=debug

# Optional: OpenAI API key (if using the openai provider)
# OPENAI_API_KEY=sk-...
"#
    .to_string()
}

fn generate_gitignore() -> String {
    r#"# Delve
.env
/target
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::toml_config::{DelveConfig, LlmConfig};
    use tempfile::TempDir;

    fn init_config(temp_dir: &TempDir, provider: &str) -> InitConfig {
        InitConfig {
            path: temp_dir.path().to_path_buf(),
            force: false,
            provider: provider.to_string(),
            backend: SearchBackend::Simulated,
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }

    #[test]
    fn test_init_creates_files() {
        let temp_dir = TempDir::new().unwrap();
        let result = run(init_config(&temp_dir, "none"), &Output::no_color());

        assert_eq!(result, InitResult::Success);
        assert!(temp_dir.path().join("delve.toml").exists());
        assert!(temp_dir.path().join(".env.example").exists());
        assert!(temp_dir.path().join(".gitignore").exists());
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("delve.toml"), "# mine").unwrap();

        let result = run(init_config(&temp_dir, "none"), &Output::no_color());
        assert_eq!(result, InitResult::AlreadyExists);
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("delve.toml")).unwrap(),
            "# mine"
        );

        let mut forced = init_config(&temp_dir, "none");
        forced.force = true;
        assert_eq!(run(forced, &Output::no_color()), InitResult::Success);
        assert_ne!(
            fs::read_to_string(temp_dir.path().join("delve.toml")).unwrap(),
            "# mine"
        );
    }

    #[test]
    fn test_generated_config_is_valid() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = init_config(&temp_dir, "ollama");
        config.backend = SearchBackend::Web;
        config.port = 8088;

        let parsed = DelveConfig::parse(&generate_delve_toml(&config)).unwrap();
        parsed.validate().unwrap();
        assert_eq!(parsed.server.port, 8088);
        assert_eq!(parsed.research.backend, SearchBackend::Web);
        assert!(matches!(parsed.llm, Some(LlmConfig::Ollama { .. })));
    }

    #[test]
    fn test_generated_config_without_llm() {
        let temp_dir = TempDir::new().unwrap();
        let parsed =
            DelveConfig::parse(&generate_delve_toml(&init_config(&temp_dir, "none"))).unwrap();
        assert!(parsed.llm.is_none());
        assert_eq!(parsed.research.options(), crate::research::ResearchOptions::default());
    }

    #[test]
    fn test_generated_openai_section() {
        let temp_dir = TempDir::new().unwrap();
        let toml = generate_delve_toml(&init_config(&temp_dir, "openai"));
        let parsed = DelveConfig::parse(&toml).unwrap();
        assert!(matches!(
            parsed.llm,
            Some(LlmConfig::OpenAI { ref api_key_env, .. }) if api_key_env == "OPENAI_API_KEY"
        ));
    }
}

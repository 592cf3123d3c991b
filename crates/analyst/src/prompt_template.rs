use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Error as TeraError, Tera};

use crate::models::tool::Tool;

const SYSTEM_PROMPT: &str = include_str!("prompts/system.md");

/// Get the path to the prompts directory
fn prompts_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir).join("src").join("prompts")
}

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

pub fn load_prompt_file<T: Serialize>(
    template_file: impl Into<PathBuf>,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_path = template_file.into();
    // relative names that don't resolve are looked up in the bundled prompts
    let file_path = if !template_path.exists() {
        prompts_dir().join(template_path)
    } else {
        template_path
    };

    let template_content = fs::read_to_string(file_path)
        .map_err(|e| TeraError::chain("Failed to read template file", e))?;
    load_prompt(&template_content, context_data)
}

#[derive(Serialize)]
struct ToolSummary<'a> {
    name: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct SystemPromptContext<'a> {
    tools: Vec<ToolSummary<'a>>,
}

/// Render the analyst system prompt for the given catalog, from `template_file`
/// when one is configured or the bundled template otherwise
pub fn render_system_prompt(
    tools: &[Tool],
    template_file: Option<&Path>,
) -> Result<String, TeraError> {
    let context = SystemPromptContext {
        tools: tools
            .iter()
            .map(|t| ToolSummary {
                name: &t.name,
                description: &t.description,
            })
            .collect(),
    };

    match template_file {
        Some(path) => load_prompt_file(path, &context),
        None => load_prompt(SYSTEM_PROMPT, &context),
    }
}
